//! Wavefront OBJ loading
//!
//! Faces are triangulated on load. All shapes in the file are merged into one
//! [`MeshData`]; materials are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::mesh::{MeshData, Vertex};

/// Load an OBJ file from disk
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<MeshData> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::AssetLoadFailed(format!("Cannot open '{}': {}", path.display(), e))
    })?;
    let mesh = parse(&mut BufReader::new(file), &path.display().to_string())?;

    crate::engine_debug!(
        "blur::ObjLoader",
        "Loaded '{}': {} vertices, {} indices",
        path.display(),
        mesh.vertices.len(),
        mesh.indices.len()
    );
    Ok(mesh)
}

/// Load an OBJ file already in memory
pub fn load_obj_from_bytes(bytes: &[u8]) -> Result<MeshData> {
    parse(&mut Cursor::new(bytes), "<memory>")
}

fn parse<R: BufRead>(reader: &mut R, name: &str) -> Result<MeshData> {
    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    };
    let (models, _materials) = tobj::load_obj_buf(reader, &options, |_| Ok(Default::default()))
        .map_err(|e| Error::AssetLoadFailed(format!("Cannot parse '{}': {}", name, e)))?;

    let mut mesh = MeshData::default();
    let mut lookup = FxHashMap::default();

    for model in &models {
        let source = &model.mesh;
        for (corner, &position_index) in source.indices.iter().enumerate() {
            let p = position_index as usize;
            let Some(position) = read3(&source.positions, p) else {
                return Err(Error::AssetLoadFailed(format!(
                    "'{}': position index {} out of range",
                    name, p
                )));
            };

            let mut vertex = Vertex {
                position,
                color: read3(&source.vertex_color, p).unwrap_or([1.0; 3]),
                ..Default::default()
            };
            if let Some(&n) = source.normal_indices.get(corner) {
                vertex.normal = read3(&source.normals, n as usize).unwrap_or_default();
            }
            if let Some(&t) = source.texcoord_indices.get(corner) {
                vertex.tex_coord = read2(&source.texcoords, t as usize).unwrap_or_default();
            }

            mesh.push_deduplicated(&mut lookup, vertex);
        }
    }

    if mesh.indices.is_empty() {
        return Err(Error::AssetLoadFailed(format!("'{}' contains no faces", name)));
    }

    mesh.compute_tangent_basis();
    Ok(mesh)
}

fn read3(data: &[f32], index: usize) -> Option<[f32; 3]> {
    data.get(3 * index..3 * index + 3).map(|s| [s[0], s[1], s[2]])
}

fn read2(data: &[f32], index: usize) -> Option<[f32; 2]> {
    data.get(2 * index..2 * index + 2).map(|s| [s[0], s[1]])
}

#[cfg(test)]
#[path = "obj_loader_tests.rs"]
mod tests;
