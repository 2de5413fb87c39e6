//! CPU-side mesh data
//!
//! Meshes come out of the OBJ loader as a flat vertex array plus 32-bit
//! indices. [`Vertex`] is `#[repr(C)]` and `Pod` so the arrays can be handed to
//! a buffer upload as raw bytes.

pub mod obj_loader;

pub use obj_loader::{load_obj, load_obj_from_bytes};

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};
use std::mem::offset_of;
use crate::graphics_device::{VertexAttribute, VertexBinding, VertexFormat, VertexInputDesc};

// ============================================================================
// VERTEX
// ============================================================================

/// Interleaved vertex as consumed by the default pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex layout at binding 0, one attribute per field in declaration order
    pub fn input_desc() -> VertexInputDesc {
        let attribute = |location, format, offset: usize| VertexAttribute {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };

        VertexInputDesc {
            bindings: vec![VertexBinding {
                binding: 0,
                stride: std::mem::size_of::<Vertex>() as u32,
                per_instance: false,
            }],
            attributes: vec![
                attribute(0, VertexFormat::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
                attribute(1, VertexFormat::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
                attribute(2, VertexFormat::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
                attribute(3, VertexFormat::R32G32B32_SFLOAT, offset_of!(Vertex, tangent)),
                attribute(4, VertexFormat::R32G32B32_SFLOAT, offset_of!(Vertex, bitangent)),
                attribute(5, VertexFormat::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
            ],
        }
    }

    /// Attribute bits used for deduplication
    ///
    /// Two vertices are the same vertex when position, color, normal and
    /// texture coordinate match bit for bit. The tangent frame is derived
    /// afterwards and does not take part.
    pub(crate) fn dedup_key(&self) -> [u32; 11] {
        let mut key = [0u32; 11];
        let fields = self
            .position
            .iter()
            .chain(&self.color)
            .chain(&self.normal)
            .chain(&self.tex_coord);
        for (slot, value) in key.iter_mut().zip(fields) {
            *slot = value.to_bits();
        }
        key
    }

    /// Transform position by `transform`, normal and tangent frame by its inverse transpose
    pub fn apply_transform(&mut self, transform: &Mat4) {
        self.position = transform.transform_point3(Vec3::from(self.position)).into();

        let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();
        self.normal = (normal_matrix * Vec3::from(self.normal)).normalize_or_zero().into();
        self.tangent = (normal_matrix * Vec3::from(self.tangent)).normalize_or_zero().into();
        self.bitangent = (normal_matrix * Vec3::from(self.bitangent)).normalize_or_zero().into();
    }
}

// ============================================================================
// BOUNDS
// ============================================================================

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box that any point expands
    pub const EMPTY: Aabb = Aabb { min: Vec3::splat(f32::INFINITY), max: Vec3::splat(f32::NEG_INFINITY) };

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Half size along each axis
    pub fn extents(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.max - self.min) * 0.5
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.min + self.extents()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

// ============================================================================
// MESH DATA
// ============================================================================

/// Indexed triangle list with its bounds
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Append a vertex unless an identical one is already present
    ///
    /// `lookup` maps dedup keys to vertex indices and must only ever be used
    /// with this mesh.
    pub(crate) fn push_deduplicated(
        &mut self,
        lookup: &mut rustc_hash::FxHashMap<[u32; 11], u32>,
        vertex: Vertex,
    ) {
        let next = self.vertices.len() as u32;
        let index = *lookup.entry(vertex.dedup_key()).or_insert_with(|| {
            self.bounds.expand(Vec3::from(vertex.position));
            self.vertices.push(vertex);
            next
        });
        self.indices.push(index);
    }

    /// Accumulate per-triangle tangents and bitangents, then orthonormalize per vertex
    ///
    /// Each vertex ends with a tangent made orthogonal to its normal
    /// (Gram-Schmidt) and a bitangent of `normal x tangent`. Triangles with a
    /// degenerate UV mapping do not contribute.
    pub fn compute_tangent_basis(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];

        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);

            let edge1 = Vec3::from(v1.position) - Vec3::from(v0.position);
            let edge2 = Vec3::from(v2.position) - Vec3::from(v0.position);
            let delta_uv1 = Vec2::from(v1.tex_coord) - Vec2::from(v0.tex_coord);
            let delta_uv2 = Vec2::from(v2.tex_coord) - Vec2::from(v0.tex_coord);

            let det = delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let tangent = (edge1 * delta_uv2.y - edge2 * delta_uv1.y) / det;

            tangents[i0] += tangent;
            tangents[i1] += tangent;
            tangents[i2] += tangent;
        }

        for (vertex, tangent) in self.vertices.iter_mut().zip(tangents) {
            let normal = Vec3::from(vertex.normal);
            let tangent = (tangent - normal * tangent.dot(normal)).normalize_or_zero();
            vertex.tangent = tangent.into();
            vertex.bitangent = normal.cross(tangent).normalize_or_zero().into();
        }
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
