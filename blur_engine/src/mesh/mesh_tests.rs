//! Unit tests for mesh/mod.rs

use super::*;
use rustc_hash::FxHashMap;

fn vertex(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Vertex {
    Vertex { position, normal, tex_coord, color: [1.0; 3], ..Default::default() }
}

// ============================================================================
// VERTEX
// ============================================================================

#[test]
fn test_vertex_is_tightly_packed() {
    assert_eq!(std::mem::size_of::<Vertex>(), 17 * 4);
}

#[test]
fn test_input_desc_matches_layout() {
    let desc = Vertex::input_desc();
    desc.validate().unwrap();
    assert_eq!(desc.bindings[0].stride, 68);
    let offsets: Vec<u32> = desc.attributes.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 12, 24, 36, 48, 60]);
    assert_eq!(desc.attributes[5].format, VertexFormat::R32G32_SFLOAT);
}

#[test]
fn test_dedup_key_ignores_tangent_frame() {
    let a = vertex([1.0, 2.0, 3.0], [0.0, 0.0, 1.0], [0.5, 0.5]);
    let mut b = a;
    b.tangent = [1.0, 0.0, 0.0];
    b.bitangent = [0.0, 1.0, 0.0];
    assert_eq!(a.dedup_key(), b.dedup_key());

    let mut c = a;
    c.color = [0.0; 3];
    assert_ne!(a.dedup_key(), c.dedup_key());
}

#[test]
fn test_dedup_key_distinguishes_signed_zero() {
    let a = vertex([0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]);
    let b = vertex([-0.0, 0.0, 0.0], [0.0; 3], [0.0; 2]);
    assert_ne!(a.dedup_key(), b.dedup_key());
}

#[test]
fn test_apply_transform_translates_position_only() {
    let mut v = vertex([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0; 2]);
    v.apply_transform(&Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
    assert_eq!(v.position, [1.0, 5.0, 0.0]);
    assert_eq!(v.normal, [0.0, 0.0, 1.0]);
}

#[test]
fn test_apply_transform_keeps_normal_unit_under_scale() {
    let mut v = vertex([1.0, 1.0, 1.0], [0.0, 1.0, 0.0], [0.0; 2]);
    v.apply_transform(&Mat4::from_scale(Vec3::new(2.0, 4.0, 2.0)));
    assert_eq!(v.position, [2.0, 4.0, 2.0]);
    assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-6);
}

// ============================================================================
// AABB
// ============================================================================

#[test]
fn test_empty_aabb() {
    let aabb = Aabb::default();
    assert!(aabb.is_empty());
    assert_eq!(aabb.extents(), Vec3::ZERO);
    assert_eq!(aabb.center(), Vec3::ZERO);
}

#[test]
fn test_aabb_expand_tracks_min_and_max() {
    let mut aabb = Aabb::EMPTY;
    aabb.expand(Vec3::new(-1.0, 2.0, 0.0));
    aabb.expand(Vec3::new(3.0, -2.0, 4.0));
    assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
    assert_eq!(aabb.max, Vec3::new(3.0, 2.0, 4.0));
    assert_eq!(aabb.extents(), Vec3::new(2.0, 2.0, 2.0));
    assert_eq!(aabb.center(), Vec3::new(1.0, 0.0, 2.0));
}

// ============================================================================
// MESH DATA
// ============================================================================

#[test]
fn test_push_deduplicated() {
    let mut mesh = MeshData::default();
    let mut lookup = FxHashMap::default();
    let a = vertex([0.0; 3], [0.0, 0.0, 1.0], [0.0; 2]);
    let b = vertex([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]);

    for v in [a, b, a, a, b] {
        mesh.push_deduplicated(&mut lookup, v);
    }
    assert_eq!(mesh.vertices.len(), 2);
    assert_eq!(mesh.indices, vec![0, 1, 0, 0, 1]);
    assert_eq!(mesh.bounds.max, Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_byte_views() {
    let mesh = MeshData {
        vertices: vec![Vertex::default(); 3],
        indices: vec![0, 1, 2],
        bounds: Aabb::EMPTY,
    };
    assert_eq!(mesh.vertex_bytes().len(), 3 * 68);
    assert_eq!(mesh.index_bytes(), bytemuck::cast_slice::<u32, u8>(&[0, 1, 2]));
}

#[test]
fn test_degenerate_uv_leaves_zero_tangent() {
    let mut mesh = MeshData {
        vertices: vec![
            vertex([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            vertex([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        ],
        indices: vec![0, 1, 2],
        bounds: Aabb::EMPTY,
    };
    mesh.compute_tangent_basis();
    for v in &mesh.vertices {
        assert_eq!(v.tangent, [0.0; 3]);
        assert!(v.tangent.iter().all(|c| c.is_finite()));
    }
}

#[test]
fn test_tangent_orthogonal_to_normal() {
    // Tilted normal: the raw UV tangent (1,0,0) is not orthogonal to it
    let n = Vec3::new(1.0, 0.0, 1.0).normalize();
    let mut mesh = MeshData {
        vertices: vec![
            vertex([0.0, 0.0, 0.0], n.into(), [0.0, 0.0]),
            vertex([1.0, 0.0, 0.0], n.into(), [1.0, 0.0]),
            vertex([0.0, 1.0, 0.0], n.into(), [0.0, 1.0]),
        ],
        indices: vec![0, 1, 2],
        bounds: Aabb::EMPTY,
    };
    mesh.compute_tangent_basis();
    for v in &mesh.vertices {
        let t = Vec3::from(v.tangent);
        let b = Vec3::from(v.bitangent);
        assert!(t.dot(n).abs() < 1e-5);
        assert!((t.length() - 1.0).abs() < 1e-5);
        assert!((b - n.cross(t)).length() < 1e-5);
    }
}
