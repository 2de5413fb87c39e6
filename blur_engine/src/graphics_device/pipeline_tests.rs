//! Unit tests for pipeline.rs

use std::sync::Arc;
use crate::error::Error;
use crate::graphics_device::pipeline::*;
use crate::graphics_device::shader::{DescriptorBinding, DescriptorType, SetLayoutDesc, ShaderStageFlags};
use crate::graphics_device::swapchain::Extent2D;
use crate::graphics_device::TextureFormat;

/// Stand-in for a backend shader module
#[derive(Debug)]
struct FakeShader(&'static str);

fn desc() -> GraphicsPipelineDesc<FakeShader> {
    let mut desc = GraphicsPipelineDesc::new(Arc::new(FakeShader("vs")), Arc::new(FakeShader("fs")));
    desc.color_formats = vec![TextureFormat::B8G8R8A8_SRGB];
    desc.name = "test".to_string();
    desc
}

fn uniform_set(set_index: u32) -> SetLayoutDesc {
    SetLayoutDesc::new(set_index, vec![DescriptorBinding {
        binding: 0,
        descriptor_type: DescriptorType::UniformBuffer,
        count: 1,
        stages: ShaderStageFlags::VERTEX,
    }])
}

// ============================================================================
// GRAPHICS DESCRIPTOR
// ============================================================================

#[test]
fn test_defaults() {
    let d = desc();
    assert!(d.depth_test && d.depth_write);
    assert_eq!(d.topology, PrimitiveTopology::TriangleList);
    assert_eq!(d.cull_mode, CullMode::Back);
    assert_eq!(d.front_face, FrontFace::CounterClockwise);
    assert_eq!(d.vertex_shader.0, "vs");
    assert!(d.validate().is_ok());
}

#[test]
fn test_desc_keeps_shaders_alive() {
    let vs = Arc::new(FakeShader("vs"));
    let d = GraphicsPipelineDesc::new(vs.clone(), Arc::new(FakeShader("fs")));
    drop(vs);
    assert_eq!(d.vertex_shader.0, "vs");
}

#[test]
fn test_default_blend_state_per_color_attachment() {
    let mut d = desc();
    d.color_formats.push(TextureFormat::R16G16B16A16_SFLOAT);
    d.blend_enable = true;

    let states = d.resolved_blend_states().unwrap();
    assert_eq!(states.len(), 2);
    assert!(states.iter().all(|s| s.enable));
    assert_eq!(states[0].src_color, BlendFactor::SrcAlpha);
    assert_eq!(states[0].dst_color, BlendFactor::OneMinusSrcAlpha);
    assert_eq!(states[0].write_mask, ColorWriteMask::all());
}

#[test]
fn test_blend_state_count_mismatch() {
    let mut d = desc();
    d.blend_states = vec![BlendState::default(), BlendState::default()];
    assert!(matches!(d.resolved_blend_states(), Err(Error::PreconditionFailed(_))));
    assert!(d.validate().is_err());
}

#[test]
fn test_dynamic_rendering_needs_formats() {
    let mut d = desc();
    d.color_formats.clear();
    d.use_dynamic_rendering = true;
    assert!(d.validate().is_err());
    d.depth_format = TextureFormat::D32_SFLOAT;
    assert!(d.validate().is_ok());
}

#[test]
fn test_vertex_input_validation() {
    let mut input = VertexInputDesc {
        bindings: vec![VertexBinding { binding: 0, stride: 24, per_instance: false }],
        attributes: vec![
            VertexAttribute { location: 0, binding: 0, format: VertexFormat::R32G32B32_SFLOAT, offset: 0 },
            VertexAttribute { location: 1, binding: 0, format: VertexFormat::R32G32B32_SFLOAT, offset: 12 },
        ],
    };
    assert!(input.validate().is_ok());

    input.attributes[1].offset = 16;
    assert!(input.validate().is_err());

    input.attributes[1].offset = 12;
    input.attributes[1].binding = 3;
    assert!(input.validate().is_err());
}

#[test]
fn test_specialization_data_size() {
    let spec = SpecializationConstants {
        entries: vec![
            SpecializationEntry { constant_id: 0, offset: 0, size: 4 },
            SpecializationEntry { constant_id: 1, offset: 4, size: 4 },
        ],
        data: vec![0; 8],
    };
    assert_eq!(spec.data_size(), 8);
    assert!(spec.validate().is_ok());

    let short = SpecializationConstants { data: vec![0; 6], ..spec };
    assert!(short.validate().is_err());
    assert_eq!(SpecializationConstants::default().data_size(), 0);
}

#[test]
fn test_viewport_scissor_handles_flipped_height() {
    let mut viewport = Viewport::from_extent(Extent2D::new(800, 600));
    viewport.y = 600.0;
    viewport.height = -600.0;
    assert_eq!(viewport.scissor_extent(), Extent2D::new(800, 600));
}

#[test]
fn test_compute_desc_rejects_sparse_sets() {
    let mut d = ComputePipelineDesc::new(Arc::new(FakeShader("cs")));
    d.set_layouts = vec![uniform_set(0), uniform_set(2)];
    assert!(d.validate().is_err());
    d.set_layouts = vec![uniform_set(0), uniform_set(1)];
    assert!(d.validate().is_ok());
}

// ============================================================================
// DESCRIPTOR POOL
// ============================================================================

#[test]
fn test_pool_sizes_scale_with_set_count() {
    let layouts = vec![
        uniform_set(0),
        SetLayoutDesc::bindless(1, DescriptorType::SampledImage, ShaderStageFlags::FRAGMENT),
    ];
    let pool = DescriptorPoolSizes::for_sets(&layouts, &[(0, 3), (1, 1)]).unwrap();

    assert_eq!(pool.max_sets, 4);
    assert!(pool.update_after_bind);
    assert_eq!(pool.sizes, vec![(DescriptorType::SampledImage, 1000), (DescriptorType::UniformBuffer, 3)]);
}

#[test]
fn test_pool_sizes_unknown_set() {
    let result = DescriptorPoolSizes::for_sets(&[uniform_set(0)], &[(5, 1)]);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
    assert!(DescriptorPoolSizes::for_sets(&[uniform_set(0)], &[]).is_err());
}

#[test]
fn test_pool_sizes_zero_count_rejected() {
    let result = DescriptorPoolSizes::for_sets(&[uniform_set(0)], &[(0, 0)]);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

#[test]
fn test_pool_sizes_duplicate_set_rejected() {
    let layouts = vec![uniform_set(0), uniform_set(1)];
    let result = DescriptorPoolSizes::for_sets(&layouts, &[(0, 2), (1, 1), (0, 1)]);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// ALLOCATED SETS
// ============================================================================

#[test]
fn test_lookup_before_allocation_fails() {
    let sets: DescriptorSets<u64> = DescriptorSets::new();
    let err = sets.get(0, 0).unwrap_err();
    assert!(matches!(err, Error::PreconditionFailed(ref m) if m.contains("allocated before")));
}

#[test]
fn test_lookup_after_allocation() {
    let mut sets = DescriptorSets::new();
    sets.insert(0, vec![10u64, 11, 12]).unwrap();
    assert!(sets.is_allocated());
    assert_eq!(*sets.get(0, 2).unwrap(), 12);
    assert_eq!(sets.count(0), 3);
    assert!(sets.get(0, 3).is_err());
    assert!(sets.get(1, 0).is_err());
}

#[test]
fn test_double_allocation_rejected() {
    let mut sets = DescriptorSets::new();
    sets.insert(0, vec![1u64]).unwrap();
    assert!(sets.insert(0, vec![2u64]).is_err());
    assert_eq!(sets.drain().count(), 1);
    assert!(!sets.is_allocated());
}
