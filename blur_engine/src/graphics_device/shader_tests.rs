//! Unit tests for shader.rs

use std::path::{Path, PathBuf};
use crate::error::Error;
use crate::graphics_device::shader::*;

fn reflected(set: u32, binding: u32, descriptor_type: DescriptorType, count: u32) -> ReflectedBinding {
    ReflectedBinding { name: None, set, binding, descriptor_type, count }
}

// ============================================================================
// STAGE AND SOURCE KIND
// ============================================================================

#[test]
fn test_stage_from_extension() {
    let cases = [
        ("mesh.vert", ShaderStage::Vertex),
        ("mesh.frag", ShaderStage::Fragment),
        ("cull.comp", ShaderStage::Compute),
        ("rt.rgen", ShaderStage::RayGen),
        ("rt.rmiss", ShaderStage::Miss),
        ("rt.rchit", ShaderStage::ClosestHit),
        ("rt.rahit", ShaderStage::AnyHit),
    ];
    for (file, stage) in cases {
        assert_eq!(ShaderStage::from_path(Path::new(file)).unwrap(), stage, "{}", file);
    }
}

#[test]
fn test_stage_from_precompiled_extension() {
    assert_eq!(ShaderStage::from_path(Path::new("shaders/mesh.frag.spv")).unwrap(), ShaderStage::Fragment);
}

#[test]
fn test_unknown_stage_fails() {
    let result = ShaderStage::from_path(Path::new("mesh.glsl"));
    assert!(matches!(result, Err(Error::ShaderCompilationFailed(_))));
    assert!(ShaderStage::from_path(Path::new("mesh.spv")).is_err());
}

#[test]
fn test_source_kind() {
    assert_eq!(ShaderSourceKind::from_path(Path::new("a.vert.spv")), ShaderSourceKind::SpirV);
    assert_eq!(ShaderSourceKind::from_path(Path::new("a.vert")), ShaderSourceKind::Glsl);
}

#[test]
fn test_ray_tracing_stages() {
    assert!(ShaderStage::RayGen.is_ray_tracing());
    assert!(!ShaderStage::Compute.is_ray_tracing());
}

#[test]
fn test_include_resolved_next_to_including_file() {
    let resolved = resolve_include(Path::new("shaders/lighting/pbr.frag"), "common.glsl");
    assert_eq!(resolved, PathBuf::from("shaders/lighting/common.glsl"));
}

// ============================================================================
// SET LAYOUTS
// ============================================================================

#[test]
fn test_bindless_set() {
    let set = SetLayoutDesc::bindless(1, DescriptorType::SampledImage, ShaderStageFlags::FRAGMENT);
    assert!(set.bindless);
    assert_eq!(set.bindings[0].count, MAX_DESC_BINDLESS);
    assert!(set.check_write(0, 999, DescriptorType::SampledImage).is_ok());
    assert!(set.check_write(0, 1000, DescriptorType::SampledImage).is_err());
}

#[test]
fn test_check_write_rejects_wrong_binding_or_type() {
    let set = SetLayoutDesc::new(0, vec![DescriptorBinding {
        binding: 0,
        descriptor_type: DescriptorType::UniformBuffer,
        count: 1,
        stages: ShaderStageFlags::VERTEX,
    }]);
    assert!(set.check_write(0, 0, DescriptorType::UniformBuffer).is_ok());
    assert!(matches!(set.check_write(1, 0, DescriptorType::UniformBuffer), Err(Error::PreconditionFailed(_))));
    assert!(set.check_write(0, 0, DescriptorType::StorageBuffer).is_err());
}

#[test]
fn test_set_indices_must_be_contiguous() {
    let a = SetLayoutDesc::new(0, vec![]);
    let b = SetLayoutDesc::new(1, vec![]);
    let c = SetLayoutDesc::new(3, vec![]);
    assert!(validate_set_layouts(&[b.clone(), a.clone()]).is_ok());
    assert!(validate_set_layouts(&[a.clone(), c]).is_err());
    assert!(validate_set_layouts(&[a.clone(), a]).is_err());
    assert!(validate_set_layouts(&[]).is_ok());
}

#[test]
fn test_update_after_bind_excludes_dynamic_and_input_attachments() {
    assert!(DescriptorType::SampledImage.supports_update_after_bind());
    assert!(DescriptorType::CombinedImageSampler.supports_update_after_bind());
    assert!(DescriptorType::StorageBuffer.supports_update_after_bind());
    assert!(DescriptorType::UniformBuffer.supports_update_after_bind());

    assert!(!DescriptorType::UniformBufferDynamic.supports_update_after_bind());
    assert!(!DescriptorType::StorageBufferDynamic.supports_update_after_bind());
    assert!(!DescriptorType::InputAttachment.supports_update_after_bind());
}

// ============================================================================
// REFLECTION MERGE
// ============================================================================

#[test]
fn test_merge_unions_stage_masks() {
    let vs = ShaderReflection {
        bindings: vec![reflected(0, 0, DescriptorType::UniformBuffer, 1)],
        push_constant_size: Some(64),
    };
    let fs = ShaderReflection {
        bindings: vec![
            reflected(0, 0, DescriptorType::UniformBuffer, 1),
            reflected(0, 1, DescriptorType::CombinedImageSampler, 1),
        ],
        push_constant_size: Some(16),
    };

    let sets = merge_reflected_layouts(&[(ShaderStage::Vertex, &vs), (ShaderStage::Fragment, &fs)]).unwrap();
    assert_eq!(sets.len(), 1);
    let camera = sets[0].binding(0).unwrap();
    assert_eq!(camera.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);
    assert_eq!(sets[0].binding(1).unwrap().stages, ShaderStageFlags::FRAGMENT);

    let push = merge_push_constants(&[(ShaderStage::Vertex, &vs), (ShaderStage::Fragment, &fs)]).unwrap();
    assert_eq!(push.size, 64);
    assert_eq!(push.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);
}

#[test]
fn test_merge_runtime_array_becomes_bindless() {
    let fs = ShaderReflection {
        bindings: vec![reflected(1, 0, DescriptorType::SampledImage, 0)],
        push_constant_size: None,
    };
    let sets = merge_reflected_layouts(&[(ShaderStage::Fragment, &fs)]).unwrap();

    // Set 0 is filled in empty so set 1 keeps its position
    assert_eq!(sets.len(), 2);
    assert!(sets[0].bindings.is_empty());
    assert!(sets[1].bindless);
    assert_eq!(sets[1].bindings[0].count, MAX_DESC_BINDLESS);
}

#[test]
fn test_merge_conflicting_types_fails() {
    let vs = ShaderReflection { bindings: vec![reflected(0, 0, DescriptorType::UniformBuffer, 1)], push_constant_size: None };
    let fs = ShaderReflection { bindings: vec![reflected(0, 0, DescriptorType::StorageBuffer, 1)], push_constant_size: None };
    let result = merge_reflected_layouts(&[(ShaderStage::Vertex, &vs), (ShaderStage::Fragment, &fs)]);
    assert!(matches!(result, Err(Error::ShaderCompilationFailed(_))));
}

#[test]
fn test_merge_nothing_reflected() {
    let empty = ShaderReflection::default();
    assert!(merge_reflected_layouts(&[(ShaderStage::Vertex, &empty)]).unwrap().is_empty());
    assert!(merge_push_constants(&[(ShaderStage::Vertex, &empty)]).is_none());
}
