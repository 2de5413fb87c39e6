//! Integration tests for the Vulkan backend on a headless context
//!
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_context_tests -- --ignored

mod gpu_test_utils;

use blur_engine::blur::render::{
    BufferDesc, BufferUsage, ComputePipelineDesc, DescriptorType, FramebufferDesc, ImageLayout, LoadOp,
    MemoryUsage, SamplerDesc, StoreOp, TextureDesc, TextureFormat, TextureUsage,
};
use blur_engine::blur::Error;
use blur_engine_renderer_vulkan::blur::{DescriptorResource, QueueSubmission};
use gpu_test_utils::{get_test_context, shader_dir};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FILL_COMPUTE: &str = r#"#version 450
layout(local_size_x = 64) in;

layout(set = 0, binding = 0) buffer Values {
    uint values[];
} data;

layout(push_constant) uniform Push {
    uint fill;
} push;

void main() {
    data.values[gl_GlobalInvocationID.x] = push.fill;
}
"#;

// ============================================================================
// CONTEXT TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_headless_context_has_graphics_queue_and_no_surface() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    assert!(!context.has_surface());
    assert!(context.gpu().graphics_queue().is_ok());
    assert!(!context.physical_device().name().is_empty());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_headless_context_rejects_swapchain() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let result = context.create_swapchain(blur_engine::blur::render::Extent2D::new(800, 600));
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_host_visible_buffer_copy_and_read_back() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let desc = BufferDesc::new(64, BufferUsage::UNIFORM, MemoryUsage::CpuToGpu, "Readback Uniform");
    let buffer = context.create_buffer(&desc).unwrap();
    buffer.copy_to_buffer_at(16, &[1, 2, 3, 4]).unwrap();

    assert_eq!(buffer.read_back(16, 4).unwrap(), vec![1, 2, 3, 4]);
    assert!(matches!(buffer.copy_to_buffer_at(62, &[0; 4]), Err(Error::PreconditionFailed(_))));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_unaligned_buffer_bounds_use_buffer_size() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    // The allocation behind a 10-byte buffer is rounded up; writes must not use the padding
    let desc = BufferDesc::new(10, BufferUsage::UNIFORM, MemoryUsage::CpuToGpu, "Unaligned Uniform");
    let buffer = context.create_buffer(&desc).unwrap();

    buffer.copy_to_buffer(&[5; 10]).unwrap();
    assert!(matches!(buffer.copy_to_buffer(&[0; 13]), Err(Error::PreconditionFailed(_))));
    assert!(matches!(buffer.copy_to_buffer_at(8, &[0; 3]), Err(Error::PreconditionFailed(_))));
    assert!(matches!(buffer.read_back(0, 11), Err(Error::PreconditionFailed(_))));
    assert_eq!(buffer.read_back(0, 10).unwrap(), vec![5; 10]);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_staging_upload_round_trip() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let device_desc = BufferDesc::new(
        256,
        BufferUsage::STORAGE | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC,
        MemoryUsage::GpuOnly,
        "Device Storage",
    );
    let device_buffer = context.create_buffer(&device_desc).unwrap();
    let staging = context.create_staging_buffer(&device_buffer).unwrap();
    assert!(staging.is_staging());

    let payload: Vec<u8> = (0..=255).collect();
    staging.copy_to_buffer(&payload).unwrap();

    let readback_desc = BufferDesc::new(256, BufferUsage::TRANSFER_DST, MemoryUsage::GpuToCpu, "Readback");
    let readback = context.create_buffer(&readback_desc).unwrap();
    context
        .immediate_submit(|cmd| {
            staging.upload_staging_buffer(cmd, 0, 0)?;
            Ok(())
        })
        .unwrap();
    context
        .immediate_submit(|cmd| {
            let copy = ash::vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 256 };
            unsafe { context.device().cmd_copy_buffer(cmd, device_buffer.handle(), readback.handle(), &[copy]) };
            Ok(())
        })
        .unwrap();

    assert_eq!(readback.read_back(0, 256).unwrap(), payload);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_staging_requires_gpu_only_destination() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let desc = BufferDesc::new(64, BufferUsage::TRANSFER_DST, MemoryUsage::CpuToGpu, "Host Target");
    let host_buffer = context.create_buffer(&desc).unwrap();
    let result = context.create_staging_buffer(&host_buffer);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// TEXTURE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_texture_generated_mip_chain_and_upload() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let mut desc = TextureDesc::new_2d(
        TextureFormat::R8G8B8A8_UNORM,
        256,
        256,
        TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC,
        "Mipmapped",
    );
    desc.generate_mips = true;
    let texture = context.create_texture(&desc).unwrap();

    assert_eq!(texture.mip_levels(), 8);
    assert!(!texture.is_depth());
    texture.upload(&vec![255u8; 256 * 256 * 4]).unwrap();
    assert!(texture.mip_view(3).is_ok());
    assert!(texture.mip_view(8).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_sampler_creation() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let sampler = context.create_sampler(&SamplerDesc::default()).unwrap();
    assert_eq!(sampler.desc(), &SamplerDesc::default());
}

// ============================================================================
// RENDER PASS / FRAMEBUFFER TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_offscreen_render_pass_and_framebuffer() {
    let context = get_test_context();
    let context = context.lock().unwrap();

    let color = context
        .create_texture(&TextureDesc::new_2d(
            TextureFormat::R8G8B8A8_UNORM,
            64,
            32,
            TextureUsage::COLOR_ATTACHMENT | TextureUsage::SAMPLED,
            "Offscreen Color",
        ))
        .unwrap();
    let depth = context
        .create_texture(&TextureDesc::new_2d(
            TextureFormat::D32_SFLOAT,
            64,
            32,
            TextureUsage::DEPTH_STENCIL_ATTACHMENT,
            "Offscreen Depth",
        ))
        .unwrap();
    assert!(depth.is_depth());

    let render_pass = context
        .create_render_pass(
            &[
                color.attachment_info(LoadOp::Clear, StoreOp::Store, ImageLayout::ShaderReadOnly),
                depth.attachment_info(LoadOp::Clear, StoreOp::DontCare, ImageLayout::DepthStencilAttachment),
            ],
            &[],
            "Offscreen Pass",
        )
        .unwrap();
    assert_eq!(render_pass.attachment_count(), 2);

    let mut desc = FramebufferDesc::new("Offscreen Framebuffer");
    desc.attachments.push(Arc::clone(&color));
    desc.depth_attachment = Some(Arc::clone(&depth));
    let framebuffer = context.create_framebuffer(&render_pass, desc).unwrap();
    assert_eq!(framebuffer.extent().width, 64);
    assert_eq!(framebuffer.extent().height, 32);

    // Color only does not match the two-attachment pass
    let mut short = FramebufferDesc::new("Short Framebuffer");
    short.attachments.push(color);
    let result = context.create_framebuffer(&render_pass, short);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// PIPELINE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_compute_pipeline_from_reflection_fills_buffer() {
    std::fs::write(shader_dir().join("fill.comp"), FILL_COMPUTE).unwrap();

    let context = get_test_context();
    let context = context.lock().unwrap();

    let shader = context.create_shader_module("fill.comp", None).unwrap();
    let mut desc = ComputePipelineDesc::new(Arc::clone(&shader));
    desc.name = "Fill".to_string();
    let pipeline = context.create_compute_pipeline(desc).unwrap();

    assert_eq!(pipeline.set_layouts().len(), 1);
    assert_eq!(
        pipeline.set_layouts()[0].binding(0).unwrap().descriptor_type,
        DescriptorType::StorageBuffer
    );
    assert_eq!(pipeline.push_constant_ranges()[0].size, 4);

    let output = context
        .create_buffer(&BufferDesc::new(256, BufferUsage::STORAGE, MemoryUsage::GpuToCpu, "Fill Output"))
        .unwrap();
    // Rejected requests leave the pipeline free to allocate again
    assert!(pipeline.allocate_descriptors(&[(0, 0)]).is_err());
    assert!(pipeline.allocate_descriptors(&[(0, 1), (0, 1)]).is_err());
    assert!(pipeline.descriptor_set(0, 0).is_err());
    pipeline.allocate_descriptors(&[(0, 1)]).unwrap();
    pipeline.bind_resource(0, 0, 0, DescriptorResource::buffer(&output)).unwrap();
    assert_eq!(pipeline.pending_write_count(), 1);

    context
        .immediate_submit(|cmd| {
            pipeline.bind(cmd)?;
            pipeline.bind_descriptor_sets(cmd, 0, &[0])?;
            pipeline.push_constants(cmd, blur_engine::blur::render::ShaderStage::Compute.flags(), 0, &7u32.to_ne_bytes())?;
            unsafe { context.device().cmd_dispatch(cmd, 1, 1, 1) };
            Ok(())
        })
        .unwrap();

    assert_eq!(pipeline.pending_write_count(), 0);
    let values: Vec<u32> = output
        .read_back(0, 256)
        .unwrap()
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert!(values.iter().all(|&v| v == 7));
}

// ============================================================================
// COMMAND QUEUE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_command_queue_rings_wrap_and_release_disposals() {
    let context = get_test_context();
    let context = context.lock().unwrap();
    let mut queue = context.create_graphics_command_queue().unwrap();
    let buffers = queue.command_buffer_count();
    let fences = queue.in_flight_count();

    let released = Arc::new(AtomicUsize::new(0));
    for frame in 0..(buffers * fences + 1) {
        assert_eq!(queue.command_buffer_index(), frame % buffers);
        assert_eq!(queue.fence_index(), frame % fences);

        queue.begin_cmd_buffer().unwrap();
        let counter = Arc::clone(&released);
        queue.dispose_with(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        queue.end_cmd_buffer().unwrap();
        queue.submit(&QueueSubmission::new()).unwrap();
        queue.to_next_cmd_buffer();
    }

    queue.wait_for_all_submissions().unwrap();
    assert_eq!(released.load(Ordering::SeqCst), buffers * fences + 1);
    assert_eq!(queue.pending_disposals(), 0);
}
