//! Unit tests for render_pass.rs

use std::sync::Arc;
use crate::error::Error;
use crate::graphics_device::render_pass::*;
use crate::graphics_device::swapchain::Extent2D;
use crate::graphics_device::texture::SampleCount;
use crate::graphics_device::TextureFormat;

fn attachment(format: TextureFormat, final_layout: ImageLayout) -> AttachmentInfo {
    AttachmentInfo {
        format,
        samples: SampleCount::S1,
        load_op: LoadOp::Clear,
        store_op: StoreOp::Store,
        initial_layout: ImageLayout::Undefined,
        final_layout,
    }
}

// ============================================================================
// RENDER PASS LAYOUT
// ============================================================================

#[test]
fn test_color_and_depth_split() {
    let layout = RenderPassLayout::derive(
        &[
            attachment(TextureFormat::B8G8R8A8_SRGB, ImageLayout::PresentSrc),
            attachment(TextureFormat::D32_SFLOAT, ImageLayout::DepthStencilAttachment),
        ],
        &[],
    )
    .unwrap();

    assert_eq!(layout.attachments.len(), 2);
    assert_eq!(layout.color_refs, vec![AttachmentRef { attachment: 0, layout: ImageLayout::ColorAttachment }]);
    assert_eq!(
        layout.depth_stencil_ref,
        Some(AttachmentRef { attachment: 1, layout: ImageLayout::DepthStencilAttachment })
    );
    assert!(layout.resolve_refs.is_empty());
}

#[test]
fn test_stencil_ops_only_for_stencil_formats() {
    let layout = RenderPassLayout::derive(
        &[
            attachment(TextureFormat::R8G8B8A8_UNORM, ImageLayout::ShaderReadOnly),
            attachment(TextureFormat::D24_UNORM_S8_UINT, ImageLayout::DepthStencilAttachment),
        ],
        &[],
    )
    .unwrap();

    let color = &layout.attachments[0];
    assert_eq!(color.stencil_load_op, LoadOp::DontCare);
    assert_eq!(color.stencil_store_op, StoreOp::DontCare);

    let depth_stencil = &layout.attachments[1];
    assert_eq!(depth_stencil.stencil_load_op, LoadOp::Clear);
    assert_eq!(depth_stencil.stencil_store_op, StoreOp::Store);
}

#[test]
fn test_depth_only_format_has_no_stencil_ops() {
    let layout = RenderPassLayout::derive(&[attachment(TextureFormat::D32_SFLOAT, ImageLayout::General)], &[]).unwrap();
    assert_eq!(layout.attachments[0].stencil_load_op, LoadOp::DontCare);
    assert!(layout.color_refs.is_empty());
}

#[test]
fn test_resolve_attachments_follow_main_attachments() {
    let mut msaa = attachment(TextureFormat::B8G8R8A8_SRGB, ImageLayout::ColorAttachment);
    msaa.samples = SampleCount::S4;
    let layout = RenderPassLayout::derive(
        &[msaa, attachment(TextureFormat::D32_SFLOAT, ImageLayout::DepthStencilAttachment)],
        &[attachment(TextureFormat::B8G8R8A8_SRGB, ImageLayout::PresentSrc)],
    )
    .unwrap();

    assert_eq!(layout.attachments.len(), 3);
    assert_eq!(layout.attachments[2].samples, SampleCount::S1);
    assert_eq!(layout.resolve_refs, vec![AttachmentRef { attachment: 2, layout: ImageLayout::ColorAttachment }]);
}

#[test]
fn test_resolve_count_must_match_colors() {
    let result = RenderPassLayout::derive(
        &[attachment(TextureFormat::D32_SFLOAT, ImageLayout::DepthStencilAttachment)],
        &[attachment(TextureFormat::B8G8R8A8_SRGB, ImageLayout::PresentSrc)],
    );
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

#[test]
fn test_two_depth_attachments_rejected() {
    let result = RenderPassLayout::derive(
        &[
            attachment(TextureFormat::D32_SFLOAT, ImageLayout::General),
            attachment(TextureFormat::D16_UNORM, ImageLayout::General),
        ],
        &[],
    );
    assert!(result.is_err());
    assert!(RenderPassLayout::derive(&[], &[]).is_err());
}

// ============================================================================
// FRAMEBUFFER
// ============================================================================

#[derive(Debug)]
struct FakeTexture(Extent2D);

fn tex(width: u32, height: u32) -> Arc<FakeTexture> {
    Arc::new(FakeTexture(Extent2D::new(width, height)))
}

#[test]
fn test_framebuffer_without_attachments_rejected() {
    let desc: FramebufferDesc<FakeTexture> = FramebufferDesc::new("empty");
    assert!(matches!(desc.ordered(), Err(Error::PreconditionFailed(_))));
    assert!(desc.extent(|t| t.0).is_err());
}

#[test]
fn test_framebuffer_sized_from_first_color() {
    let mut desc = FramebufferDesc::new("main");
    desc.attachments = vec![tex(800, 600), tex(400, 300)];
    desc.depth_attachment = Some(tex(1024, 1024));
    assert_eq!(desc.extent(|t| t.0).unwrap(), Extent2D::new(800, 600));
    assert_eq!(desc.ordered().unwrap().len(), 3);
}

#[test]
fn test_framebuffer_depth_only_sized_from_depth() {
    let mut desc = FramebufferDesc::new("shadow");
    desc.depth_attachment = Some(tex(2048, 2048));
    assert_eq!(desc.extent(|t| t.0).unwrap(), Extent2D::new(2048, 2048));
}

#[test]
fn test_framebuffer_order_is_color_depth_stencil() {
    let color = tex(1, 1);
    let depth = tex(2, 2);
    let stencil = tex(3, 3);
    let desc = FramebufferDesc {
        attachments: vec![color.clone()],
        depth_attachment: Some(depth.clone()),
        stencil_attachment: Some(stencil.clone()),
        resolve_attachments: Vec::new(),
        name: "ordered".to_string(),
    };
    let ordered = desc.ordered().unwrap();
    assert!(Arc::ptr_eq(ordered[0], &color));
    assert!(Arc::ptr_eq(ordered[1], &depth));
    assert!(Arc::ptr_eq(ordered[2], &stencil));
}

#[test]
fn test_framebuffer_resolves_follow_depth() {
    let color = tex(4, 4);
    let depth = tex(4, 4);
    let resolve = tex(4, 4);
    let mut desc = FramebufferDesc::new("msaa");
    desc.attachments = vec![color.clone()];
    desc.depth_attachment = Some(depth.clone());
    desc.resolve_attachments = vec![resolve.clone()];

    let ordered = desc.ordered().unwrap();
    assert_eq!(ordered.len(), 3);
    assert!(Arc::ptr_eq(ordered[1], &depth));
    assert!(Arc::ptr_eq(ordered[2], &resolve));
}
