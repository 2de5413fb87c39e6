/// Framebuffer - VkFramebuffer grouping the textures a render pass draws into
///
/// Attachments are bound colors first, then depth, stencil and resolves. The
/// framebuffer keeps its render pass and textures alive.

use ash::vk;
use blur_engine::blur::render::{Extent2D, FramebufferDesc};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_error, engine_precondition};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_texture::Texture;

const LOG_SOURCE: &str = "blur::vulkan::Framebuffer";

/// Vulkan framebuffer
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    render_pass: Arc<RenderPass>,
    desc: FramebufferDesc<Texture>,
    extent: Extent2D,
}

impl Framebuffer {
    pub(crate) fn create(ctx: &Arc<GpuContext>, render_pass: Arc<RenderPass>, desc: FramebufferDesc<Texture>) -> Result<Self> {
        let ordered = desc.ordered().map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        engine_precondition!(
            ordered.len() == render_pass.attachment_count(),
            LOG_SOURCE,
            "Framebuffer '{}' has {} attachments but render pass '{}' expects {}",
            desc.name,
            ordered.len(),
            render_pass.name(),
            render_pass.attachment_count()
        );
        let extent = desc.extent(Texture::extent_2d)?;
        let views: Vec<vk::ImageView> = ordered.iter().map(|t| t.view()).collect();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { ctx.device.create_framebuffer(&create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create framebuffer '{}': {:?}", desc.name, e);
            Error::BackendError(format!("Failed to create framebuffer: {:?}", e))
        })?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            framebuffer,
            render_pass,
            desc,
            extent,
        })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn desc(&self) -> &FramebufferDesc<Texture> {
        &self.desc
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_framebuffer(self.framebuffer, None) };
    }
}
