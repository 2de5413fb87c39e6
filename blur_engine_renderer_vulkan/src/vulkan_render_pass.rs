/// RenderPass - Single-subpass VkRenderPass derived from attachment infos
///
/// Color and depth-stencil references come from each attachment's format
/// class. Resolve attachments, when given, are appended after the main ones.

use ash::vk;
use blur_engine::blur::render::{AttachmentInfo, AttachmentRef, RenderPassLayout, SampleCount, TextureFormat};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_debug, engine_error};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_to_vk, image_layout_to_vk, load_op_to_vk, sample_count_to_vk, store_op_to_vk};

const LOG_SOURCE: &str = "blur::vulkan::RenderPass";

/// Vulkan render pass
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    layout: RenderPassLayout,
    name: String,
}

impl RenderPass {
    pub(crate) fn create(
        ctx: &Arc<GpuContext>,
        attachments: &[AttachmentInfo],
        resolves: &[AttachmentInfo],
        name: &str,
    ) -> Result<Self> {
        let layout = RenderPassLayout::derive(attachments, resolves).map_err(|e| {
            engine_error!(LOG_SOURCE, "Render pass '{}': {}", name, e);
            e
        })?;

        let descriptions: Vec<vk::AttachmentDescription> = layout
            .attachments
            .iter()
            .map(|a| vk::AttachmentDescription {
                flags: vk::AttachmentDescriptionFlags::empty(),
                format: format_to_vk(a.format),
                samples: sample_count_to_vk(a.samples),
                load_op: load_op_to_vk(a.load_op),
                store_op: store_op_to_vk(a.store_op),
                stencil_load_op: load_op_to_vk(a.stencil_load_op),
                stencil_store_op: store_op_to_vk(a.stencil_store_op),
                initial_layout: image_layout_to_vk(a.initial_layout),
                final_layout: image_layout_to_vk(a.final_layout),
            })
            .collect();

        let to_vk_ref = |r: &AttachmentRef| vk::AttachmentReference {
            attachment: r.attachment,
            layout: image_layout_to_vk(r.layout),
        };
        let color_refs: Vec<vk::AttachmentReference> = layout.color_refs.iter().map(to_vk_ref).collect();
        let resolve_refs: Vec<vk::AttachmentReference> = layout.resolve_refs.iter().map(to_vk_ref).collect();
        let depth_ref = layout.depth_stencil_ref.as_ref().map(to_vk_ref);

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        let access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        let dependencies = [
            // Earlier writes and presentation finish before the pass writes
            vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: stages,
                dst_stage_mask: stages,
                src_access_mask: vk::AccessFlags::empty(),
                dst_access_mask: access | vk::AccessFlags::COLOR_ATTACHMENT_READ,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
            // The pass's writes are visible to later sampling
            vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: vk::SUBPASS_EXTERNAL,
                src_stage_mask: stages,
                dst_stage_mask: vk::PipelineStageFlags::FRAGMENT_SHADER,
                src_access_mask: access,
                dst_access_mask: vk::AccessFlags::SHADER_READ,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
        ];

        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&descriptions)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { ctx.device.create_render_pass(&create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create render pass '{}': {:?}", name, e);
            Error::BackendError(format!("Failed to create render pass: {:?}", e))
        })?;

        engine_debug!(
            LOG_SOURCE,
            "Created render pass '{}' ({} color, depth: {}, {} resolve)",
            name,
            layout.color_refs.len(),
            layout.depth_stencil_ref.is_some(),
            layout.resolve_refs.len()
        );

        Ok(Self {
            ctx: Arc::clone(ctx),
            render_pass,
            layout,
            name: name.to_string(),
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &RenderPassLayout {
        &self.layout
    }

    pub fn attachment_count(&self) -> usize {
        self.layout.attachments.len()
    }

    /// Formats of the color attachments, in reference order
    pub fn color_formats(&self) -> Vec<TextureFormat> {
        self.layout
            .color_refs
            .iter()
            .map(|r| self.layout.attachments[r.attachment as usize].format)
            .collect()
    }

    pub fn depth_format(&self) -> TextureFormat {
        self.layout
            .depth_stencil_ref
            .map_or(TextureFormat::Undefined, |r| self.layout.attachments[r.attachment as usize].format)
    }

    pub fn samples(&self) -> SampleCount {
        self.layout.attachments.first().map_or(SampleCount::S1, |a| a.samples)
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe { self.ctx.device.destroy_render_pass(self.render_pass, None) };
    }
}
