/// Render pass attachment derivation and framebuffer layout
///
/// Attachment descriptions and references are derived from the attached
/// textures' formats: depth/stencil formats become the depth-stencil
/// reference, everything else a color reference.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::format::TextureFormat;
use crate::graphics_device::swapchain::Extent2D;
use crate::graphics_device::texture::SampleCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Store,
    DontCare,
}

/// Image layouts the engine transitions through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    Undefined,
    General,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// One attachment as requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Layout the texture is in when the pass begins
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

/// Attachment description handed to the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescription {
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentRef {
    pub attachment: u32,
    pub layout: ImageLayout,
}

/// Attachments and single-subpass references of a render pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderPassLayout {
    pub attachments: Vec<AttachmentDescription>,
    pub color_refs: Vec<AttachmentRef>,
    pub depth_stencil_ref: Option<AttachmentRef>,
    pub resolve_refs: Vec<AttachmentRef>,
}

impl RenderPassLayout {
    /// Derive descriptions and references from `attachments`, followed by
    /// optional single-sample `resolves` (one per color attachment)
    pub fn derive(attachments: &[AttachmentInfo], resolves: &[AttachmentInfo]) -> Result<Self> {
        if attachments.is_empty() {
            return Err(Error::PreconditionFailed("Render pass needs at least one attachment".to_string()));
        }

        let mut layout = RenderPassLayout::default();

        for (index, info) in attachments.iter().enumerate() {
            let stencil = info.format.is_stencil();
            layout.attachments.push(AttachmentDescription {
                format: info.format,
                samples: info.samples,
                load_op: info.load_op,
                store_op: info.store_op,
                stencil_load_op: if stencil { info.load_op } else { LoadOp::DontCare },
                stencil_store_op: if stencil { info.store_op } else { StoreOp::DontCare },
                initial_layout: info.initial_layout,
                final_layout: info.final_layout,
            });

            if info.format.is_depth() || stencil {
                if layout.depth_stencil_ref.is_some() {
                    return Err(Error::PreconditionFailed(
                        "Render pass supports a single depth/stencil attachment".to_string(),
                    ));
                }
                layout.depth_stencil_ref = Some(AttachmentRef {
                    attachment: index as u32,
                    layout: ImageLayout::DepthStencilAttachment,
                });
            } else {
                layout.color_refs.push(AttachmentRef {
                    attachment: index as u32,
                    layout: ImageLayout::ColorAttachment,
                });
            }
        }

        if !resolves.is_empty() && resolves.len() != layout.color_refs.len() {
            return Err(Error::PreconditionFailed(format!(
                "Resolve attachments must match color attachments ({} resolves, {} colors)",
                resolves.len(),
                layout.color_refs.len()
            )));
        }

        let base = layout.attachments.len();
        for (index, info) in resolves.iter().enumerate() {
            layout.attachments.push(AttachmentDescription {
                format: info.format,
                samples: SampleCount::S1,
                load_op: info.load_op,
                store_op: info.store_op,
                stencil_load_op: LoadOp::DontCare,
                stencil_store_op: StoreOp::DontCare,
                initial_layout: info.initial_layout,
                final_layout: info.final_layout,
            });
            layout.resolve_refs.push(AttachmentRef {
                attachment: (base + index) as u32,
                layout: ImageLayout::ColorAttachment,
            });
        }

        Ok(layout)
    }
}

/// Textures bound to a framebuffer, generic over the backend texture type
#[derive(Debug)]
pub struct FramebufferDesc<T> {
    pub attachments: Vec<Arc<T>>,
    pub depth_attachment: Option<Arc<T>>,
    pub stencil_attachment: Option<Arc<T>>,
    /// Single-sample targets of a multisampled pass, one per color attachment
    pub resolve_attachments: Vec<Arc<T>>,
    pub name: String,
}

impl<T> Clone for FramebufferDesc<T> {
    fn clone(&self) -> Self {
        Self {
            attachments: self.attachments.clone(),
            depth_attachment: self.depth_attachment.clone(),
            stencil_attachment: self.stencil_attachment.clone(),
            resolve_attachments: self.resolve_attachments.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T> FramebufferDesc<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            attachments: Vec::new(),
            depth_attachment: None,
            stencil_attachment: None,
            resolve_attachments: Vec::new(),
            name: name.into(),
        }
    }

    /// Attachments in binding order: colors, depth, stencil, then resolves
    pub fn ordered(&self) -> Result<Vec<&Arc<T>>> {
        let ordered: Vec<&Arc<T>> = self
            .attachments
            .iter()
            .chain(self.depth_attachment.iter())
            .chain(self.stencil_attachment.iter())
            .chain(self.resolve_attachments.iter())
            .collect();
        if ordered.is_empty() {
            return Err(Error::PreconditionFailed(format!(
                "Creating framebuffer '{}' with no attachments is not supported",
                self.name
            )));
        }
        Ok(ordered)
    }

    /// Size of the first color attachment, else the depth (or stencil) attachment
    pub fn extent(&self, extent_of: impl Fn(&T) -> Extent2D) -> Result<Extent2D> {
        self.attachments
            .first()
            .or(self.depth_attachment.as_ref())
            .or(self.stencil_attachment.as_ref())
            .map(|t| extent_of(t.as_ref()))
            .ok_or_else(|| Error::PreconditionFailed(format!(
                "Creating framebuffer '{}' with no attachments is not supported",
                self.name
            )))
    }
}

#[cfg(test)]
#[path = "render_pass_tests.rs"]
mod tests;
