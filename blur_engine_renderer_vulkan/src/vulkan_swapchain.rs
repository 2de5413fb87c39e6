/// Swapchain - presentable images, their framebuffers and acquire/present sync
///
/// One image-available semaphore, one render-complete semaphore and one
/// acquire fence per swapchain. The swapchain never recreates itself: acquire
/// and present report `PresentStatus` and the owner decides when to rebuild.

use ash::vk;
use blur_engine::blur::render::{
    framebuffer_slot, AttachmentInfo, FramebufferDesc, ImageLayout, LoadOp, PresentStatus, SharingMode, StoreOp, SwapchainDesc,
    FENCE_TIMEOUT_NS,
};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_debug, engine_err, engine_error, engine_precondition, engine_warn};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{extent_to_vk, present_mode_to_vk, sharing_mode_to_vk, surface_format_to_vk};
use crate::vulkan_framebuffer::Framebuffer;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_texture::Texture;

const LOG_SOURCE: &str = "blur::vulkan::Swapchain";

/// Vulkan swapchain
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    pub(crate) swapchain: vk::SwapchainKHR,
    desc: SwapchainDesc,

    /// Presentable images, wrapped as textures that do not own their image
    images: Vec<Arc<Texture>>,
    /// One framebuffer per image, built by `attach_render_pass`
    framebuffers: Vec<Arc<Framebuffer>>,

    image_available: vk::Semaphore,
    render_complete: vk::Semaphore,
    /// Guards reuse of `image_available` across acquires
    acquire_fence: vk::Fence,
    /// The acquire fence was handed to a successful acquire and not yet waited on
    acquire_pending: bool,

    current_image: u32,
}

impl Swapchain {
    /// Build a swapchain for `desc`, reusing `previous` as the old swapchain
    ///
    /// `previous` is destroyed once the new swapchain exists.
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &SwapchainDesc, previous: Option<Swapchain>) -> Result<Self> {
        let surface = ctx.surface.ok_or_else(|| {
            engine_error!(LOG_SOURCE, "Cannot create a swapchain without a surface");
            Error::PreconditionFailed("A surface is required to create a swapchain".to_string())
        })?;
        let graphics = ctx.graphics_queue()?;
        let present = ctx.present_queue()?;

        let sharing_mode = SharingMode::for_families(graphics.family, present.family);
        let family_indices = [graphics.family, present.family];
        let surface_format = surface_format_to_vk(desc.surface_format);

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(desc.image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent_to_vk(desc.extent))
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(sharing_mode_to_vk(sharing_mode))
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true)
            .old_swapchain(previous.as_ref().map_or(vk::SwapchainKHR::null(), |p| p.swapchain));
        if sharing_mode == SharingMode::Concurrent {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let swapchain = unsafe { ctx.swapchain_loader.create_swapchain(&create_info, None) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create swapchain: {:?}", e);
            Error::BackendError(format!("Failed to create swapchain: {:?}", e))
        })?;
        // The old swapchain is retired now that the new one took over the surface
        drop(previous);

        let vk_images = unsafe { ctx.swapchain_loader.get_swapchain_images(swapchain) }.map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to get swapchain images: {:?}", e);
            unsafe { ctx.swapchain_loader.destroy_swapchain(swapchain, None) };
            Error::BackendError(format!("Failed to get swapchain images: {:?}", e))
        })?;

        let mut this = Self {
            ctx: Arc::clone(ctx),
            swapchain,
            desc: *desc,
            images: Vec::with_capacity(vk_images.len()),
            framebuffers: Vec::new(),
            image_available: vk::Semaphore::null(),
            render_complete: vk::Semaphore::null(),
            acquire_fence: vk::Fence::null(),
            acquire_pending: false,
            current_image: 0,
        };

        // From here on, Drop releases whatever was created
        for (index, image) in vk_images.into_iter().enumerate() {
            let texture = Texture::from_swapchain_image(ctx, image, desc.surface_format.format, desc.extent, index)?;
            this.images.push(Arc::new(texture));
        }
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        this.image_available = create_semaphore(ctx, &semaphore_info)?;
        this.render_complete = create_semaphore(ctx, &semaphore_info)?;
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        this.acquire_fence = unsafe { ctx.device.create_fence(&fence_info, None) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to create acquire fence: {:?}", e))?;

        engine_debug!(
            LOG_SOURCE,
            "Created swapchain {}x{} with {} images ({:?}, {})",
            desc.extent.width,
            desc.extent.height,
            this.images.len(),
            desc.surface_format.format,
            desc.present_mode
        );
        Ok(this)
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn desc(&self) -> &SwapchainDesc {
        &self.desc
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[Arc<Texture>] {
        &self.images
    }

    pub fn current_image_index(&self) -> u32 {
        self.current_image
    }

    /// Texture of the most recently acquired image
    pub fn current_image(&self) -> &Arc<Texture> {
        &self.images[self.current_image as usize]
    }

    pub fn image_available_semaphore(&self) -> vk::Semaphore {
        self.image_available
    }

    pub fn render_complete_semaphore(&self) -> vk::Semaphore {
        self.render_complete
    }

    /// Acquire the next presentable image
    ///
    /// Blocks on the acquire fence, then signals the image-available semaphore
    /// and the fence. `OutOfDate` leaves the current index unchanged.
    pub fn acquire_image(&mut self) -> Result<(PresentStatus, u32)> {
        let device = &self.ctx.device;
        if self.acquire_pending {
            match unsafe { device.wait_for_fences(&[self.acquire_fence], true, FENCE_TIMEOUT_NS) } {
                Ok(()) => {}
                Err(vk::Result::TIMEOUT) => {
                    engine_warn!(LOG_SOURCE, "Timed out waiting for the acquire fence, waiting for device idle");
                    self.ctx.wait_idle()?;
                }
                Err(e) => return Err(engine_err!(LOG_SOURCE, "Failed to wait for acquire fence: {:?}", e)),
            }
            self.acquire_pending = false;
        }
        unsafe { device.reset_fences(&[self.acquire_fence]) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to reset acquire fence: {:?}", e))?;

        let acquired = unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.image_available,
                self.acquire_fence,
            )
        };
        match acquired {
            Ok((index, suboptimal)) => {
                self.acquire_pending = true;
                self.current_image = index;
                let status = if suboptimal { PresentStatus::Suboptimal } else { PresentStatus::Optimal };
                Ok((status, index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!(LOG_SOURCE, "Swapchain out of date during acquire");
                Ok((PresentStatus::OutOfDate, self.current_image))
            }
            Err(e) => Err(engine_err!(LOG_SOURCE, "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    /// Present the current image once the render-complete semaphore signals
    pub fn present(&mut self) -> Result<PresentStatus> {
        let queue = self.ctx.present_queue()?;
        let swapchains = [self.swapchain];
        let image_indices = [self.current_image];
        let wait_semaphores = [self.render_complete];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.ctx.swapchain_loader.queue_present(queue.queue, &present_info) } {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!(LOG_SOURCE, "Swapchain out of date during present");
                Ok(PresentStatus::OutOfDate)
            }
            Err(e) => Err(engine_err!(LOG_SOURCE, "Failed to present swapchain image: {:?}", e)),
        }
    }

    /// Build one framebuffer per image for `render_pass`
    ///
    /// `depth` is shared by every framebuffer. Replaces previously built ones.
    pub fn attach_render_pass(&mut self, render_pass: &Arc<RenderPass>, depth: Option<&Arc<Texture>>) -> Result<()> {
        if let Some(depth) = depth {
            engine_precondition!(
                depth.extent_2d() == self.desc.extent,
                LOG_SOURCE,
                "Depth attachment '{}' is {}x{} but the swapchain is {}x{}",
                depth.name(),
                depth.extent_2d().width,
                depth.extent_2d().height,
                self.desc.extent.width,
                self.desc.extent.height
            );
        }

        let framebuffers = self
            .images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                let mut desc = FramebufferDesc::new(format!("Swapchain Framebuffer {}", index));
                desc.attachments.push(Arc::clone(image));
                desc.depth_attachment = depth.cloned();
                Framebuffer::create(&self.ctx, Arc::clone(render_pass), desc).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;
        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Framebuffer of swapchain image `index`
    pub fn get_framebuffer(&self, index: u32) -> Result<&Arc<Framebuffer>> {
        let slot = framebuffer_slot(index, self.framebuffers.len()).map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;
        Ok(&self.framebuffers[slot])
    }

    /// Attachment description for rendering straight into the swapchain images
    pub fn color_attachment_info(&self, load_op: LoadOp) -> AttachmentInfo {
        self.images[0].attachment_info(load_op, StoreOp::Store, ImageLayout::PresentSrc)
    }
}

fn create_semaphore(ctx: &GpuContext, info: &vk::SemaphoreCreateInfo) -> Result<vk::Semaphore> {
    unsafe { ctx.device.create_semaphore(info, None) }
        .map_err(|e| engine_err!(LOG_SOURCE, "Failed to create semaphore: {:?}", e))
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = &self.ctx.device;
        unsafe {
            if self.acquire_pending {
                device.wait_for_fences(&[self.acquire_fence], true, FENCE_TIMEOUT_NS).ok();
            }
            // Framebuffers and image views go before the images they point at
            self.framebuffers.clear();
            self.images.clear();

            if self.acquire_fence != vk::Fence::null() {
                device.destroy_fence(self.acquire_fence, None);
            }
            if self.render_complete != vk::Semaphore::null() {
                device.destroy_semaphore(self.render_complete, None);
            }
            if self.image_available != vk::Semaphore::null() {
                device.destroy_semaphore(self.image_available, None);
            }
            self.ctx.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
