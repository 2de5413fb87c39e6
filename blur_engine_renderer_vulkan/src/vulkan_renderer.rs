/// Renderer - per-frame orchestration over a window
///
/// Owns the context, swapchain, render pass, per-image framebuffers, the
/// graphics command queue and the per-frame uniform ring. `draw_frame` runs
/// acquire, begin, record, end, submit, present and advance; resize handling
/// follows the core resize sequence.

use ash::vk;
use blur_engine::blur::render::{
    Extent2D, ImageLayout, LoadOp, PresentStatus, StoreOp, TextureDesc, TextureFormat, TextureUsage, WindowSurface,
};
use blur_engine::blur::{ContextConfig, Engine, Error, Result};
use blur_engine::{engine_debug, engine_error, engine_info};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use raw_window_handle::{DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle};
use std::sync::Arc;
use std::time::Duration;
use winit::window::Window;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_queue::{CommandQueue, QueueSubmission};
use crate::vulkan_context::VulkanContext;
use crate::vulkan_framebuffer::Framebuffer;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_ring_buffer::UniformRingBuffer;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_texture::Texture;

const LOG_SOURCE: &str = "blur::vulkan::Renderer";

/// Depth format of the main pass
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::D32_SFLOAT;

/// Per-frame uniform block written at the start of every frame
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: Mat4,
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub frame_index: u32,
    pub _padding: [u32; 2],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            delta_time: 0.0,
            frame_index: 0,
            _padding: [0; 2],
        }
    }
}

// ===== WINDOW =====

/// `WindowSurface` over a winit window
///
/// winit delivers events to the application's event loop, so the owner calls
/// `notify_resized` from its `WindowEvent::Resized` handler. While minimized,
/// `pump_events` yields briefly and the size is queried again from the platform.
pub struct WinitWindowSurface {
    window: Arc<Window>,
    resized: bool,
}

impl WinitWindowSurface {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window, resized: false }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn notify_resized(&mut self) {
        self.resized = true;
    }
}

impl HasWindowHandle for WinitWindowSurface {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for WinitWindowSurface {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl WindowSurface for WinitWindowSurface {
    fn drawable_extent(&self) -> Extent2D {
        let size = self.window.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn clear_resized(&mut self) {
        self.resized = false;
    }

    fn pump_events(&mut self) {
        std::thread::sleep(Duration::from_millis(10));
    }
}

// ===== FRAME =====

/// What a frame's record callback can draw with
pub struct FrameContext<'a> {
    pub device: &'a ash::Device,
    pub cmd: vk::CommandBuffer,
    pub image_index: u32,
    pub extent: Extent2D,
    pub render_pass: &'a Arc<RenderPass>,
    pub framebuffer: &'a Arc<Framebuffer>,
    /// This frame's slot of the uniform ring
    pub uniforms: &'a Arc<Buffer>,
}

impl FrameContext<'_> {
    /// Begin the main pass with `clear_color`, depth cleared to 1.0, and set a
    /// full-extent viewport and scissor
    pub fn begin_render_pass(&self, clear_color: [f32; 4]) {
        let clear_values = [
            vk::ClearValue { color: vk::ClearColorValue { float32: clear_color } },
            vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D { width: self.extent.width, height: self.extent.height },
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(self.framebuffer.handle())
            .render_area(render_area)
            .clear_values(&clear_values);
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device.cmd_begin_render_pass(self.cmd, &begin_info, vk::SubpassContents::INLINE);
            self.device.cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(self.cmd, 0, &[render_area]);
        }
    }

    pub fn end_render_pass(&self) {
        unsafe { self.device.cmd_end_render_pass(self.cmd) };
    }
}

// ===== RENDERER =====

pub struct Renderer {
    command_queue: CommandQueue,
    uniforms: UniformRingBuffer,
    swapchain: Option<Swapchain>,
    depth: Arc<Texture>,
    render_pass: Arc<RenderPass>,
    frame_index: u32,
    context: VulkanContext,
}

impl Renderer {
    pub fn new<W: HasDisplayHandle + HasWindowHandle + WindowSurface>(window: &W, config: ContextConfig) -> Result<Self> {
        let context = VulkanContext::new(window, config)?;
        let mut swapchain = context.create_swapchain(window.drawable_extent())?;
        let extent = swapchain.desc().extent;

        let depth = create_depth_texture(&context, extent)?;
        let render_pass = context.create_render_pass(
            &[
                swapchain.color_attachment_info(LoadOp::Clear),
                depth.attachment_info(LoadOp::Clear, StoreOp::DontCare, ImageLayout::DepthStencilAttachment),
            ],
            &[],
            "Main Render Pass",
        )?;
        swapchain.attach_render_pass(&render_pass, Some(&depth))?;

        let command_queue = context.create_graphics_command_queue()?;
        let uniforms = context.create_uniform_ring_buffer(
            std::mem::size_of::<FrameUniforms>() as u64,
            "Frame Uniforms",
        )?;

        engine_info!(
            LOG_SOURCE,
            "Renderer ready: {}x{}, {} swapchain images, {} frames in flight",
            extent.width,
            extent.height,
            swapchain.image_count(),
            command_queue.in_flight_count()
        );

        Ok(Self {
            command_queue,
            uniforms,
            swapchain: Some(swapchain),
            depth,
            render_pass,
            frame_index: 0,
            context,
        })
    }

    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    pub fn command_queue_mut(&mut self) -> &mut CommandQueue {
        &mut self.command_queue
    }

    pub fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(lost_swapchain)
    }

    fn swapchain_mut(&mut self) -> Result<&mut Swapchain> {
        self.swapchain.as_mut().ok_or_else(lost_swapchain)
    }

    pub fn extent(&self) -> Result<Extent2D> {
        Ok(self.swapchain()?.desc().extent)
    }

    /// Render one frame, recording draw commands with `record`
    ///
    /// Returns `false` when the frame was skipped because the swapchain had
    /// to be recreated first.
    pub fn draw_frame<W, F>(&mut self, window: &mut W, view_proj: Mat4, record: F) -> Result<bool>
    where
        W: WindowSurface,
        F: FnOnce(&FrameContext<'_>) -> Result<()>,
    {
        if window.was_resized() {
            self.handle_resize(window)?;
        }

        let (acquire_status, image_index) = self.swapchain_mut()?.acquire_image()?;
        if acquire_status == PresentStatus::OutOfDate {
            self.handle_resize(window)?;
            return Ok(false);
        }

        if let Err(e) = self.record_and_submit(image_index, view_proj, record) {
            // The acquire semaphore is still signaled; consume it before the next acquire
            let swapchain = self.swapchain.as_ref().ok_or_else(lost_swapchain)?;
            if let Err(release) = self
                .command_queue
                .consume_semaphore(swapchain.image_available_semaphore(), vk::PipelineStageFlags::ALL_COMMANDS)
            {
                engine_error!(LOG_SOURCE, "Failed to release acquired image: {}", release);
            }
            return Err(e);
        }
        let present_status = self.swapchain_mut()?.present()?;

        self.command_queue.to_next_cmd_buffer();
        self.uniforms.to_next_buffer();
        self.frame_index = self.frame_index.wrapping_add(1);

        if acquire_status.needs_recreation() || present_status.needs_recreation() {
            engine_debug!(LOG_SOURCE, "Swapchain reported {:?}/{:?}", acquire_status, present_status);
            self.handle_resize(window)?;
        }
        Ok(true)
    }

    /// Record the frame's commands and submit them against the acquired image
    fn record_and_submit<F>(&mut self, image_index: u32, view_proj: Mat4, record: F) -> Result<()>
    where
        F: FnOnce(&FrameContext<'_>) -> Result<()>,
    {
        let cmd = self.command_queue.begin_cmd_buffer()?;

        let delta_time = Engine::update_frame_clock();
        self.uniforms.write(&[FrameUniforms {
            view_proj,
            delta_time,
            frame_index: self.frame_index,
            _padding: [0; 2],
        }])?;

        let swapchain = self.swapchain.as_ref().ok_or_else(lost_swapchain)?;
        let frame = FrameContext {
            device: self.context.device(),
            cmd,
            image_index,
            extent: swapchain.desc().extent,
            render_pass: &self.render_pass,
            framebuffer: swapchain.get_framebuffer(image_index)?,
            uniforms: self.uniforms.current(),
        };
        record(&frame)?;
        let submission = QueueSubmission::new()
            .wait_on(swapchain.image_available_semaphore(), vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .signal(swapchain.render_complete_semaphore());

        self.command_queue.end_cmd_buffer()?;
        self.command_queue.submit(&submission)
    }

    /// Rebuild the swapchain, depth buffer and framebuffers for the window's size
    pub fn handle_resize<W: WindowSurface>(&mut self, window: &mut W) -> Result<()> {
        self.command_queue.wait_for_all_submissions()?;

        let old = self.swapchain.take().ok_or_else(lost_swapchain)?;
        let mut swapchain = self.context.recreate_swapchain(window, old)?;

        self.depth = create_depth_texture(&self.context, swapchain.desc().extent)?;
        swapchain.attach_render_pass(&self.render_pass, Some(&self.depth))?;
        self.swapchain = Some(swapchain);
        Ok(())
    }

    /// Drain the GPU; call before dropping resources the frames may still use
    pub fn wait_idle(&mut self) -> Result<()> {
        self.command_queue.wait_for_all_submissions()?;
        self.context.wait_idle()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.command_queue.wait_for_all_submissions().ok();
        self.context.wait_idle().ok();
    }
}

fn lost_swapchain() -> Error {
    Error::InvalidResource("Swapchain was lost during recreation".to_string())
}

fn create_depth_texture(context: &VulkanContext, extent: Extent2D) -> Result<Arc<Texture>> {
    let desc = TextureDesc::new_2d(
        DEPTH_FORMAT,
        extent.width,
        extent.height,
        TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        "Depth Buffer",
    );
    context.create_texture(&desc)
}
