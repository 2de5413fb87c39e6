/// Swapchain recreation on window resize
///
/// Order matters: a minimized window is polled until it has a drawable area,
/// the device is drained, and only then is the old swapchain replaced. The
/// replacement keeps the old surface format and present mode.

use crate::error::Result;
use crate::graphics_device::swapchain::{Extent2D, PresentMode, SurfaceCapabilities, SwapchainDesc};

/// Window as seen by the resize logic
pub trait WindowSurface {
    /// Current drawable size in pixels (zero-area when minimized)
    fn drawable_extent(&self) -> Extent2D;
    /// The window was resized since the flag was last cleared
    fn was_resized(&self) -> bool;
    fn clear_resized(&mut self);
    /// Pump platform events once (may block until one arrives)
    fn pump_events(&mut self);
}

/// Device-side operations needed to rebuild a swapchain
pub trait SwapchainHost {
    type Swapchain;

    fn wait_idle(&self) -> Result<()>;
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities>;
    fn swapchain_desc(&self, swapchain: &Self::Swapchain) -> SwapchainDesc;
    /// Build a swapchain for `desc`, handing `old` over for reuse then destroying it
    fn rebuild_swapchain(&mut self, desc: &SwapchainDesc, old: Self::Swapchain) -> Result<Self::Swapchain>;
}

/// Result of acquire or present as far as recreation is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    /// Still presentable but no longer matches the surface
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    pub fn needs_recreation(self) -> bool {
        !matches!(self, PresentStatus::Optimal)
    }
}

/// Block until the window has a non-zero drawable area
pub fn wait_for_drawable_extent<W: WindowSurface>(window: &mut W) -> Extent2D {
    let mut extent = window.drawable_extent();
    while extent.is_zero_area() {
        window.pump_events();
        extent = window.drawable_extent();
    }
    extent
}

/// Replace `old` with a swapchain sized for the window's current extent
pub fn recreate_swapchain<H, W>(host: &mut H, window: &mut W, old: H::Swapchain) -> Result<H::Swapchain>
where
    H: SwapchainHost,
    W: WindowSurface,
{
    let window_extent = wait_for_drawable_extent(window);
    host.wait_idle()?;

    let previous = host.swapchain_desc(&old);
    let caps = host.surface_capabilities()?;
    // Format and present mode come from `previous`; the lists are not consulted
    let desc = SwapchainDesc::negotiate(&caps, &[], &[], window_extent, PresentMode::Fifo, Some(&previous))?;

    crate::engine_info!(
        "blur::Swapchain",
        "Recreating swapchain {}x{} -> {}x{} ({} images, {})",
        previous.extent.width,
        previous.extent.height,
        desc.extent.width,
        desc.extent.height,
        desc.image_count,
        desc.present_mode
    );

    let swapchain = host.rebuild_swapchain(&desc, old)?;
    window.clear_resized();
    Ok(swapchain)
}

#[cfg(test)]
#[path = "resize_tests.rs"]
mod tests;
