/// Swapchain sizing and surface negotiation
///
/// The backend queries the surface once and hands the raw capabilities,
/// formats and present modes to [`SwapchainDesc::negotiate`]. Everything that
/// decides how the presentable images look lives here so that it can be tested
/// without a window.

use std::fmt;
use crate::error::{Error, Result};
use crate::graphics_device::TextureFormat;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-area extent
    pub const fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Surface capabilities as reported by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    pub min_image_count: u32,
    /// 0 means "no upper bound"
    pub max_image_count: u32,
    /// `width == u32::MAX` means the surface lets the swapchain pick its extent
    pub current_extent: Extent2D,
    pub min_image_extent: Extent2D,
    pub max_image_extent: Extent2D,
}

/// Color space of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    SrgbNonlinear,
    /// Any other color space the surface reports
    Other(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceFormat {
    pub format: TextureFormat,
    pub color_space: ColorSpace,
}

/// Presentation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

impl fmt::Display for PresentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PresentMode::Immediate => "Immediate",
            PresentMode::Mailbox => "V-Sync Triple Buffering",
            PresentMode::Fifo => "V-Sync",
            PresentMode::FifoRelaxed => "V-Sync Catch Up",
        };
        f.write_str(name)
    }
}

/// How swapchain images are shared between queue families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    Concurrent,
}

impl SharingMode {
    pub fn for_families(graphics_family: u32, present_family: u32) -> Self {
        if graphics_family == present_family {
            SharingMode::Exclusive
        } else {
            SharingMode::Concurrent
        }
    }
}

/// clamp(min + 1, min, max), where a max of 0 is unbounded
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        desired
    } else {
        desired.clamp(caps.min_image_count, caps.max_image_count.max(caps.min_image_count))
    }
}

/// Extent of the swapchain for a window of `window_extent`
///
/// The surface's current extent wins unless the surface leaves the choice to
/// the swapchain, in which case the window extent is clamped to the allowed range.
pub fn choose_extent(caps: &SurfaceCapabilities, window_extent: Extent2D) -> Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    Extent2D {
        width: window_extent.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window_extent.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Prefer an sRGB 8-bit BGRA/RGBA format with the sRGB nonlinear color space,
/// otherwise the first one the engine can name
pub fn choose_surface_format(available: &[SurfaceFormat]) -> Result<SurfaceFormat> {
    const PREFERRED: [TextureFormat; 2] = [TextureFormat::B8G8R8A8_SRGB, TextureFormat::R8G8B8A8_SRGB];

    let mut usable = available.iter().filter(|f| f.format != TextureFormat::Undefined);
    available
        .iter()
        .find(|f| PREFERRED.contains(&f.format) && f.color_space == ColorSpace::SrgbNonlinear)
        .or_else(|| usable.next())
        .copied()
        .ok_or_else(|| Error::InitializationFailed("Surface reports no usable formats".to_string()))
}

/// `preferred` when the surface supports it, FIFO otherwise (always available)
pub fn choose_present_mode(available: &[PresentMode], preferred: PresentMode) -> PresentMode {
    if available.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// Everything needed to build one swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub extent: Extent2D,
    pub image_count: u32,
}

impl SwapchainDesc {
    /// Pick format, present mode, extent and image count for a new swapchain
    ///
    /// When `previous` is given (recreation), its format and present mode are
    /// kept and only extent and image count are recomputed.
    pub fn negotiate(
        caps: &SurfaceCapabilities,
        formats: &[SurfaceFormat],
        present_modes: &[PresentMode],
        window_extent: Extent2D,
        preferred_present_mode: PresentMode,
        previous: Option<&SwapchainDesc>,
    ) -> Result<Self> {
        let (surface_format, present_mode) = match previous {
            Some(prev) => (prev.surface_format, prev.present_mode),
            None => (
                choose_surface_format(formats)?,
                choose_present_mode(present_modes, preferred_present_mode),
            ),
        };

        let extent = choose_extent(caps, window_extent);
        if extent.is_zero_area() {
            return Err(Error::PreconditionFailed(format!(
                "Cannot create a swapchain with a zero-area extent ({}x{})",
                extent.width, extent.height
            )));
        }

        Ok(Self {
            surface_format,
            present_mode,
            extent,
            image_count: choose_image_count(caps),
        })
    }
}

/// Validate a framebuffer lookup by swapchain image index
pub fn framebuffer_slot(index: u32, framebuffer_count: usize) -> Result<usize> {
    let slot = index as usize;
    if slot >= framebuffer_count {
        return Err(Error::PreconditionFailed(format!(
            "Framebuffer index {} out of range (swapchain has {} images)",
            index, framebuffer_count
        )));
    }
    Ok(slot)
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
