//! Unit tests for swapchain.rs

use crate::error::Error;
use crate::graphics_device::swapchain::*;
use crate::graphics_device::TextureFormat;

fn caps(min: u32, max: u32) -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: min,
        max_image_count: max,
        current_extent: Extent2D::new(800, 600),
        min_image_extent: Extent2D::new(1, 1),
        max_image_extent: Extent2D::new(4096, 4096),
    }
}

fn free_extent_caps() -> SurfaceCapabilities {
    SurfaceCapabilities {
        current_extent: Extent2D::new(u32::MAX, u32::MAX),
        min_image_extent: Extent2D::new(64, 64),
        max_image_extent: Extent2D::new(2048, 2048),
        ..caps(2, 3)
    }
}

fn srgb(format: TextureFormat) -> SurfaceFormat {
    SurfaceFormat { format, color_space: ColorSpace::SrgbNonlinear }
}

// ============================================================================
// IMAGE COUNT
// ============================================================================

#[test]
fn test_image_count_min_two_max_three() {
    assert_eq!(choose_image_count(&caps(2, 3)), 3);
}

#[test]
fn test_image_count_clamped_to_max() {
    assert_eq!(choose_image_count(&caps(3, 3)), 3);
}

#[test]
fn test_image_count_unbounded_max() {
    assert_eq!(choose_image_count(&caps(2, 0)), 3);
    assert_eq!(choose_image_count(&caps(4, 0)), 5);
}

// ============================================================================
// EXTENT
// ============================================================================

#[test]
fn test_extent_uses_current_extent_when_fixed() {
    let extent = choose_extent(&caps(2, 3), Extent2D::new(1920, 1080));
    assert_eq!(extent, Extent2D::new(800, 600));
}

#[test]
fn test_extent_clamps_window_size_when_free() {
    let c = free_extent_caps();
    assert_eq!(choose_extent(&c, Extent2D::new(1280, 720)), Extent2D::new(1280, 720));
    assert_eq!(choose_extent(&c, Extent2D::new(8000, 10)), Extent2D::new(2048, 64));
}

#[test]
fn test_zero_area_detection() {
    assert!(Extent2D::new(0, 600).is_zero_area());
    assert!(Extent2D::new(800, 0).is_zero_area());
    assert!(!Extent2D::new(1, 1).is_zero_area());
}

// ============================================================================
// FORMAT AND PRESENT MODE
// ============================================================================

#[test]
fn test_surface_format_prefers_srgb() {
    let formats = [
        srgb(TextureFormat::B8G8R8A8_UNORM),
        srgb(TextureFormat::B8G8R8A8_SRGB),
    ];
    assert_eq!(choose_surface_format(&formats).unwrap().format, TextureFormat::B8G8R8A8_SRGB);
}

#[test]
fn test_surface_format_requires_srgb_color_space() {
    let formats = [
        SurfaceFormat { format: TextureFormat::R8G8B8A8_SRGB, color_space: ColorSpace::Other(1000104002) },
        srgb(TextureFormat::A2B10G10R10_UNORM_PACK32),
    ];
    // No preferred match: first reported wins
    assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
}

#[test]
fn test_surface_format_skips_unknown_formats() {
    let formats = [srgb(TextureFormat::Undefined), srgb(TextureFormat::B8G8R8A8_UNORM)];
    let chosen = choose_surface_format(&formats).unwrap();
    assert_eq!(chosen.format, TextureFormat::B8G8R8A8_UNORM);
}

#[test]
fn test_surface_format_only_unknown_fails() {
    let formats = [srgb(TextureFormat::Undefined)];
    assert!(matches!(choose_surface_format(&formats), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_surface_format_empty_fails() {
    assert!(matches!(choose_surface_format(&[]), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let modes = [PresentMode::Fifo, PresentMode::Immediate];
    assert_eq!(choose_present_mode(&modes, PresentMode::Immediate), PresentMode::Immediate);
    assert_eq!(choose_present_mode(&modes, PresentMode::Mailbox), PresentMode::Fifo);
}

#[test]
fn test_present_mode_names() {
    assert_eq!(PresentMode::Fifo.to_string(), "V-Sync");
    assert_eq!(PresentMode::FifoRelaxed.to_string(), "V-Sync Catch Up");
    assert_eq!(PresentMode::Immediate.to_string(), "Immediate");
    assert_eq!(PresentMode::Mailbox.to_string(), "V-Sync Triple Buffering");
}

#[test]
fn test_sharing_mode() {
    assert_eq!(SharingMode::for_families(0, 0), SharingMode::Exclusive);
    assert_eq!(SharingMode::for_families(0, 2), SharingMode::Concurrent);
}

// ============================================================================
// NEGOTIATION
// ============================================================================

#[test]
fn test_negotiate_fresh_swapchain() {
    let desc = SwapchainDesc::negotiate(
        &caps(2, 3),
        &[srgb(TextureFormat::B8G8R8A8_SRGB)],
        &[PresentMode::Fifo, PresentMode::Mailbox],
        Extent2D::new(800, 600),
        PresentMode::Mailbox,
        None,
    )
    .unwrap();

    assert_eq!(desc.image_count, 3);
    assert_eq!(desc.present_mode, PresentMode::Mailbox);
    assert_eq!(desc.surface_format.format, TextureFormat::B8G8R8A8_SRGB);
    assert_eq!(desc.extent, Extent2D::new(800, 600));
}

#[test]
fn test_negotiate_recreation_keeps_format_and_mode() {
    let previous = SwapchainDesc {
        surface_format: srgb(TextureFormat::R8G8B8A8_SRGB),
        present_mode: PresentMode::Immediate,
        extent: Extent2D::new(800, 600),
        image_count: 3,
    };
    let desc = SwapchainDesc::negotiate(
        &free_extent_caps(),
        &[srgb(TextureFormat::B8G8R8A8_SRGB)],
        &[PresentMode::Fifo],
        Extent2D::new(1024, 768),
        PresentMode::Fifo,
        Some(&previous),
    )
    .unwrap();

    assert_eq!(desc.surface_format, previous.surface_format);
    assert_eq!(desc.present_mode, PresentMode::Immediate);
    assert_eq!(desc.extent, Extent2D::new(1024, 768));
}

#[test]
fn test_negotiate_rejects_zero_area() {
    let mut c = caps(2, 3);
    c.current_extent = Extent2D::new(0, 0);
    let result = SwapchainDesc::negotiate(
        &c,
        &[srgb(TextureFormat::B8G8R8A8_SRGB)],
        &[PresentMode::Fifo],
        Extent2D::new(0, 0),
        PresentMode::Fifo,
        None,
    );
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// FRAMEBUFFER LOOKUP
// ============================================================================

#[test]
fn test_framebuffer_slot_in_range() {
    assert_eq!(framebuffer_slot(2, 3).unwrap(), 2);
}

#[test]
fn test_framebuffer_slot_out_of_range_is_error() {
    assert!(matches!(framebuffer_slot(3, 3), Err(Error::PreconditionFailed(_))));
    assert!(framebuffer_slot(0, 0).is_err());
}
