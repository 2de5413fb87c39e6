//! Unit tests for resize.rs

use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::resize::*;
use crate::graphics_device::swapchain::*;
use crate::graphics_device::TextureFormat;

fn free_caps() -> SurfaceCapabilities {
    SurfaceCapabilities {
        min_image_count: 2,
        max_image_count: 3,
        current_extent: Extent2D::new(u32::MAX, u32::MAX),
        min_image_extent: Extent2D::new(1, 1),
        max_image_extent: Extent2D::new(1920, 1080),
    }
}

fn initial_swapchain() -> MockSwapchain {
    MockSwapchain {
        desc: SwapchainDesc {
            surface_format: SurfaceFormat {
                format: TextureFormat::B8G8R8A8_SRGB,
                color_space: ColorSpace::SrgbNonlinear,
            },
            present_mode: PresentMode::Mailbox,
            extent: Extent2D::new(800, 600),
            image_count: 3,
        },
        generation: 0,
    }
}

fn setup(extent: Extent2D) -> (MockSwapchainHost, MockWindow, CallLog) {
    let calls = new_call_log();
    let host = MockSwapchainHost::new(calls.clone(), free_caps());
    let mut window = MockWindow::new(calls.clone(), extent);
    window.resized = true;
    (host, window, calls)
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_recreate_waits_idle_before_rebuild() {
    let (mut host, mut window, calls) = setup(Extent2D::new(1024, 768));

    recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();

    let log = calls.lock().unwrap().clone();
    let idle = log.iter().position(|c| *c == MockCall::WaitIdle).unwrap();
    let rebuild = log
        .iter()
        .position(|c| matches!(c, MockCall::RebuildSwapchain { .. }))
        .unwrap();
    assert!(idle < rebuild);
}

#[test]
fn test_old_swapchain_handed_back() {
    let (mut host, mut window, _calls) = setup(Extent2D::new(1024, 768));

    let next = recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();
    assert_eq!(next.generation, 1);
    assert_eq!(host.destroyed, vec![0]);

    let last = recreate_swapchain(&mut host, &mut window, next).unwrap();
    assert_eq!(last.generation, 2);
    assert_eq!(host.destroyed, vec![0, 1]);
}

// ============================================================================
// NEGOTIATED DESCRIPTION
// ============================================================================

#[test]
fn test_recreate_keeps_format_and_present_mode() {
    let (mut host, mut window, _calls) = setup(Extent2D::new(1024, 768));

    let next = recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();

    assert_eq!(next.desc.surface_format.format, TextureFormat::B8G8R8A8_SRGB);
    assert_eq!(next.desc.present_mode, PresentMode::Mailbox);
    assert_eq!(next.desc.extent, Extent2D::new(1024, 768));
    assert_eq!(next.desc.image_count, 3);
}

#[test]
fn test_recreate_clamps_extent_to_surface() {
    let (mut host, mut window, calls) = setup(Extent2D::new(4000, 500));

    let next = recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();

    assert_eq!(next.desc.extent, Extent2D::new(1920, 500));
    assert!(calls.lock().unwrap().contains(&MockCall::RebuildSwapchain {
        extent: Extent2D::new(1920, 500),
        replaced_generation: 0,
    }));
}

#[test]
fn test_recreate_uses_fixed_surface_extent() {
    let (mut host, mut window, _calls) = setup(Extent2D::new(1024, 768));
    host.caps.current_extent = Extent2D::new(640, 480);

    let next = recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();
    assert_eq!(next.desc.extent, Extent2D::new(640, 480));
}

#[test]
fn test_recreate_clears_resized_flag() {
    let (mut host, mut window, _calls) = setup(Extent2D::new(1024, 768));
    assert!(window.was_resized());

    recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();
    assert!(!window.was_resized());
}

// ============================================================================
// MINIMIZED WINDOW
// ============================================================================

#[test]
fn test_minimized_window_polls_until_drawable() {
    let (mut host, mut window, calls) = setup(Extent2D::new(0, 0));
    window.pending_extents.push_back(Extent2D::new(0, 600));
    window.pending_extents.push_back(Extent2D::new(800, 0));
    window.pending_extents.push_back(Extent2D::new(800, 600));

    let next = recreate_swapchain(&mut host, &mut window, initial_swapchain()).unwrap();

    let log = calls.lock().unwrap().clone();
    let pumps = log.iter().filter(|c| **c == MockCall::PumpEvents).count();
    assert_eq!(pumps, 3);
    // No device work while minimized
    assert_eq!(log[..3], [MockCall::PumpEvents, MockCall::PumpEvents, MockCall::PumpEvents]);
    assert_eq!(next.desc.extent, Extent2D::new(800, 600));
}

#[test]
fn test_drawable_window_does_not_pump() {
    let calls = new_call_log();
    let mut window = MockWindow::new(calls.clone(), Extent2D::new(320, 240));
    assert_eq!(wait_for_drawable_extent(&mut window), Extent2D::new(320, 240));
    assert!(calls.lock().unwrap().is_empty());
}

// ============================================================================
// PRESENT STATUS
// ============================================================================

#[test]
fn test_present_status_needs_recreation() {
    assert!(!PresentStatus::Optimal.needs_recreation());
    assert!(PresentStatus::Suboptimal.needs_recreation());
    assert!(PresentStatus::OutOfDate.needs_recreation());
}
