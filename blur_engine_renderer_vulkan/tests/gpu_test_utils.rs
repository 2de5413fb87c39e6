#![allow(dead_code)]
//! GPU test utilities - shared Vulkan context and window for integration tests
//!
//! One headless context is created lazily and shared by every test in a
//! binary. Window-backed tests share one hidden window: winit allows a single
//! event loop per process, so the loop is leaked to keep the window valid.

use blur_engine::blur::{ContextConfig, DeviceFeatures};
use blur_engine_renderer_vulkan::blur::VulkanContext;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::EventLoopBuilder;
use winit::window::Window;

#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
#[cfg(all(unix, not(target_os = "macos")))]
use winit::platform::x11::EventLoopBuilderExtX11;

static GPU_CONTEXT: OnceLock<Arc<Mutex<VulkanContext>>> = OnceLock::new();
static GPU_WINDOW: OnceLock<Arc<Window>> = OnceLock::new();

/// Config that runs on any Vulkan 1.3 device, with shaders under `shader_directory`
pub fn test_config(shader_directory: PathBuf) -> ContextConfig {
    ContextConfig {
        app_name: "BlurEngine GPU Tests".to_string(),
        enable_validation: false,
        features: DeviceFeatures::none(),
        shader_directory,
        ..ContextConfig::default()
    }
}

/// Directory test shaders are written to
pub fn shader_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blur_gpu_tests_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Shared headless context (created on first use)
pub fn get_test_context() -> Arc<Mutex<VulkanContext>> {
    GPU_CONTEXT
        .get_or_init(|| {
            let context = VulkanContext::new_headless(test_config(shader_dir()))
                .expect("Failed to create headless VulkanContext for tests");
            Arc::new(Mutex::new(context))
        })
        .clone()
}

/// Shared hidden 800x600 window (created on first use)
#[allow(deprecated)]
pub fn get_test_window() -> Arc<Window> {
    GPU_WINDOW
        .get_or_init(|| {
            let event_loop = {
                #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
                {
                    EventLoopBuilder::new().with_any_thread(true).build().unwrap()
                }
                #[cfg(not(any(target_os = "windows", all(unix, not(target_os = "macos")))))]
                {
                    EventLoopBuilder::new().build().unwrap()
                }
            };
            let window_attrs = Window::default_attributes()
                .with_title("GPU Test Window")
                .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
                .with_visible(false);
            let window = event_loop.create_window(window_attrs).unwrap();

            // Test-only: the event loop is not Sync and cannot live in a static
            std::mem::forget(event_loop);
            Arc::new(window)
        })
        .clone()
}
