/*!
# Blur Engine

Core types and frame logic for the Blur rendering engine.

This crate holds everything about the engine that does not talk to a GPU API:
resource descriptions, swapchain negotiation, queue reservation and device
scoring, the in-flight command ring with its retire queue, the resize
sequence, render-pass derivation and the OBJ mesh loader. The Vulkan backend
(`blur_engine_renderer_vulkan`) plugs into the trait seams defined here.

## Architecture

- **FrameSync**: fence and command-buffer operations driven by [`CommandRing`](blur::render::CommandRing)
- **SwapchainHost**: device side of swapchain recreation
- **WindowSurface**: drawable extent, resized flag and event pump
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod graphics_device;
pub mod mesh;

// Main blur namespace module
pub mod blur {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Context configuration
    pub use crate::config::{ContextConfig, DeviceFeatures};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all GPU-agnostic rendering types
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Mesh sub-module
    pub mod mesh {
        pub use crate::mesh::*;
    }
}

// Re-export math library at crate root
pub use glam;
