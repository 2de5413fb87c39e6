/// Graphics device module - GPU-API-agnostic resource descriptions and frame logic

// Resource descriptions
pub mod format;
pub mod physical_device;
pub mod swapchain;
pub mod buffer;
pub mod texture;
pub mod sampler;
pub mod shader;
pub mod pipeline;
pub mod render_pass;

// Submission and lifetime tracking
pub mod descriptor_batch;
pub mod retire_queue;
pub mod frame_ring;
pub mod command_ring;
pub mod resize;

pub use format::*;
pub use physical_device::*;
pub use swapchain::*;
pub use buffer::*;
pub use texture::*;
pub use sampler::*;
pub use shader::*;
pub use pipeline::*;
pub use render_pass::*;

pub use descriptor_batch::*;
pub use retire_queue::*;
pub use frame_ring::*;
pub use command_ring::*;
pub use resize::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
