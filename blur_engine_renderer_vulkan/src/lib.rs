/*!
# Blur Engine - Vulkan Backend

Vulkan realisation of the Blur Engine: device context, swapchain, buffers,
textures, samplers, shader modules, pipelines, render passes, framebuffers,
command queues and the per-frame renderer.

Built on `ash` for the API bindings, `gpu-allocator` for memory, `shaderc`
for GLSL compilation and `spirq` for SPIR-V reflection. Decision logic shared
with tests (queue reservation, swapchain sizing, the in-flight command ring,
resize sequencing) lives in the `blur_engine` core crate.

```no_run
use blur_engine::blur::ContextConfig;
use blur_engine_renderer_vulkan::blur::VulkanContext;

let context = VulkanContext::new_headless(ContextConfig::default())?;
let queue = context.create_graphics_command_queue()?;
# Ok::<(), blur_engine::blur::Error>(())
```
*/

mod vulkan_format;
mod vulkan_debug;
mod vulkan_physical_device;
mod vulkan_context;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_render_pass;
mod vulkan_framebuffer;
mod vulkan_swapchain;
mod vulkan_command_queue;
mod vulkan_ring_buffer;
mod vulkan_renderer;

/// Public API of the Vulkan backend
pub mod blur {
    pub use crate::vulkan_context::{GpuContext, QueueHandle, Queues, VulkanContext};
    pub use crate::vulkan_physical_device::PhysicalDevice;
    pub use crate::vulkan_buffer::Buffer;
    pub use crate::vulkan_texture::Texture;
    pub use crate::vulkan_sampler::Sampler;
    pub use crate::vulkan_shader::{compile_glsl, load_spirv, reflect_spirv, ShaderModule};
    pub use crate::vulkan_pipeline::{DescriptorResource, Pipeline};
    pub use crate::vulkan_render_pass::RenderPass;
    pub use crate::vulkan_framebuffer::Framebuffer;
    pub use crate::vulkan_swapchain::Swapchain;
    pub use crate::vulkan_command_queue::{CommandQueue, QueueSubmission, VulkanFrameSync};
    pub use crate::vulkan_ring_buffer::UniformRingBuffer;
    pub use crate::vulkan_renderer::{FrameContext, FrameUniforms, Renderer, WinitWindowSurface, DEPTH_FORMAT};

    /// Validation layer message counters
    pub mod validation {
        pub use crate::vulkan_debug::{
            print_validation_stats_report, reset_validation_stats, validation_stats, ValidationStats,
        };
    }

    /// Conversions between engine types and Vulkan types
    pub mod format {
        pub use crate::vulkan_format::*;
    }
}
