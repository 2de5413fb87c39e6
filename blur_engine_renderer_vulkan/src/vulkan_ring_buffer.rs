/// UniformRingBuffer - one host-visible uniform buffer per frame in flight

use blur_engine::blur::render::{BufferDesc, BufferUsage, FrameRing, MemoryUsage};
use blur_engine::blur::Result;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;

/// Per-frame uniform buffers cycled with `to_next_buffer`
///
/// Writing the current buffer never touches one the GPU may still read,
/// as long as the ring is at least as long as the frames in flight.
pub struct UniformRingBuffer {
    buffers: FrameRing<Arc<Buffer>>,
}

impl UniformRingBuffer {
    pub(crate) fn create(ctx: &Arc<GpuContext>, size: u64, count: usize, name: &str) -> Result<Self> {
        let buffers = FrameRing::try_from_fn(count, |index| {
            let desc = BufferDesc::new(
                size,
                BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST,
                MemoryUsage::CpuToGpu,
                format!("{} {}", name, index),
            );
            Buffer::create(ctx, &desc).map(Arc::new)
        })?;
        Ok(Self { buffers })
    }

    pub fn current(&self) -> &Arc<Buffer> {
        self.buffers.current()
    }

    pub fn index(&self) -> usize {
        self.buffers.index()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Arc<Buffer>> {
        self.buffers.iter()
    }

    /// Move to the next buffer, wrapping after the last
    pub fn to_next_buffer(&mut self) -> &Arc<Buffer> {
        self.buffers.advance()
    }

    /// Write `values` into the current buffer
    pub fn write<T: bytemuck::Pod>(&self, values: &[T]) -> Result<()> {
        self.current().copy_pod(values)
    }
}
