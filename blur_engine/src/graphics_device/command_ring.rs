/// Ring of command buffers and in-flight fences
///
/// The command-buffer ring and the fence ring may have different lengths and
/// advance independently. Each fence slot remembers whether it has pending
/// work; resources disposed while a slot is active are released only after
/// that slot's next submission has completed on the GPU.

use std::fmt;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::frame_ring::RingCursor;
use crate::graphics_device::retire_queue::RetireQueue;

/// Upper bound for one fence wait (about 4.3 seconds)
pub const FENCE_TIMEOUT_NS: u64 = u32::MAX as u64;

/// Outcome of a bounded fence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    TimedOut,
}

/// Fence, command-buffer and queue operations the ring drives
///
/// Implemented by the GPU backend and by the test mock.
pub trait FrameSync {
    type Fence;
    type CommandBuffer: Copy;
    /// Extra submit parameters (wait/signal semaphores, stages)
    type Submission;

    fn wait_fence(&self, fence: &Self::Fence, timeout_ns: u64) -> Result<FenceStatus>;
    fn reset_fence(&self, fence: &Self::Fence) -> Result<()>;
    fn wait_idle(&self) -> Result<()>;
    /// Reset `cmd` and begin recording with the one-time-submit hint
    fn begin_command_buffer(&self, cmd: Self::CommandBuffer) -> Result<()>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> Result<()>;
    fn submit(&self, cmd: Self::CommandBuffer, fence: &Self::Fence, submission: &Self::Submission) -> Result<()>;
}

#[derive(Debug)]
struct InFlightSlot<F> {
    fence: F,
    submitted: bool,
    /// Token of the last submission signalling this fence
    token: u64,
}

pub struct CommandRing<B: FrameSync> {
    backend: B,
    command_buffers: Vec<B::CommandBuffer>,
    slots: Vec<InFlightSlot<B::Fence>>,
    buffer_cursor: RingCursor,
    fence_cursor: RingCursor,
    /// Token the next submission will carry
    next_token: u64,
    retire: RetireQueue,
}

impl<B: FrameSync> fmt::Debug for CommandRing<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRing")
            .field("command_buffer_index", &self.buffer_cursor.index())
            .field("command_buffer_count", &self.command_buffers.len())
            .field("fence_index", &self.fence_cursor.index())
            .field("in_flight_count", &self.slots.len())
            .field("next_token", &self.next_token)
            .field("retire", &self.retire)
            .finish()
    }
}

impl<B: FrameSync> CommandRing<B> {
    /// `fences` must be created signaled
    pub fn new(backend: B, command_buffers: Vec<B::CommandBuffer>, fences: Vec<B::Fence>) -> Result<Self> {
        let buffer_cursor = RingCursor::new(command_buffers.len())?;
        let fence_cursor = RingCursor::new(fences.len())?;
        Ok(Self {
            backend,
            command_buffers,
            slots: fences
                .into_iter()
                .map(|fence| InFlightSlot { fence, submitted: false, token: 0 })
                .collect(),
            buffer_cursor,
            fence_cursor,
            next_token: 1,
            retire: RetireQueue::new(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Wait for the current slot, then reset and begin the current command buffer
    pub fn begin(&mut self) -> Result<B::CommandBuffer> {
        self.wait_for_submit()?;
        let cmd = self.current_command_buffer();
        self.backend.begin_command_buffer(cmd)?;
        Ok(cmd)
    }

    pub fn end(&mut self) -> Result<()> {
        self.backend.end_command_buffer(self.current_command_buffer())
    }

    /// Submit the current command buffer, signalling the current fence
    pub fn submit(&mut self, submission: &B::Submission) -> Result<()> {
        let cmd = self.current_command_buffer();
        let slot = &mut self.slots[self.fence_cursor.index()];
        self.backend.reset_fence(&slot.fence)?;
        self.backend.submit(cmd, &slot.fence, submission)?;
        slot.submitted = true;
        slot.token = self.next_token;
        self.next_token += 1;
        Ok(())
    }

    /// Advance both rings by one, each modulo its own length
    pub fn advance(&mut self) {
        self.buffer_cursor.advance();
        self.fence_cursor.advance();
    }

    /// If the current slot has pending work, wait for it and release what it kept alive
    pub fn wait_for_submit(&mut self) -> Result<()> {
        let index = self.fence_cursor.index();
        if !self.slots[index].submitted {
            return Ok(());
        }
        Self::wait_slot(&self.backend, &self.slots[index].fence, index)?;

        let slot = &mut self.slots[index];
        slot.submitted = false;
        self.retire.retire_through(slot.token);
        Ok(())
    }

    /// Wait on every fence and release everything
    pub fn wait_for_all_submissions(&mut self) -> Result<()> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            Self::wait_slot(&self.backend, &slot.fence, index)?;
            slot.submitted = false;
        }
        self.retire.retire_all();
        Ok(())
    }

    fn wait_slot(backend: &B, fence: &B::Fence, index: usize) -> Result<()> {
        if backend.wait_fence(fence, FENCE_TIMEOUT_NS)? == FenceStatus::TimedOut {
            crate::engine_error!(
                "blur::CommandRing",
                "Timed out waiting for in-flight fence {} ({} ns), waiting for device idle",
                index,
                FENCE_TIMEOUT_NS
            );
            backend.wait_idle()?;
        }
        Ok(())
    }

    /// Keep `resource` alive until the current slot's next submission completes
    pub fn dispose_resource<T: Send + Sync + 'static>(&mut self, resource: Arc<T>) {
        self.dispose_with(move || drop(resource));
    }

    /// Run `dealloc` once the current slot's next submission completes
    pub fn dispose_with(&mut self, dealloc: impl FnOnce() + Send + 'static) {
        self.retire.push(self.next_token, Box::new(dealloc));
    }

    pub fn current_command_buffer(&self) -> B::CommandBuffer {
        self.command_buffers[self.buffer_cursor.index()]
    }

    pub fn command_buffer_index(&self) -> usize {
        self.buffer_cursor.index()
    }

    pub fn fence_index(&self) -> usize {
        self.fence_cursor.index()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.command_buffers.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.slots.len()
    }

    /// Slot `index` has work whose completion has not been observed
    pub fn is_submitted(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|s| s.submitted)
    }

    pub fn pending_disposals(&self) -> usize {
        self.retire.len()
    }

    pub fn command_buffers(&self) -> &[B::CommandBuffer] {
        &self.command_buffers
    }

    /// Fences in slot order (for destruction by the owner)
    pub fn fences(&self) -> impl Iterator<Item = &B::Fence> {
        self.slots.iter().map(|s| &s.fence)
    }
}

#[cfg(test)]
#[path = "command_ring_tests.rs"]
mod tests;
