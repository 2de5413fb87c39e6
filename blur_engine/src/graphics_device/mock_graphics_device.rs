/// Mock backend for unit tests (no GPU required)
///
/// Implements the frame-sync, swapchain-host and window seams and records
/// every call in a shared log so tests can assert on ordering. The mock "GPU"
/// finishes work instantly: a submitted fence signals as soon as it is waited
/// on, unless the test asked for it to time out.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::graphics_device::command_ring::{FenceStatus, FrameSync};
use crate::graphics_device::resize::{SwapchainHost, WindowSurface};
use crate::graphics_device::swapchain::{Extent2D, SurfaceCapabilities, SwapchainDesc};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    WaitFence(u32),
    ResetFence(u32),
    WaitIdle,
    BeginCommandBuffer(u32),
    EndCommandBuffer(u32),
    Submit { command_buffer: u32, fence: u32 },
    PumpEvents,
    SurfaceCapabilities,
    RebuildSwapchain { extent: Extent2D, replaced_generation: u32 },
}

/// Call log shared between mocks
pub type CallLog = Arc<Mutex<Vec<MockCall>>>;

pub fn new_call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &CallLog, call: MockCall) {
    if let Ok(mut calls) = log.lock() {
        calls.push(call);
    }
}

// ============================================================================
// Frame sync
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockFence(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockCommandBuffer(pub u32);

#[derive(Debug, Default)]
struct MockGpuState {
    /// Fences with submitted work not yet observed complete
    pending: HashSet<u32>,
    /// Fences whose next wait times out
    time_out_next: HashSet<u32>,
    /// Command buffers currently recording
    recording: HashSet<u32>,
}

#[derive(Debug, Clone)]
pub struct MockFrameSync {
    pub calls: CallLog,
    state: Arc<Mutex<MockGpuState>>,
}

impl MockFrameSync {
    pub fn new(calls: CallLog) -> Self {
        Self { calls, state: Arc::new(Mutex::new(MockGpuState::default())) }
    }

    /// Make the next wait on `fence` report a timeout
    pub fn time_out_next_wait(&self, fence: u32) {
        self.state.lock().unwrap().time_out_next.insert(fence);
    }

    pub fn is_pending(&self, fence: u32) -> bool {
        self.state.lock().unwrap().pending.contains(&fence)
    }

    /// Fences and command buffers for a ring of the given sizes
    pub fn ring_parts(command_buffers: u32, fences: u32) -> (Vec<MockCommandBuffer>, Vec<MockFence>) {
        (
            (0..command_buffers).map(MockCommandBuffer).collect(),
            (0..fences).map(MockFence).collect(),
        )
    }
}

impl FrameSync for MockFrameSync {
    type Fence = MockFence;
    type CommandBuffer = MockCommandBuffer;
    type Submission = ();

    fn wait_fence(&self, fence: &MockFence, _timeout_ns: u64) -> Result<FenceStatus> {
        record(&self.calls, MockCall::WaitFence(fence.0));
        let mut state = self.state.lock().unwrap();
        if state.time_out_next.remove(&fence.0) {
            return Ok(FenceStatus::TimedOut);
        }
        state.pending.remove(&fence.0);
        Ok(FenceStatus::Signaled)
    }

    fn reset_fence(&self, fence: &MockFence) -> Result<()> {
        record(&self.calls, MockCall::ResetFence(fence.0));
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        record(&self.calls, MockCall::WaitIdle);
        self.state.lock().unwrap().pending.clear();
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: MockCommandBuffer) -> Result<()> {
        record(&self.calls, MockCall::BeginCommandBuffer(cmd.0));
        if !self.state.lock().unwrap().recording.insert(cmd.0) {
            return Err(Error::BackendError(format!("Command buffer {} is already recording", cmd.0)));
        }
        Ok(())
    }

    fn end_command_buffer(&self, cmd: MockCommandBuffer) -> Result<()> {
        record(&self.calls, MockCall::EndCommandBuffer(cmd.0));
        if !self.state.lock().unwrap().recording.remove(&cmd.0) {
            return Err(Error::BackendError(format!("Command buffer {} is not recording", cmd.0)));
        }
        Ok(())
    }

    fn submit(&self, cmd: MockCommandBuffer, fence: &MockFence, _submission: &()) -> Result<()> {
        record(&self.calls, MockCall::Submit { command_buffer: cmd.0, fence: fence.0 });
        let mut state = self.state.lock().unwrap();
        // Submitting on a fence with unobserved work means the ring skipped a wait
        if !state.pending.insert(fence.0) {
            return Err(Error::BackendError(format!("Fence {} reused while still in flight", fence.0)));
        }
        Ok(())
    }
}

// ============================================================================
// Window
// ============================================================================

#[derive(Debug)]
pub struct MockWindow {
    pub calls: CallLog,
    pub extent: Extent2D,
    pub resized: bool,
    /// Extents the window takes on, one per event pump
    pub pending_extents: VecDeque<Extent2D>,
}

impl MockWindow {
    pub fn new(calls: CallLog, extent: Extent2D) -> Self {
        Self { calls, extent, resized: false, pending_extents: VecDeque::new() }
    }
}

impl WindowSurface for MockWindow {
    fn drawable_extent(&self) -> Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn clear_resized(&mut self) {
        self.resized = false;
    }

    fn pump_events(&mut self) {
        record(&self.calls, MockCall::PumpEvents);
        if let Some(next) = self.pending_extents.pop_front() {
            self.extent = next;
        }
    }
}

// ============================================================================
// Swapchain host
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSwapchain {
    pub desc: SwapchainDesc,
    /// Increments on every rebuild
    pub generation: u32,
}

#[derive(Debug)]
pub struct MockSwapchainHost {
    pub calls: CallLog,
    pub caps: SurfaceCapabilities,
    /// Generations of swapchains handed back for destruction
    pub destroyed: Vec<u32>,
}

impl MockSwapchainHost {
    pub fn new(calls: CallLog, caps: SurfaceCapabilities) -> Self {
        Self { calls, caps, destroyed: Vec::new() }
    }
}

impl SwapchainHost for MockSwapchainHost {
    type Swapchain = MockSwapchain;

    fn wait_idle(&self) -> Result<()> {
        record(&self.calls, MockCall::WaitIdle);
        Ok(())
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        record(&self.calls, MockCall::SurfaceCapabilities);
        Ok(self.caps)
    }

    fn swapchain_desc(&self, swapchain: &MockSwapchain) -> SwapchainDesc {
        swapchain.desc
    }

    fn rebuild_swapchain(&mut self, desc: &SwapchainDesc, old: MockSwapchain) -> Result<MockSwapchain> {
        record(&self.calls, MockCall::RebuildSwapchain {
            extent: desc.extent,
            replaced_generation: old.generation,
        });
        self.destroyed.push(old.generation);
        Ok(MockSwapchain { desc: *desc, generation: old.generation + 1 })
    }
}
