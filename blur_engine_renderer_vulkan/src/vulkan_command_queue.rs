/// CommandQueue - in-flight command buffers and fences on one device queue
///
/// The ring logic (slot waits, independent cursors, deferred disposal) lives in
/// the core `CommandRing`; this module supplies the Vulkan fence, command
/// buffer and submit calls it drives.

use ash::vk;
use blur_engine::blur::render::{CommandRing, FenceStatus, FrameSync};
use blur_engine::blur::Result;
use blur_engine::{engine_debug, engine_err, engine_precondition};
use std::fmt;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, QueueHandle};

const LOG_SOURCE: &str = "blur::vulkan::CommandQueue";

/// Semaphores waited on and signalled by one submission
#[derive(Debug, Clone, Default)]
pub struct QueueSubmission {
    pub wait: Vec<(vk::Semaphore, vk::PipelineStageFlags)>,
    pub signal: Vec<vk::Semaphore>,
}

impl QueueSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait_on(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags) -> Self {
        self.wait.push((semaphore, stage));
        self
    }

    pub fn signal(mut self, semaphore: vk::Semaphore) -> Self {
        self.signal.push(semaphore);
        self
    }
}

/// Fence and command-buffer calls on one queue
pub struct VulkanFrameSync {
    ctx: Arc<GpuContext>,
    queue: QueueHandle,
}

impl FrameSync for VulkanFrameSync {
    type Fence = vk::Fence;
    type CommandBuffer = vk::CommandBuffer;
    type Submission = QueueSubmission;

    fn wait_fence(&self, fence: &vk::Fence, timeout_ns: u64) -> Result<FenceStatus> {
        match unsafe { self.ctx.device.wait_for_fences(&[*fence], true, timeout_ns) } {
            Ok(()) => Ok(FenceStatus::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceStatus::TimedOut),
            Err(e) => Err(engine_err!(LOG_SOURCE, "Failed to wait for fence: {:?}", e)),
        }
    }

    fn reset_fence(&self, fence: &vk::Fence) -> Result<()> {
        unsafe { self.ctx.device.reset_fences(&[*fence]) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to reset fence: {:?}", e))
    }

    fn wait_idle(&self) -> Result<()> {
        self.ctx.wait_idle()
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(LOG_SOURCE, "Failed to reset command buffer: {:?}", e))?;

            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| engine_err!(LOG_SOURCE, "Failed to begin command buffer: {:?}", e))
        }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.ctx.device.end_command_buffer(cmd) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to end command buffer: {:?}", e))
    }

    fn submit(&self, cmd: vk::CommandBuffer, fence: &vk::Fence, submission: &QueueSubmission) -> Result<()> {
        let (wait_semaphores, wait_stages): (Vec<vk::Semaphore>, Vec<vk::PipelineStageFlags>) =
            submission.wait.iter().copied().unzip();
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&submission.signal);

        unsafe { self.ctx.device.queue_submit(self.queue.queue, &[submit_info], *fence) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to submit command buffer: {:?}", e))
    }
}

/// Command buffers and in-flight fences for one queue
pub struct CommandQueue {
    ring: CommandRing<VulkanFrameSync>,
    pool: vk::CommandPool,
    name: String,
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue").field("name", &self.name).field("ring", &self.ring).finish()
    }
}

impl CommandQueue {
    /// `command_buffer_count` buffers and `in_flight_count` fences (created signaled)
    pub(crate) fn create(
        ctx: &Arc<GpuContext>,
        queue: QueueHandle,
        command_buffer_count: usize,
        in_flight_count: usize,
        name: &str,
    ) -> Result<Self> {
        engine_precondition!(
            command_buffer_count > 0 && in_flight_count > 0,
            LOG_SOURCE,
            "Command queue '{}' needs at least one command buffer and one fence",
            name
        );
        let device = &ctx.device;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue.family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(|e| engine_err!(LOG_SOURCE, "Failed to create command pool for '{}': {:?}", name, e))?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(command_buffer_count as u32);
        let command_buffers = unsafe { device.allocate_command_buffers(&alloc_info) }.map_err(|e| {
            unsafe { device.destroy_command_pool(pool, None) };
            engine_err!(LOG_SOURCE, "Failed to allocate command buffers for '{}': {:?}", name, e)
        })?;

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let mut fences = Vec::with_capacity(in_flight_count);
        for _ in 0..in_flight_count {
            match unsafe { device.create_fence(&fence_info, None) } {
                Ok(fence) => fences.push(fence),
                Err(e) => {
                    unsafe {
                        for fence in fences {
                            device.destroy_fence(fence, None);
                        }
                        device.destroy_command_pool(pool, None);
                    }
                    return Err(engine_err!(LOG_SOURCE, "Failed to create fence for '{}': {:?}", name, e));
                }
            }
        }

        let backend = VulkanFrameSync { ctx: Arc::clone(ctx), queue };
        let ring = CommandRing::new(backend, command_buffers, fences)?;

        engine_debug!(
            LOG_SOURCE,
            "Created '{}' on family {} ({} command buffers, {} in flight)",
            name,
            queue.family,
            command_buffer_count,
            in_flight_count
        );

        Ok(Self { ring, pool, name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> QueueHandle {
        self.ring.backend().queue
    }

    /// Wait for the current slot's last submission, then reset and begin its command buffer
    pub fn begin_cmd_buffer(&mut self) -> Result<vk::CommandBuffer> {
        self.ring.begin()
    }

    pub fn end_cmd_buffer(&mut self) -> Result<()> {
        self.ring.end()
    }

    /// Submit the current command buffer, signalling the current fence
    pub fn submit(&mut self, submission: &QueueSubmission) -> Result<()> {
        self.ring.submit(submission)
    }

    /// Advance the command-buffer and fence rings, each by one
    pub fn to_next_cmd_buffer(&mut self) {
        self.ring.advance();
    }

    pub fn wait_for_submit(&mut self) -> Result<()> {
        self.ring.wait_for_submit()
    }

    /// Submit an empty batch that only waits on `semaphore`
    ///
    /// Unsignals a semaphore whose intended consumer was never submitted.
    pub fn consume_semaphore(&self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags) -> Result<()> {
        let backend = self.ring.backend();
        let wait_semaphores = [semaphore];
        let wait_stages = [stage];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);
        unsafe {
            backend
                .ctx
                .device
                .queue_submit(backend.queue.queue, &[submit_info], vk::Fence::null())
        }
        .map_err(|e| engine_err!(LOG_SOURCE, "Failed to consume semaphore on '{}': {:?}", self.name, e))
    }

    pub fn wait_for_all_submissions(&mut self) -> Result<()> {
        self.ring.wait_for_all_submissions()
    }

    /// Keep `resource` alive until the current slot's next submission completes
    pub fn dispose_on_submit_completion<T: Send + Sync + 'static>(&mut self, resource: Arc<T>) {
        self.ring.dispose_resource(resource);
    }

    /// Run `dealloc` once the current slot's next submission completes
    pub fn dispose_with(&mut self, dealloc: impl FnOnce() + Send + 'static) {
        self.ring.dispose_with(dealloc);
    }

    pub fn current_cmd_buffer(&self) -> vk::CommandBuffer {
        self.ring.current_command_buffer()
    }

    pub fn command_buffer_index(&self) -> usize {
        self.ring.command_buffer_index()
    }

    pub fn fence_index(&self) -> usize {
        self.ring.fence_index()
    }

    pub fn command_buffer_count(&self) -> usize {
        self.ring.command_buffer_count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.ring.in_flight_count()
    }

    pub fn pending_disposals(&self) -> usize {
        self.ring.pending_disposals()
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        self.ring.wait_for_all_submissions().ok();
        let device = &self.ring.backend().ctx.device;
        unsafe {
            for &fence in self.ring.fences() {
                device.destroy_fence(fence, None);
            }
            // Frees the command buffers allocated from it
            device.destroy_command_pool(self.pool, None);
        }
    }
}
