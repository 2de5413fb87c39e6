/// Buffer - GPU buffer backed by a gpu-allocator allocation
///
/// A direct buffer owns its memory. A staging buffer is host-visible and tied to
/// a device-local destination; `upload_staging_buffer` records the copy into a
/// command buffer, it does not perform it.

use ash::vk;
use blur_engine::blur::render::{
    checked_range, validate_staging_target, write_mapped, BufferDesc, BufferUsage, TextureFormat,
    UploadRegion,
};
use blur_engine::blur::{Error, Result};
use blur_engine::{engine_err, engine_error, engine_precondition};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, OnceLock};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{buffer_usage_to_vk, format_to_vk, memory_usage_to_location};

const LOG_SOURCE: &str = "blur::vulkan::Buffer";

/// Direct buffers own their contents, staging buffers feed a destination
enum BufferKind {
    Direct,
    Staging { destination: Arc<Buffer> },
}

/// Vulkan buffer
pub struct Buffer {
    /// Shared GPU context (device, allocator, queues)
    ctx: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation (host-visible allocations stay mapped until drop)
    allocation: Mutex<Option<Allocation>>,
    desc: BufferDesc,
    kind: BufferKind,
    device_address: OnceLock<vk::DeviceAddress>,
    /// Texel views, created on first request per format
    views: Mutex<FxHashMap<TextureFormat, vk::BufferView>>,
}

impl Buffer {
    /// Allocate a buffer described by `desc`
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &BufferDesc) -> Result<Self> {
        desc.validate()?;
        engine_precondition!(
            !desc.usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS) || ctx.enabled_features.buffer_device_address,
            LOG_SOURCE,
            "Buffer '{}' requests SHADER_DEVICE_ADDRESS but buffer device address is not enabled",
            desc.name
        );

        let (buffer, allocation) = allocate_buffer(ctx, desc)?;
        Ok(Self::from_parts(ctx, buffer, allocation, desc.clone(), BufferKind::Direct))
    }

    /// Host-visible buffer staging into `destination`
    pub(crate) fn create_staging(ctx: &Arc<GpuContext>, destination: Arc<Buffer>) -> Result<Self> {
        validate_staging_target(Some(&destination.desc)).map_err(|e| {
            engine_error!(LOG_SOURCE, "{}", e);
            e
        })?;

        let desc = destination.desc.staging_for();
        // The staging side never needs an address of its own
        let desc = BufferDesc { usage: desc.usage - BufferUsage::SHADER_DEVICE_ADDRESS, ..desc };
        let (buffer, allocation) = allocate_buffer(ctx, &desc)?;
        Ok(Self::from_parts(ctx, buffer, allocation, desc, BufferKind::Staging { destination }))
    }

    fn from_parts(
        ctx: &Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        desc: BufferDesc,
        kind: BufferKind,
    ) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            buffer,
            allocation: Mutex::new(Some(allocation)),
            desc,
            kind,
            device_address: OnceLock::new(),
            views: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }

    pub fn is_staging(&self) -> bool {
        matches!(self.kind, BufferKind::Staging { .. })
    }

    /// Destination of a staging buffer
    pub fn destination(&self) -> Option<&Arc<Buffer>> {
        match &self.kind {
            BufferKind::Staging { destination } => Some(destination),
            BufferKind::Direct => None,
        }
    }

    /// Copy `data` to the start of the buffer
    pub fn copy_to_buffer(&self, data: &[u8]) -> Result<()> {
        self.copy_to_buffer_at(0, data)
    }

    /// Copy `data` into the mapped memory at `offset`
    pub fn copy_to_buffer_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut allocation = self.lock_allocation()?;
        let mapped = allocation
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or_else(|| {
                engine_error!(LOG_SOURCE, "Buffer '{}' is not CPU-accessible", self.desc.name);
                Error::PreconditionFailed(format!("Buffer '{}' is not CPU-accessible", self.desc.name))
            })?;
        // The allocation may be padded past the buffer's size
        let size = mapped.len().min(self.desc.size as usize);
        write_mapped(&mut mapped[..size], offset, data)
    }

    /// Copy a slice of plain-old-data values to the start of the buffer
    pub fn copy_pod<T: bytemuck::Pod>(&self, values: &[T]) -> Result<()> {
        self.copy_to_buffer(bytemuck::cast_slice(values))
    }

    /// Read `len` bytes at `offset` from a host-visible buffer
    pub fn read_back(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let allocation = self.lock_allocation()?;
        let mapped = allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .ok_or_else(|| {
                Error::PreconditionFailed(format!("Buffer '{}' is not CPU-accessible", self.desc.name))
            })?;
        let range = checked_range(offset, len, self.desc.size.min(mapped.len() as u64))?;
        Ok(mapped[range].to_vec())
    }

    /// Record the copy from this staging buffer into its destination
    ///
    /// Copies as many bytes as fit from `src_offset` to `dst_offset`. The copy
    /// resolves when `cmd` is submitted and completes; this buffer must stay
    /// alive until then (see `CommandQueue::dispose_on_submit_completion`).
    pub fn upload_staging_buffer(&self, cmd: vk::CommandBuffer, src_offset: u64, dst_offset: u64) -> Result<UploadRegion> {
        let BufferKind::Staging { destination } = &self.kind else {
            engine_error!(LOG_SOURCE, "Buffer '{}' is not a staging buffer", self.desc.name);
            return Err(Error::PreconditionFailed(format!(
                "Buffer '{}' is not a staging buffer",
                self.desc.name
            )));
        };

        let region = UploadRegion::fit(self.desc.size, destination.desc.size, src_offset, dst_offset)?;
        record_copy(&self.ctx.device, cmd, self, destination, region);
        Ok(region)
    }

    /// GPU virtual address of the buffer, queried once and cached
    ///
    /// A staging buffer answers with its destination's address.
    pub fn device_address(&self) -> Result<vk::DeviceAddress> {
        if let BufferKind::Staging { destination } = &self.kind {
            return destination.device_address();
        }
        if let Some(address) = self.device_address.get() {
            return Ok(*address);
        }

        engine_precondition!(
            self.desc.usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS),
            LOG_SOURCE,
            "Buffer '{}' was not created with SHADER_DEVICE_ADDRESS usage",
            self.desc.name
        );
        let info = vk::BufferDeviceAddressInfo::default().buffer(self.buffer);
        let address = unsafe { self.ctx.device.get_buffer_device_address(&info) };
        Ok(*self.device_address.get_or_init(|| address))
    }

    /// Texel view of the whole buffer in `format`, cached per format
    pub fn buffer_view(&self, format: TextureFormat) -> Result<vk::BufferView> {
        engine_precondition!(
            self.desc
                .usage
                .intersects(BufferUsage::UNIFORM_TEXEL | BufferUsage::STORAGE_TEXEL),
            LOG_SOURCE,
            "Buffer '{}' needs a texel usage to create a buffer view",
            self.desc.name
        );

        let mut views = self
            .views
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "Buffer view cache mutex poisoned"))?;
        if let Some(view) = views.get(&format) {
            return Ok(*view);
        }

        let create_info = vk::BufferViewCreateInfo::default()
            .buffer(self.buffer)
            .format(format_to_vk(format))
            .offset(0)
            .range(vk::WHOLE_SIZE);
        let view = unsafe { self.ctx.device.create_buffer_view(&create_info, None) }.map_err(|e| {
            engine_err!(LOG_SOURCE, "Failed to create buffer view for '{}': {:?}", self.desc.name, e)
        })?;
        views.insert(format, view);
        Ok(view)
    }

    fn lock_allocation(&self) -> Result<std::sync::MutexGuard<'_, Option<Allocation>>> {
        self.allocation
            .lock()
            .map_err(|_| engine_err!(LOG_SOURCE, "Buffer allocation mutex poisoned"))
    }
}

/// Record a buffer-to-buffer copy of `region`
pub(crate) fn record_copy(device: &ash::Device, cmd: vk::CommandBuffer, src: &Buffer, dst: &Buffer, region: UploadRegion) {
    let copy = vk::BufferCopy {
        src_offset: region.src_offset,
        dst_offset: region.dst_offset,
        size: region.size,
    };
    unsafe { device.cmd_copy_buffer(cmd, src.buffer, dst.buffer, &[copy]) };
}

fn allocate_buffer(ctx: &GpuContext, desc: &BufferDesc) -> Result<(vk::Buffer, Allocation)> {
    let buffer_info = vk::BufferCreateInfo::default()
        .size(desc.size)
        .usage(buffer_usage_to_vk(desc.usage))
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    unsafe {
        let buffer = ctx.device.create_buffer(&buffer_info, None).map_err(|e| {
            engine_error!(LOG_SOURCE, "Failed to create buffer '{}': {:?}", desc.name, e);
            Error::BackendError(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = ctx.device.get_buffer_memory_requirements(buffer);
        let allocation = ctx
            .allocator()
            .and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: &desc.name,
                        requirements,
                        location: memory_usage_to_location(desc.memory),
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|e| {
                        engine_error!(LOG_SOURCE, "Failed to allocate {} bytes for '{}': {:?}", desc.size, desc.name, e);
                        Error::OutOfMemory
                    })
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                ctx.device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };

        if let Err(e) = ctx
            .device
            .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        {
            engine_error!(LOG_SOURCE, "Failed to bind memory of '{}': {:?}", desc.name, e);
            if let Ok(mut allocator) = ctx.allocator() {
                allocator.free(allocation).ok();
            }
            ctx.device.destroy_buffer(buffer, None);
            return Err(Error::BackendError(format!("Failed to bind buffer memory: {:?}", e)));
        }

        Ok((buffer, allocation))
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if let Ok(views) = self.views.get_mut() {
                for (_, view) in views.drain() {
                    self.ctx.device.destroy_buffer_view(view, None);
                }
            }

            // Free GPU memory (unmaps host-visible allocations)
            if let Some(allocation) = self.allocation.get_mut().ok().and_then(Option::take) {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
