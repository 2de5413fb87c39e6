/// Buffer descriptors, staging rules and mapped-memory copies

use std::ops::Range;
use bitflags::bitflags;
use crate::error::{Error, Result};

bitflags! {
    /// Buffer usage flags (bit-compatible with the API's buffer usage bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC          = 0x0001;
        const TRANSFER_DST          = 0x0002;
        const UNIFORM_TEXEL         = 0x0004;
        const STORAGE_TEXEL         = 0x0008;
        const UNIFORM               = 0x0010;
        const STORAGE               = 0x0020;
        const INDEX                 = 0x0040;
        const VERTEX                = 0x0080;
        const INDIRECT              = 0x0100;
        const SHADER_DEVICE_ADDRESS = 0x0002_0000;
    }
}

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryUsage {
    /// Device-local, not CPU-visible
    GpuOnly,
    /// Host memory, CPU writes, GPU reads slowly
    CpuOnly,
    /// CPU writes every frame, GPU reads (uniforms)
    CpuToGpu,
    /// GPU writes, CPU reads back
    GpuToCpu,
}

impl MemoryUsage {
    pub const fn is_host_visible(self) -> bool {
        !matches!(self, MemoryUsage::GpuOnly)
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    pub usage: BufferUsage,
    pub memory: MemoryUsage,
    /// Debug name
    pub name: String,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsage, memory: MemoryUsage, name: impl Into<String>) -> Self {
        Self { size, usage, memory, name: name.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::PreconditionFailed(format!("Buffer '{}' has zero size", self.name)));
        }
        if self.usage.is_empty() {
            return Err(Error::PreconditionFailed(format!("Buffer '{}' has no usage flags", self.name)));
        }
        Ok(())
    }

    /// Descriptor of the CPU-visible buffer staging into `self`
    ///
    /// The staging buffer always has TRANSFER_SRC added and lives in host memory.
    pub fn staging_for(&self) -> Self {
        Self {
            size: self.size,
            usage: self.usage | BufferUsage::TRANSFER_SRC,
            memory: MemoryUsage::CpuOnly,
            name: format!("Staging Buffer: {}", self.name),
        }
    }
}

/// Check that `destination` can receive a staging upload
///
/// It must exist, carry TRANSFER_DST and be GPU-only.
pub fn validate_staging_target(destination: Option<&BufferDesc>) -> Result<()> {
    let dst = destination.ok_or_else(|| {
        Error::PreconditionFailed("Actual buffer must not be null when creating a staging buffer".to_string())
    })?;
    if !dst.usage.contains(BufferUsage::TRANSFER_DST) {
        return Err(Error::PreconditionFailed(format!(
            "Actual buffer '{}' must have TRANSFER_DST usage to receive a staging upload",
            dst.name
        )));
    }
    if dst.memory != MemoryUsage::GpuOnly {
        return Err(Error::PreconditionFailed(format!(
            "Actual buffer '{}' must be GPU only to receive a staging upload",
            dst.name
        )));
    }
    Ok(())
}

/// Byte range `[offset, offset + len)` inside a buffer of `size` bytes
pub fn checked_range(offset: u64, len: usize, size: u64) -> Result<Range<usize>> {
    let end = offset.checked_add(len as u64).filter(|&end| end <= size).ok_or_else(|| {
        Error::PreconditionFailed(format!(
            "Range {}..{}+{} exceeds buffer size {}",
            offset, offset, len, size
        ))
    })?;
    Ok(offset as usize..end as usize)
}

/// Copy `data` into mapped memory at `offset`
pub fn write_mapped(mapped: &mut [u8], offset: u64, data: &[u8]) -> Result<()> {
    let range = checked_range(offset, data.len(), mapped.len() as u64)?;
    mapped[range].copy_from_slice(data);
    Ok(())
}

/// One recorded staging copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

impl UploadRegion {
    /// Copy as many bytes as fit from `src_offset` in the staging buffer to
    /// `dst_offset` in the destination
    pub fn fit(src_size: u64, dst_size: u64, src_offset: u64, dst_offset: u64) -> Result<Self> {
        if src_offset >= src_size || dst_offset >= dst_size {
            return Err(Error::PreconditionFailed(format!(
                "Upload offsets out of range (src {}/{}, dst {}/{})",
                src_offset, src_size, dst_offset, dst_size
            )));
        }
        Ok(Self {
            src_offset,
            dst_offset,
            size: (src_size - src_offset).min(dst_size - dst_offset),
        })
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
