//! Context configuration
//!
//! [`DeviceFeatures`] is built by the caller and handed to the context
//! constructor once; it is read when the logical device is created. There is no
//! process-wide feature state to toggle after the fact.

use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::graphics_device::{PresentMode, QueueFlags};

/// Optional device features requested at logical-device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceFeatures {
    /// Descriptor indexing: non-uniform indexing, partially bound and
    /// update-after-bind descriptors, runtime descriptor arrays
    pub bindless_indexing: bool,
    /// Multi-draw indirect, draw-indirect-count, first-instance, draw parameters
    pub indirect_rendering: bool,
    /// synchronization2
    pub synchronization2: bool,
    /// bufferDeviceAddress (+ capture/replay)
    pub buffer_device_address: bool,
}

impl DeviceFeatures {
    /// No optional feature
    pub fn none() -> Self {
        Self::default()
    }

    /// Every optional feature; the renderer requests this set
    pub fn all() -> Self {
        Self::none()
            .enable_default_bindless_indexing()
            .enable_indirect_rendering()
            .enable_synchronization()
            .enable_buffer_device_address()
    }

    pub fn enable_default_bindless_indexing(mut self) -> Self {
        self.bindless_indexing = true;
        self
    }

    pub fn enable_indirect_rendering(mut self) -> Self {
        self.indirect_rendering = true;
        self
    }

    pub fn enable_synchronization(mut self) -> Self {
        self.synchronization2 = true;
        self
    }

    pub fn enable_buffer_device_address(mut self) -> Self {
        self.buffer_device_address = true;
        self
    }

    /// Names of requested features missing from `available`
    pub fn missing_from(&self, available: &DeviceFeatures) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bindless_indexing && !available.bindless_indexing {
            missing.push("bindless_indexing");
        }
        if self.indirect_rendering && !available.indirect_rendering {
            missing.push("indirect_rendering");
        }
        if self.synchronization2 && !available.synchronization2 {
            missing.push("synchronization2");
        }
        if self.buffer_device_address && !available.buffer_device_address {
            missing.push("buffer_device_address");
        }
        missing
    }
}

/// Everything the context and renderer need at construction time
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Request the Khronos validation layer. Only honoured when the backend is
    /// built with its validation feature; otherwise ignored with a warning.
    pub enable_validation: bool,
    /// Queue types to reserve (graphics, compute, transfer)
    pub requested_queues: QueueFlags,
    pub features: DeviceFeatures,
    /// Present mode used when the surface supports it (FIFO otherwise)
    pub preferred_present_mode: PresentMode,
    /// Number of in-flight fence slots
    pub frames_in_flight: usize,
    /// Number of command buffers in the graphics ring (>= frames_in_flight)
    pub command_buffer_count: usize,
    /// Directory shader paths are resolved against
    pub shader_directory: PathBuf,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "BlurEngine Application".to_string(),
            app_version: (1, 0, 0),
            enable_validation: cfg!(debug_assertions),
            requested_queues: QueueFlags::GRAPHICS | QueueFlags::COMPUTE | QueueFlags::TRANSFER,
            features: DeviceFeatures::all(),
            preferred_present_mode: PresentMode::Fifo,
            frames_in_flight: 2,
            command_buffer_count: 3,
            shader_directory: PathBuf::from("shaders"),
        }
    }
}

impl ContextConfig {
    /// Reject ring sizes the command queue cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frames_in_flight == 0 {
            return Err(Error::PreconditionFailed("frames_in_flight must be at least 1".to_string()));
        }
        if self.command_buffer_count < self.frames_in_flight {
            return Err(Error::PreconditionFailed(format!(
                "command_buffer_count ({}) must be at least frames_in_flight ({})",
                self.command_buffer_count, self.frames_in_flight
            )));
        }
        if self.requested_queues.is_empty() {
            return Err(Error::PreconditionFailed("Requested queue types cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Shader path resolved against `shader_directory` (absolute paths pass through)
    pub fn shader_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.shader_directory.join(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
