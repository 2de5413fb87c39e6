//! Error types for the Blur engine
//!
//! Every fallible engine operation returns [`Result`]. GPU API failures carry the
//! API-level error code in their message; precondition violations that used to be
//! debug-only checks are reported as [`Error::PreconditionFailed`].

use std::fmt;

/// Result type for Blur engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Blur engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (a Vulkan call returned a non-success code)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain, subsystems)
    InitializationFailed(String),

    /// A call-order or argument contract was violated by the caller
    PreconditionFailed(String),

    /// The surface changed and the swapchain must be recreated
    SwapchainOutOfDate,

    /// GLSL to SPIR-V compilation or SPIR-V loading failed
    ShaderCompilationFailed(String),

    /// A file on disk (shader, model) could not be read or parsed
    AssetLoadFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::PreconditionFailed(msg) => write!(f, "Precondition failed: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::ShaderCompilationFailed(msg) => write!(f, "Shader compilation failed: {}", msg),
            Error::AssetLoadFailed(msg) => write!(f, "Asset load failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
