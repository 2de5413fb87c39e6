//! Unit tests for error.rs
//!
//! Covers Display output of every variant and `?` propagation.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkCreateDevice returned ERROR_INITIALIZATION_FAILED".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("ERROR_INITIALIZATION_FAILED"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_precondition_failed_display() {
    let err = Error::PreconditionFailed("descriptors not allocated".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Precondition failed"));
    assert!(display.contains("descriptors not allocated"));
}

#[test]
fn test_swapchain_out_of_date_display() {
    assert_eq!(format!("{}", Error::SwapchainOutOfDate), "Swapchain out of date");
}

#[test]
fn test_shader_and_asset_display() {
    let shader = Error::ShaderCompilationFailed("basic.frag:3: syntax error".to_string());
    assert!(format!("{}", shader).contains("basic.frag:3"));

    let asset = Error::AssetLoadFailed("cube.obj: not found".to_string());
    assert!(format!("{}", asset).contains("cube.obj"));
}

#[test]
fn test_error_debug_names_variant() {
    let debug = format!("{:?}", Error::InvalidResource("x".to_string()));
    assert!(debug.contains("InvalidResource"));

    let debug = format!("{:?}", Error::InitializationFailed("y".to_string()));
    assert!(debug.contains("InitializationFailed"));
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_clone_keeps_message() {
    let err = Error::PreconditionFailed("staging target".to_string());
    let cloned = err.clone();
    assert_eq!(format!("{}", err), format!("{}", cloned));
}

// ============================================================================
// ERROR PROPAGATION TESTS
// ============================================================================

#[test]
fn test_error_propagation_with_question_mark() {
    fn inner() -> Result<i32> {
        Err(Error::SwapchainOutOfDate)
    }

    fn outer() -> Result<i32> {
        inner()?;
        Ok(42)
    }

    assert!(matches!(outer(), Err(Error::SwapchainOutOfDate)));
}
