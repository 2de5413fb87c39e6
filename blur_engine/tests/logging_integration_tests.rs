//! Integration tests for Engine logging system
//!
//! These tests verify the logging system through the public API only.
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use blur_engine::blur::{Engine, Error};
use blur_engine::blur::log::{format_entry, LogEntry, LogSeverity, Logger};
use blur_engine::{engine_err, engine_error, engine_info, engine_precondition, engine_warn};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn check_positive(value: i32) -> blur_engine::blur::Result<i32> {
    engine_precondition!(value > 0, "test::precondition", "value must be positive, got {}", value);
    Ok(value)
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    engine_info!("test::module", "Swapchain created with {} images", 3);
    engine_warn!("test::module", "Present mode {} unsupported", "Mailbox");
    engine_error!("test::module", "Fence {} timed out", 1);

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert_eq!(captured.len(), 3);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "Swapchain created with 3 images");
    assert_eq!(captured[1].severity, LogSeverity::Warn);
    assert_eq!(captured[2].severity, LogSeverity::Error);
    assert!(captured.iter().all(|e| e.source == "test::module"));
}

#[test]
#[serial]
fn test_integration_error_logging_with_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    engine_info!("test::location", "no location");
    engine_error!("test::location", "with location");

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert!(captured[0].file.is_none());
    assert!(captured[0].line.is_none());
    assert_eq!(captured[1].file, Some(file!()));
    assert!(captured[1].line.is_some());
    assert!(format_entry(&captured[1]).contains("logging_integration_tests.rs:"));
}

#[test]
#[serial]
fn test_integration_engine_err_builds_backend_error() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let error = engine_err!("test::err", "vkCreateDevice failed: {}", -3);

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    match error {
        Error::BackendError(msg) => assert_eq!(msg, "vkCreateDevice failed: -3"),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
}

#[test]
#[serial]
fn test_integration_precondition_macro() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    assert_eq!(check_positive(4).unwrap(), 4);
    let result = check_positive(-1);

    let captured = entries.lock().unwrap().clone();
    Engine::reset_logger();

    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "value must be positive, got -1");
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    Engine::reset_logger();

    engine_info!("test::reset", "goes to the default logger");

    assert!(entries.lock().unwrap().is_empty());
}
