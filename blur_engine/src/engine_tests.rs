//! Unit tests for Engine singletons
//!
//! LOGGER and FRAME_CLOCK are process-wide, so every test here is #[serial].

use crate::blur::Engine;
use crate::blur::log::{LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// TEST HELPERS
// ============================================================================

struct TestLogger {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        // Other tests may log concurrently from their own sources
        if entry.source != "blur::test" {
            return;
        }
        let mut entries = self.entries.lock().unwrap();
        entries.push(format!("{:?}: {}", entry.severity, entry.message));
    }
}

fn capture() -> Arc<Mutex<Vec<String>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: Arc::clone(&entries) });
    entries
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_receives_macro_output() {
    let entries = capture();

    crate::engine_info!("blur::test", "swapchain has {} images", 3);
    crate::engine_warn!("blur::test", "present mode {} unsupported", "Immediate");

    Engine::reset_logger();

    let entries = entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], "Info: swapchain has 3 images");
    assert_eq!(entries[1], "Warn: present mode Immediate unsupported");
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let entries = capture();
    Engine::reset_logger();

    crate::engine_debug!("blur::test", "not captured");

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_log_detailed_carries_location() {
    let seen: Arc<Mutex<Vec<(Option<&'static str>, Option<u32>)>>> = Arc::new(Mutex::new(Vec::new()));

    struct LocationLogger(Arc<Mutex<Vec<(Option<&'static str>, Option<u32>)>>>);
    impl Logger for LocationLogger {
        fn log(&self, entry: &LogEntry) {
            if entry.source == "blur::test" {
                self.0.lock().unwrap().push((entry.file, entry.line));
            }
        }
    }

    Engine::set_logger(LocationLogger(Arc::clone(&seen)));
    Engine::log_detailed(LogSeverity::Error, "blur::test", "boom".to_string(), "pipeline.rs", 12);
    Engine::log(LogSeverity::Info, "blur::test", "plain".to_string());
    Engine::reset_logger();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], (Some("pipeline.rs"), Some(12)));
    assert_eq!(seen[1], (None, None));
}

// ============================================================================
// FRAME CLOCK TESTS
// ============================================================================

#[test]
#[serial]
fn test_frame_clock_first_tick_is_zero() {
    Engine::reset_frame_clock();
    let delta = Engine::update_frame_clock_at(Instant::now());
    assert_eq!(delta, 0.0);
    assert_eq!(Engine::frame_count(), 1);
}

#[test]
#[serial]
fn test_frame_clock_measures_delta() {
    Engine::reset_frame_clock();
    let start = Instant::now();
    Engine::update_frame_clock_at(start);
    let delta = Engine::update_frame_clock_at(start + Duration::from_millis(16));

    assert!((delta - 0.016).abs() < 1e-4);
    assert!((Engine::delta_time() - 0.016).abs() < 1e-4);
    assert_eq!(Engine::frame_count(), 2);
}

#[test]
#[serial]
fn test_frame_clock_never_negative() {
    Engine::reset_frame_clock();
    let start = Instant::now() + Duration::from_secs(1);
    Engine::update_frame_clock_at(start);
    let delta = Engine::update_frame_clock_at(start - Duration::from_millis(5));
    assert_eq!(delta, 0.0);
}
