/// Engine - process-wide singletons
///
/// Holds the two pieces of state that live for the whole process: the logger used
/// by the `engine_*!` macros and the frame clock the application loop ticks once
/// per frame. Neither has an explicit teardown.

use std::sync::{Mutex, OnceLock, RwLock};
use std::time::{Instant, SystemTime};
use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Global frame clock
static FRAME_CLOCK: OnceLock<Mutex<FrameClock>> = OnceLock::new();

#[derive(Debug, Default)]
struct FrameClock {
    last_tick: Option<Instant>,
    delta_seconds: f32,
    frame_count: u64,
}

impl FrameClock {
    fn tick(&mut self, now: Instant) -> f32 {
        self.delta_seconds = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last_tick = Some(now);
        self.frame_count += 1;
        self.delta_seconds
    }
}

fn logger_lock() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::new())))
}

fn clock_lock() -> &'static Mutex<FrameClock> {
    FRAME_CLOCK.get_or_init(|| Mutex::new(FrameClock::default()))
}

// ===== PUBLIC API =====

/// Access point for the engine-wide singletons
pub struct Engine;

impl Engine {
    // ===== LOGGING API =====

    /// Replace the default logger with a custom implementation
    ///
    /// # Example
    ///
    /// ```no_run
    /// use blur_engine::blur::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to [`DefaultLogger`]
    pub fn reset_logger() {
        if let Ok(mut lock) = logger_lock().write() {
            *lock = Box::new(DefaultLogger::new());
        }
    }

    /// Log without file:line (used by `engine_info!`, `engine_warn!`, ...)
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Log with file:line (used by `engine_error!`, `engine_err!`, `engine_bail!`)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger_lock().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }

    // ===== FRAME CLOCK API =====

    /// Advance the frame clock; call once per frame from the application loop
    ///
    /// Returns the seconds elapsed since the previous call (0.0 on the first call).
    pub fn update_frame_clock() -> f32 {
        Self::update_frame_clock_at(Instant::now())
    }

    /// Same as [`Engine::update_frame_clock`] with an explicit timestamp
    pub fn update_frame_clock_at(now: Instant) -> f32 {
        match clock_lock().lock() {
            Ok(mut clock) => clock.tick(now),
            Err(_) => 0.0,
        }
    }

    /// Seconds between the last two frame-clock updates
    pub fn delta_time() -> f32 {
        clock_lock().lock().map(|c| c.delta_seconds).unwrap_or(0.0)
    }

    /// Number of frame-clock updates since start (or the last reset)
    pub fn frame_count() -> u64 {
        clock_lock().lock().map(|c| c.frame_count).unwrap_or(0)
    }

    /// Forget the previous tick so the next update reports a zero delta
    pub fn reset_frame_clock() {
        if let Ok(mut clock) = clock_lock().lock() {
            *clock = FrameClock::default();
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
