//! Time and Logging Abstractions
//!
//! Provides an injectable tick source and logging sink for testing and
//! platform integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crate::error::Result;

/// Default tick period: one tick per millisecond.
pub const DEFAULT_TICK_PERIOD_US: u32 = 1000;

/// Monotonic tick counter.
///
/// Ticks are a wrapping `u32`. Consumers must compare tick values with
/// wrapping arithmetic and never assume `a < b` means "earlier".
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::TickSource;
///
/// fn deadline(ticks: &dyn TickSource, delay_ms: u32) -> u32 {
///     ticks.tick_count().wrapping_add(ticks.msec_to_ticks(delay_ms))
/// }
/// ```
pub trait TickSource: Send + Sync {
    /// Current tick count.
    fn tick_count(&self) -> u32;

    /// Length of one tick in microseconds. Never zero for a valid source.
    fn tick_period_us(&self) -> u32;

    /// Convert a tick interval to milliseconds.
    fn ticks_to_msec(&self, ticks: u32) -> u32 {
        let period = u64::from(self.tick_period_us().max(1));
        ((u64::from(ticks) * period) / 1000).min(u64::from(u32::MAX)) as u32
    }

    /// Convert milliseconds to a tick interval.
    fn msec_to_ticks(&self, msec: u32) -> u32 {
        let period = u64::from(self.tick_period_us().max(1));
        ((u64::from(msec) * 1000) / period).min(u64::from(u32::MAX)) as u32
    }
}

/// Tick source backed by the OS monotonic clock.
#[derive(Debug, Clone)]
pub struct SystemTickSource {
    origin: Instant,
    period_us: u32,
}

impl SystemTickSource {
    pub fn new() -> Self {
        Self::with_period(DEFAULT_TICK_PERIOD_US)
    }

    pub fn with_period(period_us: u32) -> Self {
        Self {
            origin: Instant::now(),
            period_us,
        }
    }
}

impl Default for SystemTickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemTickSource {
    fn tick_count(&self) -> u32 {
        let period = u128::from(self.period_us.max(1));
        // Truncation is the wraparound.
        (self.origin.elapsed().as_micros() / period) as u32
    }

    fn tick_period_us(&self) -> u32 {
        self.period_us
    }
}

/// Manually driven tick source for deterministic tests.
#[derive(Debug)]
pub struct ManualTickSource {
    ticks: AtomicU32,
    period_us: u32,
}

impl ManualTickSource {
    pub fn new(start: u32) -> Self {
        Self {
            ticks: AtomicU32::new(start),
            period_us: DEFAULT_TICK_PERIOD_US,
        }
    }

    pub fn with_period(start: u32, period_us: u32) -> Self {
        Self {
            ticks: AtomicU32::new(start),
            period_us,
        }
    }

    /// Set the current tick value.
    pub fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    /// Advance by `ticks`, wrapping at `u32::MAX`.
    pub fn advance(&self, ticks: u32) {
        self.ticks.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl TickSource for ManualTickSource {
    fn tick_count(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn tick_period_us(&self) -> u32 {
        self.period_us
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Upper-case label used by console output.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
    /// Name of the enclosing span, if any
    pub span_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
            span_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the runtime to host logging pipelines:
/// - **Android**: Logcat
/// - **iOS**: OSLog
/// - **Desktop**: Console, file logs, or system logging
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::{LoggerSink, LogEntry, LogLevel};
///
/// async fn log_error(logger: &dyn LoggerSink, error: &str) {
///     let entry = LogEntry::new(LogLevel::Error, "pvsched", error)
///         .with_field("scheduler", "decoder");
///     logger.log(entry).await.ok();
/// }
/// ```
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host logging system
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the minimum log level that will be processed
    ///
    /// Logs below this level can be filtered out at the source for performance.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Console logger implementation for testing/development
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

#[async_trait::async_trait]
impl LoggerSink for ConsoleLogger {
    async fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level < self.min_level {
            return Ok(());
        }

        eprintln!(
            "[{}] {} {}: {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            entry.level.as_str(),
            entry.target,
            entry.message
        );
        if !entry.fields.is_empty() {
            eprintln!("  Fields: {:?}", entry.fields);
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
