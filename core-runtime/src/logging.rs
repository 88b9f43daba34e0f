//! # Logging & Tracing Infrastructure
//!
//! Provides structured logging with the `tracing` crate, supporting:
//! - JSON, pretty and compact output formats
//! - Module-level filtering
//! - Thread identification, since every scheduler is bound to one thread
//! - Integration with host logging via `LoggerSink`
//!
//! ## Overview
//!
//! This module configures the `tracing-subscriber` infrastructure and mirrors
//! events to a platform-specific logging system through the `LoggerSink`
//! trait. When a sink is configured, every event that survives filtering is
//! forwarded to the host logger while still flowing through the standard
//! `tracing` layers.
//!
//! Scheduler threads are plain OS threads with no async executor, so the sink
//! future is driven to completion inline with `futures::executor::block_on`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Pretty)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//!
//! init_logging(config).expect("Failed to initialize logging");
//!
//! tracing::info!(scheduler = "decoder", "Scheduler installed");
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// Workspace crates that receive the configured level in the default filter.
const WORKSPACE_TARGETS: &[&str] = &[
    "core_scheduler",
    "core_runtime",
    "bridge_traits",
    "pvsched_workspace",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line output for local debugging
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line text
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Serializable logging options, loaded from host settings alongside
/// [`SchedulerSettings`](crate::config::SchedulerSettings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    pub level: LogLevel,
    /// `EnvFilter` directives replacing the per-crate defaults,
    /// e.g. `"core_scheduler=trace,core_runtime=warn"`.
    pub filter: Option<String>,
    /// Log span enter and exit.
    pub spans: bool,
    pub show_target: bool,
    /// Thread ids and names; each scheduler owns one thread.
    pub show_thread: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            spans: false,
            show_target: true,
            show_thread: true,
        }
    }
}

/// Logging configuration: [`LogSettings`] plus an optional host sink.
#[derive(Clone, Default)]
pub struct LoggingConfig {
    pub settings: LogSettings,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("settings", &self.settings)
            .field("has_logger_sink", &self.logger_sink.is_some())
            .finish()
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: LogSettings) -> Self {
        Self {
            settings,
            logger_sink: None,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.settings.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.settings.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.settings.filter = Some(filter.into());
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.settings.spans = enable;
        self
    }

    /// Mirror every event that passes the filter to `sink`.
    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }
}

/// Initialize the logging system
///
/// This should be called once during application startup. Subsequent calls
/// will return an error.
///
/// # Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - The filter string is invalid
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.settings)?;
    let output = fmt_layer(&config.settings);

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .with(LoggerSinkLayer::new(config.logger_sink))
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to initialize logging: {}", e)))
}

pub(crate) fn build_filter(settings: &LogSettings) -> Result<EnvFilter> {
    let filter_string = match &settings.filter {
        Some(custom) => custom.clone(),
        None => {
            // Our crates at the configured level, everything else at warn
            let level = settings.level.as_str().to_ascii_lowercase();
            std::iter::once("warn".to_string())
                .chain(
                    WORKSPACE_TARGETS
                        .iter()
                        .map(|target| format!("{}={}", target, level)),
                )
                .collect::<Vec<_>>()
                .join(",")
        }
    };

    EnvFilter::try_new(filter_string)
        .map_err(|e| Error::Config(format!("Invalid log filter: {}", e)))
}

/// Stdout formatting layer for the configured output format.
fn fmt_layer<S>(settings: &LogSettings) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let span_events = if settings.spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_target(settings.show_target)
        .with_thread_ids(settings.show_thread)
        .with_thread_names(settings.show_thread)
        .with_writer(io::stdout);

    match settings.format {
        LogFormat::Pretty => base.pretty().with_span_events(span_events).boxed(),
        LogFormat::Compact => base.compact().with_span_events(span_events).boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(settings.spans)
            .with_span_list(settings.spans)
            .boxed(),
    }
}

/// Layer that forwards events to a `LoggerSink` implementation.
pub struct LoggerSinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl LoggerSinkLayer {
    pub fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };

        let metadata = event.metadata();
        let level = log_level(*metadata.level());

        if level < sink.min_level() {
            return;
        }

        let mut visitor = SinkVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .unwrap_or_else(|| metadata.name().to_string());

        let mut entry = LogEntry::new(level, metadata.target(), message);

        for (key, value) in visitor.fields {
            entry = entry.with_field(key, value);
        }

        // Schedulers are per thread; keep the thread name for host logs
        if let Some(thread) = std::thread::current().name() {
            entry = entry.with_field("thread", thread);
        }

        if let Some(span) = ctx.lookup_current() {
            entry.span_id = Some(span.name().to_string());
        }

        if let Err(err) = futures::executor::block_on(sink.log(entry)) {
            eprintln!("LoggerSink error: {}", err);
        }
    }
}

/// Collects an event's message and fields as strings for a [`LogEntry`].
///
/// Numeric and boolean fields reach `record_debug` through the `Visit`
/// defaults.
#[derive(Default)]
struct SinkVisitor {
    message: Option<String>,
    fields: HashMap<String, String>,
}

impl SinkVisitor {
    fn record_value(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.fields.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for SinkVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_value(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.record_value(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.record_value(field, format!("{:?}", value));
    }
}

fn log_level(level: tracing::Level) -> LogLevel {
    if level == tracing::Level::ERROR {
        LogLevel::Error
    } else if level == tracing::Level::WARN {
        LogLevel::Warn
    } else if level == tracing::Level::INFO {
        LogLevel::Info
    } else if level == tracing::Level::DEBUG {
        LogLevel::Debug
    } else {
        LogLevel::Trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_filter("core_scheduler=trace")
            .with_spans(true);

        let settings = &config.settings;
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.level, LogLevel::Debug);
        assert_eq!(settings.filter.as_deref(), Some("core_scheduler=trace"));
        assert!(settings.spans);
        assert!(settings.show_target);
        assert!(config.logger_sink.is_none());
    }

    #[test]
    fn test_log_settings_from_json() {
        let settings: LogSettings =
            serde_json::from_str(r#"{ "format": "compact", "level": "Warn", "show_thread": false }"#)
                .unwrap();

        assert_eq!(settings.format, LogFormat::Compact);
        assert_eq!(settings.level, LogLevel::Warn);
        assert!(!settings.show_thread);
        assert!(settings.show_target);
        assert!(settings.filter.is_none());

        let config = LoggingConfig::from_settings(settings.clone());
        assert_eq!(config.settings, settings);
    }

    #[test]
    fn test_default_format_follows_build_profile() {
        let expected = if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        };
        assert_eq!(LogSettings::default().format, expected);
    }

    #[test]
    fn test_default_filter_covers_workspace_crates() {
        let settings = LoggingConfig::default().with_level(LogLevel::Debug).settings;
        let filter = build_filter(&settings).unwrap().to_string();
        for target in WORKSPACE_TARGETS {
            assert!(filter.contains(&format!("{}=debug", target)));
        }
    }

    #[test]
    fn test_custom_filter_replaces_defaults() {
        let settings = LoggingConfig::default().with_filter("core_scheduler=trace").settings;
        let filter = build_filter(&settings).unwrap().to_string();
        assert!(filter.contains("core_scheduler=trace"));
        assert!(!filter.contains("core_runtime"));
    }

    #[test]
    fn test_build_invalid_filter() {
        let settings = LoggingConfig::default()
            .with_filter("core_scheduler=notalevel")
            .settings;
        assert!(matches!(build_filter(&settings), Err(Error::Config(_))));
    }

    #[test]
    fn test_logger_sink_layer_forwards_event() {
        let sink = Arc::new(TestLoggerSink::default());
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let layer = LoggerSinkLayer::new(Some(trait_sink));
        let subscriber = tracing_subscriber::registry().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(target: "test.target", scheduler = "decoder", "hello world");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "test.target");
        assert_eq!(entry.message, "hello world");
        assert_eq!(entry.fields.get("scheduler"), Some(&"decoder".to_string()));
    }

    #[test]
    fn test_logger_sink_layer_respects_min_level() {
        let sink = Arc::new(TestLoggerSink {
            entries: Mutex::new(Vec::new()),
            min_level: LogLevel::Warn,
        });
        let trait_sink: Arc<dyn LoggerSink> = sink.clone();
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(trait_sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!("dropped");
        tracing::warn!("kept");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }

    #[test]
    fn test_logger_sink_layer_survives_sink_failure() {
        let sink: Arc<dyn LoggerSink> = Arc::new(FailingSink);
        let subscriber = tracing_subscriber::registry().with(LoggerSinkLayer::new(Some(sink)));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::error!(scheduler = "decoder", "dropped by the host");
    }

    struct FailingSink;

    #[async_trait]
    impl LoggerSink for FailingSink {
        async fn log(&self, _entry: LogEntry) -> SinkResult<()> {
            Err(bridge_traits::BridgeError::SinkWrite("pipe closed".to_string()))
        }
    }

    struct TestLoggerSink {
        entries: Mutex<Vec<LogEntry>>,
        min_level: LogLevel,
    }

    impl Default for TestLoggerSink {
        fn default() -> Self {
            Self {
                entries: Mutex::new(Vec::new()),
                min_level: LogLevel::Trace,
            }
        }
    }

    #[async_trait]
    impl LoggerSink for TestLoggerSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min_level
        }
    }
}
