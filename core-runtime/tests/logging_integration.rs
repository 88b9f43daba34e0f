//! Integration tests for logging system
//!
//! A process holds a single global subscriber, so this binary initializes
//! logging exactly once.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_logging_from_scheduler_threads() {
    let sink = Arc::new(RecordingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).unwrap();

    thread::Builder::new()
        .name("decoder".to_string())
        .spawn(|| {
            tracing::info!(target: "core_scheduler::scheduler", scheduler = "decoder", "installed");
            // Below the workspace level filter for foreign targets
            tracing::info!(target: "other_crate", "filtered out");
        })
        .unwrap()
        .join()
        .unwrap();

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.message, "installed");
    assert_eq!(entry.target, "core_scheduler::scheduler");
    assert_eq!(entry.fields.get("scheduler"), Some(&"decoder".to_string()));
    assert_eq!(entry.fields.get("thread"), Some(&"decoder".to_string()));
    drop(entries);

    // A second init must fail
    assert!(init_logging(config).is_err());
}
