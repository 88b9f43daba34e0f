//! # Scheduler Configuration Module
//!
//! Provides configuration management for scheduler instances.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`SchedulerConfig`] holding the settings and host bridges a scheduler needs.
//! Validation is fail-fast: `build()` rejects configurations the scheduler
//! could not run with.
//!
//! Hosts that ship settings as data (JSON from the app layer, for example)
//! deserialize a [`SchedulerSettings`] and convert it with
//! [`SchedulerConfig::from_settings`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{SchedulerConfig, TieBreak};
//!
//! let config = SchedulerConfig::builder()
//!     .name("decoder")
//!     .reserve(32)
//!     .tie_break(TieBreak::Fifo)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::SchedulerConfig;
//!
//! // An empty scheduler name is rejected
//! let config = SchedulerConfig::builder()
//!     .name("")
//!     .build()
//!     .expect("Should fail - empty name");
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::time::{SystemTickSource, TickSource, DEFAULT_TICK_PERIOD_US};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default queue preallocation.
pub const DEFAULT_RESERVE: usize = 20;

/// Default scheduler name.
pub const DEFAULT_SCHEDULER_NAME: &str = "pvsched";

/// Longest accepted scheduler name, in bytes.
pub const MAX_SCHEDULER_NAME_LEN: usize = 30;

/// How equal-priority requests are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Requests completed earliest run first.
    #[default]
    Fifo,
    /// Active objects added to the scheduler earliest run first.
    AddedOrder,
}

/// Scheduler configuration.
///
/// Use [`SchedulerConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Scheduler name, used in logs and events
    pub name: String,

    /// Number of queue slots to preallocate
    pub reserve: usize,

    /// Equal-priority ordering policy
    pub tie_break: TieBreak,

    /// Reject `set_busy`/`cancel` calls made from a foreign thread
    pub thread_checks: bool,

    /// Tick source for timer deadlines
    pub tick_source: Arc<dyn TickSource>,

    /// Optional bus for lifecycle events
    pub event_bus: Option<EventBus>,
}

impl std::fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("name", &self.name)
            .field("reserve", &self.reserve)
            .field("tie_break", &self.tie_break)
            .field("thread_checks", &self.thread_checks)
            .field("tick_period_us", &self.tick_source.tick_period_us())
            .field("event_bus", &self.event_bus)
            .finish()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SCHEDULER_NAME.to_string(),
            reserve: DEFAULT_RESERVE,
            tie_break: TieBreak::default(),
            thread_checks: true,
            tick_source: Arc::new(SystemTickSource::new()),
            event_bus: None,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Builds a validated configuration from serialized settings.
    pub fn from_settings(settings: SchedulerSettings) -> Result<Self> {
        SchedulerConfig::builder()
            .name(settings.name)
            .reserve(settings.reserve)
            .tie_break(settings.tie_break)
            .thread_checks(settings.thread_checks)
            .tick_source(Arc::new(SystemTickSource::with_period(
                settings.tick_period_us,
            )))
            .build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("Scheduler name cannot be empty".to_string()));
        }

        if self.name.len() > MAX_SCHEDULER_NAME_LEN {
            return Err(Error::Config(format!(
                "Scheduler name '{}' exceeds {} bytes",
                self.name, MAX_SCHEDULER_NAME_LEN
            )));
        }

        if self.tick_source.tick_period_us() == 0 {
            return Err(Error::Config(
                "Tick source period must be greater than 0us".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Default)]
pub struct SchedulerConfigBuilder {
    name: Option<String>,
    reserve: Option<usize>,
    tie_break: Option<TieBreak>,
    thread_checks: Option<bool>,
    tick_source: Option<Arc<dyn TickSource>>,
    event_bus: Option<EventBus>,
}

impl SchedulerConfigBuilder {
    /// Sets the scheduler name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the queue preallocation hint.
    pub fn reserve(mut self, reserve: usize) -> Self {
        self.reserve = Some(reserve);
        self
    }

    /// Sets the equal-priority ordering policy.
    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = Some(tie_break);
        self
    }

    /// Enables or disables foreign-thread checks on active objects.
    pub fn thread_checks(mut self, enabled: bool) -> Self {
        self.thread_checks = Some(enabled);
        self
    }

    /// Sets the tick source.
    pub fn tick_source(mut self, tick_source: Arc<dyn TickSource>) -> Self {
        self.tick_source = Some(tick_source);
        self
    }

    /// Sets the lifecycle event bus.
    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the name is empty or too long, or if the
    /// tick source reports a zero period.
    pub fn build(self) -> Result<SchedulerConfig> {
        let defaults = SchedulerConfig::default();
        let config = SchedulerConfig {
            name: self.name.unwrap_or(defaults.name),
            reserve: self.reserve.unwrap_or(defaults.reserve),
            tie_break: self.tie_break.unwrap_or(defaults.tie_break),
            thread_checks: self.thread_checks.unwrap_or(defaults.thread_checks),
            tick_source: self.tick_source.unwrap_or(defaults.tick_source),
            event_bus: self.event_bus,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Serializable scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_reserve")]
    pub reserve: usize,

    #[serde(default)]
    pub tie_break: TieBreak,

    #[serde(default = "default_thread_checks")]
    pub thread_checks: bool,

    #[serde(default = "default_tick_period_us")]
    pub tick_period_us: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            reserve: default_reserve(),
            tie_break: TieBreak::default(),
            thread_checks: default_thread_checks(),
            tick_period_us: default_tick_period_us(),
        }
    }
}

fn default_name() -> String {
    DEFAULT_SCHEDULER_NAME.to_string()
}

fn default_reserve() -> usize {
    DEFAULT_RESERVE
}

fn default_thread_checks() -> bool {
    true
}

fn default_tick_period_us() -> u32 {
    DEFAULT_TICK_PERIOD_US
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualTickSource;

    #[test]
    fn test_builder_defaults() {
        let config = SchedulerConfig::builder().build().unwrap();

        assert_eq!(config.name, DEFAULT_SCHEDULER_NAME);
        assert_eq!(config.reserve, DEFAULT_RESERVE);
        assert_eq!(config.tie_break, TieBreak::Fifo);
        assert!(config.thread_checks);
        assert!(config.event_bus.is_none());
        assert_eq!(config.tick_source.tick_period_us(), DEFAULT_TICK_PERIOD_US);
    }

    #[test]
    fn test_builder_overrides() {
        let ticks = Arc::new(ManualTickSource::new(10));
        let config = SchedulerConfig::builder()
            .name("decoder")
            .reserve(4)
            .tie_break(TieBreak::AddedOrder)
            .thread_checks(false)
            .tick_source(ticks)
            .event_bus(EventBus::new(4))
            .build()
            .unwrap();

        assert_eq!(config.name, "decoder");
        assert_eq!(config.reserve, 4);
        assert_eq!(config.tie_break, TieBreak::AddedOrder);
        assert!(!config.thread_checks);
        assert_eq!(config.tick_source.tick_count(), 10);
        assert!(config.event_bus.is_some());
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = SchedulerConfig::builder().name("").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_long_name_rejected() {
        let result = SchedulerConfig::builder().name("x".repeat(31)).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_tick_period_rejected() {
        let result = SchedulerConfig::builder()
            .tick_source(Arc::new(ManualTickSource::with_period(0, 0)))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("period")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: SchedulerSettings =
            serde_json::from_str(r#"{ "name": "audio", "tie_break": "added_order" }"#).unwrap();

        assert_eq!(settings.name, "audio");
        assert_eq!(settings.reserve, DEFAULT_RESERVE);
        assert_eq!(settings.tie_break, TieBreak::AddedOrder);
        assert!(settings.thread_checks);
        assert_eq!(settings.tick_period_us, DEFAULT_TICK_PERIOD_US);

        let config = SchedulerConfig::from_settings(settings).unwrap();
        assert_eq!(config.name, "audio");
        assert_eq!(config.tie_break, TieBreak::AddedOrder);
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = SchedulerConfig::default();
        let debug = format!("{:?}", config);
        assert!(debug.contains("tick_period_us"));
        assert!(debug.contains("pvsched"));
    }
}
