//! Integration tests for scheduler configuration

use bridge_traits::time::{ManualTickSource, TickSource};
use core_runtime::config::{SchedulerConfig, SchedulerSettings, TieBreak, DEFAULT_RESERVE};
use core_runtime::events::{EventBus, SchedulerEvent};
use core_runtime::Error;
use std::sync::Arc;

#[test]
fn test_config_shares_event_bus() {
    let bus = EventBus::new(8);
    let mut receiver = bus.subscribe();

    let config = SchedulerConfig::builder()
        .name("video")
        .event_bus(bus)
        .build()
        .unwrap();

    let cloned = config.clone();
    cloned
        .event_bus
        .as_ref()
        .unwrap()
        .emit(SchedulerEvent::Started {
            scheduler: cloned.name.clone(),
        })
        .unwrap();

    let event = receiver.try_recv().unwrap();
    assert_eq!(event.scheduler(), "video");
}

#[test]
fn test_config_tick_source_is_shared() {
    let ticks = Arc::new(ManualTickSource::new(100));
    let config = SchedulerConfig::builder()
        .tick_source(ticks.clone())
        .build()
        .unwrap();

    ticks.advance(50);
    assert_eq!(config.tick_source.tick_count(), 150);
}

#[test]
fn test_settings_round_trip_through_json() {
    let settings = SchedulerSettings {
        name: "audio".to_string(),
        reserve: 8,
        tie_break: TieBreak::AddedOrder,
        thread_checks: false,
        tick_period_us: 500,
    };

    let json = serde_json::to_string(&settings).unwrap();
    assert!(json.contains("\"added_order\""));

    let parsed: SchedulerSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, settings);

    let config = SchedulerConfig::from_settings(parsed).unwrap();
    assert_eq!(config.tick_source.tick_period_us(), 500);
    assert!(!config.thread_checks);
}

#[test]
fn test_empty_settings_use_defaults() {
    let settings: SchedulerSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, SchedulerSettings::default());
    assert_eq!(settings.reserve, DEFAULT_RESERVE);
}

#[test]
fn test_invalid_settings_rejected() {
    let settings = SchedulerSettings {
        tick_period_us: 0,
        ..SchedulerSettings::default()
    };

    assert!(matches!(
        SchedulerConfig::from_settings(settings),
        Err(Error::Config(_))
    ));
}
