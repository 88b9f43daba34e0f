//! # Event Bus System
//!
//! Broadcasts scheduler lifecycle events using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`SchedulerEvent`] describing install, start, stop,
//!   suspend, resume, uninstall and unhandled run errors
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Emission is synchronous and never blocks the scheduler thread, so the bus
//! can be used from a blocking scheduler loop. Receivers may be polled with
//! `try_recv` from plain threads or awaited from an async host.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SchedulerEvent};
//!
//! let event_bus = EventBus::new(16);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(SchedulerEvent::Started {
//!         scheduler: "decoder".to_string(),
//!     })
//!     .ok();
//!
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: All senders have been dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Lifecycle events published by a scheduler instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SchedulerEvent {
    /// Scheduler registered on its thread.
    Installed {
        scheduler: String,
        thread_id: u64,
    },
    /// Blocking or non-blocking scheduling began.
    Started { scheduler: String },
    /// Scheduling loop exited.
    Stopped { scheduler: String },
    /// Blocking loop parked until resumed.
    Suspended { scheduler: String },
    /// Blocking loop continued after a suspend.
    Resumed { scheduler: String },
    /// Scheduler unregistered from its thread.
    Uninstalled { scheduler: String },
    /// An active object's run failed and its error handler did not recover.
    Error {
        scheduler: String,
        active_object: String,
        code: i32,
    },
}

impl SchedulerEvent {
    /// Name of the scheduler that published the event.
    pub fn scheduler(&self) -> &str {
        match self {
            SchedulerEvent::Installed { scheduler, .. }
            | SchedulerEvent::Started { scheduler }
            | SchedulerEvent::Stopped { scheduler }
            | SchedulerEvent::Suspended { scheduler }
            | SchedulerEvent::Resumed { scheduler }
            | SchedulerEvent::Uninstalled { scheduler }
            | SchedulerEvent::Error { scheduler, .. } => scheduler,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self {
            SchedulerEvent::Installed { .. } => "Scheduler installed",
            SchedulerEvent::Started { .. } => "Scheduling started",
            SchedulerEvent::Stopped { .. } => "Scheduling stopped",
            SchedulerEvent::Suspended { .. } => "Scheduler suspended",
            SchedulerEvent::Resumed { .. } => "Scheduler resumed",
            SchedulerEvent::Uninstalled { .. } => "Scheduler uninstalled",
            SchedulerEvent::Error { .. } => "Unhandled active object error",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            SchedulerEvent::Error { .. } => EventSeverity::Error,
            SchedulerEvent::Installed { .. } | SchedulerEvent::Uninstalled { .. } => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Central event bus for broadcasting scheduler events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it will
    /// receive `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: SchedulerEvent) -> Result<usize, SendError<SchedulerEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&SchedulerEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
pub struct EventStream {
    receiver: Receiver<SchedulerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<SchedulerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&SchedulerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &SchedulerEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<SchedulerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<SchedulerEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.accepts(&event) {
                return Some(Ok(event));
            }
        }
    }

    /// Drains every currently available matching event.
    pub fn drain(&mut self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Some(Ok(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
