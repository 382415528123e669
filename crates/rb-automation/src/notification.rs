//! Lifecycle notifications
//!
//! The engine reports registry changes, every processed automation,
//! paused runs and each dispatched event to a [`NotificationSink`]. The
//! [`EventBus`] from `rb-event-bus` is the default sink; subscribers pick
//! topics such as [`PROCESSED_TOPIC`] or everything with `MATCH_ALL`.

use chrono::{DateTime, Utc};
use rb_core::{Event, EventContext};
use rb_event_bus::{EventBus, Topic};
use std::sync::Arc;

use crate::automation::Automation;
use crate::resume::ResumeKey;
use crate::result::AutomationResult;

pub const REGISTERED_TOPIC: &str = "automation_registered";
pub const REMOVED_TOPIC: &str = "automation_removed";
pub const REMOVED_ALL_TOPIC: &str = "automations_removed";
pub const PROCESSED_TOPIC: &str = "automation_processed";
pub const PAUSED_TOPIC: &str = "automation_paused";
pub const EVENT_TOPIC: &str = "event";

/// Something the engine did
#[derive(Debug, Clone)]
pub enum Notification {
    Registered(Arc<Automation>),
    Removed(Arc<Automation>),
    RemovedAll,
    /// One automation was evaluated against a context
    Processed {
        automation: Arc<Automation>,
        context: EventContext,
        /// `Ok` with the result, or the error message of a failed run
        result: Result<AutomationResult, String>,
        resumed: bool,
    },
    Paused {
        automation: Arc<Automation>,
        key: ResumeKey,
        deadline: Option<DateTime<Utc>>,
    },
    /// An event finished dispatching
    Event {
        event: Arc<Event>,
        context: EventContext,
    },
}

impl Topic for Notification {
    fn topic(&self) -> &str {
        match self {
            Notification::Registered(_) => REGISTERED_TOPIC,
            Notification::Removed(_) => REMOVED_TOPIC,
            Notification::RemovedAll => REMOVED_ALL_TOPIC,
            Notification::Processed { .. } => PROCESSED_TOPIC,
            Notification::Paused { .. } => PAUSED_TOPIC,
            Notification::Event { .. } => EVENT_TOPIC,
        }
    }
}

/// Receiver of engine notifications
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

impl NotificationSink for EventBus<Notification> {
    fn publish(&self, notification: Notification) {
        self.fire(notification);
    }
}

/// Sink dropping every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn publish(&self, _notification: Notification) {}
}
