//! Event types dispatched to automations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Errors raised when an event fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event type must not be blank")]
    BlankEventType,
}

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    /// Create a new event type
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Get the event type as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Special event type that matches all events
    pub fn match_all() -> Self {
        Self("*".to_string())
    }

    /// Check if this is the MATCH_ALL event type
    pub fn is_match_all(&self) -> bool {
        self.0 == "*"
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inbound event evaluated against registered automations
///
/// Events are immutable once created; the engine shares them between
/// every automation evaluated for the same dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (ULID)
    pub id: String,

    /// The type of event
    pub event_type: EventType,

    /// Domain specific payload
    pub data: serde_json::Value,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,
}

impl Event {
    /// Create a new event with current timestamp
    pub fn new(event_type: impl Into<EventType>, data: serde_json::Value) -> Self {
        Self {
            id: Ulid::new().to_string(),
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
        }
    }

    /// Create an event without payload
    pub fn empty(event_type: impl Into<EventType>) -> Self {
        Self::new(event_type, serde_json::Value::Null)
    }

    /// Check that the event can be dispatched
    pub fn validate(&self) -> Result<(), EventError> {
        if self.event_type.as_str().trim().is_empty() {
            return Err(EventError::BlankEventType);
        }
        Ok(())
    }

    /// JSON view of the event exposed to templates
    pub fn to_template_value(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "type": self.event_type.as_str(),
            "data": self.data,
            "time_fired": self.time_fired.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_new() {
        let event = Event::new("order_created", json!({"id": 7}));
        assert_eq!(event.event_type.as_str(), "order_created");
        assert_eq!(event.data["id"], 7);
        // ULID format check
        assert_eq!(event.id.len(), 26);
    }

    #[test]
    fn test_blank_event_type_is_invalid() {
        assert_eq!(
            Event::empty("  ").validate(),
            Err(EventError::BlankEventType)
        );
        assert!(Event::empty("ping").validate().is_ok());
    }

    #[test]
    fn test_match_all() {
        assert!(EventType::match_all().is_match_all());
        assert!(!EventType::from("ping").is_match_all());
    }

    #[test]
    fn test_template_value() {
        let event = Event::new("approved", json!({"by": "alice"}));
        let value = event.to_template_value();
        assert_eq!(value["type"], "approved");
        assert_eq!(value["data"]["by"], "alice");
    }
}
