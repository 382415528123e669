//! Per-evaluation event context

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::Event;

/// Insertion-ordered metadata written during one evaluation
pub type Metadata = IndexMap<String, Value>;

/// Key under which the event is exposed to templates
pub const EVENT_VAR: &str = "event";

/// Context for one evaluation of one automation
///
/// Owns a shared handle to the immutable [`Event`] and a mutable metadata
/// scratchpad. Variables, conditions, actions and results write into the
/// metadata; triggers only read it. Every automation evaluated for the same
/// event works on its own [`fork`](Self::fork) so metadata never leaks
/// between automations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    event: Arc<Event>,
    #[serde(default)]
    metadata: Metadata,
}

impl EventContext {
    /// Create a context with empty metadata
    pub fn new(event: impl Into<Arc<Event>>) -> Self {
        Self {
            event: event.into(),
            metadata: Metadata::new(),
        }
    }

    /// Create a context seeded with metadata
    pub fn with_metadata(event: impl Into<Arc<Event>>, metadata: Metadata) -> Self {
        Self {
            event: event.into(),
            metadata,
        }
    }

    /// The event being evaluated
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Shared handle to the event
    pub fn event_arc(&self) -> Arc<Event> {
        self.event.clone()
    }

    /// Independent metadata view over the same event
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Same metadata, different event
    pub fn with_event(&self, event: impl Into<Arc<Event>>) -> Self {
        Self {
            event: event.into(),
            metadata: self.metadata.clone(),
        }
    }

    /// Read-only metadata
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Get a metadata value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.metadata.insert(key.into(), value)
    }

    /// Remove a metadata value, keeping the order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.metadata.shift_remove(key)
    }

    /// Check whether a metadata key is present
    pub fn contains(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Merge entries from another metadata map, overwriting existing keys
    pub fn merge(&mut self, other: Metadata) {
        self.metadata.extend(other);
    }

    /// Convert to template variables
    ///
    /// Metadata entries are exposed at top level, the event under `event`.
    /// A metadata entry named `event` shadows the event.
    pub fn to_template_vars(&self) -> Value {
        let mut vars = serde_json::Map::new();
        vars.insert(EVENT_VAR.to_string(), self.event.to_template_value());

        for (k, v) in &self.metadata {
            vars.insert(k.clone(), v.clone());
        }

        Value::Object(vars)
    }
}

impl From<Event> for EventContext {
    fn from(event: Event) -> Self {
        Self::new(event)
    }
}
