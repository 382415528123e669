//! Broadcast bus for rulebook notifications
//!
//! The bus is the default sink for engine lifecycle notifications
//! (registration, removal, processed runs, paused runs, raw events).
//! External collaborators such as schedulers or loggers subscribe to a
//! topic or to everything and receive each message they are interested in.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Topic that subscribes to every message
pub const MATCH_ALL: &str = "*";

/// A message that can be routed by topic
pub trait Topic: Clone + Send + Sync + 'static {
    /// Topic name used for routing
    fn topic(&self) -> &str;
}

/// Topic based broadcast bus
///
/// Supports:
/// - Subscribing to a specific topic
/// - Subscribing to all messages (MATCH_ALL)
/// - Firing messages to all matching subscribers
///
/// Firing never blocks: messages without subscribers are dropped and slow
/// subscribers observe `RecvError::Lagged`.
pub struct EventBus<T: Topic> {
    /// Map of topics to their broadcast senders
    listeners: DashMap<String, broadcast::Sender<T>>,
    /// Special sender for MATCH_ALL subscribers
    match_all_sender: broadcast::Sender<T>,
    /// Channel capacity
    capacity: usize,
}

impl<T: Topic> EventBus<T> {
    /// Create a new bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to messages of a specific topic
    pub fn subscribe(&self, topic: impl Into<String>) -> broadcast::Receiver<T> {
        let topic = topic.into();
        trace!(topic = %topic, "Subscribing to topic");

        if topic == MATCH_ALL {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(topic)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to all messages
    pub fn subscribe_all(&self) -> broadcast::Receiver<T> {
        self.match_all_sender.subscribe()
    }

    /// Fire a message to all subscribers
    ///
    /// The message is delivered to:
    /// 1. All subscribers of its topic
    /// 2. All MATCH_ALL subscribers
    pub fn fire(&self, message: T) {
        debug!(topic = %message.topic(), "Firing message");

        if let Some(sender) = self.listeners.get(message.topic()) {
            // Ignore send errors - they just mean no active receivers
            let _ = sender.send(message.clone());
        }

        let _ = self.match_all_sender.send(message);
    }

    /// Number of topics with a channel
    pub fn topic_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Topic> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus<T> = Arc<EventBus<T>>;
