//! Automation registry
//!
//! Copy-on-write list of registered automations. Readers load an `Arc`
//! snapshot without taking any lock and iterate it, so a dispatch never
//! waits on a registration and never observes a half-applied one. Writers
//! serialize on a mutex, build the next list and swap it in atomically.

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::automation::{Automation, AutomationId};

type Snapshot = Arc<Vec<Arc<Automation>>>;

/// Registered automations in registration order
#[derive(Debug, Default)]
pub struct AutomationRegistry {
    current: ArcSwap<Vec<Arc<Automation>>>,
    writer: Mutex<()>,
}

impl AutomationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current automations
    pub fn snapshot(&self) -> Snapshot {
        self.current.load_full()
    }

    /// Add an automation
    ///
    /// An automation with the same id is replaced in place.
    pub fn register(&self, automation: Arc<Automation>) {
        let _writer = self.lock_writer();
        let mut next: Vec<Arc<Automation>> = self.snapshot().as_ref().clone();

        match next.iter().position(|a| a.id() == automation.id()) {
            Some(index) => {
                debug!(id = %automation.id(), "Replacing registered automation");
                next[index] = automation;
            }
            None => {
                info!(id = %automation.id(), alias = automation.alias(), "Registered automation");
                next.push(automation);
            }
        }

        self.swap(next);
    }

    /// Remove an automation by id, returning it when it was registered
    pub fn remove(&self, id: &AutomationId) -> Option<Arc<Automation>> {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        let index = current.iter().position(|a| a.id() == id)?;

        let mut next = current.as_ref().clone();
        let removed = next.remove(index);
        self.swap(next);

        info!(id = %id, "Removed automation");
        Some(removed)
    }

    /// Remove everything, returning how many were registered
    pub fn clear(&self) -> usize {
        let _writer = self.lock_writer();
        let count = self.snapshot().len();
        self.swap(Vec::new());

        info!(count, "Removed all automations");
        count
    }

    pub fn get(&self, id: &AutomationId) -> Option<Arc<Automation>> {
        self.snapshot().iter().find(|a| a.id() == id).cloned()
    }

    pub fn contains(&self, id: &AutomationId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn swap(&self, next: Vec<Arc<Automation>>) {
        self.current.store(Arc::new(next));
    }
}
