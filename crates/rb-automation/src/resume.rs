//! Pending resumes
//!
//! When an action pauses a run, the engine captures the execution stack,
//! the automation and the context as a [`PendingResume`] and parks it in
//! a [`PendingResumeStore`]. A later event activating the resume trigger,
//! an elapsed timeout or an explicit resume takes it out again. `take` is
//! at-most-once, so a paused run continues exactly once even when several
//! dispatchers race for it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rb_core::EventContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::automation::{Automation, AutomationId};
use crate::block::BlockDefinition;
use crate::executor::{ExecutionStack, FrameSnapshot};
use crate::lists::TriggerBlock;

/// Identity of a paused run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeKey {
    pub automation_id: AutomationId,
    pub execution_id: String,
}

impl ResumeKey {
    pub fn new(automation_id: AutomationId, execution_id: impl Into<String>) -> Self {
        Self {
            automation_id,
            execution_id: execution_id.into(),
        }
    }
}

impl fmt::Display for ResumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.automation_id, self.execution_id)
    }
}

/// A paused run waiting to continue
#[derive(Debug, Clone)]
pub struct PendingResume {
    pub key: ResumeKey,
    pub automation: Arc<Automation>,
    /// Where to continue
    pub stack: ExecutionStack,
    /// Metadata at the time of the pause
    pub context: EventContext,
    pub resume_trigger: Option<TriggerBlock>,
    /// When the timeout elapses, if any
    pub deadline: Option<DateTime<Utc>>,
    pub paused_at: DateTime<Utc>,
}

impl PendingResume {
    /// Whether the timeout has elapsed at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Serializable form, restorable with
    /// [`Resolver::restore_pending`](crate::Resolver::restore_pending)
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            key: self.key.clone(),
            frames: self.stack.snapshot(),
            context: self.context.clone(),
            resume_trigger: self
                .resume_trigger
                .as_ref()
                .map(|t| t.definition().clone()),
            deadline: self.deadline,
            paused_at: self.paused_at,
        }
    }
}

/// Serializable form of a [`PendingResume`]
///
/// Blocks are kept as definitions; the automation is referenced by the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSnapshot {
    pub key: ResumeKey,
    pub frames: Vec<FrameSnapshot>,
    pub context: EventContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_trigger: Option<BlockDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub paused_at: DateTime<Utc>,
}

/// Storage for paused runs
pub trait PendingResumeStore: Send + Sync {
    /// Park a paused run, replacing any with the same key
    fn insert(&self, pending: PendingResume);

    /// Look at a paused run without taking it
    fn get(&self, key: &ResumeKey) -> Option<PendingResume>;

    /// Remove and return a paused run; only one caller ever gets it
    fn take(&self, key: &ResumeKey) -> Option<PendingResume>;

    /// Keys of all paused runs, oldest first
    fn keys(&self) -> Vec<ResumeKey>;

    /// Drop every paused run of an automation, returning how many
    fn remove_automation(&self, automation_id: &AutomationId) -> usize;

    /// Drop everything
    fn clear(&self);

    /// Keys whose timeout has elapsed at `now`, oldest first
    fn due(&self, now: DateTime<Utc>) -> Vec<ResumeKey>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory [`PendingResumeStore`]
#[derive(Debug, Default)]
pub struct InMemoryPendingStore {
    pending: DashMap<ResumeKey, PendingResume>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_keys(&self, filter: impl Fn(&PendingResume) -> bool) -> Vec<ResumeKey> {
        let mut entries: Vec<(DateTime<Utc>, ResumeKey)> = self
            .pending
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| (entry.paused_at, entry.key().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, key)| key).collect()
    }
}

impl PendingResumeStore for InMemoryPendingStore {
    fn insert(&self, pending: PendingResume) {
        debug!(key = %pending.key, "Parking paused run");
        self.pending.insert(pending.key.clone(), pending);
    }

    fn get(&self, key: &ResumeKey) -> Option<PendingResume> {
        self.pending.get(key).map(|entry| entry.value().clone())
    }

    fn take(&self, key: &ResumeKey) -> Option<PendingResume> {
        self.pending.remove(key).map(|(_, pending)| pending)
    }

    fn keys(&self) -> Vec<ResumeKey> {
        self.sorted_keys(|_| true)
    }

    fn remove_automation(&self, automation_id: &AutomationId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|key, _| &key.automation_id != automation_id);
        before.saturating_sub(self.pending.len())
    }

    fn clear(&self) {
        self.pending.clear();
    }

    fn due(&self, now: DateTime<Utc>) -> Vec<ResumeKey> {
        self.sorted_keys(|pending| pending.is_due(now))
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}
