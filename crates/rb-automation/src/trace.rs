//! Execution traces
//!
//! A trace is a structured record of one run: which triggers activated,
//! which conditions held, what every action returned and how the metadata
//! looked around it, and the computed result. Traces are produced by the
//! tracing interceptor when the automation's `tracing` option is truthy
//! and attached to the [`AutomationResult`](crate::AutomationResult) under
//! [`TRACE_KEY`].

use chrono::{DateTime, Utc};
use rb_core::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Reserved result field holding the trace
pub const TRACE_KEY: &str = "trace";

/// Record of one block evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Type tag of the block
    pub block: String,

    /// Activation flag, satisfaction flag, action outcome or produced value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,

    /// Metadata before the block ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Metadata>,

    /// Metadata after the block ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Metadata>,

    /// Error message when the evaluation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl TraceEntry {
    pub fn new(block: impl Into<String>) -> Self {
        Self {
            block: block.into(),
            outcome: None,
            before: None,
            after: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_outcome(mut self, outcome: Value) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_snapshots(mut self, before: Metadata, after: Metadata) -> Self {
        self.before = Some(before);
        self.after = Some(after);
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Structured record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub execution_id: String,
    pub automation_id: String,
    pub alias: String,
    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Whether this run continued a paused execution
    #[serde(default)]
    pub resumed: bool,

    #[serde(default)]
    pub variables: Vec<TraceEntry>,
    #[serde(default)]
    pub triggers: Vec<TraceEntry>,
    #[serde(default)]
    pub conditions: Vec<TraceEntry>,
    #[serde(default)]
    pub actions: Vec<TraceEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TraceEntry>,

    /// Error that ended the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionTrace {
    /// Open a trace
    pub fn new(
        execution_id: impl Into<String>,
        automation_id: impl Into<String>,
        alias: impl Into<String>,
        resumed: bool,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            automation_id: automation_id.into(),
            alias: alias.into(),
            started_at: Utc::now(),
            finished_at: None,
            resumed,
            variables: Vec::new(),
            triggers: Vec::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// Close the trace
    pub fn finish(&mut self, error: Option<String>) {
        self.finished_at = Some(Utc::now());
        self.error = error;
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Whether any recorded trigger activated
    pub fn activated(&self) -> bool {
        self.triggers
            .iter()
            .any(|t| t.outcome == Some(Value::Bool(true)))
    }

    /// Serialize for embedding into a result
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Bounded store of the most recent finished traces
#[derive(Debug)]
pub struct TraceStore {
    capacity: usize,
    traces: Mutex<VecDeque<ExecutionTrace>>,
}

impl TraceStore {
    /// Store keeping at most `capacity` traces; zero keeps none
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            traces: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ExecutionTrace>> {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Keep a trace, evicting the oldest one when full
    pub fn push(&self, trace: ExecutionTrace) {
        if self.capacity == 0 {
            return;
        }
        let mut traces = self.lock();
        while traces.len() >= self.capacity {
            traces.pop_front();
        }
        traces.push_back(trace);
    }

    /// All kept traces, oldest first
    pub fn recent(&self) -> Vec<ExecutionTrace> {
        self.lock().iter().cloned().collect()
    }

    /// Kept traces of one automation, oldest first
    pub fn for_automation(&self, automation_id: &str) -> Vec<ExecutionTrace> {
        self.lock()
            .iter()
            .filter(|t| t.automation_id == automation_id)
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
