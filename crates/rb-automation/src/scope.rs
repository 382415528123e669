//! Per-run scope
//!
//! A [`RunScope`] carries what every block evaluation of one run shares:
//! the execution id, the automation's identity and options, the open
//! trace and, once an action pauses, the suspension handed back to the
//! engine. It is shared by reference, so the mutable parts sit behind
//! short-lived locks that are never held across an await.

use std::sync::{Mutex, MutexGuard};

use crate::automation::{Automation, AutomationId, Options};
use crate::executor::Suspension;
use crate::trace::ExecutionTrace;

/// Shared state of one automation run
#[derive(Debug)]
pub struct RunScope {
    execution_id: String,
    automation_id: AutomationId,
    alias: String,
    options: Options,
    resumed: bool,
    fan_out_limit: Option<usize>,
    trace: Mutex<Option<ExecutionTrace>>,
    suspension: Mutex<Option<Suspension>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RunScope {
    /// Scope for a fresh run of `automation`
    pub fn new(automation: &Automation) -> Self {
        Self::build(automation, ulid::Ulid::new().to_string(), false)
    }

    /// Scope continuing the paused execution `execution_id`
    pub fn resuming(automation: &Automation, execution_id: impl Into<String>) -> Self {
        Self::build(automation, execution_id.into(), true)
    }

    /// Scope not bound to any automation
    ///
    /// Useful for evaluating blocks or lists on their own.
    pub fn detached() -> Self {
        Self {
            execution_id: ulid::Ulid::new().to_string(),
            automation_id: AutomationId::new(""),
            alias: String::new(),
            options: Options::new(),
            resumed: false,
            fan_out_limit: None,
            trace: Mutex::new(None),
            suspension: Mutex::new(None),
        }
    }

    fn build(automation: &Automation, execution_id: String, resumed: bool) -> Self {
        Self {
            execution_id,
            automation_id: automation.id().clone(),
            alias: automation.alias().to_string(),
            options: automation.options().clone(),
            resumed,
            fan_out_limit: None,
            trace: Mutex::new(None),
            suspension: Mutex::new(None),
        }
    }

    /// Bound the number of concurrently running fan-out branches
    pub fn with_fan_out_limit(mut self, limit: Option<usize>) -> Self {
        self.fan_out_limit = limit;
        self
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn automation_id(&self) -> &AutomationId {
        &self.automation_id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn fan_out_limit(&self) -> Option<usize> {
        self.fan_out_limit
    }

    /// Open a trace for this run, replacing any open one
    pub fn start_trace(&self) {
        let trace = ExecutionTrace::new(
            self.execution_id.clone(),
            self.automation_id.to_string(),
            self.alias.clone(),
            self.resumed,
        );
        *lock(&self.trace) = Some(trace);
    }

    /// Whether a trace is open
    pub fn is_tracing(&self) -> bool {
        lock(&self.trace).is_some()
    }

    /// Apply `f` to the open trace; does nothing when none is open
    pub fn record(&self, f: impl FnOnce(&mut ExecutionTrace)) {
        if let Some(trace) = lock(&self.trace).as_mut() {
            f(trace);
        }
    }

    /// Close the open trace and hand it over
    pub fn take_trace(&self) -> Option<ExecutionTrace> {
        lock(&self.trace).take()
    }

    pub(crate) fn suspend(&self, suspension: Suspension) {
        *lock(&self.suspension) = Some(suspension);
    }

    pub(crate) fn take_suspension(&self) -> Option<Suspension> {
        lock(&self.suspension).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceEntry;
    use serde_json::json;

    #[test]
    fn test_scope_from_automation() {
        let automation = Automation::builder("Nightly")
            .option("tracing", json!(true))
            .build();

        let scope = RunScope::new(&automation);
        assert_eq!(scope.automation_id(), automation.id());
        assert_eq!(scope.alias(), "Nightly");
        assert!(scope.options().tracing());
        assert!(!scope.is_resumed());

        let resumed = RunScope::resuming(&automation, scope.execution_id());
        assert!(resumed.is_resumed());
        assert_eq!(resumed.execution_id(), scope.execution_id());
    }

    #[test]
    fn test_record_without_trace_is_noop() {
        let scope = RunScope::detached();
        scope.record(|t| t.actions.push(TraceEntry::new("log")));
        assert!(!scope.is_tracing());
        assert!(scope.take_trace().is_none());
    }

    #[test]
    fn test_trace_roundtrip() {
        let scope = RunScope::detached();
        scope.start_trace();
        scope.record(|t| t.actions.push(TraceEntry::new("log")));

        let trace = scope.take_trace().unwrap();
        assert_eq!(trace.actions.len(), 1);
        assert_eq!(trace.execution_id, scope.execution_id());
        assert!(!scope.is_tracing());
    }
}
