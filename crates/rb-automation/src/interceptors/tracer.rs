//! Execution tracing
//!
//! The run interceptor opens a trace when the automation's `tracing`
//! option is truthy, and closes it once the run finishes. Block
//! interceptors append one entry per evaluation while a trace is open.

use async_trait::async_trait;
use rb_core::EventContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::error::EvalResult;
use crate::executor::ActionResult;
use crate::kind::{
    ActionKind, BlockKind, ConditionKind, ResultKind, RunKind, TriggerKind, VariableKind,
};
use crate::pipeline::{Interceptor, Invocation, Next};
use crate::result::AutomationResult;
use crate::trace::{ExecutionTrace, TraceEntry, TraceStore, TRACE_KEY};

/// Priority of the tracing interceptor
pub const TRACING_PRIORITY: i32 = 100;

type Section = fn(&mut ExecutionTrace) -> &mut Vec<TraceEntry>;

/// Records execution traces
#[derive(Debug, Clone, Default)]
pub struct TracingInterceptor {
    store: Option<Arc<TraceStore>>,
}

impl TracingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep every finished trace in `store`
    pub fn with_store(store: Arc<TraceStore>) -> Self {
        Self { store: Some(store) }
    }
}

async fn trace_block<K: BlockKind>(
    ctx: &mut EventContext,
    invocation: Invocation<'_, K>,
    next: Next<'_, K>,
    section: Section,
    snapshots: bool,
    outcome_of: fn(&K::Output) -> Value,
) -> EvalResult<K::Output> {
    let scope = invocation.scope;
    if !scope.is_tracing() {
        return next.proceed(ctx, invocation).await;
    }

    let before = snapshots.then(|| ctx.metadata().clone());
    let outcome = next.proceed(ctx, invocation).await;

    let mut entry = TraceEntry::new(invocation.type_tag);
    if let Some(before) = before {
        entry = entry.with_snapshots(before, ctx.metadata().clone());
    }
    entry = match &outcome {
        Ok(output) => entry.with_outcome(outcome_of(output)),
        Err(e) => entry.with_error(e),
    };
    scope.record(|trace| section(trace).push(entry));

    outcome
}

#[async_trait]
impl Interceptor<TriggerKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, TriggerKind>,
        next: Next<'_, TriggerKind>,
    ) -> EvalResult<bool> {
        trace_block(ctx, invocation, next, |t| &mut t.triggers, false, |activated| {
            Value::Bool(*activated)
        })
        .await
    }
}

#[async_trait]
impl Interceptor<ConditionKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, ConditionKind>,
        next: Next<'_, ConditionKind>,
    ) -> EvalResult<bool> {
        trace_block(ctx, invocation, next, |t| &mut t.conditions, false, |satisfied| {
            Value::Bool(*satisfied)
        })
        .await
    }
}

#[async_trait]
impl Interceptor<VariableKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, VariableKind>,
        next: Next<'_, VariableKind>,
    ) -> EvalResult<()> {
        trace_block(ctx, invocation, next, |t| &mut t.variables, true, |_| {
            Value::Null
        })
        .await
    }
}

#[async_trait]
impl Interceptor<ActionKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, ActionKind>,
        next: Next<'_, ActionKind>,
    ) -> EvalResult<ActionResult> {
        trace_block(ctx, invocation, next, |t| &mut t.actions, true, |result| {
            Value::String(result.label().to_string())
        })
        .await
    }
}

#[async_trait]
impl Interceptor<ResultKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, ResultKind>,
        next: Next<'_, ResultKind>,
    ) -> EvalResult<Value> {
        let scope = invocation.scope;
        let outcome = next.proceed(ctx, invocation).await;

        let entry = TraceEntry::new(invocation.type_tag);
        let entry = match &outcome {
            Ok(value) => entry.with_outcome(value.clone()),
            Err(e) => entry.with_error(e),
        };
        scope.record(|trace| trace.result = Some(entry));

        outcome
    }
}

#[async_trait]
impl Interceptor<RunKind> for TracingInterceptor {
    fn name(&self) -> &str {
        "tracing"
    }

    fn priority(&self) -> i32 {
        TRACING_PRIORITY
    }

    async fn intercept(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, RunKind>,
        next: Next<'_, RunKind>,
    ) -> EvalResult<AutomationResult> {
        let scope = invocation.scope;
        if !scope.options().tracing() {
            return next.proceed(ctx, invocation).await;
        }

        scope.start_trace();
        let outcome = next.proceed(ctx, invocation).await;

        let Some(mut trace) = scope.take_trace() else {
            return outcome;
        };
        trace.finish(outcome.as_ref().err().map(ToString::to_string));
        debug!(
            execution_id = %trace.execution_id,
            actions = trace.actions.len(),
            "Trace finished"
        );

        if let Some(store) = &self.store {
            store.push(trace.clone());
        }

        let mut result = outcome?;
        result
            .additional_fields
            .insert(TRACE_KEY.to_string(), trace.to_value()?);
        Ok(result)
    }
}
