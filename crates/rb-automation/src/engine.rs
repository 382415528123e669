//! Dispatch engine
//!
//! The engine owns the automation registry and drives every automation
//! through the run interceptor chain for each incoming event:
//!
//! ```text
//! publish(context)
//!   ├─ paused runs whose resume trigger activates continue first
//!   └─ for each registered automation, on its own fork of the context:
//!        variables → triggers (OR) → conditions (AND) → actions → result
//! ```
//!
//! Automations run sequentially on the caller's task. A failing
//! automation is isolated by default: the fault is logged, recorded in its
//! [`RunOutcome`] and the remaining automations still run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rb_config::{EngineConfig, FailurePolicy, TimeoutPolicy};
use rb_core::{Event, EventContext};
use rb_event_bus::EventBus;
use rb_template::TemplateRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::automation::{Automation, AutomationId};
use crate::error::{AutomationError, EvalResult};
use crate::executor::{ActionExecutor, ExecutionStack, RunState, Suspension};
use crate::interceptors::{Interceptors, TransactionManager};
use crate::kind::{RunKind, Stage};
use crate::notification::{Notification, NotificationSink};
use crate::pipeline::{Handler, Invocation};
use crate::registry::AutomationRegistry;
use crate::resolver::{BlockRegistry, Resolver};
use crate::result::AutomationResult;
use crate::resume::{InMemoryPendingStore, PendingResume, PendingResumeStore, ResumeKey};
use crate::scope::RunScope;
use crate::trace::TraceStore;

/// Metadata key describing how a paused run continued
///
/// Holds `{completed, timed_out, event}`: `completed` is true when the
/// resume trigger activated or the run was resumed explicitly,
/// `timed_out` when the timeout woke it, and `event` is the resuming event.
pub const WAIT_VAR: &str = "wait";

static RUN_PARAMS: Value = Value::Null;

/// Engine behaviour derived from [`EngineConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineSettings {
    pub failure_policy: FailurePolicy,
    pub timeout_policy: TimeoutPolicy,
    pub fan_out_limit: Option<usize>,
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            failure_policy: config.dispatch.failure_policy,
            timeout_policy: config.resume.timeout_policy,
            fan_out_limit: config.fan_out.max_concurrency,
        }
    }
}

/// What happened to one automation during a dispatch
#[derive(Debug)]
pub struct RunOutcome {
    pub automation: Arc<Automation>,
    /// Whether a paused run was continued
    pub resumed: bool,
    pub result: EvalResult<AutomationResult>,
}

impl RunOutcome {
    /// Whether the automation executed without error
    pub fn executed(&self) -> bool {
        matches!(&self.result, Ok(r) if r.executed)
    }
}

/// Runs a fresh automation
struct RunBody;

#[async_trait]
impl Handler<RunKind> for RunBody {
    async fn handle(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, RunKind>,
    ) -> EvalResult<AutomationResult> {
        let automation = invocation.subject;
        let scope = invocation.scope;

        automation.variables().resolve_all(ctx, scope).await?;

        if !automation.triggers().any_activated(ctx, scope).await? {
            trace!(id = %automation.id(), "No trigger activated");
            return Ok(AutomationResult::skipped());
        }

        if !automation.conditions().all_satisfied(ctx, scope).await? {
            trace!(id = %automation.id(), "Conditions not satisfied");
            return Ok(AutomationResult::skipped());
        }

        let state = automation.actions().perform(ctx, scope).await?;
        finish(automation, state, ctx, scope).await
    }
}

/// Continues a paused run from its stack
struct ResumeBody {
    stack: ExecutionStack,
}

#[async_trait]
impl Handler<RunKind> for ResumeBody {
    async fn handle(
        &self,
        ctx: &mut EventContext,
        invocation: Invocation<'_, RunKind>,
    ) -> EvalResult<AutomationResult> {
        let scope = invocation.scope;
        let state = ActionExecutor::run(self.stack.clone(), ctx, scope).await?;
        finish(invocation.subject, state, ctx, scope).await
    }
}

async fn finish(
    automation: &Automation,
    state: RunState,
    ctx: &mut EventContext,
    scope: &RunScope,
) -> EvalResult<AutomationResult> {
    if let RunState::Paused(suspension) = state {
        let key = ResumeKey::new(automation.id().clone(), scope.execution_id());
        scope.suspend(suspension);
        return Ok(AutomationResult::paused(&key)?);
    }

    let value = match automation.result() {
        Some(producer) => Some(producer.evaluate(ctx, scope).await?),
        None => None,
    };
    Ok(AutomationResult::executed(value))
}

fn wait_marker(completed: bool, timed_out: bool, event: Option<&Event>) -> Value {
    json!({
        "completed": completed,
        "timed_out": timed_out,
        "event": event.map(Event::to_template_value),
    })
}

/// Receives events and runs automations against them
pub struct DispatchEngine {
    registry: AutomationRegistry,
    interceptors: Interceptors,
    pending: Arc<dyn PendingResumeStore>,
    sink: Arc<dyn NotificationSink>,
    traces: Arc<TraceStore>,
    settings: EngineSettings,
}

impl DispatchEngine {
    /// Engine with the default configuration
    pub fn new() -> EvalResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> DispatchEngineBuilder {
        DispatchEngineBuilder::default()
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Interceptor chains blocks must be resolved with
    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    /// Resolver binding blocks to this engine's chains
    pub fn resolver(&self, blocks: Arc<BlockRegistry>) -> Resolver {
        Resolver::new(blocks, self.interceptors.clone())
    }

    /// Registered automations in registration order
    pub fn automations(&self) -> Arc<Vec<Arc<Automation>>> {
        self.registry.snapshot()
    }

    pub fn get(&self, id: &AutomationId) -> Option<Arc<Automation>> {
        self.registry.get(id)
    }

    pub fn pending(&self) -> &dyn PendingResumeStore {
        self.pending.as_ref()
    }

    /// Most recent finished traces
    pub fn traces(&self) -> &TraceStore {
        &self.traces
    }

    /// Register an automation, replacing one with the same id
    pub fn register(&self, automation: impl Into<Arc<Automation>>) {
        let automation = automation.into();
        self.registry.register(automation.clone());
        self.sink.publish(Notification::Registered(automation));
    }

    /// Remove an automation and discard its paused runs
    pub fn remove(&self, automation: &Automation) {
        let Some(removed) = self.registry.remove(automation.id()) else {
            debug!(id = %automation.id(), "Automation was not registered");
            return;
        };

        let discarded = self.pending.remove_automation(removed.id());
        if discarded > 0 {
            info!(id = %removed.id(), discarded, "Discarded paused runs");
        }
        self.sink.publish(Notification::Removed(removed));
    }

    /// Remove every automation and every paused run
    pub fn remove_all(&self) {
        self.registry.clear();
        self.pending.clear();
        self.sink.publish(Notification::RemovedAll);
    }

    /// Dispatch a bare event
    pub async fn publish_event(&self, event: Event) -> EvalResult<Vec<RunOutcome>> {
        self.publish(EventContext::new(event)).await
    }

    /// Dispatch an event context to paused runs and registered automations
    ///
    /// Fails before evaluating anything when the event type is blank. With
    /// the `propagate` failure policy the first automation fault is
    /// returned; with `isolate` it is recorded in the outcome instead.
    pub async fn publish(&self, context: EventContext) -> EvalResult<Vec<RunOutcome>> {
        context.event().validate()?;
        debug!(
            event_type = %context.event().event_type,
            event_id = %context.event().id,
            "Dispatching event"
        );

        let mut outcomes = self.dispatch_pending(&context).await?;

        let automations = self.registry.snapshot();
        for automation in automations.iter() {
            outcomes.push(self.evaluate(automation, context.fork()).await?);
        }

        self.sink.publish(Notification::Event {
            event: context.event_arc(),
            context,
        });
        Ok(outcomes)
    }

    /// Evaluate a single automation against a context
    ///
    /// The automation does not need to be registered.
    pub async fn run_automation(
        &self,
        automation: &Arc<Automation>,
        context: EventContext,
    ) -> EvalResult<RunOutcome> {
        context.event().validate()?;
        self.evaluate(automation, context).await
    }

    /// Continue a paused run explicitly
    pub async fn resume(&self, key: &ResumeKey) -> EvalResult<RunOutcome> {
        let pending = self
            .pending
            .take(key)
            .ok_or_else(|| AutomationError::PendingNotFound(key.to_string()))?;

        info!(key = %key, "Resuming paused run");
        self.continue_pending(pending, None, wait_marker(true, false, None), false)
            .await
    }

    /// Handle an elapsed timeout of a paused run
    ///
    /// With the `resume` timeout policy the remaining actions run with
    /// `wait.timed_out` set; with `abort` they are dropped and only the
    /// result is computed.
    pub async fn wake(&self, key: &ResumeKey) -> EvalResult<RunOutcome> {
        let pending = self
            .pending
            .take(key)
            .ok_or_else(|| AutomationError::PendingNotFound(key.to_string()))?;

        let abort = self.settings.timeout_policy == TimeoutPolicy::Abort;
        info!(key = %key, abort, "Paused run timed out");
        self.continue_pending(pending, None, wait_marker(false, true, None), abort)
            .await
    }

    /// Wake every paused run whose timeout elapsed at `now`
    pub async fn wake_due(&self, now: DateTime<Utc>) -> EvalResult<Vec<RunOutcome>> {
        let mut outcomes = Vec::new();
        for key in self.pending.due(now) {
            match self.wake(&key).await {
                Ok(outcome) => outcomes.push(outcome),
                // taken by a concurrent dispatch
                Err(AutomationError::PendingNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    fn scope_for(&self, scope: RunScope) -> RunScope {
        scope.with_fan_out_limit(self.settings.fan_out_limit)
    }

    async fn run_chain(
        &self,
        automation: &Automation,
        ctx: &mut EventContext,
        scope: &RunScope,
        body: &dyn Handler<RunKind>,
    ) -> EvalResult<AutomationResult> {
        let invocation = Invocation::new(automation, RunKind::NAME, &RUN_PARAMS, scope);
        self.interceptors.runs.invoke(ctx, invocation, body).await
    }

    async fn evaluate(
        &self,
        automation: &Arc<Automation>,
        mut ctx: EventContext,
    ) -> EvalResult<RunOutcome> {
        let scope = self.scope_for(RunScope::new(automation));
        let result = self.run_chain(automation, &mut ctx, &scope, &RunBody).await;
        self.settle(automation.clone(), ctx, &scope, result, false)
    }

    /// Continue paused runs whose resume trigger activates for the event
    async fn dispatch_pending(&self, context: &EventContext) -> EvalResult<Vec<RunOutcome>> {
        let mut outcomes = Vec::new();

        for key in self.pending.keys() {
            let Some(pending) = self.pending.get(&key) else {
                continue;
            };
            let Some(trigger) = &pending.resume_trigger else {
                continue;
            };

            let scope = self.scope_for(RunScope::resuming(
                &pending.automation,
                key.execution_id.clone(),
            ));
            let mut probe = pending.context.with_event(context.event_arc());
            let activated = match trigger.evaluate(&mut probe, &scope).await {
                Ok(activated) => activated,
                Err(e) if self.settings.failure_policy == FailurePolicy::Propagate => {
                    return Err(e)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Resume trigger failed");
                    continue;
                }
            };
            if !activated {
                continue;
            }

            // another dispatch may have taken it meanwhile
            let Some(pending) = self.pending.take(&key) else {
                continue;
            };

            debug!(key = %key, "Resume trigger activated");
            let marker = wait_marker(true, false, Some(context.event()));
            outcomes.push(
                self.continue_pending(pending, Some(context.event_arc()), marker, false)
                    .await?,
            );
        }

        Ok(outcomes)
    }

    async fn continue_pending(
        &self,
        pending: PendingResume,
        event: Option<Arc<Event>>,
        marker: Value,
        discard_rest: bool,
    ) -> EvalResult<RunOutcome> {
        let scope = self.scope_for(RunScope::resuming(
            &pending.automation,
            pending.key.execution_id.clone(),
        ));

        let mut ctx = match event {
            Some(event) => pending.context.with_event(event),
            None => pending.context.clone(),
        };
        ctx.set(WAIT_VAR, marker);

        let body = ResumeBody {
            stack: if discard_rest {
                ExecutionStack::default()
            } else {
                pending.stack.clone()
            },
        };
        let result = self
            .run_chain(&pending.automation, &mut ctx, &scope, &body)
            .await;
        self.settle(pending.automation.clone(), ctx, &scope, result, true)
    }

    /// Park a suspension, notify and apply the failure policy
    fn settle(
        &self,
        automation: Arc<Automation>,
        ctx: EventContext,
        scope: &RunScope,
        result: EvalResult<AutomationResult>,
        resumed: bool,
    ) -> EvalResult<RunOutcome> {
        let suspension = scope.take_suspension();
        let result = match (result, suspension) {
            (Ok(result), Some(suspension)) => self
                .park(&automation, suspension, ctx.clone(), scope)
                .map(|()| result),
            (result, _) => result,
        };

        let notified = match &result {
            Ok(result) => Ok(result.clone()),
            Err(e) => Err(e.to_string()),
        };
        self.sink.publish(Notification::Processed {
            automation: automation.clone(),
            context: ctx,
            result: notified,
            resumed,
        });

        match result {
            Err(e) if self.settings.failure_policy == FailurePolicy::Propagate => Err(e),
            result => {
                if let Err(e) = &result {
                    error!(
                        id = %automation.id(),
                        alias = automation.alias(),
                        error = %e,
                        "Automation failed"
                    );
                }
                Ok(RunOutcome {
                    automation,
                    resumed,
                    result,
                })
            }
        }
    }

    fn park(
        &self,
        automation: &Arc<Automation>,
        suspension: Suspension,
        context: EventContext,
        scope: &RunScope,
    ) -> EvalResult<()> {
        let paused_at = Utc::now();
        let deadline = match suspension.timeout {
            Some(timeout) => Some(
                chrono::Duration::from_std(timeout)
                    .ok()
                    .and_then(|timeout| paused_at.checked_add_signed(timeout))
                    .ok_or_else(|| {
                        AutomationError::InvalidState(format!("timeout {timeout:?} out of range"))
                    })?,
            ),
            None => None,
        };

        let key = ResumeKey::new(automation.id().clone(), scope.execution_id());
        info!(key = %key, deadline = ?deadline, "Run paused");

        self.pending.insert(PendingResume {
            key: key.clone(),
            automation: automation.clone(),
            stack: suspension.stack,
            context,
            resume_trigger: suspension.resume_trigger,
            deadline,
            paused_at,
        });
        self.sink.publish(Notification::Paused {
            automation: automation.clone(),
            key,
            deadline,
        });
        Ok(())
    }
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("automations", &self.registry.len())
            .field("pending", &self.pending.len())
            .field("interceptors", &self.interceptors)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Builder for [`DispatchEngine`]
#[derive(Default)]
pub struct DispatchEngineBuilder {
    config: EngineConfig,
    templates: Option<TemplateRegistry>,
    transactions: Option<Arc<dyn TransactionManager>>,
    interceptors: Option<Interceptors>,
    pending: Option<Arc<dyn PendingResumeStore>>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl DispatchEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Expression engines available to the templating interceptor
    pub fn templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Wrap every run of a transactional automation in a transaction
    pub fn transactions(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transactions = Some(manager);
        self
    }

    /// Use these chains instead of the standard ones
    ///
    /// Templates, transactions and the trace store are then up to the caller.
    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = Some(interceptors);
        self
    }

    pub fn pending_store(mut self, store: Arc<dyn PendingResumeStore>) -> Self {
        self.pending = Some(store);
        self
    }

    /// Where lifecycle notifications go; an [`EventBus`] by default
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> EvalResult<DispatchEngine> {
        self.config
            .validate()
            .map_err(|e| AutomationError::InvalidState(e.to_string()))?;

        let traces = Arc::new(TraceStore::new(self.config.tracing.stored_traces));

        let interceptors = match self.interceptors {
            Some(interceptors) => interceptors,
            None => {
                let mut templates = self.templates.unwrap_or_default();
                templates.set_default(&self.config.template.default_engine)?;
                Interceptors::standard(
                    Arc::new(templates),
                    self.transactions,
                    Some(traces.clone()),
                )
            }
        };

        let settings = EngineSettings::from(&self.config);
        debug!(?settings, "Dispatch engine ready");

        Ok(DispatchEngine {
            registry: AutomationRegistry::new(),
            interceptors,
            pending: self
                .pending
                .unwrap_or_else(|| Arc::new(InMemoryPendingStore::new())),
            sink: self
                .sink
                .unwrap_or_else(|| Arc::new(EventBus::<Notification>::new())),
            traces,
            settings,
        })
    }
}
