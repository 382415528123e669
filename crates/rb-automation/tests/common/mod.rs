//! Test blocks and an engine harness shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rb_automation::{
    bind_params, fan_out, Action, ActionList, ActionResult, Automation, AutomationDefinition,
    AutomationError, BlockCall, BlockDefinition, BlockRegistry, Condition, DispatchEngine,
    DispatchEngineBuilder, EvalResult, Notification, Resolver, ResultProducer, Transaction,
    TransactionManager, Trigger, TriggerBlock, Variable,
};
use rb_core::EventContext;
use rb_event_bus::EventBus;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Triggers and conditions
// ============================================================================

#[derive(Deserialize)]
struct EventTypeParams {
    event_type: String,
}

/// Activates for events of one type
pub struct EventTypeTrigger;

#[async_trait]
impl Trigger for EventTypeTrigger {
    async fn is_triggered(&self, ctx: &EventContext, call: BlockCall<'_>) -> EvalResult<bool> {
        let params: EventTypeParams = call.bind()?;
        Ok(ctx.event().event_type.as_str() == params.event_type)
    }
}

#[derive(Deserialize)]
struct FixedParams {
    value: bool,
}

/// Answers with its `value` parameter
pub struct Fixed;

#[async_trait]
impl Trigger for Fixed {
    async fn is_triggered(&self, _ctx: &EventContext, call: BlockCall<'_>) -> EvalResult<bool> {
        Ok(call.bind::<FixedParams>()?.value)
    }
}

#[async_trait]
impl Condition for Fixed {
    async fn is_satisfied(&self, _ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<bool> {
        Ok(call.bind::<FixedParams>()?.value)
    }
}

#[derive(Deserialize)]
struct KeyValueParams {
    key: String,
    value: Value,
}

/// Satisfied when a metadata entry has the given value
pub struct Equals;

#[async_trait]
impl Condition for Equals {
    async fn is_satisfied(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<bool> {
        let params: KeyValueParams = call.bind()?;
        Ok(ctx.get(&params.key) == Some(&params.value))
    }
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Deserialize)]
struct NameParams {
    name: String,
}

/// Appends its name to the log and to `last`
pub struct Record {
    log: Log,
}

#[async_trait]
impl Action for Record {
    async fn execute(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<ActionResult> {
        let params: NameParams = call.bind()?;
        self.log.lock().unwrap().push(params.name.clone());
        ctx.set("last", json!(params.name));
        Ok(ActionResult::Continue)
    }
}

pub struct Set;

#[async_trait]
impl Action for Set {
    async fn execute(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<ActionResult> {
        let params: KeyValueParams = call.bind()?;
        ctx.set(params.key, params.value);
        Ok(ActionResult::Continue)
    }
}

/// Logs `stop` and ends its frame
pub struct Stop {
    log: Log,
}

#[async_trait]
impl Action for Stop {
    async fn execute(&self, _ctx: &mut EventContext, _call: BlockCall<'_>) -> EvalResult<ActionResult> {
        self.log.lock().unwrap().push("stop".to_string());
        Ok(ActionResult::Stop)
    }
}

#[derive(Deserialize)]
struct AbortParams {
    scope: String,
}

pub struct Abort;

#[async_trait]
impl Action for Abort {
    async fn execute(&self, _ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<ActionResult> {
        match call.bind::<AbortParams>()?.scope.as_str() {
            "run" => Err(AutomationError::stop_run()),
            _ => Err(AutomationError::stop_sequence()),
        }
    }
}

pub struct Fail;

#[async_trait]
impl Action for Fail {
    async fn execute(&self, _ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<ActionResult> {
        Err(AutomationError::block(call.type_tag, "boom"))
    }
}

#[derive(Deserialize)]
struct NestedParams {
    #[serde(default)]
    actions: Vec<BlockDefinition>,
}

/// Runs nested actions before the next sibling
pub struct Invoke {
    children: ActionList,
}

#[async_trait]
impl Action for Invoke {
    async fn execute(&self, _ctx: &mut EventContext, _call: BlockCall<'_>) -> EvalResult<ActionResult> {
        Ok(ActionResult::Invoke(self.children.clone()))
    }
}

#[derive(Deserialize)]
struct WaitParams {
    #[serde(default)]
    trigger: Option<BlockDefinition>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// Pauses the run
pub struct Wait {
    trigger: Option<TriggerBlock>,
    timeout: Option<Duration>,
}

#[async_trait]
impl Action for Wait {
    async fn execute(&self, _ctx: &mut EventContext, _call: BlockCall<'_>) -> EvalResult<ActionResult> {
        Ok(match &self.trigger {
            Some(trigger) => ActionResult::pause_until(trigger.clone(), self.timeout),
            None => ActionResult::pause(self.timeout),
        })
    }
}

#[derive(Deserialize)]
struct ParallelParams {
    branches: Vec<Vec<BlockDefinition>>,
}

/// Runs branches concurrently
pub struct Parallel {
    branches: Vec<ActionList>,
}

#[async_trait]
impl Action for Parallel {
    async fn execute(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<ActionResult> {
        fan_out(&self.branches, ctx, call.scope).await?;
        Ok(ActionResult::Continue)
    }
}

// ============================================================================
// Variables and results
// ============================================================================

#[derive(Deserialize)]
struct LetParams {
    name: String,
    value: Value,
}

pub struct Let;

#[async_trait]
impl Variable for Let {
    async fn resolve(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<()> {
        let params: LetParams = call.bind()?;
        ctx.set(params.name, params.value);
        Ok(())
    }
}

#[derive(Deserialize)]
struct ValueParams {
    #[serde(default)]
    value: Value,
}

/// Returns its `value` parameter
pub struct Constant;

#[async_trait]
impl ResultProducer for Constant {
    async fn produce(&self, _ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<Value> {
        Ok(call.bind::<ValueParams>()?.value)
    }
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

/// Returns one metadata entry
pub struct Get;

#[async_trait]
impl ResultProducer for Get {
    async fn produce(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<Value> {
        let params: KeyParams = call.bind()?;
        Ok(ctx.get(&params.key).cloned().unwrap_or(Value::Null))
    }
}

/// Returns the whole metadata map
pub struct Snapshot;

#[async_trait]
impl ResultProducer for Snapshot {
    async fn produce(&self, ctx: &mut EventContext, _call: BlockCall<'_>) -> EvalResult<Value> {
        Ok(serde_json::to_value(ctx.metadata())?)
    }
}

/// Block registry with every test block, logging into `log`
pub fn blocks(log: &Log) -> Arc<BlockRegistry> {
    let mut registry = BlockRegistry::new();

    let record_log = log.clone();
    let stop_log = log.clone();

    registry
        .trigger("event_type", |_, _| Ok(EventTypeTrigger))
        .trigger("fixed", |_, _| Ok(Fixed))
        .condition("fixed", |_, _| Ok(Fixed))
        .condition("equals", |_, _| Ok(Equals))
        .action("record", move |_, _| {
            Ok(Record {
                log: record_log.clone(),
            })
        })
        .action("set", |_, _| Ok(Set))
        .action("stop", move |_, _| {
            Ok(Stop {
                log: stop_log.clone(),
            })
        })
        .action("abort", |_, _| Ok(Abort))
        .action("fail", |_, _| Ok(Fail))
        .action("invoke", |def, resolver| {
            let params: NestedParams = bind_params(&def.type_tag, &def.params)?;
            Ok(Invoke {
                children: resolver.resolve_actions(&params.actions)?,
            })
        })
        .action("wait", |def, resolver| {
            let params: WaitParams = bind_params(&def.type_tag, &def.params)?;
            Ok(Wait {
                trigger: params
                    .trigger
                    .as_ref()
                    .map(|trigger| resolver.resolve_trigger(trigger))
                    .transpose()?,
                timeout: params.timeout_ms.map(Duration::from_millis),
            })
        })
        .action("parallel", |def, resolver| {
            let params: ParallelParams = bind_params(&def.type_tag, &def.params)?;
            Ok(Parallel {
                branches: params
                    .branches
                    .iter()
                    .map(|branch| resolver.resolve_actions(branch))
                    .collect::<EvalResult<_>>()?,
            })
        })
        .variable("let", |_, _| Ok(Let))
        .result("value", |_, _| Ok(Constant))
        .result("get", |_, _| Ok(Get))
        .result("metadata", |_, _| Ok(Snapshot));

    Arc::new(registry)
}

// ============================================================================
// Transactions
// ============================================================================

/// Transaction manager logging begin, commit and rollback
pub struct RecordingTransactions {
    pub log: Log,
}

struct RecordingTransaction {
    log: Log,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> EvalResult<()> {
        self.log.lock().unwrap().push("commit".to_string());
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> EvalResult<()> {
        self.log.lock().unwrap().push("rollback".to_string());
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for RecordingTransactions {
    async fn begin(&self) -> EvalResult<Box<dyn Transaction>> {
        self.log.lock().unwrap().push("begin".to_string());
        Ok(Box::new(RecordingTransaction {
            log: self.log.clone(),
        }))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Engine wired to the test blocks and a notification bus
pub struct Harness {
    pub engine: Arc<DispatchEngine>,
    pub resolver: Resolver,
    pub bus: Arc<EventBus<Notification>>,
    log: Log,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_builder(DispatchEngine::builder())
    }

    pub fn with_builder(builder: DispatchEngineBuilder) -> Self {
        init_tracing();

        let log = Log::default();
        let bus: Arc<EventBus<Notification>> = Arc::new(EventBus::new());
        let engine = builder.sink(bus.clone()).build().unwrap();
        let resolver = engine.resolver(blocks(&log));

        Self {
            engine: Arc::new(engine),
            resolver,
            bus,
            log,
        }
    }

    /// Resolve an automation from JSON without registering it
    pub fn build(&self, definition: Value) -> Arc<Automation> {
        let definition: AutomationDefinition = serde_json::from_value(definition).unwrap();
        Arc::new(self.resolver.build_automation(&definition).unwrap())
    }

    /// Resolve and register an automation
    pub fn add(&self, definition: Value) -> Arc<Automation> {
        let automation = self.build(definition);
        self.engine.register(automation.clone());
        automation
    }

    /// Names recorded so far
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}
