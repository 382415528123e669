//! Automation Engine
//!
//! This crate provides the rule engine of rulebook. An automation is an
//! event-driven rule: when one of its triggers activates and all of its
//! conditions hold, its actions run and an optional result is computed.
//!
//! # Architecture
//!
//! ```text
//! AUTOMATION = VARIABLES → TRIGGERS (OR) → CONDITIONS (AND) → ACTIONS → RESULT
//! ```
//!
//! - **Blocks**: user supplied [`Trigger`], [`Condition`], [`Action`],
//!   [`Variable`] and [`ResultProducer`] implementations, resolved from
//!   [`BlockDefinition`]s by a [`Resolver`]
//! - **Interceptors**: tracing, transactions, logging and templating wrap
//!   every block evaluation and every run
//! - **Executor**: actions run on an explicit frame stack so a run can stop,
//!   invoke nested actions, or pause and resume later
//! - **Engine**: the [`DispatchEngine`] feeds events to every registered
//!   automation and to paused runs waiting for them
//!
//! # Key Types
//!
//! - [`Automation`] - Resolved rule
//! - [`AutomationDefinition`] - Serializable description of an automation
//! - [`DispatchEngine`] - Registry and dispatch loop
//! - [`ActionResult`] - How the executor proceeds after an action

pub mod automation;
pub mod block;
pub mod engine;
pub mod error;
pub mod executor;
pub mod interceptors;
pub mod kind;
pub mod lists;
pub mod notification;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod resume;
pub mod scope;
pub mod trace;

pub use automation::{
    Automation, AutomationBuilder, AutomationDefinition, AutomationId, Options,
    TEMPLATE_ENGINE_OPTION, TRACING_OPTION, TRANSACTIONAL_OPTION,
};
pub use block::{
    bind_params, Action, BlockCall, BlockDefinition, Condition, ResultProducer, Trigger, Variable,
};
pub use engine::{DispatchEngine, DispatchEngineBuilder, EngineSettings, RunOutcome, WAIT_VAR};
pub use error::{AbortScope, AutomationError, EvalResult};
pub use executor::{
    fan_out, ActionExecutor, ActionResult, ExecutionFrame, ExecutionStack, FrameSnapshot,
    PauseSpec, RunState, Suspension,
};
pub use interceptors::{
    Interceptors, InterceptorsBuilder, LoggingInterceptor, TemplatingInterceptor, Transaction,
    TransactionManager, TransactionalInterceptor, TracingInterceptor,
};
pub use kind::{
    ActionKind, BlockKind, ConditionKind, ResultKind, RunKind, Stage, TriggerKind, VariableKind,
};
pub use lists::{
    ActionBlock, ActionList, BlockList, ConditionBlock, ConditionList, ResultBlock, TriggerBlock,
    TriggerList, VariableBlock, VariableList,
};
pub use notification::{Notification, NotificationSink, NullSink};
pub use pipeline::{Block, Handler, Interceptor, InterceptorChain, Invocation, Next};
pub use registry::AutomationRegistry;
pub use resolver::{BlockRegistry, Factory, Resolver};
pub use result::{AutomationResult, PENDING_KEY};
pub use resume::{
    InMemoryPendingStore, PendingResume, PendingResumeStore, PendingSnapshot, ResumeKey,
};
pub use scope::RunScope;
pub use trace::{ExecutionTrace, TraceEntry, TraceStore, TRACE_KEY};
