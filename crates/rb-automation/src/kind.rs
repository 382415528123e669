//! Evaluation stages
//!
//! Every interceptor chain is parameterised by a [`Stage`], which names
//! what is being evaluated (`Subject`) and what the evaluation yields
//! (`Output`). The five block kinds additionally implement [`BlockKind`],
//! which knows how to call the block itself at the end of the chain.

use futures::future::BoxFuture;
use rb_core::EventContext;
use serde_json::Value;
use std::fmt::Debug;

use crate::automation::Automation;
use crate::block::{Action, BlockCall, Condition, ResultProducer, Trigger, Variable};
use crate::error::EvalResult;
use crate::executor::ActionResult;
use crate::result::AutomationResult;

/// One kind of evaluation an interceptor chain wraps
pub trait Stage: Send + Sync + 'static {
    /// What is evaluated
    type Subject: ?Sized + Send + Sync;
    /// What the evaluation yields
    type Output: Send + Debug;
    /// Name used in logs, traces and errors
    const NAME: &'static str;
}

/// A stage whose subject is a block implementation
pub trait BlockKind: Stage {
    /// Whether the block renders its own expressions
    fn evaluates_expressions(subject: &Self::Subject) -> bool;

    /// Call the block
    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<Self::Output>>;
}

/// Triggers: read-only predicates
#[derive(Debug, Clone, Copy)]
pub struct TriggerKind;

/// Conditions
#[derive(Debug, Clone, Copy)]
pub struct ConditionKind;

/// Actions
#[derive(Debug, Clone, Copy)]
pub struct ActionKind;

/// Variables
#[derive(Debug, Clone, Copy)]
pub struct VariableKind;

/// Result producers
#[derive(Debug, Clone, Copy)]
pub struct ResultKind;

/// A whole automation run
#[derive(Debug, Clone, Copy)]
pub struct RunKind;

impl Stage for TriggerKind {
    type Subject = dyn Trigger;
    type Output = bool;
    const NAME: &'static str = "trigger";
}

impl BlockKind for TriggerKind {
    fn evaluates_expressions(subject: &Self::Subject) -> bool {
        subject.evaluates_expressions()
    }

    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<bool>> {
        let ctx: &'a EventContext = ctx;
        subject.is_triggered(ctx, call)
    }
}

impl Stage for ConditionKind {
    type Subject = dyn Condition;
    type Output = bool;
    const NAME: &'static str = "condition";
}

impl BlockKind for ConditionKind {
    fn evaluates_expressions(subject: &Self::Subject) -> bool {
        subject.evaluates_expressions()
    }

    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<bool>> {
        subject.is_satisfied(ctx, call)
    }
}

impl Stage for ActionKind {
    type Subject = dyn Action;
    type Output = ActionResult;
    const NAME: &'static str = "action";
}

impl BlockKind for ActionKind {
    fn evaluates_expressions(subject: &Self::Subject) -> bool {
        subject.evaluates_expressions()
    }

    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<ActionResult>> {
        subject.execute(ctx, call)
    }
}

impl Stage for VariableKind {
    type Subject = dyn Variable;
    type Output = ();
    const NAME: &'static str = "variable";
}

impl BlockKind for VariableKind {
    fn evaluates_expressions(subject: &Self::Subject) -> bool {
        subject.evaluates_expressions()
    }

    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<()>> {
        subject.resolve(ctx, call)
    }
}

impl Stage for ResultKind {
    type Subject = dyn ResultProducer;
    type Output = Value;
    const NAME: &'static str = "result";
}

impl BlockKind for ResultKind {
    fn evaluates_expressions(subject: &Self::Subject) -> bool {
        subject.evaluates_expressions()
    }

    fn call<'a>(
        subject: &'a Self::Subject,
        ctx: &'a mut EventContext,
        call: BlockCall<'a>,
    ) -> BoxFuture<'a, EvalResult<Value>> {
        subject.produce(ctx, call)
    }
}

impl Stage for RunKind {
    type Subject = Automation;
    type Output = AutomationResult;
    const NAME: &'static str = "automation";
}
