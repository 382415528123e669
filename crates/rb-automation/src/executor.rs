//! Resumable action executor
//!
//! Actions run on an explicit stack of [`ExecutionFrame`]s instead of the
//! native call stack, so a run can stop part way, invoke nested action
//! lists, or pause and later continue exactly where it left off.
//!
//! Every action answers with an [`ActionResult`]:
//!
//! - `Continue` - advance to the next action
//! - `Stop` - drop the rest of the current frame; the parent continues
//! - `Invoke(children)` - run `children` before the next action
//! - `Pause(spec)` - suspend the run until the resume trigger fires,
//!   the timeout elapses, or the run is resumed explicitly

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use rb_core::EventContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::block::BlockDefinition;
use crate::error::{AbortScope, AutomationError, EvalResult};
use crate::lists::{ActionBlock, ActionList, TriggerBlock};
use crate::scope::RunScope;

/// How a paused run resumes
#[derive(Debug, Clone, Default)]
pub struct PauseSpec {
    /// Trigger that continues the run when activated by a later event
    pub resume_trigger: Option<TriggerBlock>,
    /// Time after which an external scheduler wakes the run
    pub timeout: Option<Duration>,
}

/// Outcome of one action
#[derive(Debug, Clone)]
pub enum ActionResult {
    Continue,
    Stop,
    Invoke(ActionList),
    Pause(PauseSpec),
}

impl ActionResult {
    /// Suspend until resumed explicitly or by timeout
    pub fn pause(timeout: Option<Duration>) -> Self {
        ActionResult::Pause(PauseSpec {
            resume_trigger: None,
            timeout,
        })
    }

    /// Suspend until `trigger` activates or the timeout elapses
    pub fn pause_until(trigger: TriggerBlock, timeout: Option<Duration>) -> Self {
        ActionResult::Pause(PauseSpec {
            resume_trigger: Some(trigger),
            timeout,
        })
    }

    /// Short name used in traces and logs
    pub fn label(&self) -> &'static str {
        match self {
            ActionResult::Continue => "continue",
            ActionResult::Stop => "stop",
            ActionResult::Invoke(_) => "invoke",
            ActionResult::Pause(_) => "pause",
        }
    }
}

/// One level of the action call stack
#[derive(Clone)]
pub struct ExecutionFrame {
    actions: Arc<[ActionBlock]>,
    index: usize,
}

impl ExecutionFrame {
    /// Frame positioned at the first action of `actions`
    pub fn new(actions: &ActionList) -> Self {
        Self {
            actions: actions.to_shared(),
            index: 0,
        }
    }

    /// Same actions at another position
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            actions: self.actions.clone(),
            index,
        }
    }

    /// Frame advanced past the current action
    pub fn next(&self) -> Self {
        self.with_index(self.index + 1)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action at the current position, `None` once exhausted
    pub fn current(&self) -> Option<&ActionBlock> {
        self.actions.get(self.index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.actions.len()
    }

    /// Serializable form of the frame
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            actions: self
                .actions
                .iter()
                .map(|a| a.definition().clone())
                .collect(),
            index: self.index,
        }
    }
}

impl fmt::Debug for ExecutionFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionFrame")
            .field("actions", &self.actions.len())
            .field("index", &self.index)
            .finish()
    }
}

/// Serializable form of an [`ExecutionFrame`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub actions: Vec<BlockDefinition>,
    pub index: usize,
}

/// Stack of frames describing where a run is
#[derive(Debug, Clone, Default)]
pub struct ExecutionStack {
    frames: Vec<ExecutionFrame>,
}

impl ExecutionStack {
    /// Stack with one frame over `actions`
    pub fn new(actions: &ActionList) -> Self {
        Self {
            frames: vec![ExecutionFrame::new(actions)],
        }
    }

    /// Stack from frames, bottom first
    pub fn from_frames(frames: Vec<ExecutionFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[ExecutionFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn top(&self) -> Option<&ExecutionFrame> {
        self.frames.last()
    }

    pub fn push(&mut self, frame: ExecutionFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<ExecutionFrame> {
        self.frames.pop()
    }

    /// Replace the top frame with its successor
    pub fn advance(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            *top = top.next();
        }
    }

    /// Pop the top frame and advance its parent past the invoking action
    pub fn unwind(&mut self) {
        self.frames.pop();
        self.advance();
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn snapshot(&self) -> Vec<FrameSnapshot> {
        self.frames.iter().map(ExecutionFrame::snapshot).collect()
    }
}

/// A run suspended by an action
#[derive(Debug, Clone)]
pub struct Suspension {
    /// Where to continue, already past the pausing action
    pub stack: ExecutionStack,
    pub resume_trigger: Option<TriggerBlock>,
    pub timeout: Option<Duration>,
}

/// How the executor left a run
#[derive(Debug, Clone)]
pub enum RunState {
    /// Every frame was exhausted or stopped
    Completed,
    /// A run-abort ended the run early
    Aborted,
    /// An action paused the run
    Paused(Suspension),
}

impl RunState {
    pub fn is_paused(&self) -> bool {
        matches!(self, RunState::Paused(_))
    }
}

/// Interpreter over an [`ExecutionStack`]
pub struct ActionExecutor;

impl ActionExecutor {
    /// Run until the stack is empty, the run aborts or an action pauses
    pub async fn run(
        mut stack: ExecutionStack,
        ctx: &mut EventContext,
        scope: &RunScope,
    ) -> EvalResult<RunState> {
        debug!(
            execution_id = scope.execution_id(),
            depth = stack.depth(),
            "Running actions"
        );

        while let Some(frame) = stack.top() {
            let Some(action) = frame.current().cloned() else {
                trace!(depth = stack.depth(), "Frame exhausted");
                stack.unwind();
                continue;
            };

            match action.evaluate(ctx, scope).await {
                Ok(ActionResult::Continue) => stack.advance(),
                Ok(ActionResult::Stop) => {
                    trace!(action = action.type_tag(), "Stopping frame");
                    stack.unwind();
                }
                Ok(ActionResult::Invoke(children)) => {
                    trace!(
                        action = action.type_tag(),
                        children = children.len(),
                        "Invoking child actions"
                    );
                    stack.push(ExecutionFrame::new(&children));
                }
                Ok(ActionResult::Pause(spec)) => {
                    debug!(
                        action = action.type_tag(),
                        timeout = ?spec.timeout,
                        "Pausing run"
                    );
                    stack.advance();
                    return Ok(RunState::Paused(Suspension {
                        stack,
                        resume_trigger: spec.resume_trigger,
                        timeout: spec.timeout,
                    }));
                }
                Err(e) if e.is_abort(AbortScope::Sequence) => {
                    trace!(action = action.type_tag(), "Sequence aborted");
                    stack.unwind();
                }
                Err(e) if e.is_abort(AbortScope::Run) => {
                    debug!(action = action.type_tag(), "Run aborted");
                    stack.clear();
                    return Ok(RunState::Aborted);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(RunState::Completed)
    }
}

/// Run `branches` concurrently and join them
///
/// Each branch works on its own fork of `ctx`. At most the scope's fan-out
/// limit of branches run at once, unbounded when unset. The first failure
/// is returned. After the join, the metadata changes of every branch are
/// applied to `ctx` in branch order, so later branches win on conflicting
/// keys. A branch that pauses is an error. A branch that aborts the run
/// makes the whole fan-out return the run-abort signal once the writes
/// are merged.
pub async fn fan_out(
    branches: &[ActionList],
    ctx: &mut EventContext,
    scope: &RunScope,
) -> EvalResult<()> {
    if branches.is_empty() {
        return Ok(());
    }

    let limit = scope.fan_out_limit().unwrap_or(branches.len()).max(1);
    debug!(branches = branches.len(), limit, "Fanning out");

    let base = ctx.fork();
    let runs: Vec<BoxFuture<'_, EvalResult<(EventContext, bool)>>> = branches
        .iter()
        .map(|branch| {
            let mut branch_ctx = base.fork();
            async move {
                match branch.perform(&mut branch_ctx, scope).await? {
                    RunState::Paused(_) => Err(AutomationError::InvalidState(
                        "an action paused inside a fan-out branch".to_string(),
                    )),
                    RunState::Completed => Ok((branch_ctx, false)),
                    RunState::Aborted => Ok((branch_ctx, true)),
                }
            }
            .boxed()
        })
        .collect();

    let finished: Vec<(EventContext, bool)> =
        stream::iter(runs).buffered(limit).try_collect().await?;

    let mut aborted = false;
    for (branch_ctx, branch_aborted) in finished {
        aborted |= branch_aborted;
        for (key, value) in branch_ctx.metadata() {
            if base.get(key) != Some(value) {
                ctx.set(key.clone(), value.clone());
            }
        }
        for key in base.metadata().keys() {
            if !branch_ctx.contains(key) {
                ctx.remove(key);
            }
        }
    }

    if aborted {
        debug!("Run aborted inside a fan-out branch");
        return Err(AutomationError::stop_run());
    }
    Ok(())
}
