//! Block lists
//!
//! Ordered collections of resolved blocks with the combinators the engine
//! evaluates: triggers are OR-ed, conditions AND-ed, variables resolved in
//! order and actions handed to the [`ActionExecutor`].

use rb_core::EventContext;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::block::BlockDefinition;
use crate::error::EvalResult;
use crate::executor::{ActionExecutor, ExecutionStack, RunState};
use crate::kind::{ActionKind, BlockKind, ConditionKind, ResultKind, TriggerKind, VariableKind};
use crate::pipeline::Block;
use crate::scope::RunScope;

pub type TriggerBlock = Block<TriggerKind>;
pub type ConditionBlock = Block<ConditionKind>;
pub type ActionBlock = Block<ActionKind>;
pub type VariableBlock = Block<VariableKind>;
pub type ResultBlock = Block<ResultKind>;

pub type TriggerList = BlockList<TriggerKind>;
pub type ConditionList = BlockList<ConditionKind>;
pub type ActionList = BlockList<ActionKind>;
pub type VariableList = BlockList<VariableKind>;

/// Ordered sequence of blocks of one kind
pub struct BlockList<K: BlockKind> {
    blocks: Vec<Block<K>>,
}

impl<K: BlockKind> BlockList<K> {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn push(&mut self, block: Block<K>) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Block<K>> {
        self.blocks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block<K>> {
        self.blocks.iter()
    }

    /// Definitions of all blocks, in order
    pub fn definitions(&self) -> Vec<BlockDefinition> {
        self.blocks.iter().map(|b| b.definition().clone()).collect()
    }

    pub(crate) fn to_shared(&self) -> Arc<[Block<K>]> {
        Arc::from(self.blocks.clone())
    }
}

impl<K: BlockKind> Clone for BlockList<K> {
    fn clone(&self) -> Self {
        Self {
            blocks: self.blocks.clone(),
        }
    }
}

impl<K: BlockKind> Default for BlockList<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: BlockKind> fmt::Debug for BlockList<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.blocks.iter()).finish()
    }
}

impl<K: BlockKind> FromIterator<Block<K>> for BlockList<K> {
    fn from_iter<I: IntoIterator<Item = Block<K>>>(iter: I) -> Self {
        Self {
            blocks: iter.into_iter().collect(),
        }
    }
}

impl<K: BlockKind> From<Vec<Block<K>>> for BlockList<K> {
    fn from(blocks: Vec<Block<K>>) -> Self {
        Self { blocks }
    }
}

impl<'a, K: BlockKind> IntoIterator for &'a BlockList<K> {
    type Item = &'a Block<K>;
    type IntoIter = std::slice::Iter<'a, Block<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl BlockList<TriggerKind> {
    /// OR over all triggers
    ///
    /// Every trigger is evaluated in order, even after one activated. An
    /// empty list never activates.
    pub async fn any_activated(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        let mut activated = false;
        for trigger in &self.blocks {
            if trigger.evaluate(ctx, scope).await? {
                trace!(trigger = trigger.type_tag(), "Trigger activated");
                activated = true;
            }
        }
        Ok(activated)
    }

    /// AND over all triggers, short-circuiting; an empty list never activates
    pub async fn all_activated(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        if self.blocks.is_empty() {
            return Ok(false);
        }
        for trigger in &self.blocks {
            if !trigger.evaluate(ctx, scope).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True when no trigger activates, short-circuiting
    pub async fn none_activated(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        for trigger in &self.blocks {
            if trigger.evaluate(ctx, scope).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl BlockList<ConditionKind> {
    /// AND over all conditions
    ///
    /// Stops at the first unsatisfied condition. An empty list is satisfied.
    pub async fn all_satisfied(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        for condition in &self.blocks {
            if !condition.evaluate(ctx, scope).await? {
                trace!(condition = condition.type_tag(), "Condition not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// OR over all conditions, short-circuiting; an empty list is not satisfied
    pub async fn any_satisfied(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        for condition in &self.blocks {
            if condition.evaluate(ctx, scope).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True when no condition is satisfied
    pub async fn none_satisfied(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<bool> {
        Ok(!self.any_satisfied(ctx, scope).await?)
    }
}

impl BlockList<VariableKind> {
    /// Resolve every variable in order
    ///
    /// Later variables see the metadata written by earlier ones.
    pub async fn resolve_all(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<()> {
        for variable in &self.blocks {
            variable.evaluate(ctx, scope).await?;
        }
        Ok(())
    }
}

impl BlockList<ActionKind> {
    /// Run the actions through the executor
    ///
    /// A run-abort ends the run normally with [`RunState::Aborted`].
    pub async fn perform(&self, ctx: &mut EventContext, scope: &RunScope) -> EvalResult<RunState> {
        if self.blocks.is_empty() {
            return Ok(RunState::Completed);
        }
        ActionExecutor::run(ExecutionStack::new(self), ctx, scope).await
    }
}
