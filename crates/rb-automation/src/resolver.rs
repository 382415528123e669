//! Definition to automation resolution
//!
//! A [`BlockRegistry`] maps block type tags to constructor functions, one
//! table per block kind. The [`Resolver`] combines the registry with the
//! interceptor chains: every block it builds is bound to the chain of its
//! kind, so callers can only evaluate it through the pipeline.
//!
//! Resolving never shares block instances: every call constructs new ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::automation::{Automation, AutomationDefinition, AutomationId};
use crate::block::{Action, BlockDefinition, Condition, ResultProducer, Trigger, Variable};
use crate::error::{AutomationError, EvalResult};
use crate::executor::{ExecutionFrame, ExecutionStack};
use crate::interceptors::Interceptors;
use crate::kind::{
    ActionKind, BlockKind, ConditionKind, ResultKind, Stage, TriggerKind, VariableKind,
};
use crate::lists::{ActionList, ConditionList, ResultBlock, TriggerBlock, TriggerList, VariableList};
use crate::pipeline::{Block, InterceptorChain};
use crate::resume::{PendingResume, PendingSnapshot};

/// Constructor of one block type
pub type Factory<K> = Arc<
    dyn Fn(&BlockDefinition, &Resolver) -> EvalResult<Arc<<K as Stage>::Subject>>
        + Send
        + Sync,
>;

/// Block constructors by kind and type tag
#[derive(Default)]
pub struct BlockRegistry {
    triggers: HashMap<String, Factory<TriggerKind>>,
    conditions: HashMap<String, Factory<ConditionKind>>,
    actions: HashMap<String, Factory<ActionKind>>,
    variables: HashMap<String, Factory<VariableKind>>,
    results: HashMap<String, Factory<ResultKind>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger type
    ///
    /// The factory receives the definition and the resolver, so composite
    /// blocks can resolve nested definitions.
    pub fn trigger<T, F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        T: Trigger + 'static,
        F: Fn(&BlockDefinition, &Resolver) -> EvalResult<T> + Send + Sync + 'static,
    {
        self.triggers.insert(
            type_tag.into(),
            Arc::new(move |def: &BlockDefinition, resolver: &Resolver| {
                Ok(Arc::new(factory(def, resolver)?) as Arc<dyn Trigger>)
            }),
        );
        self
    }

    pub fn condition<T, F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        T: Condition + 'static,
        F: Fn(&BlockDefinition, &Resolver) -> EvalResult<T> + Send + Sync + 'static,
    {
        self.conditions.insert(
            type_tag.into(),
            Arc::new(move |def: &BlockDefinition, resolver: &Resolver| {
                Ok(Arc::new(factory(def, resolver)?) as Arc<dyn Condition>)
            }),
        );
        self
    }

    pub fn action<T, F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        T: Action + 'static,
        F: Fn(&BlockDefinition, &Resolver) -> EvalResult<T> + Send + Sync + 'static,
    {
        self.actions.insert(
            type_tag.into(),
            Arc::new(move |def: &BlockDefinition, resolver: &Resolver| {
                Ok(Arc::new(factory(def, resolver)?) as Arc<dyn Action>)
            }),
        );
        self
    }

    pub fn variable<T, F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        T: Variable + 'static,
        F: Fn(&BlockDefinition, &Resolver) -> EvalResult<T> + Send + Sync + 'static,
    {
        self.variables.insert(
            type_tag.into(),
            Arc::new(move |def: &BlockDefinition, resolver: &Resolver| {
                Ok(Arc::new(factory(def, resolver)?) as Arc<dyn Variable>)
            }),
        );
        self
    }

    pub fn result<T, F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        T: ResultProducer + 'static,
        F: Fn(&BlockDefinition, &Resolver) -> EvalResult<T> + Send + Sync + 'static,
    {
        self.results.insert(
            type_tag.into(),
            Arc::new(move |def: &BlockDefinition, resolver: &Resolver| {
                Ok(Arc::new(factory(def, resolver)?) as Arc<dyn ResultProducer>)
            }),
        );
        self
    }

    /// Registered type tags of one kind, sorted
    pub fn type_tags(&self, kind: &str) -> Vec<String> {
        let mut tags: Vec<String> = match kind {
            "trigger" => self.triggers.keys().cloned().collect(),
            "condition" => self.conditions.keys().cloned().collect(),
            "action" => self.actions.keys().cloned().collect(),
            "variable" => self.variables.keys().cloned().collect(),
            "result" => self.results.keys().cloned().collect(),
            _ => Vec::new(),
        };
        tags.sort();
        tags
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("triggers", &self.type_tags("trigger"))
            .field("conditions", &self.type_tags("condition"))
            .field("actions", &self.type_tags("action"))
            .field("variables", &self.type_tags("variable"))
            .field("results", &self.type_tags("result"))
            .finish()
    }
}

/// Builds automations and blocks from definitions
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<BlockRegistry>,
    interceptors: Interceptors,
}

impl Resolver {
    pub fn new(registry: Arc<BlockRegistry>, interceptors: Interceptors) -> Self {
        Self {
            registry,
            interceptors,
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.interceptors
    }

    fn resolve_one<K: BlockKind>(
        &self,
        table: &HashMap<String, Factory<K>>,
        chain: &Arc<InterceptorChain<K>>,
        definition: &BlockDefinition,
    ) -> EvalResult<Block<K>> {
        let factory = table.get(&definition.type_tag).ok_or_else(|| {
            AutomationError::UnknownBlockType {
                kind: K::NAME,
                type_tag: definition.type_tag.clone(),
            }
        })?;
        let inner = factory(definition, self)?;
        Ok(Block::new(definition.clone(), inner, chain.clone()))
    }

    fn resolve_many<K: BlockKind>(
        &self,
        table: &HashMap<String, Factory<K>>,
        chain: &Arc<InterceptorChain<K>>,
        definitions: &[BlockDefinition],
    ) -> EvalResult<Vec<Block<K>>> {
        definitions
            .iter()
            .map(|def| self.resolve_one(table, chain, def))
            .collect()
    }

    pub fn resolve_trigger(&self, definition: &BlockDefinition) -> EvalResult<TriggerBlock> {
        self.resolve_one(&self.registry.triggers, &self.interceptors.triggers, definition)
    }

    pub fn resolve_triggers(&self, definitions: &[BlockDefinition]) -> EvalResult<TriggerList> {
        self.resolve_many(&self.registry.triggers, &self.interceptors.triggers, definitions)
            .map(TriggerList::from)
    }

    pub fn resolve_conditions(
        &self,
        definitions: &[BlockDefinition],
    ) -> EvalResult<ConditionList> {
        self.resolve_many(
            &self.registry.conditions,
            &self.interceptors.conditions,
            definitions,
        )
        .map(ConditionList::from)
    }

    pub fn resolve_actions(&self, definitions: &[BlockDefinition]) -> EvalResult<ActionList> {
        self.resolve_many(&self.registry.actions, &self.interceptors.actions, definitions)
            .map(ActionList::from)
    }

    pub fn resolve_variables(&self, definitions: &[BlockDefinition]) -> EvalResult<VariableList> {
        self.resolve_many(
            &self.registry.variables,
            &self.interceptors.variables,
            definitions,
        )
        .map(VariableList::from)
    }

    pub fn resolve_result(&self, definition: &BlockDefinition) -> EvalResult<ResultBlock> {
        self.resolve_one(&self.registry.results, &self.interceptors.results, definition)
    }

    /// Build a complete automation
    pub fn build_automation(&self, definition: &AutomationDefinition) -> EvalResult<Automation> {
        let mut builder = Automation::builder(definition.alias.clone())
            .options(definition.options.clone())
            .variables(self.resolve_variables(&definition.variables)?)
            .triggers(self.resolve_triggers(&definition.triggers)?)
            .conditions(self.resolve_conditions(&definition.conditions)?)
            .actions(self.resolve_actions(&definition.actions)?);

        if let Some(id) = &definition.id {
            builder = builder.id(AutomationId::new(id.clone()));
        }
        if let Some(result) = &definition.result {
            builder = builder.result(self.resolve_result(result)?);
        }

        let automation = builder.build();
        debug!(id = %automation.id(), alias = automation.alias(), "Resolved automation");
        Ok(automation)
    }

    /// Copy of `automation` with a fresh id and freshly constructed blocks
    pub fn duplicate(&self, automation: &Automation) -> EvalResult<Automation> {
        let mut definition = automation.to_definition();
        definition.id = None;
        self.build_automation(&definition)
    }

    /// Rebuild a paused run from its snapshot
    ///
    /// `automation` must be the automation named by the snapshot key.
    pub fn restore_pending(
        &self,
        snapshot: PendingSnapshot,
        automation: Arc<Automation>,
    ) -> EvalResult<PendingResume> {
        if automation.id() != &snapshot.key.automation_id {
            return Err(AutomationError::InvalidInput(format!(
                "snapshot {} belongs to another automation than {}",
                snapshot.key,
                automation.id()
            )));
        }

        let frames = snapshot
            .frames
            .iter()
            .map(|frame| {
                let actions = self.resolve_actions(&frame.actions)?;
                if frame.index > actions.len() {
                    return Err(AutomationError::InvalidInput(format!(
                        "frame index {} out of range for {} actions",
                        frame.index,
                        actions.len()
                    )));
                }
                Ok(ExecutionFrame::new(&actions).with_index(frame.index))
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let resume_trigger = snapshot
            .resume_trigger
            .as_ref()
            .map(|def| self.resolve_trigger(def))
            .transpose()?;

        debug!(key = %snapshot.key, frames = frames.len(), "Restored paused run");

        Ok(PendingResume {
            key: snapshot.key,
            automation,
            stack: ExecutionStack::from_frames(frames),
            context: snapshot.context,
            resume_trigger,
            deadline: snapshot.deadline,
            paused_at: snapshot.paused_at,
        })
    }
}
