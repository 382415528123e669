//! The automation entity
//!
//! An automation ties together variables, triggers, conditions, actions
//! and an optional result producer. It is immutable once built; use
//! [`Automation::duplicate`] to derive a copy with a fresh identity.

use indexmap::IndexMap;
use rb_core::{is_truthy_opt, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::block::BlockDefinition;
use crate::lists::{ActionList, ConditionList, ResultBlock, TriggerList, VariableList};

/// Option enabling execution traces
pub const TRACING_OPTION: &str = "tracing";

/// Option wrapping runs in a transaction
pub const TRANSACTIONAL_OPTION: &str = "transactional";

/// Option selecting the template engine by name
pub const TEMPLATE_ENGINE_OPTION: &str = "template_engine";

/// Unique automation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutomationId(String);

impl AutomationId {
    /// Generate a new identifier
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AutomationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AutomationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Free-form automation options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(Metadata);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Truthy check of an option, absent options are off
    pub fn is_enabled(&self, key: &str) -> bool {
        is_truthy_opt(self.0.get(key))
    }

    pub fn tracing(&self) -> bool {
        self.is_enabled(TRACING_OPTION)
    }

    pub fn transactional(&self) -> bool {
        self.is_enabled(TRANSACTIONAL_OPTION)
    }

    /// Requested template engine, if any
    pub fn template_engine(&self) -> Option<&str> {
        self.0.get(TEMPLATE_ENGINE_OPTION).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<IndexMap<String, Value>> for Options {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Declarative automation, as produced by an external parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDefinition {
    /// Identifier, generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub alias: String,

    #[serde(default)]
    pub options: Options,

    #[serde(default, alias = "variable")]
    pub variables: Vec<BlockDefinition>,

    #[serde(default, alias = "trigger")]
    pub triggers: Vec<BlockDefinition>,

    #[serde(default, alias = "condition")]
    pub conditions: Vec<BlockDefinition>,

    #[serde(default, alias = "action")]
    pub actions: Vec<BlockDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BlockDefinition>,
}

/// A complete automation
#[derive(Debug)]
pub struct Automation {
    id: AutomationId,
    alias: String,
    options: Options,
    variables: VariableList,
    triggers: TriggerList,
    conditions: ConditionList,
    actions: ActionList,
    result: Option<ResultBlock>,
}

impl Automation {
    /// Start building an automation
    pub fn builder(alias: impl Into<String>) -> AutomationBuilder {
        AutomationBuilder::new(alias)
    }

    pub fn id(&self) -> &AutomationId {
        &self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn variables(&self) -> &VariableList {
        &self.variables
    }

    pub fn triggers(&self) -> &TriggerList {
        &self.triggers
    }

    pub fn conditions(&self) -> &ConditionList {
        &self.conditions
    }

    pub fn actions(&self) -> &ActionList {
        &self.actions
    }

    pub fn result(&self) -> Option<&ResultBlock> {
        self.result.as_ref()
    }

    /// Copy with a fresh id
    ///
    /// Alias, options and result producer are equal; the block lists are
    /// new list values, so the copy shares no list with the original.
    pub fn duplicate(&self) -> Self {
        Self {
            id: AutomationId::generate(),
            alias: self.alias.clone(),
            options: self.options.clone(),
            variables: self.variables.iter().cloned().collect(),
            triggers: self.triggers.iter().cloned().collect(),
            conditions: self.conditions.iter().cloned().collect(),
            actions: self.actions.iter().cloned().collect(),
            result: self.result.clone(),
        }
    }

    /// Declarative form of this automation
    pub fn to_definition(&self) -> AutomationDefinition {
        AutomationDefinition {
            id: Some(self.id.to_string()),
            alias: self.alias.clone(),
            options: self.options.clone(),
            variables: self.variables.definitions(),
            triggers: self.triggers.definitions(),
            conditions: self.conditions.definitions(),
            actions: self.actions.definitions(),
            result: self.result.as_ref().map(|r| r.definition().clone()),
        }
    }
}

/// Builder for [`Automation`]
#[derive(Debug)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    alias: String,
    options: Options,
    variables: VariableList,
    triggers: TriggerList,
    conditions: ConditionList,
    actions: ActionList,
    result: Option<ResultBlock>,
}

impl AutomationBuilder {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            id: None,
            alias: alias.into(),
            options: Options::new(),
            variables: VariableList::new(),
            triggers: TriggerList::new(),
            conditions: ConditionList::new(),
            actions: ActionList::new(),
            result: None,
        }
    }

    pub fn id(mut self, id: impl Into<AutomationId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn variables(mut self, variables: VariableList) -> Self {
        self.variables = variables;
        self
    }

    pub fn triggers(mut self, triggers: TriggerList) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn conditions(mut self, conditions: ConditionList) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn actions(mut self, actions: ActionList) -> Self {
        self.actions = actions;
        self
    }

    pub fn result(mut self, result: ResultBlock) -> Self {
        self.result = Some(result);
        self
    }

    pub fn build(self) -> Automation {
        Automation {
            id: self.id.unwrap_or_else(AutomationId::generate),
            alias: self.alias,
            options: self.options,
            variables: self.variables,
            triggers: self.triggers,
            conditions: self.conditions,
            actions: self.actions,
            result: self.result,
        }
    }
}

impl From<String> for AutomationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
