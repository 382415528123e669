//! Block capabilities
//!
//! A block is one polymorphic unit of an automation: a trigger, a
//! condition, an action, a variable or a result producer. Concrete blocks
//! live outside this crate and are registered with a
//! [`BlockRegistry`](crate::BlockRegistry) under a type tag.
//!
//! Blocks never see their raw definition. They receive a [`BlockCall`]
//! whose `params` have already passed through the interceptor chain, so
//! template expressions are rendered by the time [`bind_params`] runs.

use async_trait::async_trait;
use rb_core::EventContext;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AutomationError, EvalResult};
use crate::executor::ActionResult;
use crate::scope::RunScope;

/// Declarative description of one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Registry key of the block implementation
    #[serde(rename = "type")]
    pub type_tag: String,

    /// Parameters, possibly containing template expressions
    #[serde(default)]
    pub params: Value,
}

impl BlockDefinition {
    /// Create a definition
    pub fn new(type_tag: impl Into<String>, params: Value) -> Self {
        Self {
            type_tag: type_tag.into(),
            params,
        }
    }

    /// Create a definition without parameters
    pub fn bare(type_tag: impl Into<String>) -> Self {
        Self::new(type_tag, Value::Null)
    }
}

/// Arguments passed to a block for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct BlockCall<'a> {
    /// Type tag of the block being evaluated
    pub type_tag: &'a str,
    /// Parameters after interception
    pub params: &'a Value,
    /// Run the evaluation belongs to
    pub scope: &'a RunScope,
}

impl<'a> BlockCall<'a> {
    /// Bind the parameters to the block's typed parameter struct
    pub fn bind<T: DeserializeOwned>(&self) -> EvalResult<T> {
        bind_params(self.type_tag, self.params)
    }
}

/// Deserialize block parameters, reporting failures as conversion faults
///
/// A `null` parameter value binds like an empty object so parameter
/// structs made entirely of defaults accept bare definitions.
pub fn bind_params<T: DeserializeOwned>(type_tag: &str, params: &Value) -> EvalResult<T> {
    let value = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };

    serde_json::from_value(value).map_err(|e| AutomationError::Conversion {
        block: type_tag.to_string(),
        message: e.to_string(),
    })
}

/// Predicate signalling that an event is relevant
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Check whether the event in `ctx` activates this trigger
    async fn is_triggered(&self, ctx: &EventContext, call: BlockCall<'_>) -> EvalResult<bool>;

    /// Whether the block renders its own expressions
    fn evaluates_expressions(&self) -> bool {
        false
    }
}

/// Predicate gating the actions
#[async_trait]
pub trait Condition: Send + Sync {
    async fn is_satisfied(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<bool>;

    fn evaluates_expressions(&self) -> bool {
        false
    }
}

/// Unit of work
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action and tell the executor how to continue
    async fn execute(&self, ctx: &mut EventContext, call: BlockCall<'_>)
        -> EvalResult<ActionResult>;

    fn evaluates_expressions(&self) -> bool {
        false
    }
}

/// Named computed value written into run metadata
#[async_trait]
pub trait Variable: Send + Sync {
    async fn resolve(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<()>;

    fn evaluates_expressions(&self) -> bool {
        false
    }
}

/// Value computed at the end of a run
#[async_trait]
pub trait ResultProducer: Send + Sync {
    async fn produce(&self, ctx: &mut EventContext, call: BlockCall<'_>) -> EvalResult<Value>;

    fn evaluates_expressions(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Params {
        to: String,
        #[serde(default)]
        count: u32,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Defaults {
        #[serde(default)]
        flag: bool,
    }

    #[test]
    fn test_definition_serde() {
        let def: BlockDefinition =
            serde_json::from_value(json!({"type": "notify", "params": {"to": "ops"}})).unwrap();
        assert_eq!(def.type_tag, "notify");
        assert_eq!(def.params, json!({"to": "ops"}));

        let bare: BlockDefinition = serde_json::from_value(json!({"type": "noop"})).unwrap();
        assert_eq!(bare, BlockDefinition::bare("noop"));
    }

    #[test]
    fn test_bind_params() {
        let params: Params = bind_params("notify", &json!({"to": "ops", "count": 2})).unwrap();
        assert_eq!(
            params,
            Params {
                to: "ops".to_string(),
                count: 2
            }
        );
    }

    #[test]
    fn test_bind_null_params_as_empty_object() {
        let params: Defaults = bind_params("flag", &Value::Null).unwrap();
        assert_eq!(params, Defaults::default());
    }

    #[test]
    fn test_bind_params_conversion_error() {
        let err = bind_params::<Params>("notify", &json!({"count": "many"})).unwrap_err();
        match err {
            AutomationError::Conversion { block, .. } => assert_eq!(block, "notify"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
