//! Automation results

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resume::ResumeKey;
use crate::trace::{ExecutionTrace, TRACE_KEY};

/// Reserved result field describing a paused run
pub const PENDING_KEY: &str = "pending_resume";

/// Outcome of one automation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationResult {
    /// Whether triggers activated and conditions held
    pub executed: bool,

    /// Value computed by the result producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Extra fields; `trace` and `pending_resume` are reserved
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub additional_fields: IndexMap<String, Value>,
}

impl AutomationResult {
    /// Result of an automation whose triggers or conditions did not pass
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Result of a run that reached the end
    pub fn executed(result: Option<Value>) -> Self {
        Self {
            executed: true,
            result,
            additional_fields: IndexMap::new(),
        }
    }

    /// Result of a run that paused before finishing
    pub fn paused(key: &ResumeKey) -> serde_json::Result<Self> {
        let mut result = Self::executed(None);
        result
            .additional_fields
            .insert(PENDING_KEY.to_string(), serde_json::to_value(key)?);
        Ok(result)
    }

    /// Attach a field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_fields.insert(key.into(), value);
        self
    }

    /// Trace of the run, when tracing was enabled
    pub fn trace(&self) -> Option<ExecutionTrace> {
        self.additional_fields
            .get(TRACE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Key of the pending resume, when the run paused
    pub fn pending_resume(&self) -> Option<ResumeKey> {
        self.additional_fields
            .get(PENDING_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_paused(&self) -> bool {
        self.additional_fields.contains_key(PENDING_KEY)
    }
}
