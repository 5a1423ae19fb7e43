//! Criterion declarations and results
//!
//! A `Criterion` is one node in the evaluation DAG (§4.3, §3). This module
//! holds its static declaration plus the result record every run produces;
//! [`super::engine`] holds the executor that walks the DAG.

use super::condition::MatchMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultType {
    Boolean,
    Enum,
    Score,
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CriterionStatus {
    Success,
    Error,
    Timeout,
    Skipped,
}

/// Which evaluator kind resolves a criterion's `evaluator_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluatorRef {
    /// Assembles a prompt from criterion metadata + bindings and parses the
    /// LLM reply per `result_type` (§4.3).
    LlmBased { evaluator_id: String },
    /// A host-supplied pure function, registered by string id.
    RuleBased { evaluator_id: String },
}

/// Gates execution of a criterion on a dependency's resolved value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalExecution {
    pub depends_on_criterion: String,
    pub match_mode: MatchMode,
    /// Required for `Equals`/`NotEquals`; ignored by the other modes.
    pub expected: Option<Value>,
    pub default_value: Value,
    pub skip_reason: String,
}

/// How to split a criterion's input collection into concurrently-evaluated
/// batches (§4.3 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    pub enabled: bool,
    /// Dotted path into `CriterionExecutionContext`, e.g.
    /// `"context.input.tools"` or `"dependencies.collect_tools.value"`.
    pub source_path: String,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    /// The key the current batch is bound under before each evaluator call.
    pub batch_binding_key: String,
    pub aggregation_strategy: String,
}

/// A single node in the evaluation DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub result_type: ResultType,
    pub depends_on: Vec<String>,
    pub evaluator_ref: EvaluatorRef,
    pub conditional_execution: Option<ConditionalExecution>,
    pub batching_config: Option<BatchingConfig>,
    pub context_bindings: Vec<String>,
    pub custom_prompt: Option<String>,
    pub working_mechanism: Option<String>,
    pub few_shots: Vec<Value>,
}

impl Criterion {
    pub fn new(name: impl Into<String>, result_type: ResultType, evaluator_ref: EvaluatorRef) -> Self {
        Self {
            name: name.into(),
            result_type,
            depends_on: Vec::new(),
            evaluator_ref,
            conditional_execution: None,
            batching_config: None,
            context_bindings: Vec::new(),
            custom_prompt: None,
            working_mechanism: None,
            few_shots: Vec::new(),
        }
    }

    pub fn depends_on(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn conditional(mut self, conditional: ConditionalExecution) -> Self {
        self.conditional_execution = Some(conditional);
        self
    }

    pub fn batched(mut self, batching: BatchingConfig) -> Self {
        self.batching_config = Some(batching);
        self
    }
}

/// A frozen snapshot of a criterion's already-resolved dependencies, handed
/// to the evaluator so dependency results can't change mid-evaluation even
/// if a sibling at the same DAG level is still running.
#[derive(Debug, Clone)]
pub struct CriterionExecutionContext {
    pub criterion: Criterion,
    pub input_context: Value,
    pub dependency_results: HashMap<String, CriterionResult>,
    pub extra_bindings: HashMap<String, Value>,
}

impl CriterionExecutionContext {
    /// Navigate `context.*` / `dependencies.*` paths used by
    /// `batching_config.source_path` and `conditional_execution` lookups.
    pub fn resolve_path(&self, path: &str) -> Option<Value> {
        let mut parts = path.splitn(2, '.');
        let root = parts.next()?;
        let rest = parts.next().unwrap_or("");
        match root {
            "context" => {
                if rest.is_empty() {
                    Some(self.input_context.clone())
                } else {
                    super::condition::navigate_dotted(&self.input_context, rest).cloned()
                }
            }
            "dependencies" => {
                let mut rest_parts = rest.splitn(2, '.');
                let crit_name = rest_parts.next()?;
                let result = self.dependency_results.get(crit_name)?;
                let result_value = serde_json::to_value(result).ok()?;
                match rest_parts.next() {
                    Some(field_path) => {
                        super::condition::navigate_dotted(&result_value, field_path).cloned()
                    }
                    None => Some(result_value),
                }
            }
            _ => self.extra_bindings.get(path).cloned(),
        }
    }
}

/// The outcome of running one criterion once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionResult {
    pub status: CriterionStatus,
    pub value: Value,
    pub reason: String,
    pub raw_response: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub metadata: CriterionResultMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriterionResultMetadata {
    pub experience_ids: Vec<String>,
}

impl CriterionResult {
    pub fn skipped(reason: impl Into<String>, default_value: Value, at: DateTime<Utc>) -> Self {
        Self {
            status: CriterionStatus::Skipped,
            value: default_value,
            reason: reason.into(),
            raw_response: None,
            started_at: at,
            completed_at: at,
            metadata: CriterionResultMetadata::default(),
        }
    }

    pub fn error(reason: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            status: CriterionStatus::Error,
            value: Value::Null,
            reason: reason.into(),
            raw_response: None,
            started_at,
            completed_at: now,
            metadata: CriterionResultMetadata::default(),
        }
    }
}
