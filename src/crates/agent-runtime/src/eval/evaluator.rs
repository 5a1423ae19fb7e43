//! Evaluator registry
//!
//! An `Evaluator` turns a frozen `CriterionExecutionContext` into a raw
//! value plus a human-readable reason. Two built-in kinds are named in the
//! spec: `LLM_BASED` (prompts a model and parses the reply per
//! `result_type`) and `RULE_BASED` (a host-supplied pure function); both
//! implement the same trait so the engine doesn't need to special-case
//! either kind once registered.

use super::criterion::{CriterionExecutionContext, ResultType};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("evaluator '{0}' not registered")]
    NotRegistered(String),
    #[error("evaluator failed: {0}")]
    Failed(String),
    #[error("could not parse evaluator reply as {0:?}: {1}")]
    ParseFailed(ResultType, String),
}

/// What an evaluator produces before status/timestamps are attached by the
/// engine.
pub struct EvaluatorOutput {
    pub value: Value,
    pub reason: String,
    pub raw_response: Option<String>,
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, ctx: &CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError>;
}

/// A `RULE_BASED` evaluator backed by a host-supplied closure.
pub struct RuleEvaluator<F>
where
    F: Fn(&CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError> + Send + Sync,
{
    f: F,
}

impl<F> RuleEvaluator<F>
where
    F: Fn(&CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Evaluator for RuleEvaluator<F>
where
    F: Fn(&CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError> + Send + Sync,
{
    async fn evaluate(&self, ctx: &CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError> {
        (self.f)(ctx)
    }
}

/// An `LLM_BASED` evaluator: assembles a prompt from the criterion's
/// metadata + bindings, calls the injected model function, and parses the
/// reply according to `result_type`.
pub struct LlmEvaluator {
    model: Arc<
        dyn Fn(String) -> futures::future::BoxFuture<'static, Result<String, EvaluatorError>>
            + Send
            + Sync,
    >,
}

impl LlmEvaluator {
    pub fn new(
        model: Arc<
            dyn Fn(String) -> futures::future::BoxFuture<'static, Result<String, EvaluatorError>>
                + Send
                + Sync,
        >,
    ) -> Self {
        Self { model }
    }

    fn build_prompt(ctx: &CriterionExecutionContext) -> String {
        let mut prompt = String::new();
        if let Some(custom) = &ctx.criterion.custom_prompt {
            prompt.push_str(custom);
            prompt.push('\n');
        }
        if let Some(mechanism) = &ctx.criterion.working_mechanism {
            prompt.push_str("Working mechanism: ");
            prompt.push_str(mechanism);
            prompt.push('\n');
        }
        for shot in &ctx.criterion.few_shots {
            prompt.push_str("Example: ");
            prompt.push_str(&shot.to_string());
            prompt.push('\n');
        }
        prompt.push_str("Input context: ");
        prompt.push_str(&ctx.input_context.to_string());
        prompt
    }

    fn parse_reply(result_type: ResultType, reply: &str) -> Result<Value, EvaluatorError> {
        let trimmed = reply.trim();
        match result_type {
            ResultType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(Value::Bool(true)),
                "false" | "no" => Ok(Value::Bool(false)),
                other => Err(EvaluatorError::ParseFailed(
                    result_type,
                    format!("expected boolean, got '{other}'"),
                )),
            },
            ResultType::Score => trimmed
                .parse::<f64>()
                .map(|n| serde_json::json!(n))
                .map_err(|e| EvaluatorError::ParseFailed(result_type, e.to_string())),
            ResultType::Json => serde_json::from_str(trimmed)
                .map_err(|e| EvaluatorError::ParseFailed(result_type, e.to_string())),
            ResultType::Enum | ResultType::Text => Ok(Value::String(trimmed.to_string())),
        }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(&self, ctx: &CriterionExecutionContext) -> Result<EvaluatorOutput, EvaluatorError> {
        let prompt = Self::build_prompt(ctx);
        let reply = (self.model)(prompt).await?;
        let value = Self::parse_reply(ctx.criterion.result_type, &reply)?;
        Ok(EvaluatorOutput {
            value,
            reason: format!("llm evaluator '{}' replied", ctx.criterion.name),
            raw_response: Some(reply),
        })
    }
}

/// Registry mapping `evaluator_ref` string ids to their [`Evaluator`], plus
/// an optional default used when a referenced id isn't registered (§4.3
/// failure rule: "a missing evaluator ref falls back to the suite's default
/// evaluator if present; otherwise ERROR").
#[derive(Default)]
pub struct EvaluatorRegistry {
    evaluators: HashMap<String, Arc<dyn Evaluator>>,
    default: Option<Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, evaluator: Arc<dyn Evaluator>) {
        self.evaluators.insert(id.into(), evaluator);
    }

    pub fn set_default(&mut self, evaluator: Arc<dyn Evaluator>) {
        self.default = Some(evaluator);
    }

    pub fn resolve(&self, id: &str) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.get(id).cloned().or_else(|| self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::criterion::{Criterion, EvaluatorRef};
    use std::collections::HashMap as Map;

    fn ctx() -> CriterionExecutionContext {
        CriterionExecutionContext {
            criterion: Criterion::new(
                "c",
                ResultType::Boolean,
                EvaluatorRef::RuleBased {
                    evaluator_id: "always_true".into(),
                },
            ),
            input_context: Value::Null,
            dependency_results: Map::new(),
            extra_bindings: Map::new(),
        }
    }

    #[tokio::test]
    async fn registry_falls_back_to_default() {
        let mut registry = EvaluatorRegistry::new();
        registry.set_default(Arc::new(RuleEvaluator::new(|_ctx| {
            Ok(EvaluatorOutput {
                value: Value::Bool(true),
                reason: "default".into(),
                raw_response: None,
            })
        })));
        assert!(registry.resolve("unregistered_id").is_some());
        let evaluator = registry.resolve("unregistered_id").unwrap();
        let output = evaluator.evaluate(&ctx()).await.unwrap();
        assert_eq!(output.value, Value::Bool(true));
    }

    #[tokio::test]
    async fn llm_evaluator_parses_boolean_reply() {
        let model: Arc<
            dyn Fn(String) -> futures::future::BoxFuture<'static, Result<String, EvaluatorError>>
                + Send
                + Sync,
        > = Arc::new(|_prompt| Box::pin(async { Ok("true".to_string()) }));
        let evaluator = LlmEvaluator::new(model);
        let output = evaluator.evaluate(&ctx()).await.unwrap();
        assert_eq!(output.value, Value::Bool(true));
    }
}
