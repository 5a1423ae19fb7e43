//! DAG executor for an evaluation suite (§4.3 "Compilation"/"Execution").

use super::aggregation::AggregationStrategy;
use super::condition::navigate_dotted;
use super::criterion::{
    Criterion, CriterionExecutionContext, CriterionResult, CriterionResultMetadata, CriterionStatus,
};
use super::evaluator::{EvaluatorError, EvaluatorRegistry};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("criterion '{0}' depends on unknown criterion '{1}'")]
    UnknownDependency(String, String),
    #[error("dependency cycle detected involving '{0}'")]
    Cycle(String),
    #[error("criterion '{0}' duplicated in suite")]
    DuplicateName(String),
}

/// `store.get(suite_id)` facade result (§4.3 "Result visibility").
#[derive(Debug, Clone, Default)]
pub struct EvaluationResult {
    pub criteria_results: HashMap<String, CriterionResult>,
    pub statistics: EvaluationStatistics,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationStatistics {
    pub total: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub timed_out: usize,
    pub skipped: usize,
}

impl EvaluationStatistics {
    fn record(&mut self, status: CriterionStatus) {
        self.total += 1;
        match status {
            CriterionStatus::Success => self.succeeded += 1,
            CriterionStatus::Error => self.errored += 1,
            CriterionStatus::Timeout => self.timed_out += 1,
            CriterionStatus::Skipped => self.skipped += 1,
        }
    }
}

/// Runs a compiled `Criterion` DAG to completion.
pub struct EvaluationEngine {
    evaluators: Arc<EvaluatorRegistry>,
    worker_pool_size: usize,
}

impl EvaluationEngine {
    pub fn new(evaluators: Arc<EvaluatorRegistry>, worker_pool_size: usize) -> Self {
        Self {
            evaluators,
            worker_pool_size: worker_pool_size.max(1),
        }
    }

    /// Run every criterion in `suite`, levelled by longest-dependency-path,
    /// writing a terminal `CriterionResult` for each.
    pub async fn run(
        &self,
        suite: &[Criterion],
        input_context: Value,
        extra_bindings: HashMap<String, Value>,
    ) -> Result<EvaluationResult, EvaluationError> {
        let levels = compute_levels(suite)?;
        let by_name: HashMap<&str, &Criterion> = suite.iter().map(|c| (c.name.as_str(), c)).collect();

        let mut resolved: HashMap<String, CriterionResult> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut stats = EvaluationStatistics::default();

        for level in levels {
            let mut handles = Vec::with_capacity(level.len());
            for name in level {
                let criterion = (*by_name.get(name.as_str()).expect("level built from suite")).clone();
                let ctx = CriterionExecutionContext {
                    criterion: criterion.clone(),
                    input_context: input_context.clone(),
                    dependency_results: resolved.clone(),
                    extra_bindings: extra_bindings.clone(),
                };
                let evaluators = self.evaluators.clone();
                let permit = semaphore.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                    let result = run_one(&criterion, &ctx, evaluators.as_ref()).await;
                    (criterion.name.clone(), result)
                }));
            }
            for handle in handles {
                let (name, result) = handle.await.expect("criterion task panicked");
                stats.record(result.status);
                resolved.insert(name, result);
            }
        }

        Ok(EvaluationResult {
            criteria_results: resolved,
            statistics: stats,
        })
    }
}

async fn run_one(
    criterion: &Criterion,
    ctx: &CriterionExecutionContext,
    evaluators: &EvaluatorRegistry,
) -> CriterionResult {
    let started_at = Utc::now();

    if let Some(conditional) = &criterion.conditional_execution {
        let Some(dep_value) = ctx.resolve_path(&format!("dependencies.{}.value", conditional.depends_on_criterion))
        else {
            return CriterionResult::error(
                format!(
                    "conditional_execution depends on unresolved criterion '{}'",
                    conditional.depends_on_criterion
                ),
                started_at,
            );
        };
        if !conditional.match_mode.matches(&dep_value, conditional.expected.as_ref()) {
            return CriterionResult::skipped(conditional.skip_reason.clone(), conditional.default_value.clone(), started_at);
        }
    }

    let evaluator_id = match &criterion.evaluator_ref {
        super::criterion::EvaluatorRef::LlmBased { evaluator_id } => evaluator_id,
        super::criterion::EvaluatorRef::RuleBased { evaluator_id } => evaluator_id,
    };
    let Some(evaluator) = evaluators.resolve(evaluator_id) else {
        return CriterionResult::error(format!("evaluator '{evaluator_id}' not registered and no default set"), started_at);
    };

    let outcome = match &criterion.batching_config {
        Some(batching) if batching.enabled => run_batched(ctx, evaluator.clone(), batching).await,
        _ => evaluator.evaluate(ctx).await,
    };

    let completed_at = Utc::now();
    match outcome {
        Ok(output) => CriterionResult {
            status: CriterionStatus::Success,
            value: output.value,
            reason: output.reason,
            raw_response: output.raw_response,
            started_at,
            completed_at,
            metadata: CriterionResultMetadata::default(),
        },
        Err(e) => CriterionResult {
            status: CriterionStatus::Error,
            value: Value::Null,
            reason: e.to_string(),
            raw_response: None,
            started_at,
            completed_at,
            metadata: CriterionResultMetadata::default(),
        },
    }
}

async fn run_batched(
    ctx: &CriterionExecutionContext,
    evaluator: Arc<dyn super::evaluator::Evaluator>,
    batching: &super::criterion::BatchingConfig,
) -> Result<super::evaluator::EvaluatorOutput, EvaluatorError> {
    let collection = ctx
        .resolve_path(&batching.source_path)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();

    let chunks: Vec<Vec<Value>> = collection
        .chunks(batching.batch_size.max(1))
        .map(|c| c.to_vec())
        .collect();

    let semaphore = Arc::new(Semaphore::new(batching.max_concurrent_batches.max(1)));
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let permit = semaphore.clone();
        let mut batch_ctx = ctx.clone();
        batch_ctx
            .extra_bindings
            .insert(batching.batch_binding_key.clone(), Value::Array(chunk));
        let evaluator = evaluator.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore not closed");
            let started = Utc::now();
            match evaluator.evaluate(&batch_ctx).await {
                Ok(output) => CriterionResult {
                    status: CriterionStatus::Success,
                    value: output.value,
                    reason: output.reason,
                    raw_response: output.raw_response,
                    started_at: started,
                    completed_at: Utc::now(),
                    metadata: CriterionResultMetadata::default(),
                },
                Err(e) => CriterionResult::error(e.to_string(), started),
            }
        }));
    }

    let mut batch_results = Vec::with_capacity(handles.len());
    for handle in handles {
        batch_results.push(handle.await.expect("batch task panicked"));
    }

    let strategy = AggregationStrategy::from_id(&batching.aggregation_strategy).ok_or_else(|| {
        EvaluatorError::Failed(format!("unknown aggregation strategy '{}'", batching.aggregation_strategy))
    })?;
    let (status, value, reason) = strategy.aggregate(&batch_results);
    if status != CriterionStatus::Success {
        return Err(EvaluatorError::Failed(reason));
    }
    Ok(super::evaluator::EvaluatorOutput {
        value,
        reason,
        raw_response: None,
    })
}

/// Longest-dependency-path level assignment (§8 "Evaluation level
/// assignment"): `level(c) = 1 + max(level(d) for d in depends_on)`,
/// `level(c) = 0` if `depends_on` is empty. Returns criteria grouped by
/// level, in ascending level order.
fn compute_levels(suite: &[Criterion]) -> Result<Vec<Vec<String>>, EvaluationError> {
    let by_name: HashMap<&str, &Criterion> = suite.iter().map(|c| (c.name.as_str(), c)).collect();
    if by_name.len() != suite.len() {
        let mut seen = std::collections::HashSet::new();
        for c in suite {
            if !seen.insert(c.name.as_str()) {
                return Err(EvaluationError::DuplicateName(c.name.clone()));
            }
        }
    }
    for c in suite {
        for dep in &c.depends_on {
            if !by_name.contains_key(dep.as_str()) {
                return Err(EvaluationError::UnknownDependency(c.name.clone(), dep.clone()));
            }
        }
    }

    let mut level_of: HashMap<String, usize> = HashMap::new();
    let mut visiting: std::collections::HashSet<String> = std::collections::HashSet::new();

    fn resolve<'a>(
        name: &str,
        by_name: &HashMap<&'a str, &'a Criterion>,
        level_of: &mut HashMap<String, usize>,
        visiting: &mut std::collections::HashSet<String>,
    ) -> Result<usize, EvaluationError> {
        if let Some(level) = level_of.get(name) {
            return Ok(*level);
        }
        if !visiting.insert(name.to_string()) {
            return Err(EvaluationError::Cycle(name.to_string()));
        }
        let criterion = by_name.get(name).expect("name validated above");
        let level = if criterion.depends_on.is_empty() {
            0
        } else {
            let mut max_dep = 0;
            for dep in &criterion.depends_on {
                max_dep = max_dep.max(resolve(dep, by_name, level_of, visiting)?);
            }
            max_dep + 1
        };
        visiting.remove(name);
        level_of.insert(name.to_string(), level);
        Ok(level)
    }

    for c in suite {
        resolve(&c.name, &by_name, &mut level_of, &mut visiting)?;
    }

    let max_level = level_of.values().copied().max().unwrap_or(0);
    let mut levels: Vec<Vec<String>> = vec![Vec::new(); max_level + 1];
    for c in suite {
        levels[level_of[&c.name]].push(c.name.clone());
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::criterion::{BatchingConfig, ConditionalExecution, EvaluatorRef, ResultType};
    use crate::eval::condition::MatchMode;
    use crate::eval::evaluator::{EvaluatorOutput, RuleEvaluator};
    use serde_json::json;
    use std::time::Duration;

    fn rule(id: &str) -> EvaluatorRef {
        EvaluatorRef::RuleBased {
            evaluator_id: id.to_string(),
        }
    }

    #[test]
    fn levels_follow_longest_dependency_path() {
        let suite = vec![
            Criterion::new("a", ResultType::Boolean, rule("x")),
            Criterion::new("b", ResultType::Boolean, rule("x")).depends_on(["a"]),
            Criterion::new("c", ResultType::Boolean, rule("x")).depends_on(["a"]),
            Criterion::new("d", ResultType::Boolean, rule("x")).depends_on(["b", "c"]),
        ];
        let levels = compute_levels(&suite).unwrap();
        assert_eq!(levels[0], vec!["a".to_string()]);
        assert_eq!(levels[1].len(), 2);
        assert!(levels[1].contains(&"b".to_string()));
        assert!(levels[1].contains(&"c".to_string()));
        assert_eq!(levels[2], vec!["d".to_string()]);
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let suite = vec![Criterion::new("a", ResultType::Boolean, rule("x")).depends_on(["ghost"])];
        assert!(matches!(compute_levels(&suite), Err(EvaluationError::UnknownDependency(_, _))));
    }

    #[tokio::test]
    async fn scenario_2_dag_ordering_observable_by_timestamps() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(
            "slow",
            Arc::new(RuleEvaluator::new(|_ctx| {
                std::thread::sleep(Duration::from_millis(5));
                Ok(EvaluatorOutput {
                    value: json!(true),
                    reason: "ok".into(),
                    raw_response: None,
                })
            })),
        );
        let suite = vec![
            Criterion::new("a", ResultType::Boolean, rule("slow")),
            Criterion::new("b", ResultType::Boolean, rule("slow")).depends_on(["a"]),
            Criterion::new("c", ResultType::Boolean, rule("slow")).depends_on(["a"]),
            Criterion::new("d", ResultType::Boolean, rule("slow")).depends_on(["b", "c"]),
        ];
        let engine = EvaluationEngine::new(Arc::new(registry), 4);
        let result = engine.run(&suite, Value::Null, HashMap::new()).await.unwrap();
        let a = &result.criteria_results["a"];
        let b = &result.criteria_results["b"];
        let c = &result.criteria_results["c"];
        let d = &result.criteria_results["d"];
        assert!(b.started_at >= a.completed_at);
        assert!(c.started_at >= a.completed_at);
        assert!(d.started_at >= b.completed_at.max(c.completed_at));
    }

    #[tokio::test]
    async fn scenario_3_conditional_skip() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(
            "is_fuzzy_rule",
            Arc::new(RuleEvaluator::new(|_ctx| {
                Ok(EvaluatorOutput {
                    value: json!(true),
                    reason: "fuzzy".into(),
                    raw_response: None,
                })
            })),
        );
        registry.register(
            "answer_rule",
            Arc::new(RuleEvaluator::new(|_ctx| {
                Ok(EvaluatorOutput {
                    value: json!("should not run"),
                    reason: "unreachable".into(),
                    raw_response: None,
                })
            })),
        );
        let suite = vec![
            Criterion::new("is_fuzzy", ResultType::Boolean, rule("is_fuzzy_rule")),
            Criterion::new("answer", ResultType::Text, rule("answer_rule"))
                .depends_on(["is_fuzzy"])
                .conditional(ConditionalExecution {
                    depends_on_criterion: "is_fuzzy".to_string(),
                    match_mode: MatchMode::IsFalse,
                    expected: None,
                    default_value: Value::Null,
                    skip_reason: "input fuzzy".to_string(),
                }),
        ];
        let engine = EvaluationEngine::new(Arc::new(registry), 4);
        let result = engine.run(&suite, Value::Null, HashMap::new()).await.unwrap();
        let answer = &result.criteria_results["answer"];
        assert_eq!(answer.status, CriterionStatus::Skipped);
        assert_eq!(answer.value, Value::Null);
        assert_eq!(answer.reason, "input fuzzy");
    }

    #[tokio::test]
    async fn scenario_4_batching_aggregation() {
        let mut registry = EvaluatorRegistry::new();
        registry.register(
            "contains_t3",
            Arc::new(RuleEvaluator::new(|ctx: &CriterionExecutionContext| {
                let batch = ctx.extra_bindings.get("batch").cloned().unwrap_or(Value::Null);
                let hit = batch
                    .as_array()
                    .map(|items| items.iter().any(|v| v.as_str() == Some("t3")))
                    .unwrap_or(false);
                Ok(EvaluatorOutput {
                    value: json!(hit),
                    reason: if hit { "batch contains t3".into() } else { "no match".into() },
                    raw_response: None,
                })
            })),
        );
        let suite = vec![Criterion::new("any_relevant", ResultType::Boolean, rule("contains_t3")).batched(
            BatchingConfig {
                enabled: true,
                source_path: "context.input.tools".to_string(),
                batch_size: 2,
                max_concurrent_batches: 2,
                batch_binding_key: "batch".to_string(),
                aggregation_strategy: "ANY_TRUE".to_string(),
            },
        )];
        let input_context = json!({"input": {"tools": ["t1", "t2", "t3", "t4", "t5"]}});
        let engine = EvaluationEngine::new(Arc::new(registry), 4);
        let result = engine.run(&suite, input_context, HashMap::new()).await.unwrap();
        let any_relevant = &result.criteria_results["any_relevant"];
        assert_eq!(any_relevant.status, CriterionStatus::Success);
        assert_eq!(any_relevant.value, json!(true));
        assert!(any_relevant.reason.contains("At least one batch"));
    }

    #[tokio::test]
    async fn missing_evaluator_without_default_errors() {
        let registry = EvaluatorRegistry::new();
        let suite = vec![Criterion::new("c", ResultType::Boolean, rule("nope"))];
        let engine = EvaluationEngine::new(Arc::new(registry), 2);
        let result = engine.run(&suite, Value::Null, HashMap::new()).await.unwrap();
        assert_eq!(result.criteria_results["c"].status, CriterionStatus::Error);
        assert_eq!(result.statistics.errored, 1);
    }

    #[test]
    fn resolve_path_dependencies_uses_shared_navigator() {
        let root = json!({"a": {"value": 1}});
        assert_eq!(navigate_dotted(&root, "a.value"), Some(&json!(1)));
    }
}
