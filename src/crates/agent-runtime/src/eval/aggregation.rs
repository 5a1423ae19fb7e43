//! Built-in batch aggregation strategies (§4.3 table)

use super::criterion::{CriterionResult, CriterionStatus};
use serde_json::{json, Value};

/// Identifies one of the built-in aggregation strategies by the string id
/// a `Criterion.batching_config.aggregation_strategy` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationStrategy {
    AnyTrue,
    AllTrue,
    MergeLists,
}

impl AggregationStrategy {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "ANY_TRUE" => Some(Self::AnyTrue),
            "ALL_TRUE" => Some(Self::AllTrue),
            "MERGE_LISTS" => Some(Self::MergeLists),
            _ => None,
        }
    }

    /// Fold a set of per-batch results into one aggregate result.
    ///
    /// Any `ERROR` batch propagates as `ERROR`; failing that, any `TIMEOUT`
    /// batch propagates as `TIMEOUT` — both checked before the strategy's own
    /// value/empty-collection logic runs, per the table's "error handling"
    /// column. Order of `batch_results` must not affect the outcome: every
    /// strategy here is defined to be commutative over its inputs.
    pub fn aggregate(self, batch_results: &[CriterionResult]) -> (CriterionStatus, Value, String) {
        if let Some(status) = first_non_success_status(batch_results) {
            let reason = match status {
                CriterionStatus::Error => "a batch evaluator returned ERROR",
                CriterionStatus::Timeout => "a batch evaluator timed out",
                _ => unreachable!(),
            };
            return (status, Value::Null, reason.to_string());
        }

        match self {
            AggregationStrategy::AnyTrue => {
                if batch_results.is_empty() {
                    return (CriterionStatus::Success, json!(false), "no batches to evaluate".into());
                }
                let any = batch_results.iter().any(|r| r.value.as_bool() == Some(true));
                let reason = if any {
                    "At least one batch matched".to_string()
                } else {
                    "No batch matched".to_string()
                };
                (CriterionStatus::Success, json!(any), reason)
            }
            AggregationStrategy::AllTrue => {
                if batch_results.is_empty() {
                    return (CriterionStatus::Success, json!(true), "vacuously true: no batches".into());
                }
                let all = batch_results.iter().all(|r| r.value.as_bool() == Some(true));
                (CriterionStatus::Success, json!(all), format!("{} of {} batches matched", batch_results.iter().filter(|r| r.value.as_bool() == Some(true)).count(), batch_results.len()))
            }
            AggregationStrategy::MergeLists => {
                if batch_results.is_empty() {
                    return (CriterionStatus::Success, json!([]), "no batches to merge".into());
                }
                let mut seen = Vec::new();
                for result in batch_results {
                    if let Some(items) = result.value.as_array() {
                        for item in items {
                            if !seen.contains(item) {
                                seen.push(item.clone());
                            }
                        }
                    }
                }
                let count = seen.len();
                (CriterionStatus::Success, Value::Array(seen), format!("merged {count} unique items"))
            }
        }
    }
}

fn first_non_success_status(results: &[CriterionResult]) -> Option<CriterionStatus> {
    if results.iter().any(|r| r.status == CriterionStatus::Error) {
        return Some(CriterionStatus::Error);
    }
    if results.iter().any(|r| r.status == CriterionStatus::Timeout) {
        return Some(CriterionStatus::Timeout);
    }
    None
}
