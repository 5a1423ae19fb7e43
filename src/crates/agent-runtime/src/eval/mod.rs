//! Evaluation Engine (§4.3)
//!
//! Ties `condition`, `criterion`, `aggregation`, and `evaluator` together
//! into a runnable DAG executor: [`engine::EvaluationEngine`] computes
//! levels by longest-dependency-path, fans each level out over a bounded
//! worker pool, and writes results into an [`EvaluationResult`] store
//! facade the way a compiled graph layer writes deltas into `OverAllState`.

pub mod aggregation;
pub mod condition;
pub mod criterion;
pub mod engine;
pub mod evaluator;

pub use engine::{EvaluationEngine, EvaluationError, EvaluationResult, EvaluationStatistics};
