//! Return-schema registry (§4.6)
//!
//! After each sandbox execution of a tool, the observed return value is
//! walked into a [`Shape`](crate::schema::Shape) and union-merged into a
//! running per-tool shape. A sample counter caps observation after N
//! samples (default 100) so schema churn doesn't grow unbounded on a
//! long-lived process; this mirrors how the tool dispatcher already caps
//! other per-tool counters rather than introducing a new capping idiom.

use crate::schema::Shape;
use parking_lot::RwLock;
use std::collections::HashMap;

const MAX_RECURSION_DEPTH: usize = 8;

struct Observed {
    shape: Shape,
    sample_count: usize,
}

/// Process-wide store of observed tool-return shapes (§5 "shared
/// resources... commutative union-merges, so concurrent observations
/// converge"), guarded by a single `RwLock` the way the in-memory
/// checkpoint saver guards its map.
pub struct ReturnSchemaRegistry {
    observed: RwLock<HashMap<String, Observed>>,
    max_samples: usize,
}

impl ReturnSchemaRegistry {
    pub fn new() -> Self {
        Self {
            observed: RwLock::new(HashMap::new()),
            max_samples: 100,
        }
    }

    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            observed: RwLock::new(HashMap::new()),
            max_samples,
        }
    }

    /// Record one observed return value for `tool_name`. A no-op once the
    /// tool has reached `max_samples` observations.
    pub fn observe(&self, tool_name: &str, value: &serde_json::Value) {
        let mut guard = self.observed.write();
        let entry = guard.entry(tool_name.to_string());
        match entry {
            std::collections::hash_map::Entry::Occupied(mut occ) => {
                let observed = occ.get_mut();
                if observed.sample_count >= self.max_samples {
                    return;
                }
                let new_shape = Shape::observe(value, MAX_RECURSION_DEPTH);
                observed.shape = observed.shape.merge(&new_shape);
                observed.sample_count += 1;
            }
            std::collections::hash_map::Entry::Vacant(vac) => {
                vac.insert(Observed {
                    shape: Shape::observe(value, MAX_RECURSION_DEPTH),
                    sample_count: 1,
                });
            }
        }
    }

    pub fn shape_for(&self, tool_name: &str) -> Option<Shape> {
        self.observed.read().get(tool_name).map(|o| o.shape.clone())
    }

    pub fn sample_count(&self, tool_name: &str) -> usize {
        self.observed
            .read()
            .get(tool_name)
            .map(|o| o.sample_count)
            .unwrap_or(0)
    }
}

impl Default for ReturnSchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scenario_5_observed_shape_enrichment() {
        let registry = ReturnSchemaRegistry::new();
        registry.observe("search", &json!({"hits": [{"title": "a", "score": 0.9}]}));
        registry.observe("search", &json!({"hits": [{"title": "b"}], "latency_ms": 12}));
        assert_eq!(registry.sample_count("search"), 2);
        let shape = registry.shape_for("search").unwrap();
        let crate::schema::Shape::Object { fields, .. } = shape else {
            panic!("expected object");
        };
        assert!(fields.get("latency_ms").unwrap().optional());
    }

    #[test]
    fn observation_stops_after_max_samples() {
        let registry = ReturnSchemaRegistry::with_max_samples(2);
        for i in 0..5 {
            registry.observe("t", &json!({"n": i}));
        }
        assert_eq!(registry.sample_count("t"), 2);
    }

    #[test]
    fn merging_identical_value_is_idempotent() {
        let registry = ReturnSchemaRegistry::with_max_samples(10);
        registry.observe("t", &json!({"a": 1}));
        let first = registry.shape_for("t").unwrap();
        registry.observe("t", &json!({"a": 2}));
        let second = registry.shape_for("t").unwrap();
        assert_eq!(first, second);
    }
}
