//! Conversation state (`OverAllState`) and the per-key merge-strategy contract
//!
//! The Agent Execution Core keeps one JSON object per conversation thread.
//! Every node and hook in the graph produces a *delta map* — a partial update
//! — rather than a full replacement, and the engine merges each key of that
//! delta into the running state using the key's declared [`MergeStrategy`].
//! This is the same delta/reducer idea `langgraph_core::state::StateSchema`
//! already provides; `OverAllState` is the agent-specific instance of it,
//! with the reserved keys and default strategies this runtime requires.

use langgraph_core::state::{AppendReducer, OverwriteReducer, Reducer, StateError, StateSchema};
use serde_json::Value;
use std::collections::HashMap;

/// Reserved top-level state keys with a fixed meaning to the runtime.
pub mod keys {
    /// Ordered sequence of `Message` (append-merged).
    pub const MESSAGES: &str = "messages";
    /// Latest raw user text for this turn (overwrite-merged).
    pub const INPUT: &str = "input";
    /// Next-node hint consumed by the graph engine's conditional edges.
    pub const JUMP_TO: &str = "jump_to";

    /// Per-criterion result key suffixes, joined to the criterion name as
    /// `"{criterion}_result"` / `"{criterion}_status"` / `"{criterion}_value"`.
    pub const RESULT_SUFFIX: &str = "_result";
    pub const STATUS_SUFFIX: &str = "_status";
    pub const VALUE_SUFFIX: &str = "_value";
}

/// Build the `<criterion>_result` / `_status` / `_value` key names for a criterion.
pub fn criterion_keys(criterion_name: &str) -> (String, String, String) {
    (
        format!("{criterion_name}{}", keys::RESULT_SUFFIX),
        format!("{criterion_name}{}", keys::STATUS_SUFFIX),
        format!("{criterion_name}{}", keys::VALUE_SUFFIX),
    )
}

/// The merge strategy a state key was declared with.
///
/// This mirrors `langgraph_core::state::Reducer` but is kept as a small,
/// serializable enum so hook/criterion authors can declare a strategy
/// declaratively (e.g. from config) instead of constructing a reducer object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MergeStrategy {
    /// Last write wins. Used for the reserved `jump_to`, `input`, and all
    /// `<criterion>_status` / `<criterion>_value` keys.
    Replace,
    /// Concatenate lists. Used for `messages` and any other key a module
    /// declares as history/log-shaped.
    Append,
}

impl MergeStrategy {
    fn as_reducer(self) -> Box<dyn Reducer> {
        match self {
            MergeStrategy::Replace => Box::new(OverwriteReducer),
            MergeStrategy::Append => Box::new(AppendReducer),
        }
    }
}

/// Conversation state keyed by `thread_id`, with per-key merge strategies.
///
/// `OverAllState` owns the JSON object that is threaded through the graph
/// engine's node layers. It is deliberately thin: the actual merge logic is
/// delegated to `langgraph_core::state::StateSchema` so a custom
/// `CheckpointSaver` can snapshot the same `Value` the graph engine already
/// understands.
pub struct OverAllState {
    pub thread_id: String,
    schema: StateSchema,
    value: Value,
}

impl OverAllState {
    /// Start a fresh state for `thread_id` with the reserved keys registered
    /// and an empty object as the initial value.
    pub fn new(thread_id: impl Into<String>) -> Self {
        let mut schema = StateSchema::new();
        schema.add_field(keys::MESSAGES, MergeStrategy::Append.as_reducer());
        schema.add_field(keys::INPUT, MergeStrategy::Replace.as_reducer());
        schema.add_field(keys::JUMP_TO, MergeStrategy::Replace.as_reducer());
        Self {
            thread_id: thread_id.into(),
            schema,
            value: Value::Object(serde_json::Map::new()),
        }
    }

    /// Restore state from a previously checkpointed value.
    pub fn from_value(thread_id: impl Into<String>, value: Value) -> Self {
        let mut state = Self::new(thread_id);
        state.value = value;
        state
    }

    /// Declare the merge strategy for a non-reserved key, e.g. a criterion's
    /// `<name>_result` key (append, for suites that accumulate history) or a
    /// custom accumulator a hook module wants merged a particular way.
    pub fn declare_field(&mut self, key: impl Into<String>, strategy: MergeStrategy) {
        self.schema.add_field(key, strategy.as_reducer());
    }

    /// Declare the three keys a criterion writes, defaulting all of them to
    /// `Replace` — a criterion overwrites its own result each run, it never
    /// accumulates history under its own name.
    pub fn declare_criterion(&mut self, criterion_name: &str) {
        let (result_key, status_key, value_key) = criterion_keys(criterion_name);
        self.declare_field(result_key, MergeStrategy::Replace);
        self.declare_field(status_key, MergeStrategy::Replace);
        self.declare_field(value_key, MergeStrategy::Replace);
    }

    /// Merge a node/hook's delta map into this state using each key's
    /// declared strategy (overwrite by default for keys with no declaration).
    pub fn merge(&mut self, delta: &Value) -> Result<(), StateError> {
        self.schema.apply(&mut self.value, delta)
    }

    /// Merge several sibling deltas produced by a parallel graph layer.
    ///
    /// Conflicts on a `Replace` key are last-writer-wins, resolved
    /// deterministically by the caller-provided order (the engine orders
    /// siblings by node name, see `langgraph_core`'s pregel loop).
    pub fn merge_parallel(&mut self, deltas: &[Value]) -> Result<(), StateError> {
        for delta in deltas {
            self.merge(delta)?;
        }
        Ok(())
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Read `jump_to`, if the most recent node/hook set it.
    pub fn jump_to(&self) -> Option<&str> {
        self.get(keys::JUMP_TO).and_then(|v| v.as_str())
    }

    /// Clear `jump_to` after the engine has consumed it for this turn, so a
    /// stale hint from a prior turn never leaks into the next one.
    pub fn clear_jump_to(&mut self) {
        if let Value::Object(map) = &mut self.value {
            map.remove(keys::JUMP_TO);
        }
    }
}

/// Build a single-key delta map, the shape every node/hook returns.
pub fn delta(key: impl Into<String>, value: Value) -> Value {
    let mut map = HashMap::new();
    map.insert(key.into(), value);
    serde_json::to_value(map).expect("HashMap<String, Value> always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_append_across_turns() {
        let mut state = OverAllState::new("t1");
        state
            .merge(&json!({"messages": ["hello"]}))
            .expect("merge");
        state
            .merge(&json!({"messages": ["world"]}))
            .expect("merge");
        assert_eq!(
            state.get("messages").unwrap().as_array().unwrap().len(),
            2
        );
    }

    #[test]
    fn jump_to_overwrites_and_clears() {
        let mut state = OverAllState::new("t1");
        state.merge(&json!({"jump_to": "tool"})).unwrap();
        assert_eq!(state.jump_to(), Some("tool"));
        state.merge(&json!({"jump_to": "model"})).unwrap();
        assert_eq!(state.jump_to(), Some("model"));
        state.clear_jump_to();
        assert_eq!(state.jump_to(), None);
    }

    #[test]
    fn criterion_keys_replace_not_append() {
        let mut state = OverAllState::new("t1");
        state.declare_criterion("is_fuzzy");
        state
            .merge(&json!({"is_fuzzy_value": true, "is_fuzzy_status": "SUCCESS"}))
            .unwrap();
        state
            .merge(&json!({"is_fuzzy_value": false, "is_fuzzy_status": "SUCCESS"}))
            .unwrap();
        assert_eq!(state.get("is_fuzzy_value"), Some(&json!(false)));
    }

    #[test]
    fn parallel_siblings_merge_in_order() {
        let mut state = OverAllState::new("t1");
        state.merge(&json!({"messages": []})).unwrap();
        state
            .merge_parallel(&[
                json!({"messages": ["a_started"]}),
                json!({"messages": ["b_started"]}),
            ])
            .unwrap();
        assert_eq!(
            state.get("messages").unwrap().as_array().unwrap().len(),
            2
        );
    }
}
