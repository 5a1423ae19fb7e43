//! Hook pipeline and model-call interceptor chain
//!
//! Hooks are the seam through which the evaluation engine, prompt assembler,
//! experience store, and fast-intent matcher all attach to the React/CodeAct
//! graph without the graph engine knowing anything about them. A hook
//! registers at one [`HookPosition`] and declares which [`Phase`] it applies
//! to; the [`HookRegistry`] groups hooks by `(position, phase)` and runs them
//! in ascending `priority` order, merging each hook's delta map into state
//! before the next hook observes it — the same "explicit registration, no
//! reflection" pattern the rest of this codebase uses for tools and graph
//! nodes (see `langgraph_core::tool::ToolRegistry`).

pub mod model_chain;

use crate::state::OverAllState;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

pub use model_chain::{ModelInterceptor, ModelRequest, ModelResponse};

/// Where in the agent turn a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum HookPosition {
    BeforeAgent,
    BeforeModel,
    AfterModel,
    AfterAgent,
    ToolIntercept,
}

/// Which nested agent a hook is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Phase {
    React,
    CodeAct,
}

/// The node a hook may redirect the turn to via its delta's `jump_to` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JumpTarget {
    Model,
    Tool,
    End,
}

impl JumpTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            JumpTarget::Model => "model",
            JumpTarget::Tool => "tool",
            JumpTarget::End => "END",
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook '{hook}' set jump_to={actual} but only declared {declared:?}")]
    UndeclaredJump {
        hook: String,
        actual: String,
        declared: Vec<String>,
    },
    #[error("hook '{0}' failed: {1}")]
    Failed(String, String),
    #[error(transparent)]
    State(#[from] langgraph_core::state::StateError),
}

/// A single pre/post hook in the pipeline.
///
/// `run` receives the state *as of just before this hook* and returns a
/// delta map to merge — hooks never mutate state directly, matching the
/// "deltas + merge" design note for the whole runtime.
#[async_trait]
pub trait Hook: Send + Sync {
    fn name(&self) -> &str;
    fn position(&self) -> HookPosition;
    fn phase(&self) -> Phase;
    /// Lower runs first within the same `(position, phase)` group.
    fn priority(&self) -> i32 {
        0
    }
    /// The jump targets this hook is allowed to set. The registry rejects
    /// registration of a hook that later sets an undeclared target, turning
    /// a silent typo into a registration-time error instead of an
    /// unreachable graph discovered at runtime.
    fn declared_jumps(&self) -> Vec<JumpTarget> {
        Vec::new()
    }

    async fn run(&self, state: &OverAllState) -> Result<Value, HookError>;
}

/// Registers hooks grouped by `(position, phase)` and runs them in priority
/// order, merging each returned delta before the next hook sees state.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<(HookPosition, Phase), Vec<Box<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook. Hooks within the same group are kept sorted by
    /// priority so `run_position` never has to re-sort on every call.
    pub fn register(&mut self, hook: Box<dyn Hook>) {
        let key = (hook.position(), hook.phase());
        let bucket = self.hooks.entry(key).or_default();
        bucket.push(hook);
        bucket.sort_by_key(|h| h.priority());
    }

    /// Run every hook registered at `position` for `phase`, feeding each
    /// hook's merged delta forward to the next. Returns the accumulated
    /// delta across all hooks in the group (the caller merges it into the
    /// outer graph state once, the same way a single node's delta is
    /// merged).
    pub async fn run_position(
        &self,
        position: HookPosition,
        phase: Phase,
        state: &mut OverAllState,
    ) -> Result<Value, HookError> {
        let mut accumulated = serde_json::Map::new();
        let Some(bucket) = self.hooks.get(&(position, phase)) else {
            return Ok(Value::Object(accumulated));
        };

        for hook in bucket {
            let delta = hook.run(state).await?;
            if let Some(jump) = delta.get("jump_to").and_then(|v| v.as_str()) {
                let declared = hook.declared_jumps();
                let allowed = declared.iter().any(|j| j.as_str() == jump);
                if !declared.is_empty() && !allowed {
                    return Err(HookError::UndeclaredJump {
                        hook: hook.name().to_string(),
                        actual: jump.to_string(),
                        declared: declared.iter().map(|j| j.as_str().to_string()).collect(),
                    });
                }
            }
            state.merge(&delta)?;
            merge_json_object(&mut accumulated, &delta);
        }

        Ok(Value::Object(accumulated))
    }
}

fn merge_json_object(into: &mut serde_json::Map<String, Value>, delta: &Value) {
    if let Some(obj) = delta.as_object() {
        for (k, v) in obj {
            into.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct JumpsToTool;
    #[async_trait]
    impl Hook for JumpsToTool {
        fn name(&self) -> &str {
            "fast_intent"
        }
        fn position(&self) -> HookPosition {
            HookPosition::BeforeAgent
        }
        fn phase(&self) -> Phase {
            Phase::React
        }
        fn declared_jumps(&self) -> Vec<JumpTarget> {
            vec![JumpTarget::Tool, JumpTarget::End]
        }
        async fn run(&self, _state: &OverAllState) -> Result<Value, HookError> {
            Ok(json!({"jump_to": "tool"}))
        }
    }

    struct Misbehaving;
    #[async_trait]
    impl Hook for Misbehaving {
        fn name(&self) -> &str {
            "misbehaving"
        }
        fn position(&self) -> HookPosition {
            HookPosition::BeforeAgent
        }
        fn phase(&self) -> Phase {
            Phase::React
        }
        fn declared_jumps(&self) -> Vec<JumpTarget> {
            vec![JumpTarget::End]
        }
        async fn run(&self, _state: &OverAllState) -> Result<Value, HookError> {
            Ok(json!({"jump_to": "tool"}))
        }
    }

    #[tokio::test]
    async fn declared_jump_is_allowed() {
        let mut registry = HookRegistry::new();
        registry.register(Box::new(JumpsToTool));
        let mut state = OverAllState::new("t1");
        let delta = registry
            .run_position(HookPosition::BeforeAgent, Phase::React, &mut state)
            .await
            .unwrap();
        assert_eq!(delta["jump_to"], "tool");
        assert_eq!(state.jump_to(), Some("tool"));
    }

    #[tokio::test]
    async fn undeclared_jump_is_rejected_at_run_time() {
        let mut registry = HookRegistry::new();
        registry.register(Box::new(Misbehaving));
        let mut state = OverAllState::new("t1");
        let result = registry
            .run_position(HookPosition::BeforeAgent, Phase::React, &mut state)
            .await;
        assert!(matches!(result, Err(HookError::UndeclaredJump { .. })));
    }

    #[tokio::test]
    async fn priority_orders_hooks_ascending() {
        struct Appender(i32, HookPosition);
        #[async_trait]
        impl Hook for Appender {
            fn name(&self) -> &str {
                "appender"
            }
            fn position(&self) -> HookPosition {
                self.1
            }
            fn phase(&self) -> Phase {
                Phase::React
            }
            fn priority(&self) -> i32 {
                self.0
            }
            async fn run(&self, _state: &OverAllState) -> Result<Value, HookError> {
                Ok(json!({"messages": [self.0]}))
            }
        }

        let mut registry = HookRegistry::new();
        registry.register(Box::new(Appender(5, HookPosition::BeforeModel)));
        registry.register(Box::new(Appender(1, HookPosition::BeforeModel)));
        let mut state = OverAllState::new("t1");
        registry
            .run_position(HookPosition::BeforeModel, Phase::React, &mut state)
            .await
            .unwrap();
        let messages = state.get("messages").unwrap().as_array().unwrap();
        assert_eq!(messages, &vec![json!(1), json!(5)]);
    }
}
