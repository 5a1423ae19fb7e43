//! Tool Dispatcher & Sandbox bridge (§4.7)
//!
//! Resolves a call by name against the [`ToolDefRegistry`], validates and
//! defaults its arguments, invokes the tool's runtime contract, feeds the
//! return through the Return-Schema Registry, and emits a `tracing` span
//! per dispatch the way the tool substrate instruments its own calls
//! (`orca::executor::adapter::ToolAdapter` bridges a tool trait over a
//! bridge the same way this bridges a `ToolDef` over a `ToolRuntime`).

pub mod builtins;

use crate::codegen::registry::ReturnSchemaRegistry;
use crate::tool::{ToolDefRegistry, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("tool '{tool}' execution failed: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("no runtime registered for tool '{0}'")]
    NoRuntime(String),
}

/// A tool's runtime contract: `(args, context) → result | error` (§3 Tool).
#[async_trait]
pub trait ToolRuntime: Send + Sync {
    async fn call(&self, args: Value, context: &DispatchContext) -> Result<Value, DispatchError>;
}

/// Per-call context a runtime may need (thread id for re-entrant sandbox
/// calls, per §4.7 "same thread's context").
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub thread_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    Failure,
}

/// Resolves, validates, invokes, and records one tool call.
pub struct ToolDispatcher {
    tools: Arc<ToolDefRegistry>,
    runtimes: HashMap<String, Arc<dyn ToolRuntime>>,
    return_schemas: Arc<ReturnSchemaRegistry>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolDefRegistry>, return_schemas: Arc<ReturnSchemaRegistry>) -> Self {
        Self {
            tools,
            runtimes: HashMap::new(),
            return_schemas,
        }
    }

    /// Bind a runtime implementation to a registered tool's canonical name.
    pub fn bind_runtime(&mut self, tool_name: impl Into<String>, runtime: Arc<dyn ToolRuntime>) {
        self.runtimes.insert(tool_name.into(), runtime);
    }

    pub async fn dispatch(
        &self,
        name_or_alias: &str,
        args: Value,
        context: &DispatchContext,
    ) -> Result<Value, DispatchError> {
        let tool = self
            .tools
            .get(name_or_alias)
            .ok_or_else(|| ToolError::UnknownTool(name_or_alias.to_string()))?;
        tool.validate_args(&args)?;
        let args = tool.with_defaults(args);

        let runtime = self
            .runtimes
            .get(&tool.name)
            .ok_or_else(|| DispatchError::NoRuntime(tool.name.clone()))?;

        let span = tracing::info_span!("tool.dispatch", tool.name = %tool.name, thread_id = %context.thread_id);
        let _enter = span.enter();
        let started = Instant::now();
        let result = runtime.call(args, context).await;
        let duration_ms = started.elapsed().as_millis();

        match &result {
            Ok(value) => {
                tracing::info!(duration_ms, outcome = "success");
                self.return_schemas.observe(&tool.name, value);
            }
            Err(e) => {
                tracing::warn!(duration_ms, outcome = "failure", error = %e);
            }
        }
        result
    }

    pub fn outcome_of(result: &Result<Value, DispatchError>) -> DispatchOutcome {
        match result {
            Ok(_) => DispatchOutcome::Success,
            Err(_) => DispatchOutcome::Failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Shape;
    use crate::tool::{Parameter, ToolDef};
    use serde_json::json;

    struct Echo;
    #[async_trait]
    impl ToolRuntime for Echo {
        async fn call(&self, args: Value, _ctx: &DispatchContext) -> Result<Value, DispatchError> {
            Ok(args)
        }
    }

    fn registry() -> Arc<ToolDefRegistry> {
        let mut registry = ToolDefRegistry::new();
        registry
            .register(
                ToolDef::new("search", "search").with_parameters(vec![Parameter::required(
                    "query",
                    Shape::observe(&json!("x"), 1),
                )]),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn dispatch_resolves_validates_and_feeds_return_schema() {
        let tools = registry();
        let schemas = Arc::new(ReturnSchemaRegistry::new());
        let mut dispatcher = ToolDispatcher::new(tools, schemas.clone());
        dispatcher.bind_runtime("search", Arc::new(Echo));
        let ctx = DispatchContext {
            thread_id: "t1".to_string(),
        };
        let result = dispatcher
            .dispatch("search", json!({"query": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, json!({"query": "hi"}));
        assert_eq!(schemas.sample_count("search"), 1);
    }

    #[tokio::test]
    async fn dispatch_rejects_invalid_args_before_invoking_runtime() {
        let tools = registry();
        let schemas = Arc::new(ReturnSchemaRegistry::new());
        let mut dispatcher = ToolDispatcher::new(tools, schemas);
        dispatcher.bind_runtime("search", Arc::new(Echo));
        let ctx = DispatchContext {
            thread_id: "t1".to_string(),
        };
        let err = dispatcher.dispatch("search", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::Tool(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let tools = registry();
        let schemas = Arc::new(ReturnSchemaRegistry::new());
        let dispatcher = ToolDispatcher::new(tools, schemas);
        let ctx = DispatchContext {
            thread_id: "t1".to_string(),
        };
        let err = dispatcher.dispatch("ghost", json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, DispatchError::Tool(ToolError::UnknownTool(_))));
    }
}
