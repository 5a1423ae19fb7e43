//! Model interceptor chain
//!
//! `BEFORE_MODEL`/`AFTER_MODEL` hooks transform the request/response at the
//! state level; the model call itself is wrapped by a *separate* chain of
//! [`ModelInterceptor`]s so concerns like caching, retries, or response
//! substitution (used by tests and by the fast-intent short-circuit) can
//! compose around the call without each one reimplementing the others. This
//! mirrors the middleware-chain shape the tool-runtime substrate already
//! uses for async retry/timeout wrapping.

use async_trait::async_trait;
use langgraph_core::messages::Message;
use langgraph_core::tool::ToolCall;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A request about to go to the model: the message history plus the tool
/// schemas currently available for this phase.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<Value>,
}

/// What the model (or a substituting interceptor) produced for this turn.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Error)]
pub enum ModelChainError {
    #[error("model call failed: {0}")]
    CallFailed(String),
}

pub type ModelChainResult = Result<ModelResponse, ModelChainError>;

/// The terminal handler a chain of interceptors wraps — normally "call the
/// configured LLM transport", injected from outside this crate since the
/// transport itself is out of scope (see spec §1).
pub type NextHandler =
    Arc<dyn Fn(ModelRequest) -> futures::future::BoxFuture<'static, ModelChainResult> + Send + Sync>;

/// One link in the model-call middleware chain.
///
/// An interceptor may inspect/rewrite the request, call `next`, and
/// inspect/rewrite the response — or skip `next` entirely and substitute a
/// response outright (used by tests and by request replay).
#[async_trait]
pub trait ModelInterceptor: Send + Sync {
    async fn intercept(&self, request: ModelRequest, next: NextHandler) -> ModelChainResult;
}

/// Compose a list of interceptors with a terminal handler into a single
/// callable chain, innermost-first (the first interceptor in the list is
/// the outermost wrapper and runs first).
pub fn build_chain(interceptors: Vec<Arc<dyn ModelInterceptor>>, terminal: NextHandler) -> NextHandler {
    interceptors.into_iter().rev().fold(terminal, |next, interceptor| {
        Arc::new(move |request: ModelRequest| {
            let interceptor = interceptor.clone();
            let next = next.clone();
            Box::pin(async move { interceptor.intercept(request, next).await })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Uppercase;
    #[async_trait]
    impl ModelInterceptor for Uppercase {
        async fn intercept(&self, request: ModelRequest, next: NextHandler) -> ModelChainResult {
            let mut response = next(request).await?;
            response.text = response.text.map(|t| t.to_uppercase());
            Ok(response)
        }
    }

    struct Substitute;
    #[async_trait]
    impl ModelInterceptor for Substitute {
        async fn intercept(&self, _request: ModelRequest, _next: NextHandler) -> ModelChainResult {
            Ok(ModelResponse {
                text: Some("cached".to_string()),
                tool_calls: vec![],
            })
        }
    }

    fn terminal_echo() -> NextHandler {
        Arc::new(|_req| {
            Box::pin(async move {
                Ok(ModelResponse {
                    text: Some("hi".to_string()),
                    tool_calls: vec![],
                })
            })
        })
    }

    #[tokio::test]
    async fn chain_applies_outer_transform() {
        let chain = build_chain(vec![Arc::new(Uppercase)], terminal_echo());
        let response = chain(ModelRequest {
            messages: vec![],
            tools: vec![],
        })
        .await
        .unwrap();
        assert_eq!(response.text.as_deref(), Some("HI"));
    }

    #[tokio::test]
    async fn interceptor_can_short_circuit_without_calling_next() {
        let chain = build_chain(vec![Arc::new(Substitute), Arc::new(Uppercase)], terminal_echo());
        let response = chain(ModelRequest {
            messages: vec![],
            tools: vec![],
        })
        .await
        .unwrap();
        // Substitute is outermost here, so it never calls Uppercase/terminal.
        assert_eq!(response.text.as_deref(), Some("cached"));
    }
}
