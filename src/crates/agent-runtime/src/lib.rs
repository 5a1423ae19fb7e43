//! Agent Execution Core: a two-phase state-graph runtime for code-acting agents
//!
//! This crate coordinates a React planning loop, a CodeAct code-generation
//! sub-agent, a sandboxed executor, an evaluation engine that drives prompt
//! assembly, an experience store with fast-intent short-circuiting, and a
//! trigger scheduler that re-enters conversations on schedule or event.
//! It is built on top of the `langgraph-core` graph/state substrate.

pub mod codegen;
pub mod config;
pub mod dispatcher;
pub mod eval;
pub mod experience;
pub mod hooks;
pub mod prompt;
pub mod sandbox;
pub mod schema;
pub mod spi;
pub mod state;
pub mod tool;
pub mod trigger;
pub mod version;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during orchestration
#[derive(Debug, Error)]
pub enum AgentRuntimeError {
    /// Task not found
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Workflow execution error
    #[error("Workflow execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid state transition
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// General error
    #[error("AgentRuntime error: {0}")]
    General(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request failed schema validation or named an unknown tool/node
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A suite, trigger, or experience id did not resolve to a record
    #[error("not found: {0}")]
    NotFound(String),

    /// A model call, sandbox execution, or evaluator batch exceeded its deadline
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// The calling context was cancelled before completion
    #[error("cancelled")]
    Cancelled,

    /// A trigger was already in a terminal state, or a `replace` merge raced
    #[error("conflict: {0}")]
    Conflict(String),

    /// A criterion could not run because an upstream dependency ended in ERROR
    #[error("dependency failed: {0}")]
    DependencyFailed(String),

    /// An external SPI (search, reply, repository, sandbox) returned an error
    #[error("external failure: {0}")]
    ExternalFailure(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, AgentRuntimeError>;

/// The seven error kinds a caller at the API boundary needs to distinguish.
///
/// Internal code raises typed, component-specific errors (see each module's
/// own error enum); this taxonomy is the stable vocabulary those errors are
/// classified into wherever a result crosses into a `ToolResponseMessage`
/// payload or a final assistant message, so failures are explainable to a
/// user without leaking a stack trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Timeout,
    Cancelled,
    Conflict,
    DependencyFailed,
    ExternalFailure,
}

impl AgentRuntimeError {
    /// Classify this error into the stable, user-facing error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentRuntimeError::InvalidInput(_) => ErrorKind::InvalidInput,
            AgentRuntimeError::NotFound(_) | AgentRuntimeError::TaskNotFound(_) => {
                ErrorKind::NotFound
            }
            AgentRuntimeError::Timeout(_) => ErrorKind::Timeout,
            AgentRuntimeError::Cancelled => ErrorKind::Cancelled,
            AgentRuntimeError::Conflict(_) | AgentRuntimeError::InvalidStateTransition { .. } => {
                ErrorKind::Conflict
            }
            AgentRuntimeError::DependencyFailed(_) => ErrorKind::DependencyFailed,
            AgentRuntimeError::ExternalFailure(_) => ErrorKind::ExternalFailure,
            AgentRuntimeError::ExecutionFailed(_)
            | AgentRuntimeError::General(_)
            | AgentRuntimeError::Serialization(_) => ErrorKind::ExternalFailure,
        }
    }
}

/// Get version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_classifies_the_boundary_taxonomy() {
        assert_eq!(AgentRuntimeError::InvalidInput("bad".into()).kind(), ErrorKind::InvalidInput);
        assert_eq!(AgentRuntimeError::TaskNotFound("t1".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            AgentRuntimeError::Timeout(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(AgentRuntimeError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            AgentRuntimeError::InvalidStateTransition {
                from: "a".into(),
                to: "b".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(AgentRuntimeError::DependencyFailed("c1".into()).kind(), ErrorKind::DependencyFailed);
        assert_eq!(AgentRuntimeError::General("boom".into()).kind(), ErrorKind::ExternalFailure);
    }

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }
}
