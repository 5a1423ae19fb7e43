//! Sandbox executor interface (§4.7, out of scope per §1: "the sandbox
//! implementation, treated as an opaque evaluate-this-source-and-return-a-
//! value service")
//!
//! The core only contracts three things about whatever sandbox backend is
//! plugged in: execution is bounded by a timeout, IO/native access are
//! disabled unless opted into, and tool calls issued from inside generated
//! code re-enter the dispatcher on the *same* thread/conversation context.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub timeout: Duration,
    pub allow_io: bool,
    pub allow_native: bool,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5_000),
            allow_io: false,
            allow_native: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox execution of '{function_name}' timed out after {timeout:?}")]
    Timeout {
        function_name: String,
        timeout: Duration,
    },
    #[error("sandbox execution of '{function_name}' failed: {message}")]
    ExecutionFailed { function_name: String, message: String },
}

/// `execute(source, function_name, args, limits) -> value | error` (§4.7).
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn execute(
        &self,
        source: &str,
        function_name: &str,
        args: Value,
        limits: SandboxLimits,
    ) -> Result<Value, SandboxError>;
}

/// An in-process stub sandbox for tests and local development: it does not
/// actually interpret Python, it only lets test code register a canned
/// return value per `function_name` so dispatcher/codegen wiring can be
/// exercised without a real interpreter. A production deployment supplies a
/// genuine `SandboxExecutor` (out of scope here, §1).
pub struct StubSandbox {
    responses: std::sync::Mutex<std::collections::HashMap<String, Value>>,
}

impl StubSandbox {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn stub(&self, function_name: impl Into<String>, value: Value) {
        self.responses.lock().unwrap().insert(function_name.into(), value);
    }
}

impl Default for StubSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxExecutor for StubSandbox {
    async fn execute(
        &self,
        _source: &str,
        function_name: &str,
        _args: Value,
        _limits: SandboxLimits,
    ) -> Result<Value, SandboxError> {
        self.responses
            .lock()
            .unwrap()
            .get(function_name)
            .cloned()
            .ok_or_else(|| SandboxError::ExecutionFailed {
                function_name: function_name.to_string(),
                message: "no stubbed response registered".to_string(),
            })
    }
}
