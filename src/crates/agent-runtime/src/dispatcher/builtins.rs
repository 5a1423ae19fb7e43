//! Built-in tool runtimes (§4.7 "Built-in tools")
//!
//! Each struct here is a thin [`ToolRuntime`] adapter over one of the
//! collaborators named in §6: the CodeGen sub-agent, the sandbox, and the
//! SPI traits (`search`, `reply`, `notification`, `subscribe_trigger`).

use super::{DispatchContext, DispatchError, ToolRuntime};
use crate::codegen::prompt::{GeneratedFunction, GeneratorForm};
use crate::codegen::{CodeGenError, CodeGenRequest, CodeGenSubAgent};
use crate::sandbox::{SandboxExecutor, SandboxLimits};
use crate::spi::{NotificationChannel, ReplyChannel, SearchKind, SearchProvider, SearchRequest};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

impl From<CodeGenError> for DispatchError {
    fn from(e: CodeGenError) -> Self {
        DispatchError::ExecutionFailed {
            tool: "write_code".to_string(),
            message: e.to_string(),
        }
    }
}

/// Per-thread generated-function history, the "current conversation's
/// generated-functions list" §4.7 refers to.
#[derive(Default)]
pub struct GeneratedFunctionsStore {
    by_thread: RwLock<HashMap<String, Vec<GeneratedFunction>>>,
}

impl GeneratedFunctionsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, thread_id: &str) -> Vec<GeneratedFunction> {
        self.by_thread.read().get(thread_id).cloned().unwrap_or_default()
    }

    pub fn record(&self, thread_id: &str, function: GeneratedFunction) {
        self.by_thread
            .write()
            .entry(thread_id.to_string())
            .or_default()
            .push(function);
    }

    pub fn source_for(&self, thread_id: &str, function_name: &str) -> Option<String> {
        self.by_thread
            .read()
            .get(thread_id)?
            .iter()
            .rev()
            .find(|f| f.function_name == function_name)
            .map(|f| f.source.clone())
    }
}

fn args_field<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.as_object().and_then(|m| m.get(key))
}

struct WriteCodeRuntime {
    codegen: Arc<CodeGenSubAgent>,
    history: Arc<GeneratedFunctionsStore>,
    form: GeneratorForm,
}

#[async_trait]
impl ToolRuntime for WriteCodeRuntime {
    async fn call(&self, args: Value, context: &DispatchContext) -> Result<Value, DispatchError> {
        let requirement = args_field(&args, "requirement")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let function_name = args_field(&args, "function_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let parameters: Vec<String> = args_field(&args, "parameters")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let history = self.history.history(&context.thread_id);
        let request = CodeGenRequest {
            form: self.form,
            requirement,
            function_name: function_name.clone(),
            parameters,
        };
        let source = self.codegen.generate(request, &history).await?;
        self.history.record(
            &context.thread_id,
            GeneratedFunction {
                function_name: function_name.clone(),
                source: source.clone(),
            },
        );
        Ok(json!({"function_name": function_name, "source": source}))
    }
}

/// `write_code` (returns a value).
pub fn write_code_runtime(codegen: Arc<CodeGenSubAgent>, history: Arc<GeneratedFunctionsStore>) -> Arc<dyn ToolRuntime> {
    Arc::new(WriteCodeRuntime {
        codegen,
        history,
        form: GeneratorForm::CodeGenerator,
    })
}

/// `write_condition_code` (must return boolean).
pub fn write_condition_code_runtime(
    codegen: Arc<CodeGenSubAgent>,
    history: Arc<GeneratedFunctionsStore>,
) -> Arc<dyn ToolRuntime> {
    Arc::new(WriteCodeRuntime {
        codegen,
        history,
        form: GeneratorForm::ConditionCodeGenerator,
    })
}

pub struct ExecuteCodeRuntime {
    sandbox: Arc<dyn SandboxExecutor>,
    history: Arc<GeneratedFunctionsStore>,
    limits: SandboxLimits,
}

impl ExecuteCodeRuntime {
    pub fn new(sandbox: Arc<dyn SandboxExecutor>, history: Arc<GeneratedFunctionsStore>, limits: SandboxLimits) -> Arc<dyn ToolRuntime> {
        Arc::new(Self {
            sandbox,
            history,
            limits,
        })
    }
}

#[async_trait]
impl ToolRuntime for ExecuteCodeRuntime {
    async fn call(&self, args: Value, context: &DispatchContext) -> Result<Value, DispatchError> {
        let function_name = args_field(&args, "function_name")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::ExecutionFailed {
                tool: "execute_code".to_string(),
                message: "missing 'function_name'".to_string(),
            })?
            .to_string();
        let call_args = args_field(&args, "args").cloned().unwrap_or(Value::Null);
        let source = self
            .history
            .source_for(&context.thread_id, &function_name)
            .ok_or_else(|| DispatchError::ExecutionFailed {
                tool: "execute_code".to_string(),
                message: format!("no generated source for '{function_name}' in this conversation"),
            })?;
        self.sandbox
            .execute(&source, &function_name, call_args, self.limits)
            .await
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: "execute_code".to_string(),
                message: e.to_string(),
            })
    }
}

pub struct SearchRuntime {
    provider: Arc<dyn SearchProvider>,
}

impl SearchRuntime {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Arc<dyn ToolRuntime> {
        Arc::new(Self { provider })
    }
}

#[async_trait]
impl ToolRuntime for SearchRuntime {
    async fn call(&self, args: Value, _context: &DispatchContext) -> Result<Value, DispatchError> {
        let kind = match args_field(&args, "kind").and_then(Value::as_str) {
            Some("knowledge") => SearchKind::Knowledge,
            Some("web") => SearchKind::Web,
            _ => SearchKind::Project,
        };
        let query = args_field(&args, "query").and_then(Value::as_str).unwrap_or_default().to_string();
        let top_k = args_field(&args, "top_k").and_then(Value::as_u64).unwrap_or(5) as usize;
        let hits = self
            .provider
            .search(SearchRequest { kind, query, top_k })
            .await
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: "search".to_string(),
                message: e.to_string(),
            })?;
        serde_json::to_value(hits).map_err(|e| DispatchError::ExecutionFailed {
            tool: "search".to_string(),
            message: e.to_string(),
        })
    }
}

pub struct ReplyRuntime {
    channel: Arc<dyn ReplyChannel>,
}

impl ReplyRuntime {
    pub fn new(channel: Arc<dyn ReplyChannel>) -> Arc<dyn ToolRuntime> {
        Arc::new(Self { channel })
    }
}

#[async_trait]
impl ToolRuntime for ReplyRuntime {
    async fn call(&self, args: Value, _context: &DispatchContext) -> Result<Value, DispatchError> {
        self.channel.send(args.clone()).await.map_err(|e| DispatchError::ExecutionFailed {
            tool: "reply".to_string(),
            message: e.to_string(),
        })?;
        Ok(args)
    }
}

pub struct NotificationRuntime {
    channel: Arc<dyn NotificationChannel>,
}

impl NotificationRuntime {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Arc<dyn ToolRuntime> {
        Arc::new(Self { channel })
    }
}

#[async_trait]
impl ToolRuntime for NotificationRuntime {
    async fn call(&self, args: Value, _context: &DispatchContext) -> Result<Value, DispatchError> {
        let message = args_field(&args, "message").and_then(Value::as_str).unwrap_or_default().to_string();
        let metadata = args_field(&args, "metadata").cloned();
        self.channel
            .notify(message, metadata)
            .await
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: "notification".to_string(),
                message: e.to_string(),
            })?;
        Ok(Value::Null)
    }
}

/// What `subscribe_trigger` hands to whichever `TriggerRepository` +
/// `ExecutionBackend` pair is wired in; kept as a narrow trait here rather
/// than a direct dependency on `crate::trigger` so the dispatcher doesn't
/// need to know trigger internals, only that something can subscribe.
#[async_trait]
pub trait TriggerSubscriber: Send + Sync {
    async fn subscribe(&self, request: Value) -> Result<Value, DispatchError>;
}

pub struct SubscribeTriggerRuntime {
    subscriber: Arc<dyn TriggerSubscriber>,
}

impl SubscribeTriggerRuntime {
    pub fn new(subscriber: Arc<dyn TriggerSubscriber>) -> Arc<dyn ToolRuntime> {
        Arc::new(Self { subscriber })
    }
}

#[async_trait]
impl ToolRuntime for SubscribeTriggerRuntime {
    async fn call(&self, args: Value, _context: &DispatchContext) -> Result<Value, DispatchError> {
        self.subscriber.subscribe(args).await
    }
}
