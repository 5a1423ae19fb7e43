//! CodeGen sub-agent (§4.6)
//!
//! Turns a natural-language task and the registered tools into a
//! self-contained function in the target language (Python only — see
//! `tool::Language`), executable by the sandbox. The sub-agent itself is
//! model-agnostic: callers inject a `model` closure, the same shape the
//! evaluation engine's `LlmEvaluator` uses for its own model call, so both
//! subsystems share one "inject the model transport" convention.

pub mod prompt;
pub mod registry;

use crate::tool::ToolDefRegistry;
use prompt::{strip_code_fences, GeneratedFunction, GeneratorForm, PromptBuilder};
use registry::ReturnSchemaRegistry;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("model call failed: {0}")]
    ModelFailed(String),
    #[error("generated source for '{function_name}' has no `return` statement")]
    MissingReturn { function_name: String },
}

pub type ModelFn =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<String, CodeGenError>> + Send>> + Send + Sync>;

/// A request to generate one function (backs both `write_code` and
/// `write_condition_code`, §4.7).
pub struct CodeGenRequest {
    pub form: GeneratorForm,
    pub requirement: String,
    pub function_name: String,
    pub parameters: Vec<String>,
}

pub struct CodeGenSubAgent {
    tools: Arc<ToolDefRegistry>,
    return_schemas: Arc<ReturnSchemaRegistry>,
    model: ModelFn,
}

impl CodeGenSubAgent {
    pub fn new(tools: Arc<ToolDefRegistry>, return_schemas: Arc<ReturnSchemaRegistry>, model: ModelFn) -> Self {
        Self {
            tools,
            return_schemas,
            model,
        }
    }

    /// Generate one function's source, given the conversation's previously
    /// generated functions for the "history" prompt section.
    pub async fn generate(
        &self,
        request: CodeGenRequest,
        history: &[GeneratedFunction],
    ) -> Result<String, CodeGenError> {
        let builder = PromptBuilder::new(&self.tools, &self.return_schemas);
        let prompt = builder.build(
            request.form,
            &request.requirement,
            &request.function_name,
            &request.parameters,
            history,
        );
        let reply = (self.model)(prompt).await?;
        let source = strip_code_fences(&reply);

        let requires_return = matches!(
            request.form,
            GeneratorForm::CodeGenerator | GeneratorForm::ConditionCodeGenerator
        );
        if requires_return && !source.contains("return") {
            return Err(CodeGenError::MissingReturn {
                function_name: request.function_name,
            });
        }
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_model(reply: &'static str) -> ModelFn {
        Arc::new(move |_prompt| Box::pin(async move { Ok(reply.to_string()) }))
    }

    #[tokio::test]
    async fn generate_strips_fences_and_accepts_return() {
        let agent = CodeGenSubAgent::new(
            Arc::new(ToolDefRegistry::new()),
            Arc::new(ReturnSchemaRegistry::new()),
            stub_model("```python\ndef calc_xm(base, exponent):\n    return base ** exponent\n```"),
        );
        let source = agent
            .generate(
                CodeGenRequest {
                    form: GeneratorForm::CodeGenerator,
                    requirement: "compute xm coefficient".to_string(),
                    function_name: "calc_xm".to_string(),
                    parameters: vec!["base".to_string(), "exponent".to_string()],
                },
                &[],
            )
            .await
            .unwrap();
        assert!(source.starts_with("def calc_xm"));
        assert!(!source.contains("```"));
    }

    #[tokio::test]
    async fn generate_rejects_missing_return() {
        let agent = CodeGenSubAgent::new(
            Arc::new(ToolDefRegistry::new()),
            Arc::new(ReturnSchemaRegistry::new()),
            stub_model("def f():\n    pass"),
        );
        let result = agent
            .generate(
                CodeGenRequest {
                    form: GeneratorForm::CodeGenerator,
                    requirement: "r".to_string(),
                    function_name: "f".to_string(),
                    parameters: vec![],
                },
                &[],
            )
            .await;
        assert!(matches!(result, Err(CodeGenError::MissingReturn { .. })));
    }
}
