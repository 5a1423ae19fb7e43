//! Tool records and the name/alias-aware registry (§3 Tool, §4.7 Registry)
//!
//! This is deliberately a richer record than `langgraph_core::tool::Tool`
//! (which only carries a flat JSON-schema `input_schema`): the CodeGen
//! sub-agent needs `target_class_name` grouping and required/optional
//! parameter ordering that a flat schema doesn't expose, so the Agent
//! Execution Core keeps its own `Tool` type and validates against it
//! directly rather than going through the generic tool substrate.

use crate::schema::Shape;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// One parameter in a tool's `parameter_tree`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub shape: Shape,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape, default: Value) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
            default: Some(default),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A language a tool's generated call site may be written in (§4.6 ambient
/// "language support table"). Only `Python` has a concrete CodeGen template
/// in this implementation (see `codegen::prompt`); the others are modeled so
/// validation and the registry stay language-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Bash,
}

/// A registered tool (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameter_tree: Vec<Parameter>,
    pub declared_return_schema: Option<Shape>,
    pub supported_languages: Vec<Language>,
    /// Groups tools into one code-gen class; `None` emits a global function.
    pub target_class_name: Option<String>,
    pub aliases: Vec<String>,
}

impl ToolDef {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_tree: Vec::new(),
            declared_return_schema: None,
            supported_languages: vec![Language::Python],
            target_class_name: None,
            aliases: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameter_tree = parameters;
        self
    }

    pub fn with_target_class(mut self, class_name: impl Into<String>) -> Self {
        self.target_class_name = Some(class_name.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameter_tree.iter().filter(|p| p.required)
    }

    pub fn optional_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameter_tree.iter().filter(|p| !p.required)
    }

    /// Validate call arguments against `parameter_tree`: every required
    /// parameter must be present; no unknown keys are accepted.
    pub fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        let Some(map) = args.as_object() else {
            return Err(ToolError::InvalidArguments {
                tool: self.name.clone(),
                reason: "arguments must be a JSON object".to_string(),
            });
        };
        for param in self.required_parameters() {
            if !map.contains_key(&param.name) {
                return Err(ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    reason: format!("missing required parameter '{}'", param.name),
                });
            }
        }
        let known: std::collections::HashSet<&str> =
            self.parameter_tree.iter().map(|p| p.name.as_str()).collect();
        for key in map.keys() {
            if !known.contains(key.as_str()) {
                return Err(ToolError::InvalidArguments {
                    tool: self.name.clone(),
                    reason: format!("unknown parameter '{key}'"),
                });
            }
        }
        Ok(())
    }

    /// Fill in defaults for any optional parameter the caller omitted.
    pub fn with_defaults(&self, mut args: Value) -> Value {
        if let Some(map) = args.as_object_mut() {
            for param in self.optional_parameters() {
                if !map.contains_key(&param.name) {
                    if let Some(default) = &param.default {
                        map.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }
        args
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("duplicate tool name or alias '{0}'")]
    DuplicateName(String),
}

/// Registers tools by name, globally unique and alias-aware (§4.7).
#[derive(Default)]
pub struct ToolDefRegistry {
    tools: HashMap<String, ToolDef>,
    /// Maps every alias (and the canonical name) to the canonical name.
    resolve: HashMap<String, String>,
}

impl ToolDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDef) -> Result<(), ToolError> {
        if self.resolve.contains_key(&tool.name) {
            return Err(ToolError::DuplicateName(tool.name.clone()));
        }
        for alias in &tool.aliases {
            if self.resolve.contains_key(alias) {
                return Err(ToolError::DuplicateName(alias.clone()));
            }
        }
        self.resolve.insert(tool.name.clone(), tool.name.clone());
        for alias in &tool.aliases {
            self.resolve.insert(alias.clone(), tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    pub fn resolve_name<'a>(&'a self, name_or_alias: &str) -> Option<&'a str> {
        self.resolve.get(name_or_alias).map(|s| s.as_str())
    }

    pub fn get(&self, name_or_alias: &str) -> Option<&ToolDef> {
        let canonical = self.resolve_name(name_or_alias)?;
        self.tools.get(canonical)
    }

    pub fn by_target_class(&self, class_name: &str) -> Vec<&ToolDef> {
        self.tools
            .values()
            .filter(|t| t.target_class_name.as_deref() == Some(class_name))
            .collect()
    }

    pub fn ungrouped(&self) -> Vec<&ToolDef> {
        self.tools
            .values()
            .filter(|t| t.target_class_name.is_none())
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &ToolDef> {
        self.tools.values()
    }
}
