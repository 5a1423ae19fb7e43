//! Synthetic source-file prompt construction (§4.6 "Prompt synthesis")
//!
//! Builds the single prompt the CodeGen sub-agent hands to the model: fixed
//! imports, one class per `target_class_name` with methods built from each
//! tool's `parameter_tree`, global functions for ungrouped tools, a history
//! section, and a stub for the function being requested.

use crate::codegen::registry::ReturnSchemaRegistry;
use crate::schema::Shape;
use crate::tool::{Parameter, ToolDef, ToolDefRegistry};
use std::fmt::Write as _;

const FIXED_IMPORTS: &str = "import json\nimport math\nimport re\nfrom typing import Any, Optional\n";

/// A previously generated function in the same conversation, listed in the
/// "history" section so later generations can call earlier ones.
#[derive(Debug, Clone)]
pub struct GeneratedFunction {
    pub function_name: String,
    pub source: String,
}

/// The form a code-gen request takes (§4.6 "Condition vs normal").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorForm {
    /// `code-generator`: returns a value, must include a `return`.
    CodeGenerator,
    /// `condition-code-generator`: must return a boolean.
    ConditionCodeGenerator,
}

impl GeneratorForm {
    fn requirement_line(self) -> &'static str {
        match self {
            GeneratorForm::CodeGenerator => {
                "The function MUST include a `return` statement with the requested value."
            }
            GeneratorForm::ConditionCodeGenerator => {
                "The function MUST return a boolean (True or False), nothing else."
            }
        }
    }
}

pub struct PromptBuilder<'a> {
    tools: &'a ToolDefRegistry,
    registry: &'a ReturnSchemaRegistry,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(tools: &'a ToolDefRegistry, registry: &'a ReturnSchemaRegistry) -> Self {
        Self { tools, registry }
    }

    /// Build the full synthetic source-file prompt for a `write_code` /
    /// `write_condition_code` request.
    pub fn build(
        &self,
        form: GeneratorForm,
        requirement: &str,
        function_name: &str,
        parameters: &[String],
        history: &[GeneratedFunction],
    ) -> String {
        let mut out = String::new();
        out.push_str(FIXED_IMPORTS);
        out.push('\n');

        let mut class_names: Vec<&str> = self
            .tools
            .all()
            .filter_map(|t| t.target_class_name.as_deref())
            .collect();
        class_names.sort_unstable();
        class_names.dedup();

        for class_name in &class_names {
            self.write_class(&mut out, class_name);
        }

        let mut ungrouped: Vec<&ToolDef> = self.tools.ungrouped();
        ungrouped.sort_by(|a, b| a.name.cmp(&b.name));
        for tool in ungrouped {
            self.write_function(&mut out, tool, "");
        }

        if !history.is_empty() {
            out.push_str("# --- previously generated functions in this conversation ---\n");
            for generated in history {
                let _ = writeln!(out, "# {}", generated.function_name);
                out.push_str(&generated.source);
                out.push_str("\n\n");
            }
        }

        out.push_str("# --- function to add ---\n");
        let _ = writeln!(out, "# {}", form.requirement_line());
        let _ = writeln!(out, "# Requirement: {requirement}");
        let _ = writeln!(
            out,
            "def {function_name}({}):\n    \"\"\"TODO: implement per the requirement above.\"\"\"\n",
            parameters.join(", ")
        );
        out
    }

    fn write_class(&self, out: &mut String, class_name: &str) {
        let _ = writeln!(out, "class {class_name}:");
        let mut tools = self.tools.by_target_class(class_name);
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        for tool in &tools {
            self.write_method(out, tool);
        }
        let instance_name = to_snake_case(class_name);
        let _ = writeln!(out, "\n{instance_name} = {class_name}()\n");
    }

    fn write_method(&self, out: &mut String, tool: &ToolDef) {
        self.write_doc_block(out, tool, "    ");
        let signature = method_signature(tool, true);
        let _ = writeln!(out, "    def {}({signature}):", tool.name);
        let _ = writeln!(out, "        ...\n");
    }

    fn write_function(&self, out: &mut String, tool: &ToolDef, _indent: &str) {
        self.write_doc_block(out, tool, "");
        let signature = method_signature(tool, false);
        let _ = writeln!(out, "def {}({signature}):", tool.name);
        let _ = writeln!(out, "    ...\n");
    }

    fn write_doc_block(&self, out: &mut String, tool: &ToolDef, indent: &str) {
        let _ = writeln!(out, "{indent}\"\"\"{}", tool.description);
        let return_shape = self
            .registry
            .shape_for(&tool.name)
            .or_else(|| tool.declared_return_schema.clone());
        if let Some(shape) = return_shape {
            let _ = writeln!(out, "{indent}Returns:");
            write_shape_doc(out, &shape, indent, "    ", 0, 8);
        }
        let _ = writeln!(out, "{indent}\"\"\"");
    }
}

fn method_signature(tool: &ToolDef, with_self: bool) -> String {
    let mut parts = Vec::new();
    if with_self {
        parts.push("self".to_string());
    }
    for p in tool.required_parameters() {
        parts.push(p.name.clone());
    }
    for p in tool.optional_parameters() {
        parts.push(format!("{}={}", p.name, python_literal(p)));
    }
    parts.join(", ")
}

fn python_literal(param: &Parameter) -> String {
    match &param.default {
        Some(serde_json::Value::String(s)) => format!("{s:?}"),
        Some(serde_json::Value::Bool(true)) => "True".to_string(),
        Some(serde_json::Value::Bool(false)) => "False".to_string(),
        Some(serde_json::Value::Null) | None => "None".to_string(),
        Some(other) => other.to_string(),
    }
}

fn write_shape_doc(out: &mut String, shape: &Shape, base_indent: &str, step: &str, depth: usize, max_depth: usize) {
    if depth >= max_depth {
        let _ = writeln!(out, "{base_indent}{step}... (truncated at depth {max_depth})");
        return;
    }
    let indent = format!("{base_indent}{}", step.repeat(depth + 1));
    match shape {
        Shape::Primitive { r#type, optional, .. } => {
            let _ = writeln!(out, "{indent}{:?}{}", r#type, if *optional { " (optional)" } else { "" });
        }
        Shape::Object { fields, .. } => {
            for (key, field_shape) in fields {
                let _ = writeln!(
                    out,
                    "{indent}{key}:{}",
                    if field_shape.optional() { " (optional)" } else { "" }
                );
                write_shape_doc(out, field_shape, base_indent, step, depth + 1, max_depth);
            }
        }
        Shape::Array { item_shape, .. } => {
            let _ = writeln!(out, "{indent}list of:");
            write_shape_doc(out, item_shape, base_indent, step, depth + 1, max_depth);
        }
        Shape::Union { variants, .. } => {
            let _ = writeln!(out, "{indent}one of:");
            for variant in variants {
                write_shape_doc(out, variant, base_indent, step, depth + 1, max_depth);
            }
        }
        Shape::Unknown { .. } => {
            let _ = writeln!(out, "{indent}unknown");
        }
    }
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Strip leading/trailing code fences from a raw model reply (§4.6
/// "Generated output must be raw function source").
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("python").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    match rest.rfind("```") {
        Some(idx) => rest[..idx].trim_end().to_string(),
        None => rest.trim_end().to_string(),
    }
}
