//! Prompt Assembler (§4.4)
//!
//! Transforms evaluation outputs into concrete, additive changes to the
//! model request: an ordered chain of `PromptContributor`s, each guarded by
//! `should_contribute`, merged and handed to the `BEFORE_MODEL` hook.
//! Contributions never delete prior system text or messages — a
//! contributor only appends, and scans for its own sentinel tool_call_id
//! before appending again so re-running the pipeline on the same state is
//! idempotent.

use crate::eval::criterion::CriterionResult;
use crate::hooks::Phase;
use langgraph_core::messages::{trim_messages, Message, TrimOptions};
use serde_json::Value;
use std::collections::HashMap;

/// What one contributor adds to the request for this turn.
#[derive(Debug, Clone, Default)]
pub struct PromptContribution {
    pub system_text_to_append: Option<String>,
    pub messages_to_append: Vec<Message>,
}

impl PromptContribution {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The evaluation results and state a contributor reads to decide whether
/// (and what) to contribute.
pub struct ContributionContext<'a> {
    pub criteria_results: &'a HashMap<String, CriterionResult>,
    pub state: &'a Value,
    pub existing_messages: &'a [Message],
}

/// Build an (Assistant, ToolResponse) pair carrying a contributor's
/// sentinel `tool_call_id`, the idempotency mechanism §4.4 describes: the
/// sentinel's `name` doubles as the marker a contributor scans for before
/// appending again.
pub fn sentinel_pair(sentinel_name: &str, assistant_text: impl Into<String>, payload: Value) -> Vec<Message> {
    let tool_call_id = format!("sentinel::{sentinel_name}");
    let tool_call = langgraph_core::tool::ToolCall {
        id: tool_call_id.clone(),
        name: sentinel_name.to_string(),
        args: Value::Null,
    };
    let mut assistant = Message::assistant(assistant_text.into());
    assistant.tool_calls = Some(vec![tool_call]);
    let tool_response = Message::tool(payload.to_string(), tool_call_id);
    vec![assistant, tool_response]
}

/// Has this contributor's sentinel already been injected into `messages`?
pub fn sentinel_present(messages: &[Message], sentinel_name: &str) -> bool {
    let marker = format!("sentinel::{sentinel_name}");
    messages.iter().any(|m| m.tool_call_id.as_deref() == Some(marker.as_str()))
}

pub trait PromptContributor: Send + Sync {
    fn name(&self) -> &str;
    fn phase(&self) -> Phase;
    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }
    fn should_contribute(&self, ctx: &ContributionContext) -> bool;
    fn contribute(&self, ctx: &ContributionContext) -> PromptContribution;
}

/// Runs the contributor chain for a phase and merges the results, trimming
/// the final message list to the configured context-window budget before
/// handing it to `BEFORE_MODEL` (§4.4 ambient addition).
pub struct PromptAssembler {
    contributors: Vec<Box<dyn PromptContributor>>,
    trim_options: TrimOptions,
}

impl PromptAssembler {
    pub fn new(trim_options: TrimOptions) -> Self {
        Self {
            contributors: Vec::new(),
            trim_options,
        }
    }

    pub fn register(&mut self, contributor: Box<dyn PromptContributor>) {
        self.contributors.push(contributor);
        self.contributors.sort_by_key(|c| c.priority());
    }

    /// Assemble one turn's contributions for `phase`, returning the
    /// appended system text (if any) and the trimmed full message list.
    pub fn assemble(&self, phase: Phase, ctx: &ContributionContext) -> (Option<String>, Vec<Message>) {
        let mut system_text = String::new();
        let mut messages: Vec<Message> = ctx.existing_messages.to_vec();

        for contributor in &self.contributors {
            if contributor.phase() != phase {
                continue;
            }
            if sentinel_present(&messages, contributor.name()) {
                continue;
            }
            if !contributor.should_contribute(ctx) {
                continue;
            }
            let contribution = contributor.contribute(ctx);
            if let Some(text) = contribution.system_text_to_append {
                if !system_text.is_empty() {
                    system_text.push_str("\n\n");
                }
                system_text.push_str(&text);
            }
            messages.extend(contribution.messages_to_append);
        }

        let trimmed = trim_messages(messages, self.trim_options.clone());
        let system_text = if system_text.is_empty() { None } else { Some(system_text) };
        (system_text, trimmed)
    }
}
