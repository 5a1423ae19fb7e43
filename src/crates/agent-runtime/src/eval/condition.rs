//! Shared boolean condition language
//!
//! `conditional_execution` (criterion gating, §4.3) and the fast-intent
//! matcher (§4.5) both need "does this JSON value satisfy a small
//! boolean expression" — rather than growing two bespoke mini-languages,
//! both reuse this one evaluator, the way `orchestrator`'s original rule
//! router shared a single `RuleCondition` tree across its routing rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A leaf match mode applied to `conditional_execution.depends_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Equals,
    NotEquals,
    NotNull,
    IsTrue,
    IsFalse,
}

impl MatchMode {
    pub fn matches(self, value: &Value, expected: Option<&Value>) -> bool {
        match self {
            MatchMode::Equals => matches!(expected, Some(e) if value == e),
            MatchMode::NotEquals => !matches!(expected, Some(e) if value == e),
            MatchMode::NotNull => !value.is_null(),
            MatchMode::IsTrue => value.as_bool() == Some(true),
            MatchMode::IsFalse => value.as_bool() == Some(false),
        }
    }
}

/// A boolean expression tree over `(user_input, messages, metadata, state)`
/// style bindings, used both for a criterion's `conditional_execution` guard
/// and for a fast-intent `match_expression`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    MessagePrefix { prefix: String },
    MessageRegex { pattern: String },
    ToolArgEquals { key: String, value: Value },
    MetadataEquals { key: String, value: Value },
    StateEquals { key: String, value: Value },
    AllOf { all_of: Vec<Condition> },
    AnyOf { any_of: Vec<Condition> },
    Not { not: Box<Condition> },
}

/// The bindings a `Condition` leaf is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext<'a> {
    pub user_input: &'a str,
    pub tool_args: Option<&'a Value>,
    pub metadata: Option<&'a Value>,
    pub state: Option<&'a Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("invalid regex '{0}': {1}")]
    InvalidRegex(String, String),
}

impl Condition {
    /// Evaluate this expression against `ctx`. Regex compile failures are
    /// surfaced rather than silently treated as non-matches, since a typo'd
    /// pattern should fail loud at evaluation time, not look like "no hit".
    pub fn evaluate(&self, ctx: &ConditionContext) -> Result<bool, ConditionError> {
        Ok(match self {
            Condition::MessagePrefix { prefix } => ctx.user_input.starts_with(prefix.as_str()),
            Condition::MessageRegex { pattern } => {
                let re = Regex::new(pattern)
                    .map_err(|e| ConditionError::InvalidRegex(pattern.clone(), e.to_string()))?;
                re.is_match(ctx.user_input)
            }
            Condition::ToolArgEquals { key, value } => lookup_equals(ctx.tool_args, key, value),
            Condition::MetadataEquals { key, value } => lookup_equals(ctx.metadata, key, value),
            Condition::StateEquals { key, value } => lookup_equals(ctx.state, key, value),
            Condition::AllOf { all_of } => {
                for c in all_of {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::AnyOf { any_of } => {
                for c in any_of {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not { not } => !not.evaluate(ctx)?,
        })
    }
}

fn lookup_equals(haystack: Option<&Value>, key: &str, expected: &Value) -> bool {
    haystack
        .and_then(|v| navigate_dotted(v, key))
        .map(|actual| actual == expected)
        .unwrap_or(false)
}

/// Resolve a dotted path like `context.input.tools` or
/// `dependencies.collect_tools.value` against a JSON value, the navigation
/// rule the evaluation engine's batching `source_path` also uses (§4.3).
pub fn navigate_dotted<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
