//! Fast-Intent Matcher (§4.5)
//!
//! Given retrieved experiences and the current turn's context, selects the
//! best `REACT`-typed candidate whose `fast_intent_config` is enabled and
//! whose `match_expression` evaluates true, breaking ties by `priority`. A
//! hit lets a `BEFORE_AGENT` hook skip the model entirely for this turn
//! (§8 scenario 1).

use super::Experience;
use crate::eval::condition::ConditionContext;
use serde_json::Value;

/// The bindings a fast-intent match is evaluated against.
pub struct FastIntentContext<'a> {
    pub user_input: &'a str,
    pub messages: &'a [Value],
    pub metadata: Option<&'a Value>,
    pub state: Option<&'a Value>,
}

impl<'a> FastIntentContext<'a> {
    fn as_condition_context(&self) -> ConditionContext<'a> {
        ConditionContext {
            user_input: self.user_input,
            tool_args: None,
            metadata: self.metadata,
            state: self.state,
        }
    }
}

pub struct FastIntentMatcher {
    /// If set, any tool name in a matched plan must appear here or the fast
    /// path is silently abandoned (§4.5 "Safety").
    allowed_tools: Option<Vec<String>>,
}

impl FastIntentMatcher {
    pub fn new(allowed_tools: Option<Vec<String>>) -> Self {
        Self { allowed_tools }
    }

    /// Select the best matching experience, or `None` if nothing matched (or
    /// a match was abandoned for naming a disallowed tool).
    pub fn select<'a>(&self, candidates: &'a [Experience], ctx: &FastIntentContext) -> Option<&'a Experience> {
        let cond_ctx = ctx.as_condition_context();
        let mut best: Option<&Experience> = None;
        for experience in candidates {
            let Some(config) = &experience.fast_intent_config else {
                continue;
            };
            if !config.enabled {
                continue;
            }
            let Ok(true) = config.match_expression.evaluate(&cond_ctx) else {
                continue;
            };
            if !self.plan_tools_allowed(experience) {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => {
                    config.priority
                        > current
                            .fast_intent_config
                            .as_ref()
                            .map(|c| c.priority)
                            .unwrap_or(i32::MIN)
                }
            };
            if better {
                best = Some(experience);
            }
        }
        best
    }

    fn plan_tools_allowed(&self, experience: &Experience) -> bool {
        let Some(allowed) = &self.allowed_tools else {
            return true;
        };
        let Some(super::Artifact::React(react)) = &experience.artifact else {
            return true;
        };
        react
            .plan
            .tool_calls
            .iter()
            .all(|call| allowed.iter().any(|name| name == &call.tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::condition::Condition;
    use crate::experience::{ExperienceType, FastIntentConfig, PlannedToolCall, ReactArtifact, ReactPlan, Scope};
    use serde_json::json;

    fn react_experience(priority: i32, pattern: &str, tool: &str) -> Experience {
        let mut e = Experience::new(ExperienceType::React, Scope::Global, "t", "c");
        e.artifact = Some(super::super::Artifact::React(ReactArtifact {
            assistant_text: None,
            plan: ReactPlan {
                tool_calls: vec![PlannedToolCall {
                    tool: tool.to_string(),
                    args: json!({"function_name": "calc_xm", "parameters": ["base", "exponent"]}),
                }],
            },
        }));
        e.fast_intent_config = Some(FastIntentConfig {
            enabled: true,
            priority,
            match_expression: Condition::MessageRegex {
                pattern: pattern.to_string(),
            },
        });
        e
    }

    #[test]
    fn scenario_1_matches_regex_and_returns_plan() {
        let candidates = vec![react_experience(1, ".*小明系数.*", "write_code")];
        let matcher = FastIntentMatcher::new(None);
        let ctx = FastIntentContext {
            user_input: "计算小明系数",
            messages: &[],
            metadata: None,
            state: None,
        };
        let hit = matcher.select(&candidates, &ctx).unwrap();
        let Some(super::super::Artifact::React(react)) = &hit.artifact else {
            panic!("expected react artifact");
        };
        assert_eq!(react.plan.tool_calls[0].tool, "write_code");
    }

    #[test]
    fn higher_priority_wins_among_matches() {
        let candidates = vec![react_experience(1, "hi", "a"), react_experience(5, "hi", "b")];
        let matcher = FastIntentMatcher::new(None);
        let ctx = FastIntentContext {
            user_input: "hi there",
            messages: &[],
            metadata: None,
            state: None,
        };
        let hit = matcher.select(&candidates, &ctx).unwrap();
        let Some(super::super::Artifact::React(react)) = &hit.artifact else {
            panic!()
        };
        assert_eq!(react.plan.tool_calls[0].tool, "b");
    }

    #[test]
    fn disallowed_tool_abandons_fast_path_silently() {
        let candidates = vec![react_experience(1, "hi", "dangerous_tool")];
        let matcher = FastIntentMatcher::new(Some(vec!["write_code".to_string()]));
        let ctx = FastIntentContext {
            user_input: "hi",
            messages: &[],
            metadata: None,
            state: None,
        };
        assert!(matcher.select(&candidates, &ctx).is_none());
    }

    #[test]
    fn disabled_config_never_matches() {
        let mut e = react_experience(1, ".*", "write_code");
        e.fast_intent_config.as_mut().unwrap().enabled = false;
        let matcher = FastIntentMatcher::new(None);
        let ctx = FastIntentContext {
            user_input: "anything",
            messages: &[],
            metadata: None,
            state: None,
        };
        assert!(matcher.select(&[e], &ctx).is_none());
    }
}
