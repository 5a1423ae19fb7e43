//! Cross-component run of §8 scenario 1: a stored REACT experience with a
//! matching fast-intent pattern lets a BEFORE_AGENT-style hook skip the model
//! and jump straight to the tool, whose result lands in conversation state.

use agent_runtime::dispatcher::{DispatchContext, DispatchError, ToolDispatcher, ToolRuntime};
use agent_runtime::eval::condition::Condition;
use agent_runtime::experience::fast_intent::{FastIntentContext, FastIntentMatcher};
use agent_runtime::experience::{
    Artifact, Experience, ExperienceMetadata, ExperienceQuery, ExperienceQueryContext, ExperienceRepository,
    ExperienceType, FastIntentConfig, InMemoryExperienceStore, PlannedToolCall, ReactArtifact, ReactPlan, Scope,
};
use agent_runtime::codegen::registry::ReturnSchemaRegistry;
use agent_runtime::schema::Shape;
use agent_runtime::state::{keys, OverAllState};
use agent_runtime::tool::{Parameter, ToolDef, ToolDefRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

struct CalcXm;

#[async_trait]
impl ToolRuntime for CalcXm {
    async fn call(&self, args: Value, _ctx: &DispatchContext) -> Result<Value, DispatchError> {
        let base = args["base"].as_f64().unwrap_or(0.0);
        let exponent = args["exponent"].as_f64().unwrap_or(0.0);
        Ok(json!({ "result": base.powf(exponent) }))
    }
}

fn dispatcher() -> ToolDispatcher {
    let mut tools = ToolDefRegistry::new();
    tools
        .register(
            ToolDef::new("write_code", "emit a callable function").with_parameters(vec![
                Parameter::required("base", Shape::observe(&json!(1.0), 1)),
                Parameter::required("exponent", Shape::observe(&json!(1.0), 1)),
            ]),
        )
        .unwrap();
    let mut dispatcher = ToolDispatcher::new(Arc::new(tools), Arc::new(ReturnSchemaRegistry::new()));
    dispatcher.bind_runtime("write_code", Arc::new(CalcXm));
    dispatcher
}

#[tokio::test]
async fn fast_intent_hit_jumps_to_tool_and_result_merges_into_state() {
    let store = InMemoryExperienceStore::new(1000, -1, 2000);
    let mut experience = Experience::new(ExperienceType::React, Scope::Global, "small-ming coefficient", "");
    experience.artifact = Some(Artifact::React(ReactArtifact {
        assistant_text: None,
        plan: ReactPlan {
            tool_calls: vec![PlannedToolCall {
                tool: "write_code".to_string(),
                args: json!({"base": 2.0, "exponent": 10.0}),
            }],
        },
    }));
    experience.fast_intent_config = Some(FastIntentConfig {
        enabled: true,
        priority: 1,
        match_expression: Condition::MessageRegex {
            pattern: ".*小明系数.*".to_string(),
        },
    });
    experience.metadata = ExperienceMetadata::default();
    store.save(experience).await.unwrap();

    let candidates = store
        .query(
            ExperienceQuery {
                r#type: Some(ExperienceType::React),
                ..Default::default()
            },
            ExperienceQueryContext::default(),
        )
        .await
        .unwrap();
    assert_eq!(candidates.len(), 1);

    let matcher = FastIntentMatcher::new(Some(vec!["write_code".to_string()]));
    let ctx = FastIntentContext {
        user_input: "计算小明系数",
        messages: &[],
        metadata: None,
        state: None,
    };
    let hit = matcher.select(&candidates, &ctx).expect("fast-intent should match");
    let Some(Artifact::React(plan)) = &hit.artifact else {
        panic!("expected a react artifact");
    };

    let mut state = OverAllState::new("thread-1");
    state.merge(&json!({ keys::JUMP_TO: "tool" })).unwrap();
    assert_eq!(state.jump_to(), Some("tool"));

    let dispatcher = dispatcher();
    let dispatch_ctx = DispatchContext {
        thread_id: state.thread_id.clone(),
    };
    let call = &plan.plan.tool_calls[0];
    let result = dispatcher.dispatch(&call.tool, call.args.clone(), &dispatch_ctx).await.unwrap();

    state
        .merge(&json!({ "messages": [{"tool_result": result}] }))
        .unwrap();
    state.clear_jump_to();

    assert_eq!(result["result"], json!(1024.0));
    assert_eq!(state.jump_to(), None);
    assert_eq!(state.get("messages").unwrap().as_array().unwrap().len(), 1);
}
