//! Orchestrates trigger subscription and re-entry (§4.8 "Re-entry")

use super::backend::{ExecutionBackend, FireFn};
use super::schedule::ParsedSchedule;
use super::{ExecutionStatus, Trigger, TriggerError, TriggerExecutionLogRepository, TriggerExecutionRecord, TriggerRepository, TriggerStatus};
use crate::dispatcher::builtins::TriggerSubscriber;
use crate::dispatcher::{DispatchContext, DispatchError, ToolDispatcher};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Either a condition function gating a subsequent action, or a direct
/// action invocation (§4.8 "Re-entry"). Both paths re-enter the dispatcher
/// with a fresh `thread_id`.
#[derive(Debug, Clone)]
pub struct TriggerAction {
    pub condition_function: Option<String>,
    pub action_function: String,
}

pub struct TriggerScheduler {
    triggers: Arc<dyn TriggerRepository>,
    log: Arc<dyn TriggerExecutionLogRepository>,
    backend: Arc<dyn ExecutionBackend>,
    dispatcher: Arc<ToolDispatcher>,
    default_timeout: Duration,
}

impl TriggerScheduler {
    pub fn new(
        triggers: Arc<dyn TriggerRepository>,
        log: Arc<dyn TriggerExecutionLogRepository>,
        backend: Arc<dyn ExecutionBackend>,
        dispatcher: Arc<ToolDispatcher>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            triggers,
            log,
            backend,
            dispatcher,
            default_timeout,
        }
    }

    pub async fn subscribe(&self, trigger: Trigger, action: TriggerAction) -> Result<Trigger, TriggerError> {
        let parsed = ParsedSchedule::parse(trigger.schedule_mode, &trigger.schedule_value)?;
        self.triggers.save(trigger.clone()).await?;
        let activated = self.triggers.update_status(&trigger.trigger_id, TriggerStatus::Active).await?;
        self.start_backend_task(&activated, parsed, action);
        Ok(activated)
    }

    pub async fn pause(&self, trigger_id: &str) -> Result<Trigger, TriggerError> {
        let updated = self.triggers.update_status(trigger_id, TriggerStatus::Paused).await?;
        self.backend.cancel(trigger_id).await;
        Ok(updated)
    }

    /// Re-schedule based on the trigger's original `schedule_value` (§8
    /// scenario 6b).
    pub async fn resume(&self, trigger_id: &str, action: TriggerAction) -> Result<Trigger, TriggerError> {
        let trigger = self.triggers.get(trigger_id).await?;
        let parsed = ParsedSchedule::parse(trigger.schedule_mode, &trigger.schedule_value)?;
        let updated = self.triggers.update_status(trigger_id, TriggerStatus::Active).await?;
        self.start_backend_task(&updated, parsed, action);
        Ok(updated)
    }

    pub async fn unsubscribe(&self, trigger_id: &str) -> Result<Trigger, TriggerError> {
        self.backend.cancel(trigger_id).await;
        self.triggers.update_status(trigger_id, TriggerStatus::Canceled).await
    }

    fn start_backend_task(&self, trigger: &Trigger, parsed: ParsedSchedule, action: TriggerAction) {
        let log = self.log.clone();
        let dispatcher = self.dispatcher.clone();
        let trigger_id = trigger.trigger_id.clone();
        let timeout = self.default_timeout;
        let fire: FireFn = Arc::new(move || {
            let log = log.clone();
            let dispatcher = dispatcher.clone();
            let trigger_id = trigger_id.clone();
            let action = action.clone();
            Box::pin(fire_once(log, dispatcher, trigger_id, action, timeout)) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let backend = self.backend.clone();
        let task_id = trigger.trigger_id.clone();
        tokio::spawn(async move {
            backend.schedule(task_id, parsed, fire).await;
        });
    }
}

async fn fire_once(
    log: Arc<dyn TriggerExecutionLogRepository>,
    dispatcher: Arc<ToolDispatcher>,
    trigger_id: String,
    action: TriggerAction,
    timeout: Duration,
) {
    let scheduled_time = Utc::now();
    let mut record = TriggerExecutionRecord::pending(trigger_id.clone(), scheduled_time);
    let _ = log.append(record.clone()).await;

    record.status = ExecutionStatus::Running;
    record.start_time = Some(Utc::now());
    let _ = log.update(record.clone()).await;

    let fresh_thread_id = uuid::Uuid::new_v4().to_string();
    let context = DispatchContext {
        thread_id: fresh_thread_id,
    };

    let outcome = tokio::time::timeout(timeout, run_action(&dispatcher, &action, &context)).await;

    match outcome {
        Ok(Ok(value)) => {
            record.status = ExecutionStatus::Success;
            record.output_summary = Some(value.to_string());
        }
        Ok(Err(e)) => {
            record.status = ExecutionStatus::Failed;
            record.error_message = Some(e.to_string());
        }
        Err(_) => {
            record.status = ExecutionStatus::Timeout;
        }
    }
    record.end_time = Some(Utc::now());
    let _ = log.update(record).await;
}

async fn run_action(
    dispatcher: &ToolDispatcher,
    action: &TriggerAction,
    context: &DispatchContext,
) -> Result<Value, DispatchError> {
    if let Some(condition_fn) = &action.condition_function {
        let should_run = dispatcher
            .dispatch(condition_fn, Value::Null, context)
            .await?
            .as_bool()
            .unwrap_or(false);
        if !should_run {
            return Ok(Value::Bool(false));
        }
    }
    dispatcher.dispatch(&action.action_function, Value::Null, context).await
}

/// `subscribe_trigger` adapts into [`TriggerScheduler::subscribe`], decoding
/// the tool call's JSON args into a `Trigger` + `TriggerAction` pair.
#[async_trait]
impl TriggerSubscriber for TriggerScheduler {
    async fn subscribe(&self, request: Value) -> Result<Value, DispatchError> {
        let trigger: Trigger = serde_json::from_value(request.get("trigger").cloned().unwrap_or(Value::Null))
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: "subscribe_trigger".to_string(),
                message: format!("invalid trigger payload: {e}"),
            })?;
        let action_function = request
            .get("action_function")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let condition_function = request
            .get("condition_function")
            .and_then(Value::as_str)
            .map(str::to_string);
        let activated = self
            .subscribe(
                trigger,
                TriggerAction {
                    condition_function,
                    action_function,
                },
            )
            .await
            .map_err(|e| DispatchError::ExecutionFailed {
                tool: "subscribe_trigger".to_string(),
                message: e.to_string(),
            })?;
        serde_json::to_value(activated).map_err(|e| DispatchError::ExecutionFailed {
            tool: "subscribe_trigger".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::registry::ReturnSchemaRegistry;
    use crate::dispatcher::ToolRuntime;
    use crate::schema::Shape;
    use crate::tool::{Parameter, ToolDef, ToolDefRegistry};
    use crate::trigger::backend::TokioExecutionBackend;
    use crate::trigger::{InMemoryTriggerStore, ScheduleMode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingNotify(Arc<AtomicUsize>);
    #[async_trait]
    impl ToolRuntime for CountingNotify {
        async fn call(&self, _args: Value, _ctx: &DispatchContext) -> Result<Value, DispatchError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Bool(true))
        }
    }

    fn dispatcher_with_notify(count: Arc<AtomicUsize>) -> Arc<ToolDispatcher> {
        let mut tools = ToolDefRegistry::new();
        tools
            .register(ToolDef::new("notify", "notify").with_parameters(vec![Parameter::optional(
                "message",
                Shape::observe(&json!(""), 1),
                json!(""),
            )]))
            .unwrap();
        let mut dispatcher = ToolDispatcher::new(Arc::new(tools), Arc::new(ReturnSchemaRegistry::new()));
        dispatcher.bind_runtime("notify", Arc::new(CountingNotify(count)));
        Arc::new(dispatcher)
    }

    #[tokio::test]
    async fn scenario_6_one_time_trigger_lifecycle() {
        let store = Arc::new(InMemoryTriggerStore::new());
        let backend = Arc::new(TokioExecutionBackend::new());
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with_notify(count.clone());
        let scheduler = TriggerScheduler::new(
            store.clone(),
            store.clone(),
            backend.clone(),
            dispatcher,
            Duration::from_secs(5),
        );

        let at = Utc::now() + chrono::Duration::milliseconds(100);
        let trigger = Trigger::new(
            "wake",
            ScheduleMode::OneTime,
            at.to_rfc3339(),
            "notify",
            Value::Null,
            "user",
            "u1",
        );
        let trigger_id = trigger.trigger_id.clone();
        let activated = scheduler
            .subscribe(
                trigger,
                TriggerAction {
                    condition_function: None,
                    action_function: "notify".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(activated.status, TriggerStatus::Active);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        let records = store.for_trigger(&trigger_id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Success);

        let canceled = scheduler.unsubscribe(&trigger_id).await.unwrap();
        assert_eq!(canceled.status, TriggerStatus::Canceled);
    }

    #[tokio::test]
    async fn pause_before_firing_cancels_backend_task() {
        let store = Arc::new(InMemoryTriggerStore::new());
        let backend = Arc::new(TokioExecutionBackend::new());
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with_notify(count.clone());
        let scheduler = TriggerScheduler::new(
            store.clone(),
            store.clone(),
            backend.clone(),
            dispatcher,
            Duration::from_secs(5),
        );

        let at = Utc::now() + chrono::Duration::milliseconds(200);
        let trigger = Trigger::new(
            "wake",
            ScheduleMode::OneTime,
            at.to_rfc3339(),
            "notify",
            Value::Null,
            "user",
            "u1",
        );
        let trigger_id = trigger.trigger_id.clone();
        scheduler
            .subscribe(
                trigger,
                TriggerAction {
                    condition_function: None,
                    action_function: "notify".to_string(),
                },
            )
            .await
            .unwrap();

        let paused = scheduler.pause(&trigger_id).await.unwrap();
        assert_eq!(paused.status, TriggerStatus::Paused);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
