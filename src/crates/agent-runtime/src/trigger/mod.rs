//! Trigger Scheduler (§4.8)
//!
//! Persists trigger definitions and re-invokes the agent (or a named
//! function) on schedule or event. `schedule`/`backend` compute and fire
//! wakeups; this module owns the records, their repositories, and the
//! status-transition invariant (§3 I3) every mutation must respect.

pub mod backend;
pub mod schedule;
pub mod scheduler;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleMode {
    Cron,
    FixedDelay,
    FixedRate,
    OneTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerStatus {
    PendingActivate,
    Active,
    Paused,
    Canceled,
}

impl TriggerStatus {
    /// §3 I3: `PENDING_ACTIVATE → ACTIVE ⇄ PAUSED → CANCELED`; `CANCELED`
    /// is terminal.
    pub fn can_transition_to(self, next: TriggerStatus) -> bool {
        use TriggerStatus::*;
        matches!(
            (self, next),
            (PendingActivate, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Canceled)
                | (Paused, Canceled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
    Canceled,
}

/// A persisted trigger definition (§3 Trigger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_id: String,
    pub name: String,
    pub schedule_mode: ScheduleMode,
    pub schedule_value: String,
    pub execute_function: String,
    pub parameters: Value,
    pub source_type: String,
    pub source_id: String,
    pub status: TriggerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        schedule_mode: ScheduleMode,
        schedule_value: impl Into<String>,
        execute_function: impl Into<String>,
        parameters: Value,
        source_type: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            trigger_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            schedule_mode,
            schedule_value: schedule_value.into(),
            execute_function: execute_function.into(),
            parameters,
            source_type: source_type.into(),
            source_id: source_id.into(),
            status: TriggerStatus::PendingActivate,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `TriggerExecutionRecord` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerExecutionRecord {
    pub execution_id: String,
    pub trigger_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub output_summary: Option<String>,
    pub retry_count: u32,
}

impl TriggerExecutionRecord {
    pub fn pending(trigger_id: impl Into<String>, scheduled_time: DateTime<Utc>) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            trigger_id: trigger_id.into(),
            scheduled_time,
            start_time: None,
            end_time: None,
            status: ExecutionStatus::Pending,
            error_message: None,
            output_summary: None,
            retry_count: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("trigger '{0}' not found")]
    NotFound(String),
    #[error("invalid status transition for trigger '{trigger_id}': {from:?} -> {to:?}")]
    InvalidTransition {
        trigger_id: String,
        from: TriggerStatus,
        to: TriggerStatus,
    },
    #[error("invalid schedule_value '{value}' for mode {mode:?}: {reason}")]
    InvalidSchedule {
        mode: ScheduleMode,
        value: String,
        reason: String,
    },
    #[error("execution of trigger '{0}' failed: {1}")]
    ExecutionFailed(String, String),
    #[error("execution of trigger '{0}' timed out")]
    ExecutionTimedOut(String),
}

#[async_trait]
pub trait TriggerRepository: Send + Sync {
    async fn save(&self, trigger: Trigger) -> Result<(), TriggerError>;
    async fn get(&self, trigger_id: &str) -> Result<Trigger, TriggerError>;
    async fn update_status(&self, trigger_id: &str, status: TriggerStatus) -> Result<Trigger, TriggerError>;
    async fn list_active(&self) -> Result<Vec<Trigger>, TriggerError>;
    /// `find_all` (§6): every trigger regardless of status, unlike
    /// `list_active`'s `ACTIVE`-only filter.
    async fn find_all(&self) -> Result<Vec<Trigger>, TriggerError>;
    /// `find_by_source` (§6): triggers registered against a given
    /// `(source_type, source_id)` pair.
    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<Trigger>, TriggerError>;
}

#[async_trait]
pub trait TriggerExecutionLogRepository: Send + Sync {
    async fn append(&self, record: TriggerExecutionRecord) -> Result<(), TriggerError>;
    async fn update(&self, record: TriggerExecutionRecord) -> Result<(), TriggerError>;
    async fn for_trigger(&self, trigger_id: &str) -> Result<Vec<TriggerExecutionRecord>, TriggerError>;
}

/// An in-memory `TriggerRepository` + `TriggerExecutionLogRepository` pair,
/// built the way the experience store's in-memory reference implementation
/// is built (an `RwLock`-guarded map), so the scheduler is concretely
/// runnable and testable while a durable backend stays a pluggable trait.
pub struct InMemoryTriggerStore {
    triggers: parking_lot::RwLock<std::collections::HashMap<String, Trigger>>,
    log: parking_lot::RwLock<std::collections::HashMap<String, Vec<TriggerExecutionRecord>>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Self {
        Self {
            triggers: parking_lot::RwLock::new(std::collections::HashMap::new()),
            log: parking_lot::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryTriggerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerRepository for InMemoryTriggerStore {
    async fn save(&self, trigger: Trigger) -> Result<(), TriggerError> {
        self.triggers.write().insert(trigger.trigger_id.clone(), trigger);
        Ok(())
    }

    async fn get(&self, trigger_id: &str) -> Result<Trigger, TriggerError> {
        self.triggers
            .read()
            .get(trigger_id)
            .cloned()
            .ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))
    }

    async fn update_status(&self, trigger_id: &str, status: TriggerStatus) -> Result<Trigger, TriggerError> {
        let mut guard = self.triggers.write();
        let trigger = guard.get_mut(trigger_id).ok_or_else(|| TriggerError::NotFound(trigger_id.to_string()))?;
        if !trigger.status.can_transition_to(status) {
            return Err(TriggerError::InvalidTransition {
                trigger_id: trigger_id.to_string(),
                from: trigger.status,
                to: status,
            });
        }
        trigger.status = status;
        trigger.updated_at = Utc::now();
        Ok(trigger.clone())
    }

    async fn list_active(&self) -> Result<Vec<Trigger>, TriggerError> {
        Ok(self
            .triggers
            .read()
            .values()
            .filter(|t| t.status == TriggerStatus::Active)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Trigger>, TriggerError> {
        Ok(self.triggers.read().values().cloned().collect())
    }

    async fn find_by_source(&self, source_type: &str, source_id: &str) -> Result<Vec<Trigger>, TriggerError> {
        Ok(self
            .triggers
            .read()
            .values()
            .filter(|t| t.source_type == source_type && t.source_id == source_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TriggerExecutionLogRepository for InMemoryTriggerStore {
    async fn append(&self, record: TriggerExecutionRecord) -> Result<(), TriggerError> {
        self.log.write().entry(record.trigger_id.clone()).or_default().push(record);
        Ok(())
    }

    async fn update(&self, record: TriggerExecutionRecord) -> Result<(), TriggerError> {
        let mut guard = self.log.write();
        let entries = guard.entry(record.trigger_id.clone()).or_default();
        if let Some(existing) = entries.iter_mut().find(|r| r.execution_id == record.execution_id) {
            *existing = record;
        } else {
            entries.push(record);
        }
        Ok(())
    }

    async fn for_trigger(&self, trigger_id: &str) -> Result<Vec<TriggerExecutionRecord>, TriggerError> {
        Ok(self.log.read().get(trigger_id).cloned().unwrap_or_default())
    }
}
