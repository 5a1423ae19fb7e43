//! External collaborator interfaces (§6 SPI surfaces)
//!
//! Everything in this module is a trait the core calls and an external
//! deployment implements — the knowledge/search providers, reply channels,
//! and learning pipeline named as out-of-scope collaborators in §1. The
//! repository SPIs for experiences and triggers live alongside the modules
//! that own their records (`experience::ExperienceRepository`,
//! `trigger::{TriggerRepository, TriggerExecutionLogRepository}`) rather
//! than here, so each module's trait sits next to the type it operates on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpiError {
    #[error("external failure: {0}")]
    External(String),
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Project,
    Knowledge,
    Web,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub kind: SearchKind,
    pub query: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub source: Option<String>,
    pub score: f64,
}

/// `SearchProvider.search(request)` (§6).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, SpiError>;
}

/// `ReplyChannel.send(payload)` (§6) — the surface the `reply` built-in tool
/// adapts over.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, payload: Value) -> Result<(), SpiError>;
}

/// `ReplyChannel.send` plus a notification-specific variant, since the
/// `notification` built-in tool (§4.7) is a thin adapter distinct from
/// `reply` but over the same kind of outbound surface.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, message: String, metadata: Option<Value>) -> Result<(), SpiError>;
}

/// What a completed turn hands to the learning pipeline so it can extract a
/// candidate experience (§6 `LearningExtractor.extract(context)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningContext {
    pub thread_id: String,
    pub user_input: String,
    pub assistant_text: Option<String>,
    pub tool_calls: Vec<Value>,
    pub outcome: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub source_thread_id: String,
}

#[async_trait]
pub trait LearningExtractor: Send + Sync {
    async fn extract(&self, context: &LearningContext) -> Result<Option<LearningRecord>, SpiError>;
}

#[async_trait]
pub trait LearningRepository: Send + Sync {
    async fn persist(&self, record: LearningRecord) -> Result<(), SpiError>;
}
