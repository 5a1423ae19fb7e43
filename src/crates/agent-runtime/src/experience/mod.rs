//! Experience Store (§4.5)
//!
//! CRUD over `Experience` records with a scope-aware, text-ranked query API,
//! plus an in-memory reference implementation of `ExperienceRepository`
//! (§6) built the way `langgraph_checkpoint`'s in-memory saver is built: an
//! `RwLock`-guarded map with secondary indices, bounded by a max-size and an
//! optional TTL.

pub mod fast_intent;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExperienceType {
    Common,
    Code,
    React,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    User,
    Team,
    Project,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub language: String,
    pub function_name: String,
    pub parameters: Vec<String>,
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedToolCall {
    pub tool: String,
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactPlan {
    pub tool_calls: Vec<PlannedToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactArtifact {
    pub assistant_text: Option<String>,
    pub plan: ReactPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Artifact {
    Code(CodeArtifact),
    React(ReactArtifact),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastIntentConfig {
    pub enabled: bool,
    pub priority: i32,
    pub match_expression: crate::eval::condition::Condition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperienceMetadata {
    pub confidence: Option<f64>,
    pub source: Option<String>,
    pub version: Option<u32>,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub r#type: ExperienceType,
    pub scope: Scope,
    pub owner_id: Option<String>,
    pub project_id: Option<String>,
    pub title: String,
    pub content: String,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: ExperienceMetadata,
    pub artifact: Option<Artifact>,
    pub fast_intent_config: Option<FastIntentConfig>,
}

impl Experience {
    pub fn new(r#type: ExperienceType, scope: Scope, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            r#type,
            scope,
            owner_id: None,
            project_id: None,
            title: title.into(),
            content: content.into(),
            language: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: ExperienceMetadata::default(),
            artifact: None,
            fast_intent_config: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    CreatedAt,
    UpdatedAt,
    Score,
}

/// Default scope-fallback priority order (§4.5 "Scope filtering").
///
/// `UserProject`/`TeamProject` aren't members of [`Scope`] itself — they
/// represent "scope == User/Team AND project_id matches" — so the default
/// order is expressed as a sequence of `(Scope, require_project)` passes.
pub fn default_scope_priority() -> Vec<(Scope, bool)> {
    vec![
        (Scope::User, true),
        (Scope::User, false),
        (Scope::Team, true),
        (Scope::Team, false),
        (Scope::Project, false),
        (Scope::Global, false),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct ExperienceQuery {
    pub r#type: Option<ExperienceType>,
    /// Explicit scope priority order; `None` means the default (§4.5).
    pub scopes: Option<Vec<Scope>>,
    pub tags: Vec<String>,
    pub text: Option<String>,
    pub language: Option<String>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ExperienceQueryContext {
    pub owner_id: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExperienceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("external failure: {0}")]
    External(String),
}

/// `ExperienceRepository.{save,find_by_type_and_scope,delete}` (§6), plus
/// the richer `query` API (§4.5) a concrete repository exposes on top.
#[async_trait]
pub trait ExperienceRepository: Send + Sync {
    async fn save(&self, experience: Experience) -> Result<(), ExperienceError>;
    async fn delete(&self, id: &str) -> Result<(), ExperienceError>;
    async fn find_by_type_and_scope(
        &self,
        r#type: ExperienceType,
        scope: Scope,
    ) -> Result<Vec<Experience>, ExperienceError>;
    async fn query(
        &self,
        query: ExperienceQuery,
        ctx: ExperienceQueryContext,
    ) -> Result<Vec<Experience>, ExperienceError>;
}

struct StoredExperience {
    experience: Experience,
    inserted_at: DateTime<Utc>,
}

/// In-memory `ExperienceRepository`, bounded by `max_total_experiences` with
/// optional TTL eviction (`ttl_seconds == -1` means never expire) — the
/// ambient reference implementation named in SPEC_FULL §4.5.
pub struct InMemoryExperienceStore {
    records: RwLock<HashMap<String, StoredExperience>>,
    max_total_experiences: usize,
    ttl_seconds: i64,
    max_content_length: usize,
}

impl InMemoryExperienceStore {
    pub fn new(max_total_experiences: usize, ttl_seconds: i64, max_content_length: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_total_experiences,
            ttl_seconds,
            max_content_length,
        }
    }

    fn is_expired(&self, stored: &StoredExperience, now: DateTime<Utc>) -> bool {
        if self.ttl_seconds < 0 {
            return false;
        }
        now.signed_duration_since(stored.inserted_at) > ChronoDuration::seconds(self.ttl_seconds)
    }

    fn evict_expired_and_oldest(&self) {
        let now = Utc::now();
        let mut guard = self.records.write();
        let expired: Vec<String> = guard
            .iter()
            .filter(|(_, v)| self.is_expired(v, now))
            .map(|(k, _)| k.clone())
            .collect();
        for id in expired {
            guard.remove(&id);
        }
        while guard.len() >= self.max_total_experiences {
            if let Some(oldest_id) = guard
                .iter()
                .min_by_key(|(_, v)| v.inserted_at)
                .map(|(k, _)| k.clone())
            {
                guard.remove(&oldest_id);
            } else {
                break;
            }
        }
    }

    fn scope_matches(&self, experience: &Experience, scope: Scope, require_project: bool, ctx: &ExperienceQueryContext) -> bool {
        if experience.scope != scope {
            return false;
        }
        match scope {
            Scope::User => {
                if experience.owner_id.is_some() && experience.owner_id != ctx.owner_id {
                    return false;
                }
            }
            Scope::Team | Scope::Project => {
                if experience.project_id.is_some() && experience.project_id != ctx.project_id {
                    return false;
                }
            }
            Scope::Global => {}
        }
        if require_project {
            match (&experience.project_id, &ctx.project_id) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        } else {
            true
        }
    }

    /// Rank candidates by substring-occurrence text relevance (§4.5, Open
    /// Question (b)): input is capped at `max_content_length` before the
    /// O(n^2 * m) substring enumeration runs.
    fn text_score(&self, text: &str, content: &str) -> usize {
        let content_lower = content.to_lowercase();
        let content_bound: String = content_lower.chars().take(self.max_content_length).collect();
        let text_lower = text.to_lowercase();
        if text_lower.chars().count() <= 1 {
            return usize::from(content_bound.contains(&text_lower));
        }
        let chars: Vec<char> = text_lower.chars().collect();
        let mut score = 0usize;
        for len in 2..=chars.len() {
            for start in 0..=(chars.len() - len) {
                let substring: String = chars[start..start + len].iter().collect();
                if content_bound.contains(&substring) {
                    score += 1;
                }
            }
        }
        score
    }
}

#[async_trait]
impl ExperienceRepository for InMemoryExperienceStore {
    async fn save(&self, experience: Experience) -> Result<(), ExperienceError> {
        self.evict_expired_and_oldest();
        self.records.write().insert(
            experience.id.clone(),
            StoredExperience {
                experience,
                inserted_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ExperienceError> {
        self.records
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ExperienceError::NotFound(id.to_string()))
    }

    async fn find_by_type_and_scope(
        &self,
        r#type: ExperienceType,
        scope: Scope,
    ) -> Result<Vec<Experience>, ExperienceError> {
        let now = Utc::now();
        let guard = self.records.read();
        Ok(guard
            .values()
            .filter(|v| !self.is_expired(v, now))
            .map(|v| &v.experience)
            .filter(|e| e.r#type == r#type && e.scope == scope)
            .cloned()
            .collect())
    }

    async fn query(
        &self,
        query: ExperienceQuery,
        ctx: ExperienceQueryContext,
    ) -> Result<Vec<Experience>, ExperienceError> {
        let now = Utc::now();
        let guard = self.records.read();
        let live: Vec<&Experience> = guard
            .values()
            .filter(|v| !self.is_expired(v, now))
            .map(|v| &v.experience)
            .collect();

        let passes: Vec<(Scope, bool)> = match &query.scopes {
            Some(scopes) => scopes.iter().map(|s| (*s, false)).collect(),
            None => default_scope_priority(),
        };

        // Open Question (c): merge candidates from every scope-fallback
        // pass into one list, de-duplicated by id, preserving first-seen
        // order so the highest-priority scope wins.
        let mut merged: Vec<&Experience> = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();
        for (scope, require_project) in &passes {
            for experience in &live {
                if seen_ids.contains(&experience.id) {
                    continue;
                }
                if !self.scope_matches(experience, *scope, *require_project, &ctx) {
                    continue;
                }
                if let Some(want_type) = query.r#type {
                    if experience.r#type != want_type {
                        continue;
                    }
                }
                if !query.tags.is_empty() && !query.tags.iter().all(|t| experience.tags.contains(t)) {
                    continue;
                }
                if let Some(lang) = &query.language {
                    if experience.language.as_deref() != Some(lang.as_str()) {
                        continue;
                    }
                }
                seen_ids.insert(experience.id.clone());
                merged.push(experience);
            }
        }

        let order_by = query.order_by.unwrap_or(OrderBy::CreatedAt);
        if let Some(text) = &query.text {
            let mut scored: Vec<(usize, &Experience)> = merged
                .into_iter()
                .map(|e| (self.text_score(text, &e.content), e))
                .collect();
            scored.sort_by(|a, b| {
                b.0.cmp(&a.0).then_with(|| order_key(b.1, order_by).cmp(&order_key(a.1, order_by)))
            });
            merged = scored.into_iter().map(|(_, e)| e).collect();
        } else {
            merged.sort_by(|a, b| order_key(b, order_by).cmp(&order_key(a, order_by)));
        }

        if let Some(limit) = query.limit {
            merged.truncate(limit);
        }
        Ok(merged.into_iter().cloned().collect())
    }
}

fn order_key(experience: &Experience, order_by: OrderBy) -> DateTime<Utc> {
    match order_by {
        OrderBy::UpdatedAt => experience.updated_at,
        _ => experience.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(scope: Scope, owner: Option<&str>, project: Option<&str>, content: &str) -> Experience {
        let mut e = Experience::new(ExperienceType::Common, scope, "t", content);
        e.owner_id = owner.map(String::from);
        e.project_id = project.map(String::from);
        e
    }

    #[tokio::test]
    async fn scope_priority_matches_default_order_when_unset() {
        let store = InMemoryExperienceStore::new(1000, -1, 2000);
        store.save(exp(Scope::Global, None, None, "global hit")).await.unwrap();
        store
            .save(exp(Scope::User, Some("u1"), None, "user hit"))
            .await
            .unwrap();
        let ctx = ExperienceQueryContext {
            owner_id: Some("u1".to_string()),
            project_id: None,
        };
        let with_default = store
            .query(ExperienceQuery::default(), ctx.clone())
            .await
            .unwrap();
        let with_explicit = store
            .query(
                ExperienceQuery {
                    scopes: Some(vec![Scope::User, Scope::Global]),
                    ..Default::default()
                },
                ctx,
            )
            .await
            .unwrap();
        let ids_default: Vec<_> = with_default.iter().map(|e| &e.id).collect();
        let ids_explicit: Vec<_> = with_explicit.iter().map(|e| &e.id).collect();
        assert_eq!(ids_default, ids_explicit);
        assert_eq!(with_default[0].scope, Scope::User);
    }

    #[tokio::test]
    async fn dedup_by_id_across_fallback_passes() {
        let store = InMemoryExperienceStore::new(1000, -1, 2000);
        // user+project experience would otherwise surface in both the
        // "UserProject" and "User" fallback passes.
        store
            .save(exp(Scope::User, Some("u1"), Some("p1"), "x"))
            .await
            .unwrap();
        let ctx = ExperienceQueryContext {
            owner_id: Some("u1".to_string()),
            project_id: Some("p1".to_string()),
        };
        let results = store.query(ExperienceQuery::default(), ctx).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn text_relevance_ranks_by_substring_overlap() {
        let store = InMemoryExperienceStore::new(1000, -1, 2000);
        store
            .save(exp(Scope::Global, None, None, "the quick brown fox"))
            .await
            .unwrap();
        store.save(exp(Scope::Global, None, None, "unrelated text")).await.unwrap();
        let results = store
            .query(
                ExperienceQuery {
                    text: Some("quick brown".to_string()),
                    ..Default::default()
                },
                ExperienceQueryContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(results[0].content, "the quick brown fox");
    }

    #[tokio::test]
    async fn single_char_text_is_substring_contains_only() {
        let store = InMemoryExperienceStore::new(1000, -1, 2000);
        store.save(exp(Scope::Global, None, None, "a cat")).await.unwrap();
        let results = store
            .query(
                ExperienceQuery {
                    text: Some("a".to_string()),
                    ..Default::default()
                },
                ExperienceQueryContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn max_total_experiences_evicts_oldest() {
        let store = InMemoryExperienceStore::new(2, -1, 2000);
        store.save(exp(Scope::Global, None, None, "a")).await.unwrap();
        store.save(exp(Scope::Global, None, None, "b")).await.unwrap();
        store.save(exp(Scope::Global, None, None, "c")).await.unwrap();
        let all = store
            .query(ExperienceQuery::default(), ExperienceQueryContext::default())
            .await
            .unwrap();
        assert!(all.len() <= 2);
    }
}
