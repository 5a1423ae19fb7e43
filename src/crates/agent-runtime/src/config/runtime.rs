//! Layered runtime configuration (§6, §10 ambient addition)
//!
//! Defaults, overlaid by an optional YAML file (via [`super::loader`], so
//! `$include` and `${ENV:default}` still apply inside the file), overlaid by
//! environment variables prefixed `AGENT_EXPERIENCE__`, `AGENT_SEARCH__`, and
//! `AGENT_SANDBOX__` (double underscore separates the section from the key,
//! matching the nesting below).

use crate::AgentRuntimeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperienceConfig {
    pub enabled: bool,
    pub code_experience_enabled: bool,
    pub react_experience_enabled: bool,
    pub fast_intent_enabled: bool,
    pub fast_intent_react_enabled: bool,
    pub fast_intent_code_enabled: bool,
    pub fast_intent_allowed_tools: Vec<String>,
    pub max_items_per_query: usize,
    pub max_content_length: usize,
    pub in_memory_max_total_experiences: usize,
    pub in_memory_ttl_seconds: i64,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            code_experience_enabled: true,
            react_experience_enabled: true,
            fast_intent_enabled: true,
            fast_intent_react_enabled: true,
            fast_intent_code_enabled: true,
            fast_intent_allowed_tools: Vec::new(),
            max_items_per_query: 5,
            max_content_length: 2000,
            in_memory_max_total_experiences: 1000,
            in_memory_ttl_seconds: -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub project_search_enabled: bool,
    pub knowledge_search_enabled: bool,
    pub web_search_enabled: bool,
    pub default_top_k: usize,
    pub search_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_search_enabled: true,
            knowledge_search_enabled: true,
            web_search_enabled: false,
            default_top_k: 5,
            search_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    pub allow_io: bool,
    pub allow_native_access: bool,
    pub execution_timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allow_io: false,
            allow_native_access: false,
            execution_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub experience: ExperienceConfig,
    pub search: SearchConfig,
    pub sandbox: SandboxConfig,
}

impl RuntimeConfig {
    /// Defaults, then an optional config file, then environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, AgentRuntimeError> {
        let mut config = Self::default();
        if let Some(path) = config_path {
            config = super::loader::load_yaml_config(path)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        apply_bool_env(&mut self.experience.enabled, "AGENT_EXPERIENCE__ENABLED");
        apply_bool_env(
            &mut self.experience.code_experience_enabled,
            "AGENT_EXPERIENCE__CODE_EXPERIENCE_ENABLED",
        );
        apply_bool_env(
            &mut self.experience.react_experience_enabled,
            "AGENT_EXPERIENCE__REACT_EXPERIENCE_ENABLED",
        );
        apply_bool_env(
            &mut self.experience.fast_intent_enabled,
            "AGENT_EXPERIENCE__FAST_INTENT_ENABLED",
        );
        apply_bool_env(
            &mut self.experience.fast_intent_react_enabled,
            "AGENT_EXPERIENCE__FAST_INTENT_REACT_ENABLED",
        );
        apply_bool_env(
            &mut self.experience.fast_intent_code_enabled,
            "AGENT_EXPERIENCE__FAST_INTENT_CODE_ENABLED",
        );
        if let Ok(raw) = std::env::var("AGENT_EXPERIENCE__FAST_INTENT_ALLOWED_TOOLS") {
            self.experience.fast_intent_allowed_tools =
                raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
        }
        apply_usize_env(&mut self.experience.max_items_per_query, "AGENT_EXPERIENCE__MAX_ITEMS_PER_QUERY");
        apply_usize_env(&mut self.experience.max_content_length, "AGENT_EXPERIENCE__MAX_CONTENT_LENGTH");
        apply_usize_env(
            &mut self.experience.in_memory_max_total_experiences,
            "AGENT_EXPERIENCE__IN_MEMORY_MAX_TOTAL_EXPERIENCES",
        );
        apply_i64_env(&mut self.experience.in_memory_ttl_seconds, "AGENT_EXPERIENCE__IN_MEMORY_TTL_SECONDS");

        apply_bool_env(&mut self.search.enabled, "AGENT_SEARCH__ENABLED");
        apply_bool_env(&mut self.search.project_search_enabled, "AGENT_SEARCH__PROJECT_SEARCH_ENABLED");
        apply_bool_env(&mut self.search.knowledge_search_enabled, "AGENT_SEARCH__KNOWLEDGE_SEARCH_ENABLED");
        apply_bool_env(&mut self.search.web_search_enabled, "AGENT_SEARCH__WEB_SEARCH_ENABLED");
        apply_usize_env(&mut self.search.default_top_k, "AGENT_SEARCH__DEFAULT_TOP_K");
        apply_u64_env(&mut self.search.search_timeout_ms, "AGENT_SEARCH__SEARCH_TIMEOUT_MS");

        apply_bool_env(&mut self.sandbox.allow_io, "AGENT_SANDBOX__ALLOW_IO");
        apply_bool_env(&mut self.sandbox.allow_native_access, "AGENT_SANDBOX__ALLOW_NATIVE_ACCESS");
        apply_u64_env(&mut self.sandbox.execution_timeout_ms, "AGENT_SANDBOX__EXECUTION_TIMEOUT_MS");
    }
}

fn apply_bool_env(field: &mut bool, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

fn apply_usize_env(field: &mut usize, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

fn apply_u64_env(field: &mut u64, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

fn apply_i64_env(field: &mut i64, var: &str) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(parsed) = raw.parse() {
            *field = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_the_documented_keys() {
        let config = RuntimeConfig::default();
        assert!(config.experience.enabled);
        assert_eq!(config.experience.max_items_per_query, 5);
        assert_eq!(config.experience.max_content_length, 2000);
        assert_eq!(config.experience.in_memory_ttl_seconds, -1);
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.sandbox.execution_timeout_ms, 30_000);
        assert!(!config.sandbox.allow_native_access);
    }

    #[test]
    fn env_overrides_apply_over_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("AGENT_EXPERIENCE__MAX_ITEMS_PER_QUERY", "9");
        std::env::set_var("AGENT_SANDBOX__ALLOW_IO", "true");
        std::env::set_var("AGENT_SEARCH__WEB_SEARCH_ENABLED", "true");

        let config = RuntimeConfig::load(None).unwrap();

        std::env::remove_var("AGENT_EXPERIENCE__MAX_ITEMS_PER_QUERY");
        std::env::remove_var("AGENT_SANDBOX__ALLOW_IO");
        std::env::remove_var("AGENT_SEARCH__WEB_SEARCH_ENABLED");

        assert_eq!(config.experience.max_items_per_query, 9);
        assert!(config.sandbox.allow_io);
        assert!(config.search.web_search_enabled);
    }

    #[test]
    fn malformed_env_value_is_ignored_not_rejected() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("AGENT_EXPERIENCE__MAX_ITEMS_PER_QUERY", "not-a-number");
        let config = RuntimeConfig::load(None).unwrap();
        std::env::remove_var("AGENT_EXPERIENCE__MAX_ITEMS_PER_QUERY");
        assert_eq!(config.experience.max_items_per_query, 5);
    }
}
