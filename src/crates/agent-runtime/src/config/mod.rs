//! Layered configuration (§6, §10 ambient addition)
//!
//! `loader` is the generic YAML `$include`/`${ENV:default}` substrate;
//! `runtime` is the typed `RuntimeConfig` built on top of it for this
//! crate's own `experience.*` / `search.*` / `sandbox.*` keys.

pub mod loader;
pub mod runtime;

pub use loader::{deep_merge, load_yaml_config, load_yaml_file};
pub use runtime::{ExperienceConfig, RuntimeConfig, SandboxConfig, SearchConfig};
