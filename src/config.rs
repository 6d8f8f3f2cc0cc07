//! Host configuration loaded from YAML.

use std::path::PathBuf;

use anyhow::{bail, Result};
use enforcement_agent::AgentConfig;
use serde::{Deserialize, Serialize};

const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule store file. Falls back to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
    pub agent: AgentConfig,
}

impl Config {
    /// Rejects values the agent would accept but that make no sense to run
    /// with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let store = &self.agent.store;
        if store.retry_attempts > MAX_RETRY_ATTEMPTS {
            problems.push(format!(
                "agent.store.retry_attempts must be at most {MAX_RETRY_ATTEMPTS}"
            ));
        }
        if store.retry_attempts > 0 && store.retry_base_delay_ms == 0 {
            problems.push("agent.store.retry_base_delay_ms must be positive".to_string());
        }
        if self.agent.queue.capacity == 0 {
            problems.push("agent.queue.capacity must be positive".to_string());
        }
        if self.agent.highlight.outline.trim().is_empty() {
            problems.push("agent.highlight.outline must not be empty".to_string());
        }
        if self.agent.highlight.background_color.trim().is_empty() {
            problems.push("agent.highlight.background_color must not be empty".to_string());
        }
        if let Some(path) = &self.store_path {
            if path.as_os_str().is_empty() {
                problems.push("store_path must not be empty".to_string());
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            bail!("invalid configuration:\n  {}", problems.join("\n  "))
        }
    }
}
