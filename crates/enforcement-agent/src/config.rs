//! Agent tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by the enforcement agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub store: StoreRetryCfg,
    pub observer: ObserverCfg,
    pub highlight: HighlightCfg,
    pub queue: QueueCfg,
}

/// Retry policy for rule store reads and writes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreRetryCfg {
    /// Retries after the first failed attempt.
    pub retry_attempts: u32,
    /// Delay before the first retry; doubled for each following one.
    pub retry_base_delay_ms: u64,
}

impl StoreRetryCfg {
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

impl Default for StoreRetryCfg {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverCfg {
    /// Treat a `class` attribute change on a targeted element like a `style`
    /// change. Off by default: class-only changes wait for the next burst
    /// that carries a style divergence or an insertion.
    pub react_to_class_mutations: bool,
    /// Run a reapplication pass when the document reports load completion.
    pub reapply_on_load: bool,
}

impl Default for ObserverCfg {
    fn default() -> Self {
        Self {
            react_to_class_mutations: false,
            reapply_on_load: true,
        }
    }
}

/// Inline styles used for preview highlights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightCfg {
    pub outline: String,
    pub background_color: String,
}

impl Default for HighlightCfg {
    fn default() -> Self {
        Self {
            outline: "2px solid #ff5722".into(),
            background_color: "rgba(255, 87, 34, 0.2)".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueCfg {
    /// Pending rule mutations accepted before submitters wait.
    pub capacity: usize,
}

impl Default for QueueCfg {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}
