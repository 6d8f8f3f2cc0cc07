use std::sync::atomic::{AtomicU64, Ordering};

/// Per-agent counters. Each document gets its own set.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    commands: AtomicU64,
    commands_failed: AtomicU64,
    store_retries: AtomicU64,
    bursts_seen: AtomicU64,
    bursts_deferred: AtomicU64,
    reapply_passes: AtomicU64,
    load_events: AtomicU64,
}

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl AgentMetrics {
    pub fn record_command(&self, ok: bool) {
        increment(&self.commands);
        if !ok {
            increment(&self.commands_failed);
        }
    }

    pub fn record_store_retry(&self) {
        increment(&self.store_retries);
    }

    pub fn record_burst(&self, deferred: bool) {
        increment(&self.bursts_seen);
        if deferred {
            increment(&self.bursts_deferred);
        }
    }

    pub fn record_reapply(&self) {
        increment(&self.reapply_passes);
    }

    pub fn record_load(&self) {
        increment(&self.load_events);
    }

    pub fn snapshot(&self) -> AgentMetricsSnapshot {
        AgentMetricsSnapshot {
            commands: self.commands.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            store_retries: self.store_retries.load(Ordering::Relaxed),
            bursts_seen: self.bursts_seen.load(Ordering::Relaxed),
            bursts_deferred: self.bursts_deferred.load(Ordering::Relaxed),
            reapply_passes: self.reapply_passes.load(Ordering::Relaxed),
            load_events: self.load_events.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct AgentMetricsSnapshot {
    pub commands: u64,
    pub commands_failed: u64,
    pub store_retries: u64,
    pub bursts_seen: u64,
    pub bursts_deferred: u64,
    pub reapply_passes: u64,
    pub load_events: u64,
}
