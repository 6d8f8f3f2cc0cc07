use std::time::Duration;

use hider_core_types::Rule;
use rule_store::StoreError;
use tracing::{debug, info, warn};

pub fn emit_rule_change(
    rule: &Rule,
    hidden: bool,
    persisted: bool,
    matched: usize,
    duration: Duration,
) {
    info!(
        target: "hider.agent",
        %rule,
        hidden,
        persisted,
        matched,
        elapsed_ms = duration.as_millis() as u64,
        "rule.change.applied"
    );
}

pub fn emit_reapply(reason: &str, rules: usize, elements: usize) {
    debug!(
        target: "hider.agent",
        reason,
        rules,
        elements,
        "rules.reapplied"
    );
}

pub fn emit_burst(records: usize, deferred: bool, outcome: &str) {
    debug!(
        target: "hider.observer",
        records,
        deferred,
        outcome,
        "observer.burst.handled"
    );
}

pub fn emit_store_retry(operation: &str, retry: u32, delay: Duration, error: &StoreError) {
    warn!(
        target: "hider.store",
        operation,
        retry,
        delay_ms = delay.as_millis() as u64,
        %error,
        "store.retry.scheduled"
    );
}
