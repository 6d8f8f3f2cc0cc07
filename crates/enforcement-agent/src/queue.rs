//! Single-flight queue for rule mutations.
//!
//! Hide and show requests each do a read-merge-write against the rule store.
//! Running them one at a time on a single worker keeps two overlapping
//! requests from reading the same list and dropping each other's change.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hider_core_types::{Rule, RuleSet};
use rule_store::{RuleStore, StoreKey, StorePatch};

use crate::errors::AgentError;
use crate::events;
use crate::retry::with_store_retry;
use crate::state::AgentState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleChange {
    pub rule: Rule,
    pub hidden: bool,
}

struct Job {
    change: RuleChange,
    reply: oneshot::Sender<Result<Vec<String>, AgentError>>,
}

pub struct MutationQueue {
    sender: mpsc::Sender<Job>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MutationQueue {
    pub fn spawn(state: Arc<AgentState>, store: Arc<dyn RuleStore>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(state.config().queue.capacity.max(1));
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    job = receiver.recv() => {
                        let Some(job) = job else { break };
                        let result = run_change(&state, store.as_ref(), &job.change).await;
                        if job.reply.send(result).is_err() {
                            debug!(target: "hider.agent", "submitter went away before the reply");
                        }
                    }
                }
            }
            debug!(target: "hider.agent", "mutation queue stopped");
        });
        Self {
            sender,
            shutdown,
            task: Mutex::new(Some(handle)),
        }
    }

    /// Enqueues a change and waits for the persisted list of its kind.
    pub async fn submit(&self, change: RuleChange) -> Result<Vec<String>, AgentError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Job { change, reply })
            .await
            .map_err(|_| AgentError::QueueClosed)?;
        response.await.map_err(|_| AgentError::QueueClosed)?
    }

    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for MutationQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

/// Read-merge-write of one list, then the document update. Nothing in memory
/// or in the document changes unless the store accepted the write.
async fn run_change(
    state: &AgentState,
    store: &dyn RuleStore,
    change: &RuleChange,
) -> Result<Vec<String>, AgentError> {
    let started = Instant::now();
    let retry_cfg = &state.config().store;
    let metrics = state.metrics();
    let kind = change.rule.kind;
    let key = StoreKey::from(kind);
    let keys = [key];
    let keys_ref: &[StoreKey] = &keys;

    let stored = with_store_retry(retry_cfg, metrics, "get", move || store.get(keys_ref))
        .await
        .map_err(|err| {
            warn!(target: "hider.agent", rule = %change.rule, %err, "rule read failed");
            AgentError::from(err)
        })?;

    let mut merged = RuleSet::new();
    for value in stored.list(key) {
        merged.insert(kind, &value);
    }
    let changed = merged.apply(&change.rule, change.hidden);
    let list = merged.values(kind).to_vec();

    if changed {
        let patch = StorePatch::new().with(key, list.clone());
        with_store_retry(retry_cfg, metrics, "set", move || store.set(patch.clone()))
            .await
            .map_err(|err| {
                warn!(target: "hider.agent", rule = %change.rule, %err, "rule write failed");
                AgentError::from(err)
            })?;
    }

    let matched = state.apply_change(&change.rule, change.hidden, list.clone());
    events::emit_rule_change(&change.rule, change.hidden, changed, matched, started.elapsed());
    Ok(list)
}
