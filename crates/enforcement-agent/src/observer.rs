//! Change observer: watches document mutation bursts and decides whether the
//! rule set has to be reapplied.

use std::sync::Arc;

use page_dom::{DomEvent, Document, MutationRecord, NodeId, DISPLAY_NONE};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hider_core_types::RuleSet;

use crate::config::ObserverCfg;
use crate::state::{is_targeted, AgentState};

/// Why a burst needs a reapplication pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    NodesAdded { parent: NodeId },
    StyleDiverged { node: NodeId },
    ClassChanged { node: NodeId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Ignore,
    Reapply(Trigger),
}

impl Verdict {
    pub fn needs_reapply(&self) -> bool {
        matches!(self, Verdict::Reapply(_))
    }
}

/// Inspects one burst. The first record that could leave a targeted element
/// visible decides; a burst never yields more than one pass.
pub fn assess_burst(
    records: &[MutationRecord],
    rules: &RuleSet,
    document: &dyn Document,
    cfg: &ObserverCfg,
) -> Verdict {
    if rules.is_empty() {
        return Verdict::Ignore;
    }
    for record in records {
        if record.has_added_nodes() {
            return Verdict::Reapply(Trigger::NodesAdded {
                parent: record.target(),
            });
        }
        let node = record.target();
        match record.attribute_name() {
            Some("style") if diverged(rules, document, node) => {
                return Verdict::Reapply(Trigger::StyleDiverged { node });
            }
            Some("class") if cfg.react_to_class_mutations && diverged(rules, document, node) => {
                return Verdict::Reapply(Trigger::ClassChanged { node });
            }
            _ => {}
        }
    }
    Verdict::Ignore
}

fn diverged(rules: &RuleSet, document: &dyn Document, node: NodeId) -> bool {
    is_targeted(rules, document, node) && document.style(node, "display") != DISPLAY_NONE
}

/// Background task that feeds document events into the agent state.
pub struct ChangeObserver {
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeObserver {
    /// Subscribes before returning, so no burst flushed after `start` is
    /// missed.
    pub fn start(state: Arc<AgentState>) -> Self {
        let shutdown = CancellationToken::new();
        let mut events = state.document().subscribe();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(DomEvent::Mutations(records)) => {
                            state.handle_burst(&records);
                        }
                        Ok(DomEvent::Load) => state.handle_load(),
                        Err(RecvError::Lagged(missed)) => {
                            warn!(target: "hider.observer", missed, "observer lagged; reapplying");
                            state.reapply("observer-lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            debug!(target: "hider.observer", "observer stopped");
        });
        Self {
            shutdown,
            task: Mutex::new(Some(handle)),
        }
    }

    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for ChangeObserver {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}
