use std::sync::Arc;

use page_dom::Document;
use tracing::{info, warn};

use hider_core_types::{Rule, RuleSet};
use rule_store::{load_rule_set, RuleStore};

use crate::config::AgentConfig;
use crate::errors::AgentError;
use crate::metrics::{AgentMetrics, AgentMetricsSnapshot};
use crate::observer::ChangeObserver;
use crate::queue::{MutationQueue, RuleChange};
use crate::retry::with_store_retry;
use crate::state::AgentState;

/// Handle to the enforcement agent running against one document.
///
/// Cloning is cheap; all clones drive the same agent. Rule mutations are
/// serialized through a single queue worker, reads are answered from the
/// in-memory rule set, and a background observer keeps newly inserted or
/// restyled elements hidden.
#[derive(Clone)]
pub struct EnforcementAgent {
    state: Arc<AgentState>,
    queue: Arc<MutationQueue>,
    observer: Arc<ChangeObserver>,
}

impl EnforcementAgent {
    /// Loads the persisted rule set, hides every match already in the
    /// document, then starts observing. Fails if the store stays unreadable
    /// after retries.
    pub async fn start(
        document: Arc<dyn Document>,
        store: Arc<dyn RuleStore>,
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        let state = Arc::new(AgentState::new(document, config));
        let store_ref: &dyn RuleStore = store.as_ref();
        let rules = with_store_retry(
            &state.config().store,
            state.metrics(),
            "load",
            move || load_rule_set(store_ref),
        )
        .await
        .map_err(|err| {
            warn!(target: "hider.agent", %err, "initial rule load failed");
            AgentError::from(err)
        })?;

        let rule_count = rules.len();
        state.replace_rules(rules);
        let observer = ChangeObserver::start(state.clone());
        let hidden = state.reapply("startup");
        let queue = MutationQueue::spawn(state.clone(), store);
        info!(target: "hider.agent", rules = rule_count, hidden, "agent started");

        Ok(Self {
            state,
            queue: Arc::new(queue),
            observer: Arc::new(observer),
        })
    }

    pub async fn hide_class(&self, class_name: &str) -> Result<Vec<String>, AgentError> {
        self.submit(Rule::class(class_name), true).await
    }

    pub async fn show_class(&self, class_name: &str) -> Result<Vec<String>, AgentError> {
        self.submit(Rule::class(class_name), false).await
    }

    pub async fn hide_id(&self, id: &str) -> Result<Vec<String>, AgentError> {
        self.submit(Rule::id(id), true).await
    }

    pub async fn show_id(&self, id: &str) -> Result<Vec<String>, AgentError> {
        self.submit(Rule::id(id), false).await
    }

    async fn submit(&self, rule: Rule, hidden: bool) -> Result<Vec<String>, AgentError> {
        self.queue.submit(RuleChange { rule, hidden }).await
    }

    /// Distinct class names in the document.
    pub fn list_classes(&self) -> Vec<String> {
        self.state.list_classes()
    }

    /// Distinct ids in the document.
    pub fn list_ids(&self) -> Vec<String> {
        self.state.list_ids()
    }

    pub fn hidden_classes(&self) -> Vec<String> {
        self.state.rules().hidden_classes
    }

    pub fn hidden_ids(&self) -> Vec<String> {
        self.state.rules().hidden_ids
    }

    pub fn rules(&self) -> RuleSet {
        self.state.rules()
    }

    /// Highlights matches without persisting anything. Returns the number of
    /// elements highlighted.
    pub fn preview_class(&self, class_name: &str) -> usize {
        self.state.preview(&Rule::class(class_name))
    }

    pub fn preview_id(&self, id: &str) -> usize {
        self.state.preview(&Rule::id(id))
    }

    /// Restores the styles captured by a preview. Elements never previewed
    /// are left untouched.
    pub fn remove_preview(&self, class_name: Option<&str>, id: Option<&str>) -> usize {
        let mut restored = 0;
        if let Some(class_name) = class_name {
            restored += self.state.remove_preview(&Rule::class(class_name));
        }
        if let Some(id) = id {
            restored += self.state.remove_preview(&Rule::id(id));
        }
        restored
    }

    /// Runs one reapplication pass outside the observer.
    pub fn reapply(&self) -> usize {
        self.state.reapply("manual")
    }

    pub fn is_reapplying(&self) -> bool {
        self.state.is_reapplying()
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        self.state.document()
    }

    pub fn config(&self) -> &AgentConfig {
        self.state.config()
    }

    pub fn metrics(&self) -> AgentMetricsSnapshot {
        self.state.metrics().snapshot()
    }

    pub(crate) fn metrics_sink(&self) -> &AgentMetrics {
        self.state.metrics()
    }

    /// Stops the observer and the queue worker. Pending submissions fail with
    /// [`AgentError::QueueClosed`].
    pub async fn shutdown(&self) {
        self.observer.stop().await;
        self.queue.stop().await;
        info!(target: "hider.agent", "agent stopped");
    }
}
