//! Per-document agent state shared by the observer task and the mutation
//! queue worker.
//!
//! Every write the agent issues against the document goes through
//! [`AgentState::guarded`]. It raises the "reapplication in progress" flag,
//! performs the writes, then drains the records those writes queued so they
//! never come back to the observer as a burst. Records the page queued before
//! the batch started are assessed first and, if needed, folded into the same
//! batch as one reapplication pass.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use page_dom::{Document, MutationRecord, NodeId, DISPLAY_NONE};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use hider_core_types::{Rule, RuleKind, RuleSet};

use crate::config::AgentConfig;
use crate::events;
use crate::metrics::AgentMetrics;
use crate::observer::assess_burst;

/// `data-*` key marking an element hidden by the agent.
pub const HIDDEN_MARKER: &str = "hidden-by-extension";
/// `data-*` keys holding the styles captured before a preview highlight.
pub const ORIGINAL_OUTLINE: &str = "original-outline";
pub const ORIGINAL_BACKGROUND: &str = "original-background-color";

const DISPLAY: &str = "display";
const OUTLINE: &str = "outline";
const BACKGROUND_COLOR: &str = "background-color";

/// What the observer did with one burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BurstOutcome {
    /// Nothing in the burst could un-hide a targeted element.
    Ignored,
    /// One reapplication pass ran.
    Reapplied,
}

impl BurstOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            BurstOutcome::Ignored => "ignored",
            BurstOutcome::Reapplied => "reapplied",
        }
    }
}

pub struct AgentState {
    document: Arc<dyn Document>,
    rules: RwLock<RuleSet>,
    reapplying: AtomicBool,
    write_gate: Mutex<()>,
    config: AgentConfig,
    metrics: AgentMetrics,
}

impl AgentState {
    pub fn new(document: Arc<dyn Document>, config: AgentConfig) -> Self {
        Self {
            document,
            rules: RwLock::new(RuleSet::default()),
            reapplying: AtomicBool::new(false),
            write_gate: Mutex::new(()),
            config,
            metrics: AgentMetrics::default(),
        }
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    pub fn rules(&self) -> RuleSet {
        self.rules.read().clone()
    }

    pub fn replace_rules(&self, rules: RuleSet) {
        *self.rules.write() = rules;
    }

    pub fn is_reapplying(&self) -> bool {
        self.reapplying.load(Ordering::SeqCst)
    }

    fn guarded<R>(&self, writes: impl FnOnce(&Self, &RuleSet) -> R) -> R {
        let _gate = self.write_gate.lock();
        let rules = self.rules();
        let foreign = self.document.take_records();
        let foreign_needs_pass = !foreign.is_empty()
            && assess_burst(&foreign, &rules, self.document.as_ref(), &self.config.observer)
                .needs_reapply();

        self.reapplying.store(true, Ordering::SeqCst);
        let result = writes(self, &rules);
        if foreign_needs_pass {
            self.hide_all(&rules, "pending-records");
        }
        let own = self.document.take_records();
        self.reapplying.store(false, Ordering::SeqCst);

        debug!(
            target: "hider.agent",
            foreign = foreign.len(),
            own = own.len(),
            "write batch complete"
        );
        result
    }

    /// Hides every class and id of the rule set across the whole document.
    pub fn reapply(&self, reason: &str) -> usize {
        self.guarded(|state, rules| state.hide_all(rules, reason))
    }

    /// Replaces the in-memory list for `rule.kind` with the list that was just
    /// persisted, then brings the document in line with it.
    pub fn apply_change(&self, rule: &Rule, hidden: bool, persisted: Vec<String>) -> usize {
        {
            let mut rules = self.rules.write();
            let mut next = RuleSet::new();
            for value in &persisted {
                next.insert(rule.kind, value);
            }
            match rule.kind {
                RuleKind::Class => rules.hidden_classes = next.hidden_classes,
                RuleKind::Id => rules.hidden_ids = next.hidden_ids,
            }
        }
        self.guarded(|state, rules| {
            let matched = if hidden {
                state.hide_matches(rule)
            } else {
                state.show_matches(rule, rules)
            };
            state.hide_all(rules, "rule-change");
            matched
        })
    }

    /// A burst delivered while a write batch is running is never assessed
    /// mid-batch: it waits for the batch to finish, then gets assessed against
    /// the settled document. Own records never reach here, `guarded` drains
    /// them before the flag drops.
    pub fn handle_burst(&self, records: &[MutationRecord]) -> BurstOutcome {
        let deferred = self.is_reapplying();
        let verdict = {
            let _gate = self.write_gate.lock();
            let rules = self.rules();
            assess_burst(records, &rules, self.document.as_ref(), &self.config.observer)
        };
        let outcome = if verdict.needs_reapply() {
            self.reapply("mutation-burst");
            BurstOutcome::Reapplied
        } else {
            BurstOutcome::Ignored
        };
        self.metrics.record_burst(deferred);
        events::emit_burst(records.len(), deferred, outcome.as_str());
        outcome
    }

    pub fn handle_load(&self) {
        self.metrics.record_load();
        if self.config.observer.reapply_on_load {
            self.reapply("load");
        }
    }

    pub fn matching(&self, rule: &Rule) -> Vec<NodeId> {
        match rule.kind {
            RuleKind::Class => self.document.elements_by_class(&rule.value),
            RuleKind::Id => self
                .document
                .elements()
                .into_iter()
                .filter(|node| self.document.element_id(*node).as_deref() == Some(rule.value.as_str()))
                .collect(),
        }
    }

    fn hide_matches(&self, rule: &Rule) -> usize {
        let nodes = self.matching(rule);
        for node in &nodes {
            self.document.set_style(*node, DISPLAY, DISPLAY_NONE);
            self.document.set_data(*node, HIDDEN_MARKER, "true");
        }
        nodes.len()
    }

    /// Restores display only on elements the agent hid and no remaining rule
    /// still targets.
    fn show_matches(&self, rule: &Rule, remaining: &RuleSet) -> usize {
        let mut restored = 0;
        for node in self.matching(rule) {
            if self.document.data(node, HIDDEN_MARKER).is_none() {
                continue;
            }
            if is_targeted(remaining, self.document.as_ref(), node) {
                continue;
            }
            self.document.set_style(node, DISPLAY, "");
            self.document.remove_data(node, HIDDEN_MARKER);
            restored += 1;
        }
        restored
    }

    fn hide_all(&self, rules: &RuleSet, reason: &str) -> usize {
        let hidden: usize = rules.rules().map(|rule| self.hide_matches(&rule)).sum();
        self.metrics.record_reapply();
        events::emit_reapply(reason, rules.len(), hidden);
        hidden
    }

    pub fn preview(&self, rule: &Rule) -> usize {
        self.guarded(|state, _| {
            let nodes = state.matching(rule);
            for node in &nodes {
                state.highlight(*node);
            }
            nodes.len()
        })
    }

    pub fn remove_preview(&self, rule: &Rule) -> usize {
        self.guarded(|state, _| {
            state
                .matching(rule)
                .into_iter()
                .filter(|node| state.unhighlight(*node))
                .count()
        })
    }

    fn highlight(&self, node: NodeId) {
        let doc = self.document.as_ref();
        if doc.data(node, ORIGINAL_OUTLINE).is_none() {
            doc.set_data(node, ORIGINAL_OUTLINE, &doc.style(node, OUTLINE));
            doc.set_data(node, ORIGINAL_BACKGROUND, &doc.style(node, BACKGROUND_COLOR));
        }
        doc.set_style(node, OUTLINE, &self.config.highlight.outline);
        doc.set_style(node, BACKGROUND_COLOR, &self.config.highlight.background_color);
    }

    fn unhighlight(&self, node: NodeId) -> bool {
        let doc = self.document.as_ref();
        let Some(outline) = doc.data(node, ORIGINAL_OUTLINE) else {
            return false;
        };
        let background = doc.data(node, ORIGINAL_BACKGROUND).unwrap_or_default();
        doc.set_style(node, OUTLINE, &outline);
        doc.set_style(node, BACKGROUND_COLOR, &background);
        doc.remove_data(node, ORIGINAL_OUTLINE);
        doc.remove_data(node, ORIGINAL_BACKGROUND);
        true
    }

    /// Distinct class names present in the document, first-seen order.
    pub fn list_classes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for node in self.document.elements() {
            for class in self.document.class_list(node) {
                if seen.insert(class.clone()) {
                    out.push(class);
                }
            }
        }
        out
    }

    /// Distinct element ids present in the document, first-seen order.
    pub fn list_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.document
            .elements()
            .into_iter()
            .filter_map(|node| self.document.element_id(node))
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect()
    }
}

/// True when the element's class list or id is covered by `rules`.
pub fn is_targeted(rules: &RuleSet, document: &dyn Document, node: NodeId) -> bool {
    if !rules.hidden_classes.is_empty()
        && document
            .class_list(node)
            .iter()
            .any(|class| rules.contains(RuleKind::Class, class))
    {
        return true;
    }
    document
        .element_id(node)
        .map(|id| rules.contains(RuleKind::Id, &id))
        .unwrap_or(false)
}
