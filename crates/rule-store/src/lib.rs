//! Persistence capability for hide rules.
//!
//! The store is a plain asynchronous key-value surface holding two lists,
//! `hiddenClasses` and `hiddenIds`. It offers `get(keys)` and `set(partial)`
//! and nothing else: no transactions, no change notifications. Callers that
//! need read-modify-write consistency serialize their own writes.

pub mod errors;
pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use hider_core_types::{RuleKind, RuleSet};

pub use errors::StoreError;
pub use file::FileRuleStore;
pub use memory::InMemoryRuleStore;

/// Keys understood by the rule store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum StoreKey {
    #[serde(rename = "hiddenClasses")]
    HiddenClasses,
    #[serde(rename = "hiddenIds")]
    HiddenIds,
}

impl StoreKey {
    pub const ALL: [StoreKey; 2] = [StoreKey::HiddenClasses, StoreKey::HiddenIds];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::HiddenClasses => "hiddenClasses",
            StoreKey::HiddenIds => "hiddenIds",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hiddenClasses" => Some(StoreKey::HiddenClasses),
            "hiddenIds" => Some(StoreKey::HiddenIds),
            _ => None,
        }
    }
}

impl From<RuleKind> for StoreKey {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Class => StoreKey::HiddenClasses,
            RuleKind::Id => StoreKey::HiddenIds,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values returned by `get`, or a partial update passed to `set`. Keys that
/// were never written are absent.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreValues {
    entries: BTreeMap<StoreKey, Vec<String>>,
}

pub type StorePatch = StoreValues;

impl StoreValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: StoreKey, values: Vec<String>) -> Self {
        self.entries.insert(key, values);
        self
    }

    pub fn insert(&mut self, key: StoreKey, values: Vec<String>) {
        self.entries.insert(key, values);
    }

    pub fn contains(&self, key: StoreKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: StoreKey) -> Option<&[String]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    /// The stored list, or an empty list when the key is absent.
    pub fn list(&self, key: StoreKey) -> Vec<String> {
        self.entries.get(&key).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StoreKey, &Vec<String>)> {
        self.entries.iter().map(|(key, values)| (*key, values))
    }

    pub fn into_rule_set(self) -> RuleSet {
        RuleSet::from_lists(
            self.list(StoreKey::HiddenClasses),
            self.list(StoreKey::HiddenIds),
        )
    }
}

impl From<&RuleSet> for StoreValues {
    fn from(rules: &RuleSet) -> Self {
        StoreValues::new()
            .with(StoreKey::HiddenClasses, rules.hidden_classes.clone())
            .with(StoreKey::HiddenIds, rules.hidden_ids.clone())
    }
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreValues, StoreError>;
    async fn set(&self, patch: StorePatch) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> RuleStore for Arc<S>
where
    S: RuleStore + ?Sized,
{
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreValues, StoreError> {
        (**self).get(keys).await
    }

    async fn set(&self, patch: StorePatch) -> Result<(), StoreError> {
        (**self).set(patch).await
    }
}

/// Reads both lists; absent keys read as empty.
pub async fn load_rule_set<S>(store: &S) -> Result<RuleSet, StoreError>
where
    S: RuleStore + ?Sized,
{
    Ok(store.get(&StoreKey::ALL).await?.into_rule_set())
}

/// Keys written by [`seed_defaults`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SeedOutcome {
    pub seeded: Vec<StoreKey>,
}

/// Installation routine: writes an empty list for every key that has never
/// been written. Existing lists are left alone.
pub async fn seed_defaults<S>(store: &S) -> Result<SeedOutcome, StoreError>
where
    S: RuleStore + ?Sized,
{
    let current = store.get(&StoreKey::ALL).await?;
    let mut patch = StorePatch::new();
    let mut outcome = SeedOutcome::default();
    for key in StoreKey::ALL {
        if !current.contains(key) {
            patch.insert(key, Vec::new());
            outcome.seeded.push(key);
        }
    }
    if !patch.is_empty() {
        store.set(patch).await?;
        info!(target: "hider.store", seeded = ?outcome.seeded, "seeded default rule lists");
    }
    Ok(outcome)
}
