use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{RuleStore, StoreError, StoreKey, StorePatch, StoreValues};

/// Process-local store, used by tests and by the CLI when no store file is
/// configured.
#[derive(Default)]
pub struct InMemoryRuleStore {
    entries: Mutex<BTreeMap<StoreKey, Vec<String>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: StoreValues) -> Self {
        let store = Self::default();
        {
            let mut entries = store.entries.lock();
            for (key, list) in values.iter() {
                entries.insert(key, list.clone());
            }
        }
        store
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> StoreValues {
        let entries = self.entries.lock();
        let mut values = StoreValues::new();
        for (key, list) in entries.iter() {
            values.insert(*key, list.clone());
        }
        values
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreValues, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let entries = self.entries.lock();
        let mut values = StoreValues::new();
        for key in keys {
            if let Some(list) = entries.get(key) {
                values.insert(*key, list.clone());
            }
        }
        Ok(values)
    }

    async fn set(&self, patch: StorePatch) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        for (key, list) in patch.iter() {
            entries.insert(key, list.clone());
        }
        Ok(())
    }
}
