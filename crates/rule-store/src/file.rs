use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{RuleStore, StoreError, StoreKey, StorePatch, StoreValues};

/// Rule store persisted as one JSON object on disk:
/// `{"hiddenClasses": [...], "hiddenIds": [...]}`.
///
/// Writes go to a sibling temp file which is then renamed over the target.
/// Unknown top-level keys written by other tools are preserved.
pub struct FileRuleStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_object(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::Corrupt(format!(
                "{} does not hold a JSON object",
                self.path.display()
            ))),
            Err(err) => Err(StoreError::Corrupt(format!(
                "{}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn write_object(&self, object: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(object)
            .map_err(|err| StoreError::Internal(err.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        if let Err(err) = fs::rename(&tmp, &self.path).await {
            warn!(target: "hider.store", path = %self.path.display(), ?err, "rename failed");
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

fn decode_list(key: StoreKey, value: &Value) -> Result<Vec<String>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::Corrupt(format!("{key} is not an array")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| StoreError::Corrupt(format!("{key} holds a non-string entry")))
        })
        .collect()
}

#[async_trait]
impl RuleStore for FileRuleStore {
    async fn get(&self, keys: &[StoreKey]) -> Result<StoreValues, StoreError> {
        let object = self.read_object().await?;
        let mut values = StoreValues::new();
        for key in keys {
            if let Some(raw) = object.get(key.as_str()) {
                values.insert(*key, decode_list(*key, raw)?);
            }
        }
        Ok(values)
    }

    async fn set(&self, patch: StorePatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut object = self.read_object().await?;
        for (key, list) in patch.iter() {
            let entries = list.iter().cloned().map(Value::String).collect();
            object.insert(key.as_str().to_string(), Value::Array(entries));
        }
        self.write_object(&object).await?;
        debug!(target: "hider.store", path = %self.path.display(), keys = patch.iter().count(), "rule lists written");
        Ok(())
    }
}
