use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use page_dom::MemoryDocument;
use rule_store::{FileRuleStore, InMemoryRuleStore, RuleStore};
use tracing::{info, warn};

use super::output::OutputFormat;
use crate::config::Config;

const STORE_DIR: &str = "element-hider";
const STORE_FILE: &str = "rules.json";

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Priority: `--store` > `store_path` from config > platform data dir.
    pub fn store_path(&self, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = &self.config.store_path {
            return Some(path.clone());
        }
        dirs::data_dir().map(|mut path| {
            path.push(STORE_DIR);
            path.push(STORE_FILE);
            path
        })
    }

    pub fn open_store(&self, explicit: Option<&Path>) -> Arc<dyn RuleStore> {
        match self.store_path(explicit) {
            Some(path) => {
                info!(path = %path.display(), "using rule store file");
                Arc::new(FileRuleStore::new(path))
            }
            None => {
                warn!("no data directory available; rules will not outlive this process");
                Arc::new(InMemoryRuleStore::new())
            }
        }
    }

    pub fn load_page(&self, path: &Path) -> Result<Arc<MemoryDocument>> {
        let document = MemoryDocument::load(path)
            .with_context(|| format!("Failed to load page fixture {}", path.display()))?;
        Ok(Arc::new(document))
    }
}
