use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

pub const CONFIG_DIR: &str = "element-hider";
const LOCAL_CONFIG: &str = "config/config.yaml";
const LOCAL_ENV: &str = "config/local.env";

/// Exports `KEY=value` lines from `config/local.env` unless the variable is
/// already set.
pub fn load_local_env_overrides() {
    let path = Path::new(LOCAL_ENV);
    if !path.exists() {
        return;
    }

    match stdfs::read_to_string(path) {
        Ok(contents) => {
            for (idx, raw_line) in contents.lines().enumerate() {
                let line = raw_line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    warn!(line = idx + 1, "invalid local.env entry; skipping");
                    continue;
                };
                let key = key.trim();
                if key.is_empty() || env::var(key).is_ok() {
                    continue;
                }
                env::set_var(key, unquote(value.trim()));
            }
            info!(path = %path.display(), "Loaded environment overrides from local.env");
        }
        Err(err) => {
            warn!(path = %path.display(), ?err, "failed to read local.env overrides");
        }
    }
}

/// Logs go to stderr; stdout carries command output and protocol responses.
pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

pub fn default_config_path() -> Result<PathBuf> {
    // Priority: ./config/config.yaml > <config dir>/element-hider/config.yaml
    let local_config = PathBuf::from(LOCAL_CONFIG);
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push(CONFIG_DIR);
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let config_path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if config_path.exists() {
        let config = read_config_file(&config_path).await?;
        info!("Loaded configuration from: {}", config_path.display());
        Ok(LoadedConfig {
            config,
            path: config_path,
        })
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            config_path.display()
        );
        Ok(LoadedConfig {
            config: Config::default(),
            path: config_path,
        })
    }
}

pub async fn read_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

fn unquote(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}
