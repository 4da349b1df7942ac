use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

const CONFIG_FILE_PATH: &str = "treechat.toml";
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding one metadata file and one tree blob per discussion.
    pub data_dir: PathBuf,
    /// Upper bound for waiting on a discussion lock before reporting contention.
    pub lock_timeout_ms: u64,
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
}

fn treechat_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".treechat")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: treechat_dir().join("discussions"),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the TOML file (explicit path, or `treechat.toml` in the
    /// working directory when present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_PATH).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_PATH))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TREECHAT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = lookup("TREECHAT_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = timeout.trim().parse().map_err(|_| {
                ServiceError::Config(format!("TREECHAT_LOCK_TIMEOUT_MS is not a number: {timeout}"))
            })?;
        }
        if let Some(level) = lookup("TREECHAT_LOG") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
