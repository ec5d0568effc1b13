//! Pool definitions loaded from a JSON file.
//!
//! Load order: env `STAKEPOOL_CONFIG_PATH`, then `./config/pools.json`, then `./pools.json`.
//! `end_time` may be written as Unix seconds or as an RFC3339 string.

use crate::registry::PoolConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "STAKEPOOL_CONFIG_PATH";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no pool config found (set STAKEPOOL_CONFIG_PATH or create ./config/pools.json)")]
    NotFound,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolsFile {
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

impl PoolsFile {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// First existing candidate path, env override first.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }
        ["./config/pools.json", "./pools.json"]
            .into_iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::locate().ok_or(ConfigError::NotFound)?;
        Self::load_from_path(&path)
    }
}
