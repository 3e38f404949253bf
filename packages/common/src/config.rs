use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::BackoffPolicy;

/// Asset storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding published images. Default: "./data/assets".
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,
    /// Largest accepted image in bytes. Default: 10 MiB.
    #[serde(default = "default_max_asset_size")]
    pub max_asset_size: u64,
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("./data/assets")
}
fn default_max_asset_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            max_asset_size: default_max_asset_size(),
        }
    }
}

/// Background asset deletion configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DeletionConfig {
    /// Attempts per asset before it is reported as leaked. Default: 5.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    /// Wait after the first failed attempt, doubled after each further failure. Default: 5.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

fn default_max_attempts() -> u8 {
    5
}
fn default_base_delay_secs() -> u64 {
    5
}

impl DeletionConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.max_attempts, Duration::from_secs(self.base_delay_secs))
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}
