use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{DeletionConfig, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Limits applied to article text fields.
#[derive(Debug, Deserialize, Clone)]
pub struct ArticleConfig {
    /// Default: 255.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    /// Default: 1000.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

fn default_title_max_chars() -> usize {
    255
}
fn default_summary_max_chars() -> usize {
    1000
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            title_max_chars: default_title_max_chars(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

/// Banner images must match these exact dimensions and stay under the size cap.
#[derive(Debug, Deserialize, Clone)]
pub struct BannerConfig {
    /// Default: 1200.
    #[serde(default = "default_banner_width")]
    pub width: u32,
    /// Default: 630.
    #[serde(default = "default_banner_height")]
    pub height: u32,
    /// Default: 500.
    #[serde(default = "default_banner_max_size_kb")]
    pub max_size_kb: u64,
}

fn default_banner_width() -> u32 {
    1200
}
fn default_banner_height() -> u32 {
    630
}
fn default_banner_max_size_kb() -> u64 {
    500
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            width: default_banner_width(),
            height: default_banner_height(),
            max_size_kb: default_banner_max_size_kb(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub deletion: DeletionConfig,
    #[serde(default)]
    pub article: ArticleConfig,
    #[serde(default)]
    pub banner: BannerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("PUBLISHER_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("storage.asset_dir", "./data/assets")?
            .set_default("deletion.max_attempts", 5_i64)?
            .set_default("deletion.base_delay_secs", 5_i64)?
            // Load from config/config.toml
            .add_source(File::with_name(&config_path).required(false))
            // Override from environment (e.g., PUBLISHER__DATABASE__URL)
            .add_source(Environment::with_prefix("PUBLISHER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
