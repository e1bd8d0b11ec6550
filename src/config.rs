use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_PATH: &str = "config.toml";

/// Application configuration, loaded from config.toml with defaults
/// for anything the file omits.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("reviews.db"),
        }
    }
}

impl AppConfig {
    /// Load configuration from config.toml if present, then apply
    /// environment overrides (PORT).
    pub fn load() -> anyhow::Result<Self> {
        let mut config = if Path::new(CONFIG_PATH).exists() {
            let raw = std::fs::read_to_string(CONFIG_PATH)
                .with_context(|| format!("Failed to read {}", CONFIG_PATH))?;
            toml::from_str(&raw).with_context(|| format!("Failed to parse {}", CONFIG_PATH))?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .context("PORT environment variable must be a number")?;
        }

        Ok(config)
    }
}
