//! Configuration module
//!
//! Handles loading and saving launcher configuration.

mod schema;

pub use schema::{BridgeConfig, Config, Theme, UiConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".duelsplus-launcher")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Load configuration from disk
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

/// Save configuration to disk
pub fn save(config: &Config) -> Result<()> {
    save_to(config, &config_path())
}

/// Load from `path`, writing defaults there first if it does not exist
pub fn load_from(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    } else {
        // Create default config
        let config = Config::default();
        save_to(&config, path)?;
        Ok(config)
    }
}

pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}
