//! Configuration file management
//!
//! Handles finding, loading, and saving configuration files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::HarnessConfig;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./contract-proxy.yaml",
    "./contract-proxy.yml",
    "./contract-proxy.json",
    "./.contract-proxy.yaml",
    "~/.config/contract-proxy/config.yaml",
    "~/.contract-proxy.yaml",
];

/// Find configuration file in standard locations
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load configuration from `path`, or the first standard location, or defaults
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(found) => found,
            None => return Ok(HarnessConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = if is_yaml_file(&path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    };

    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &HarnessConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = if is_yaml_file(path) {
        serde_yaml::to_string(config).context("Failed to serialize config")?
    } else {
        serde_json::to_string_pretty(config).context("Failed to serialize config")?
    };

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
