//! Optional user configuration (~/.config/mdbase.toml).

use crate::error::{BaseError, Result};
use crate::vault::Vault;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub vault: VaultConfig,
}

/// Vault-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    /// Default vault path, used when the base file lives inside it.
    pub default: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default location; absent file
    /// means defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| BaseError::Config(format!("Failed to read config file: {}", e)))?;
        toml::from_str(&content)
            .map_err(|e| BaseError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// ~/.config/mdbase.toml (or the platform equivalent).
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mdbase.toml")
    }

    /// Resolve the vault for a base file. Priority: CLI flag, then
    /// the configured default when the base actually lives under it,
    /// then `.obsidian` ancestor discovery.
    pub fn resolve_vault(&self, cli_vault: Option<&Path>, base_path: &Path) -> Result<Vault> {
        if let Some(path) = cli_vault {
            return Vault::new(path);
        }

        if let Some(default) = &self.vault.default {
            if default.is_dir() {
                let contains_base = match (fs::canonicalize(default), fs::canonicalize(base_path))
                {
                    (Ok(root), Ok(base)) => base.starts_with(&root),
                    _ => false,
                };
                if contains_base {
                    return Vault::new(default);
                }
            }
        }

        Vault::discover(base_path)
    }
}
