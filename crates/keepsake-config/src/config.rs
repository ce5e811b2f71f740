/// Engine configuration: load, save, and sanitize.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "KEEPSAKE_DATA_DIR";

/// File name of the configuration file inside the data directory.
const CONFIG_FILE_NAME: &str = "keepsake.json";

const DEFAULT_DATABASE_FILE: &str = "keepsake.redb";

const DEFAULT_LOG_FILTER: &str = "info";

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the state database. Empty = resolved default.
    pub data_dir: String,
    /// File name of the redb database inside `data_dir`.
    pub database_file: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Store history snapshots as pretty-printed JSON.
    pub pretty_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            pretty_json: false,
        }
    }
}

impl EngineConfig {
    /// Returns the default config file path: resolved data dir + `keepsake.json`.
    pub fn config_path() -> PathBuf {
        resolve_data_dir().join(CONFIG_FILE_NAME)
    }

    /// Loads config from `path`, creating a default file if it doesn't exist.
    /// Returns defaults on any error (unreadable file, parse error, etc.).
    pub fn load_or_create(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<EngineConfig>(&contents) {
                    Ok(mut config) => {
                        config.sanitize();
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {e}", path.display());
                }
            }
            // Don't overwrite a broken file
            Self::default()
        } else {
            let config = Self::default();
            if let Err(e) = config.save(path) {
                tracing::warn!("Failed to create default config at {}: {e}", path.display());
            }
            config
        }
    }

    /// Saves config to `path` as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config: {}", path.display()))
    }

    /// Replaces blank values with their defaults.
    pub fn sanitize(&mut self) {
        if self.database_file.trim().is_empty() {
            self.database_file = DEFAULT_DATABASE_FILE.to_string();
        }
        if self.log_filter.trim().is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
    }

    /// Returns the effective data directory.
    ///
    /// An explicit `data_dir` wins; otherwise falls back to [`resolve_data_dir`].
    pub fn effective_data_dir(&self) -> PathBuf {
        if self.data_dir.trim().is_empty() {
            resolve_data_dir()
        } else {
            PathBuf::from(&self.data_dir)
        }
    }

    /// Full path of the state database.
    pub fn database_path(&self) -> PathBuf {
        self.effective_data_dir().join(&self.database_file)
    }
}

/// Resolves the data directory path.
///
/// Resolution order:
/// 1. `KEEPSAKE_DATA_DIR` environment variable
/// 2. Platform data directory + `keepsake`
/// 3. `.data/` in the working directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::data_dir()
        .map(|d| d.join("keepsake"))
        .unwrap_or_else(|| PathBuf::from(".data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.data_dir.is_empty());
        assert_eq!(config.database_file, "keepsake.redb");
        assert_eq!(config.log_filter, "info");
        assert!(!config.pretty_json);
    }

    #[test]
    fn test_sanitize_restores_blank_fields() {
        let mut config = EngineConfig {
            data_dir: String::new(),
            database_file: "  ".to_string(),
            log_filter: String::new(),
            pretty_json: true,
        };
        config.sanitize();
        assert_eq!(config.database_file, "keepsake.redb");
        assert_eq!(config.log_filter, "info");
        assert!(config.pretty_json);
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = EngineConfig {
            data_dir: "/var/lib/keepsake".to_string(),
            ..EngineConfig::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/keepsake").join("keepsake.redb")
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "pretty_json": true }"#).expect("parse");
        assert!(config.pretty_json);
        assert_eq!(config.database_file, "keepsake.redb");
    }

    #[test]
    fn test_resolve_data_dir_with_env_var() {
        // Save and restore env var
        let original = std::env::var(DATA_DIR_ENV).ok();
        std::env::set_var(DATA_DIR_ENV, "/custom/path");
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/custom/path"));
        match original {
            Some(val) => std::env::set_var(DATA_DIR_ENV, val),
            None => std::env::remove_var(DATA_DIR_ENV),
        }
    }
}
