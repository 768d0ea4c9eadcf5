//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[serde(default)]` on every section means a config file only needs the
//! keys it wants to change; everything else falls back to `Default`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockdeck_blocks::{BlockKind, BlockRegistry, DEFAULT_HISTORY_LIMIT};
use serde::{Deserialize, Serialize};

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when no `-v` flag is given ("error" … "trace")
    pub log_level: Option<String>,

    /// Editing behavior
    pub editor: EditorConfig,

    /// Where documents are kept
    pub storage: StorageConfig,

    /// Default points per exercise kind tag
    pub points: BTreeMap<String, u32>,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("blockdeck").join("config.toml"))
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Builds the standard registry with the configured point overrides.
    pub fn registry(&self) -> Result<BlockRegistry, ConfigError> {
        let mut registry = BlockRegistry::standard();
        for (tag, &points) in &self.points {
            let kind: BlockKind = tag
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown block kind '{tag}' in [points]")))?;
            registry
                .set_default_points(kind, points)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(registry)
    }
}

/// Editing behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo depth (0 = unlimited)
    pub history_limit: usize,

    /// Open a block for editing as soon as it is added
    pub open_new_blocks: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            open_new_blocks: true,
        }
    }
}

/// Storage location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// File store root; `None` means the platform data directory
    pub directory: Option<PathBuf>,
}

impl StorageConfig {
    /// Returns the configured directory or `<data dir>/blockdeck/documents`.
    pub fn resolved_directory(&self) -> Result<PathBuf, ConfigError> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                Ok(data_dir.join("blockdeck").join("documents"))
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("Data directory not found")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::CoreError {
    fn from(e: ConfigError) -> Self {
        crate::CoreError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.editor.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(config.editor.open_new_blocks);
        assert!(config.points.is_empty());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "debug"

            [editor]
            history_limit = 50

            [points]
            flashcard = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.editor.history_limit, 50);
        assert!(config.editor.open_new_blocks);
        assert!(config.storage.directory.is_none());

        let registry = config.registry().unwrap();
        assert_eq!(registry.default_points(BlockKind::Flashcard), Some(2));
        assert_eq!(registry.default_points(BlockKind::SingleChoice), Some(5));
    }

    #[test]
    fn test_bad_points_entries_are_rejected() {
        let mut config = Config::default();
        config.points.insert("chart".to_string(), 3);
        assert!(matches!(config.registry(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.points.insert("image".to_string(), 3);
        assert!(config.registry().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.storage.directory = Some(dir.path().join("docs"));
        config.editor.open_new_blocks = false;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_explicit_storage_directory() {
        let storage = StorageConfig {
            directory: Some(PathBuf::from("/tmp/decks")),
        };
        assert_eq!(storage.resolved_directory().unwrap(), PathBuf::from("/tmp/decks"));
    }
}
