//! JSON configuration loader.
//!
//! # Design
//! - A missing file is replaced by a starter document holding the defaults,
//!   so a first run leaves an editable file behind.
//! - Relative paths in the document resolve against the document's directory,
//!   not the process working directory.
//! - The loaded document is validated before it is handed out.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;

/// Loads an [`AppConfig`] from a JSON file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Loader for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read, resolve, and validate the document, writing defaults first when
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or written, is not valid
    /// JSON, or fails validation.
    pub fn load(&self) -> ConfigResult<AppConfig> {
        let config = if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .map_err(|source| ConfigError::io("config.read", &self.path, source))?;
            serde_json::from_str::<AppConfig>(&raw)
                .map_err(|source| ConfigError::json("config.parse", &self.path, source))?
        } else {
            let config = AppConfig::default();
            self.write(&config)?;
            info!(path = %self.path.display(), "wrote default configuration");
            config
        };

        let config = self.resolve_paths(config);
        config.validate()?;
        Ok(config)
    }

    /// Persist `config` to the loader's path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be rendered or written.
    pub fn write(&self, config: &AppConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::io("config.create_dir", parent, source))?;
        }
        let rendered = serde_json::to_string_pretty(config)
            .map_err(|source| ConfigError::json("config.render", &self.path, source))?;
        fs::write(&self.path, rendered)
            .map_err(|source| ConfigError::io("config.write", &self.path, source))
    }

    fn resolve_paths(&self, mut config: AppConfig) -> AppConfig {
        let Some(root) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return config;
        };
        if config.folders.base_path.is_relative() {
            config.folders.base_path = root.join(&config.folders.base_path);
        }
        if config.tracking.tracker_file.is_relative() {
            config.tracking.tracker_file = root.join(&config.tracking.tracker_file);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("conf").join("config.json");
        let loader = ConfigLoader::new(&path);

        let config = loader.load()?;
        assert!(path.exists());
        assert_eq!(config.download.batch_size, 50);
        assert_eq!(config.folders.base_path, path.with_file_name("AstroImages"));
        Ok(())
    }

    #[test]
    fn partial_document_keeps_defaults() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"download": {"workers": 8, "collision": "rename"}, "folders": {"base_path": "/srv/images"}}"#,
        )?;

        let config = ConfigLoader::new(&path).load()?;
        assert_eq!(config.download.workers, 8);
        assert_eq!(config.download.max_retries, 3);
        assert_eq!(
            config.download.collision,
            astrofetch_core::CollisionPolicy::Rename
        );
        assert_eq!(config.folders.base_path, PathBuf::from("/srv/images"));
        assert_eq!(config.tracking.tracker_file, dir.path().join("data/download_tracker.json"));
        Ok(())
    }

    #[test]
    fn malformed_document_reports_json_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json")?;
        let err = ConfigLoader::new(&path).load();
        assert!(matches!(
            err,
            Err(ConfigError::Json {
                operation: "config.parse",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn invalid_values_fail_validation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"download": {"batch_size": 0}}"#)?;
        assert!(matches!(
            ConfigLoader::new(&path).load(),
            Err(ConfigError::InvalidField {
                field: "batch_size",
                ..
            })
        ));
        Ok(())
    }
}
