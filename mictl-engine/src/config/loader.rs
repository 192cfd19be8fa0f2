//! Configuration loader

use std::path::Path;

use mictl_utils::{config_file, MictlError, Result};

use super::AppConfig;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Err(MictlError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| MictlError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| MictlError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.control.window_size == 0 || config.control.window_size > 64 {
            return Err(MictlError::config("window_size must be between 1 and 64"));
        }

        if config.control.oob_history == 0 {
            return Err(MictlError::config("oob_history must be at least 1"));
        }

        if config.control.max_line_length < 1024 {
            return Err(MictlError::config("max_line_length must be at least 1024"));
        }

        if config.trace.wrap_width < 16 {
            return Err(MictlError::config("wrap_width must be at least 16"));
        }

        if config.backend.program.trim().is_empty() {
            return Err(MictlError::config("backend program must not be empty"));
        }

        Ok(())
    }

    /// Load and validate
    pub fn load_and_validate() -> Result<AppConfig> {
        let config = Self::load()?;
        Self::validate(&config)?;
        Ok(config)
    }
}
