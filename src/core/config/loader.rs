#![allow(clippy::result_large_err)]

use super::BuildConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file at the project root.
pub const CONFIG_FILE_NAME: &str = "mailsmith.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the project root (root/mailsmith.toml)
    /// Environment variables override config file values
    /// Falls back to defaults + env vars when the file doesn't exist
    pub fn load_from_workspace(project_root: &Path) -> Result<BuildConfig, AppError> {
        let config_path = project_root.join(CONFIG_FILE_NAME);
        let config_file = Self::load_from_file(&config_path)?;

        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config)?;

        Ok(config)
    }

    /// Load config from an explicit path; unlike the workspace lookup a missing
    /// file is an error here.
    pub fn load_explicit(path: &Path) -> Result<BuildConfig, AppError> {
        let mut config = Self::load_from_file(path)?.ok_or_else(|| {
            AppError::config(format!("config file {} does not exist", path.display()))
                .with_code("BLD-CONFIG-001")
        })?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<BuildConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::filesystem("read config file", path, e))?;

        let config: BuildConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("BLD-CONFIG-002")
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut BuildConfig) -> Result<(), AppError> {
        if let Ok(port) = env::var("MAILSMITH_PREVIEW_PORT") {
            config.preview.port = port.trim().parse().map_err(|_| {
                invalid_override("MAILSMITH_PREVIEW_PORT", &port, "a port number")
            })?;
        }

        if let Ok(debounce) = env::var("MAILSMITH_WATCH_DEBOUNCE") {
            config.watch.debounce = humantime::parse_duration(debounce.trim())
                .map_err(|_| invalid_override("MAILSMITH_WATCH_DEBOUNCE", &debounce, "a duration"))?;
        }

        if let Ok(delay) = env::var("MAILSMITH_RELOAD_DELAY") {
            config.preview.reload_delay = humantime::parse_duration(delay.trim())
                .map_err(|_| invalid_override("MAILSMITH_RELOAD_DELAY", &delay, "a duration"))?;
        }

        if let Ok(concurrency) = env::var("MAILSMITH_CONCURRENCY") {
            config.build.concurrency = concurrency.trim().parse().map_err(|_| {
                invalid_override("MAILSMITH_CONCURRENCY", &concurrency, "a positive integer")
            })?;
        }

        if let Ok(context_file) = env::var("MAILSMITH_CONTEXT_FILE") {
            config.paths.context_file = PathBuf::from(context_file);
        }

        if let Ok(command) = env::var("MAILSMITH_SASS_COMMAND") {
            if !command.trim().is_empty() {
                config.stylesheet.command = Some(command);
            }
        }

        Ok(())
    }
}

fn invalid_override(var: &str, value: &str, expected: &str) -> AppError {
    AppError::config(format!("{} must be {}, got '{}'", var, expected, value))
        .with_code("BLD-CONFIG-003")
}
