use std::fs;

use super::error::ConfigError;
use super::load::{ensure_dirs, secure_file_permissions};
use super::paths::ConfigPaths;
use super::types::ClientConfig;

pub fn save_config(config: &ClientConfig, paths: &ConfigPaths) -> Result<(), ConfigError> {
    ensure_dirs(paths)?;
    fs::write(&paths.config_file, render_config(config)?)?;
    secure_file_permissions(&paths.config_file)?;
    Ok(())
}

pub fn render_config(config: &ClientConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}
