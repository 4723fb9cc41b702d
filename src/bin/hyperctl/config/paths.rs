use std::path::{Path, PathBuf};

use super::error::ConfigError;

const APP_DIR: &str = "hyperctl";

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_file: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Registry credentials shared with other daemon clients
    pub credentials_file: PathBuf,
}

impl ConfigPaths {
    pub fn resolve(config_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::MissingHome)?;
        Self::under(&home, config_override)
    }

    pub(super) fn under(home: &Path, config_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = home.join(".local").join("share").join(APP_DIR);
        let credentials_file = home.join(".hyper").join("config.json");
        let (config_dir, config_file) = match config_override {
            Some(path) => {
                let dir = path
                    .parent()
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingHome)?;
                (dir, path)
            }
            None => {
                let dir = home.join(".config").join(APP_DIR);
                let file = dir.join("config.toml");
                (dir, file)
            }
        };
        Ok(Self {
            config_file,
            config_dir,
            logs_dir: data_dir.join("logs"),
            data_dir,
            credentials_file,
        })
    }
}
