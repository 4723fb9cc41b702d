use std::path::PathBuf;

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

use crate::config::{ConfigPaths, LoggingConfig};

/// Logs go to a rotating file; stdout and stderr belong to the session.
pub fn init_logging(config: &LoggingConfig, paths: &ConfigPaths) -> anyhow::Result<LoggerHandle> {
    let log_path = config
        .path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.logs_dir.join("hyperctl.log"));
    let directory = log_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or(paths.logs_dir.clone());
    let basename = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("hyperctl")
        .to_string();
    let handle = Logger::try_with_env_or_str(&config.level)?
        .log_to_file(FileSpec::default().directory(directory).basename(basename))
        .rotate(
            Criterion::Size(config.rotate_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.rotate_keep),
        )
        .start()?;
    Ok(handle)
}
