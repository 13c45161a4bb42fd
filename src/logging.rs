//! Tracing setup: stderr in the configured format, plus a plain-text
//! `<command>.log` in the project directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AppError, AppResult};

/// Older logs kept next to the current one (`g2o.log.1` .. `g2o.log.5`).
pub const LOG_BACKUPS: usize = 5;

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Shift a non-empty `path` to `path.1`, `path.1` to `path.2` and so on,
/// dropping the oldest.
pub fn rotate_log(path: &Path, backups: usize) -> AppResult<()> {
    let non_empty = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    if backups == 0 || !non_empty {
        return Ok(());
    }
    for n in (1..backups).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            let to = backup_path(path, n + 1);
            std::fs::rename(&from, &to).map_err(|e| AppError::io(&from, e))?;
        }
    }
    let first = backup_path(path, 1);
    std::fs::rename(path, &first).map_err(|e| AppError::io(path, e))
}

/// Rotate and open a fresh log file.
pub fn open_log_file(path: &Path) -> AppResult<File> {
    rotate_log(path, LOG_BACKUPS)?;
    File::create(path).map_err(|e| AppError::io(path, e))
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig, log_file: Option<File>) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let stderr_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
    };
    let file_layer = log_file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| AppError::Config {
            message: format!("failed to initialize logging: {}", e),
        })
}
