use crate::LogConfig;
use crate::error::{HookError, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_MAX_LOG_FILES: usize = 5;
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_FILE_PREFIX: &str = "chefdeploy";

pub struct FileLogger {
    log_directory: PathBuf,
    max_files: usize,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            max_files: DEFAULT_MAX_LOG_FILES,
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        // Ensure log directory exists
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.rotation.to_owned())
            .max_log_files(self.max_files)
            .filename_prefix(LOG_FILE_PREFIX)
            .build(&self.log_directory)
            .map_err(|e| {
                HookError::ConfigError(format!("Failed to initialize log appender: {}", e))
            })?;

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Installs the global subscriber: console output plus a rotated deploy log
/// file. The returned guard must be held for the life of the process so
/// buffered log lines are flushed.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard> {
    let file_logger = FileLogger::new(config.directory.clone())
        .with_max_files(config.max_files.unwrap_or(DEFAULT_MAX_LOG_FILES));
    let (file_writer, guard) = file_logger.setup_file_logging()?;

    // RUST_LOG wins over the configured level
    let level = config.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
