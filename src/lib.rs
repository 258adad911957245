pub mod deploy;
pub mod error;
pub mod job;
pub mod logging;
pub mod mailer;
pub mod payload;
pub mod runner;

use crate::error::HookError;
use crate::job::JobStore;
use crate::mailer::SmtpMailer;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub repo: RepoConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    pub log: LogConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:31335".to_string()
}

/// The configuration-management repository that holds the cookbooks.
#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    pub name: String,
    pub url: String,
    /// Base directory for per-job checkouts.
    pub target: PathBuf,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeployConfig {
    pub git_bin: Option<PathBuf>,
    pub knife_bin: Option<PathBuf>,
    pub command_timeout_secs: Option<u64>,
}

impl DeployConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(
            self.command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub directory: PathBuf,
    pub level: Option<String>,
    pub max_files: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// HELO/EHLO name presented to the SMTP server.
    pub domain: Option<String>,
    pub from: String,
    pub cc: String,
}

fn default_smtp_port() -> u16 {
    587
}

/// Absolute paths of the external tools, validated at startup.
#[derive(Debug, Clone)]
pub struct Binaries {
    pub git: PathBuf,
    pub knife: PathBuf,
}

impl Binaries {
    /// Resolves both external binaries, preferring explicitly configured
    /// paths over a search of the execution PATH.
    pub fn resolve(config: &DeployConfig) -> Result<Self, HookError> {
        let git = resolve_binary("git", config.git_bin.as_deref())?;
        let knife = resolve_binary("knife", config.knife_bin.as_deref())?;
        Ok(Self { git, knife })
    }
}

fn resolve_binary(name: &str, configured: Option<&Path>) -> Result<PathBuf, HookError> {
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(_) => Err(HookError::MissingBinary(name.to_string())),
        None => locate_on_path(name).ok_or_else(|| HookError::MissingBinary(name.to_string())),
    }
}

fn locate_on_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

pub struct AppState {
    /// Only one deploy sequence runs at a time.
    pub deploy_lock: Mutex<()>,
    pub job_store: Mutex<JobStore>,
    pub config: Config,
    pub binaries: Binaries,
    pub mailer: SmtpMailer,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_binary_path_is_used_when_present() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let resolved = resolve_binary("knife", Some(file.path())).unwrap();
        assert_eq!(resolved, file.path());
    }

    #[test]
    fn configured_binary_path_must_exist() {
        let missing = Path::new("/nonexistent/knife");
        let err = resolve_binary("knife", Some(missing)).unwrap_err();
        assert!(matches!(err, HookError::MissingBinary(name) if name == "knife"));
    }

    #[test]
    fn command_timeout_defaults_when_unset() {
        let config = DeployConfig::default();
        assert_eq!(config.command_timeout(), Duration::from_secs(600));
    }
}
