use std::io;

/// Custom error type for chef_deploy_hook operations
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Could not locate {0} binary")]
    MissingBinary(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid mail address: {0}")]
    AddressError(#[from] lettre::address::AddressError),

    #[error("Failed to build mail message: {0}")]
    MailBuildError(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    SmtpError(#[from] lettre::transport::smtp::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Helper type for Results that use HookError
pub type Result<T> = std::result::Result<T, HookError>;
