//! Error handling for the TGecomm CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Session error: {0}")]
    Session(#[from] tgecomm_core::SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] tgecomm_core::ConfigError),

    #[error("Failed to load environment file {path}: {reason}")]
    EnvFile { path: String, reason: String },

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
