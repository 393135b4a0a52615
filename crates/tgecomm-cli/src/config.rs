//! TGecomm CLI Configuration Loading
//!
//! Configuration is layered with this priority ordering:
//! environment variables > .env file > TOML file > defaults.
//!
//! The `.env` file only fills variables that are not already set in the
//! process environment, so real environment variables always win.

use std::collections::HashMap;
use std::path::Path;

use tgecomm_core::{ClientConfig, ConfigError};
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

/// Environment variables read into [`ClientConfig`]
pub const ENV_KEYS: [&str; 5] = [
    "API_ID",
    "API_HASH",
    "PHONE",
    "SESSION_NAME",
    "TGECOMM_MAX_RETRIES",
];

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

/// Load configuration from the optional TOML file, the `.env` file and the
/// process environment
pub fn load_configuration(config_path: Option<&Path>, env_path: &Path) -> Result<ClientConfig> {
    let mut config = match config_path {
        Some(path) => load_from_file(path)?,
        None => {
            debug!("No configuration file given, starting from defaults");
            ClientConfig::default()
        }
    };

    load_env_file(env_path)?;
    let vars: HashMap<String, String> = ENV_KEYS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();
    apply_env(&mut config, |key| vars.get(key).cloned())?;

    Ok(config)
}

/// Parse a TOML configuration file; missing sections take their defaults
pub fn load_from_file(path: &Path) -> Result<ClientConfig> {
    info!("Loading configuration from: {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Load `path` into the process environment.
///
/// A missing file is not an error; the environment may already carry every
/// credential.
pub fn load_env_file(path: &Path) -> Result<()> {
    if !path.exists() {
        warn!(".env file not found at {}", path.display());
        return Ok(());
    }

    dotenv::from_path(path).map_err(|e| CliError::EnvFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!("Loaded environment from {}", path.display());
    Ok(())
}

/// Overlay environment values onto `config` using `lookup` to read them
pub fn apply_env<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let creds = &mut config.credentials;

    if let Some(api_id) = read("API_ID") {
        let parsed = api_id.parse::<i64>().map_err(|_| ConfigError::InvalidField {
            field: "API_ID",
            reason: "must be a valid integer".into(),
        })?;
        creds.api_id = Some(parsed);
    }
    if let Some(api_hash) = read("API_HASH") {
        creds.api_hash = Some(api_hash);
    }
    if let Some(phone) = read("PHONE") {
        creds.phone = Some(phone);
    }
    if let Some(session_name) = read("SESSION_NAME") {
        creds.session_name = session_name;
    }
    if let Some(retries) = read("TGECOMM_MAX_RETRIES") {
        config.session.max_retries = retries.parse().map_err(|_| ConfigError::InvalidField {
            field: "TGECOMM_MAX_RETRIES",
            reason: "must be a non-negative integer".into(),
        })?;
    }

    Ok(())
}
