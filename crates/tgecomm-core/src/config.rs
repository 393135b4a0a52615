//! Session Configuration
//!
//! Typed configuration for the TGecomm session: account credentials, request
//! limits, and the resilience settings used by the session runtime.

use crate::errors::ConfigError;
use crate::validators::{mask_sensitive_data, validate_api_hash, validate_phone_number};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Credentials
// ----------------------------------------------------------------------------

/// Account credentials and session identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_id: Option<i64>,
    pub api_hash: Option<String>,
    /// Phone number in international format (`+1234567890`)
    pub phone: Option<String>,
    /// Name of the persisted session owned by the transport
    pub session_name: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_id: None,
            api_hash: None,
            phone: None,
            session_name: "tgecomm_session".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Limits
// ----------------------------------------------------------------------------

/// Request size limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum outbound message length in characters
    pub max_message_length: usize,
    /// Upper bound applied to dialog listings
    pub max_dialogs_limit: usize,
    /// Upper bound applied to message history fetches
    pub max_messages_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_length: 4096,
            max_dialogs_limit: 10_000,
            max_messages_limit: 10_000,
        }
    }
}

// ----------------------------------------------------------------------------
// Session Runtime
// ----------------------------------------------------------------------------

/// Reconnect, pacing and telemetry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reconnect attempts before giving up
    pub max_retries: u32,
    /// Wait before each reconnect attempt
    pub reconnect_cooldown: Duration,
    /// Sender lookups dispatched concurrently per batch
    pub fetch_batch_size: usize,
    /// Pause between sender lookup batches
    pub fetch_pacing: Duration,
    /// Error records retained by the metrics collector
    pub error_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            reconnect_cooldown: Duration::from_secs(300),
            fetch_batch_size: 5,
            fetch_pacing: Duration::from_millis(500),
            error_log_capacity: 1000,
        }
    }
}

impl SessionConfig {
    /// Short waits for tests and offline demos
    pub fn testing() -> Self {
        Self {
            max_retries: 3,
            reconnect_cooldown: Duration::from_millis(10),
            fetch_batch_size: 5,
            fetch_pacing: Duration::from_millis(1),
            error_log_capacity: 100,
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for a TGecomm client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub credentials: CredentialsConfig,
    pub limits: LimitsConfig,
    pub session: SessionConfig,
}

/// Configuration values safe to log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedConfig {
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,
    pub session_name: String,
}

impl ClientConfig {
    /// Check credentials and limits, reporting every problem at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        let creds = &self.credentials;

        if creds.api_id.is_none() {
            problems.push("API_ID is not set".to_string());
        }

        match creds.api_hash.as_deref() {
            None | Some("") => problems.push("API_HASH is not set".to_string()),
            Some(hash) if !validate_api_hash(hash) => {
                problems.push("API_HASH must be a 32-character hexadecimal string".to_string())
            }
            _ => {}
        }

        match creds.phone.as_deref() {
            None | Some("") => problems.push("PHONE is not set".to_string()),
            Some(phone) if !validate_phone_number(phone) => problems
                .push("PHONE format is invalid. Must be in format +1234567890".to_string()),
            _ => {}
        }

        if self.limits.max_message_length == 0 {
            problems.push("max_message_length must be greater than zero".to_string());
        }
        if self.session.fetch_batch_size == 0 {
            problems.push("fetch_batch_size must be greater than zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(problems))
        }
    }

    /// Phone number, or an error if it was never configured
    pub fn phone(&self) -> Result<&str, ConfigError> {
        self.credentials
            .phone
            .as_deref()
            .ok_or(ConfigError::MissingField { field: "PHONE" })
    }

    pub fn masked(&self) -> MaskedConfig {
        let creds = &self.credentials;
        MaskedConfig {
            api_id: creds.api_id.map(|id| id.to_string()),
            api_hash: creds
                .api_hash
                .as_deref()
                .map(|h| mask_sensitive_data(Some(h), 4)),
            phone: creds
                .phone
                .as_deref()
                .map(|p| mask_sensitive_data(Some(p), 2)),
            session_name: creds.session_name.clone(),
        }
    }
}
