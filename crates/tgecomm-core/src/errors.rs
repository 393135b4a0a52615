//! Error types for the TGecomm session
//!
//! This module contains the failure taxonomy shared by every component: the
//! errors a transport reports, the classified errors the session surfaces to
//! its callers, configuration errors, and the stable metric names used when a
//! failure is recorded.

use core::fmt;

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures reported by the transport collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Rate limited: retry after {seconds}s")]
    RateLimited { seconds: u64 },
    #[error("Recipient is invalid: {recipient}")]
    RecipientInvalid { recipient: String },
    #[error("Chat is invalid: {chat}")]
    ChatInvalid { chat: String },
    #[error("Channel is private: {target}")]
    ChannelPrivate { target: String },
    #[error("Not found: {target}")]
    NotFound { target: String },
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Second-factor password required")]
    PasswordRequired,
    #[error("Session is not authorized")]
    Unauthorized,
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },
    #[error("Interrupted by user")]
    Interrupted,
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short variant name, used as error-record context
    pub fn name(&self) -> &'static str {
        match self {
            TransportError::RateLimited { .. } => "RateLimited",
            TransportError::RecipientInvalid { .. } => "RecipientInvalid",
            TransportError::ChatInvalid { .. } => "ChatInvalid",
            TransportError::ChannelPrivate { .. } => "ChannelPrivate",
            TransportError::NotFound { .. } => "NotFound",
            TransportError::EmptyMessage => "EmptyMessage",
            TransportError::PasswordRequired => "PasswordRequired",
            TransportError::Unauthorized => "Unauthorized",
            TransportError::ConnectionLost { .. } => "ConnectionLost",
            TransportError::Interrupted => "Interrupted",
            TransportError::Other(_) => "Other",
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

// ----------------------------------------------------------------------------
// Configuration Errors
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} is not set")]
    MissingField { field: &'static str },
    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("Configuration validation failed:\n{}", format_report(.0))]
    Validation(Vec<String>),
}

fn format_report(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {}", p))
        .collect::<Vec<_>>()
        .join("\n")
}

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Classified failures surfaced by the session core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Malformed input caught before any remote call
    #[error("Validation error: {0}")]
    Validation(String),
    /// Remote-imposed cooldown; the caller may retry after waiting
    #[error("Rate limited: wait {seconds} seconds")]
    RateLimited { seconds: u64 },
    /// Recipient or chat does not exist or is not accessible
    #[error("Not found or inaccessible: {target}")]
    NotFoundOrInaccessible { target: String },
    /// Transient connection failure
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },
    /// Authentication failure at start, or reconnect retries exhausted
    #[error("Unrecoverable: {reason}")]
    Unrecoverable { reason: String },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    pub fn validation(reason: impl Into<String>) -> Self {
        SessionError::Validation(reason.into())
    }

    pub fn unrecoverable(reason: impl fmt::Display) -> Self {
        SessionError::Unrecoverable {
            reason: reason.to_string(),
        }
    }

    /// Whether the lifecycle retry policy applies to this failure
    pub fn is_retriable(&self) -> bool {
        matches!(self, SessionError::ConnectionLost { .. })
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

// ----------------------------------------------------------------------------
// Error Kinds
// ----------------------------------------------------------------------------

/// Stable names under which classified failures are recorded in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    RateLimited,
    RecipientNotFound,
    RecipientPrivate,
    EmptyPayload,
    ChatNotFound,
    ConnectionLost,
    Authentication,
    RetriesExhausted,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::RateLimited => "FloodWaitError",
            ErrorKind::RecipientNotFound => "NotFoundError",
            ErrorKind::RecipientPrivate => "ChannelPrivateError",
            ErrorKind::EmptyPayload => "MessageEmptyError",
            ErrorKind::ChatNotFound => "ChatNotFoundError",
            ErrorKind::ConnectionLost => "ConnectionLost",
            ErrorKind::Authentication => "AuthenticationError",
            ErrorKind::RetriesExhausted => "RetriesExhausted",
            ErrorKind::Transport => "TransportError",
        }
    }

    /// Classify a failure returned by an outbound send
    pub fn for_send(err: &TransportError) -> Self {
        match err {
            TransportError::RateLimited { .. } => ErrorKind::RateLimited,
            TransportError::RecipientInvalid { .. }
            | TransportError::ChatInvalid { .. }
            | TransportError::NotFound { .. } => ErrorKind::RecipientNotFound,
            TransportError::ChannelPrivate { .. } => ErrorKind::RecipientPrivate,
            TransportError::EmptyMessage => ErrorKind::EmptyPayload,
            TransportError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            _ => ErrorKind::Transport,
        }
    }

    /// Classify a failure returned by a chat history fetch
    pub fn for_fetch(err: &TransportError) -> Self {
        match err {
            TransportError::ChatInvalid { .. }
            | TransportError::ChannelPrivate { .. }
            | TransportError::NotFound { .. }
            | TransportError::RecipientInvalid { .. } => ErrorKind::ChatNotFound,
            TransportError::RateLimited { .. } => ErrorKind::RateLimited,
            TransportError::ConnectionLost { .. } => ErrorKind::ConnectionLost,
            _ => ErrorKind::Transport,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SessionError {
    /// Convert a transport failure into the session taxonomy
    pub fn from_transport(err: &TransportError, target: &str) -> Self {
        match err {
            TransportError::RateLimited { seconds } => {
                SessionError::RateLimited { seconds: *seconds }
            }
            TransportError::RecipientInvalid { .. }
            | TransportError::ChatInvalid { .. }
            | TransportError::ChannelPrivate { .. }
            | TransportError::NotFound { .. } => SessionError::NotFoundOrInaccessible {
                target: target.to_string(),
            },
            TransportError::EmptyMessage => SessionError::validation("message is empty"),
            TransportError::ConnectionLost { reason } => SessionError::ConnectionLost {
                reason: reason.clone(),
            },
            other => SessionError::unrecoverable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_classification() {
        assert_eq!(
            ErrorKind::for_send(&TransportError::RateLimited { seconds: 30 }),
            ErrorKind::RateLimited
        );
        assert_eq!(
            ErrorKind::for_send(&TransportError::RecipientInvalid {
                recipient: "@nobody".into()
            }),
            ErrorKind::RecipientNotFound
        );
        assert_eq!(
            ErrorKind::for_send(&TransportError::ChannelPrivate { target: "x".into() }),
            ErrorKind::RecipientPrivate
        );
        assert_eq!(
            ErrorKind::for_send(&TransportError::EmptyMessage),
            ErrorKind::EmptyPayload
        );
        assert_eq!(
            ErrorKind::for_send(&TransportError::Other("boom".into())),
            ErrorKind::Transport
        );
    }

    #[test]
    fn test_fetch_classification() {
        for err in [
            TransportError::ChatInvalid { chat: "c".into() },
            TransportError::ChannelPrivate { target: "c".into() },
            TransportError::NotFound { target: "c".into() },
        ] {
            assert_eq!(ErrorKind::for_fetch(&err), ErrorKind::ChatNotFound);
        }
    }

    #[test]
    fn test_session_error_from_transport() {
        let err =
            SessionError::from_transport(&TransportError::RateLimited { seconds: 12 }, "@bob");
        assert_eq!(err, SessionError::RateLimited { seconds: 12 });

        let private = TransportError::ChannelPrivate { target: "c".into() };
        let err = SessionError::from_transport(&private, "c");
        assert!(matches!(err, SessionError::NotFoundOrInaccessible { .. }));

        let lost = TransportError::ConnectionLost { reason: "eof".into() };
        let err = SessionError::from_transport(&lost, "");
        assert!(err.is_retriable());
    }

    #[test]
    fn test_validation_report_lists_every_problem() {
        let err = ConfigError::Validation(vec![
            "API_ID is not set".into(),
            "PHONE is invalid".into(),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("  - API_ID is not set"));
        assert!(rendered.contains("  - PHONE is invalid"));
    }
}
