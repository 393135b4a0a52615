//! Transport capability and the records it exchanges
//!
//! The wire protocol, authentication handshake and persisted session
//! material belong to the transport implementation. The session core only
//! depends on the [`Transport`] trait defined here.

use crate::errors::TransportResult;
use crate::media::{format_media_info, Media};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Records
// ----------------------------------------------------------------------------

/// A user, group chat or channel known to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    User {
        id: i64,
        username: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
    },
    Chat {
        id: i64,
        title: Option<String>,
    },
    Channel {
        id: i64,
        title: Option<String>,
    },
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Entity::User { id, .. } | Entity::Chat { id, .. } | Entity::Channel { id, .. } => *id,
        }
    }

    /// Name shown to the user: `@username`, full name, or title
    pub fn display_name(&self) -> String {
        match self {
            Entity::User {
                id,
                username,
                first_name,
                last_name,
            } => {
                if let Some(username) = username.as_deref().filter(|u| !u.is_empty()) {
                    return format!("@{}", username);
                }
                let name = format!(
                    "{} {}",
                    first_name.as_deref().unwrap_or(""),
                    last_name.as_deref().unwrap_or("")
                );
                let name = name.trim();
                if name.is_empty() {
                    format!("User {}", id)
                } else {
                    name.to_string()
                }
            }
            Entity::Chat { title, .. } | Entity::Channel { title, .. } => title
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or("Unknown Chat")
                .to_string(),
        }
    }
}

/// Display name for an optional entity
pub fn entity_name(entity: Option<&Entity>) -> String {
    entity
        .map(Entity::display_name)
        .unwrap_or_else(|| "Unknown".to_string())
}

/// A message as returned by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub media: Option<Media>,
}

impl MessageRecord {
    /// Text body, media description, or `[Empty message]`
    pub fn body(&self) -> String {
        match (&self.text, &self.media) {
            (Some(text), _) if !text.is_empty() => text.clone(),
            (_, Some(media)) => format_media_info(media),
            _ => "[Empty message]".to_string(),
        }
    }

    pub fn formatted_date(&self) -> String {
        self.date
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown date".to_string())
    }
}

/// A conversation listed by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    pub id: i64,
    pub name: String,
}

/// The authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

impl Account {
    pub fn handle(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => "No username".to_string(),
        }
    }
}

/// An inbound notification delivered to the registered callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message: MessageRecord,
    pub sender: Option<Entity>,
    pub chat: Option<Entity>,
}

/// Callback invoked for every inbound message
pub type IncomingHandler = Arc<dyn Fn(IncomingMessage) + Send + Sync>;

// ----------------------------------------------------------------------------
// Transport Capability
// ----------------------------------------------------------------------------

/// Connection to the remote messaging service
///
/// Implementations use interior mutability so one instance can be shared by
/// the lifecycle loop and concurrent send/fetch flows.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> TransportResult<()>;

    async fn disconnect(&self) -> TransportResult<()>;

    fn is_connected(&self) -> bool;

    async fn is_authorized(&self) -> TransportResult<bool>;

    /// Authenticate with the primary credential.
    ///
    /// Fails with `TransportError::PasswordRequired` when the account has a
    /// second factor enabled.
    async fn authenticate(&self, phone: &str) -> TransportResult<Account>;

    /// Complete authentication with the second-factor password
    async fn sign_in(&self, password: &str) -> TransportResult<Account>;

    async fn send_message(&self, recipient: &str, text: &str) -> TransportResult<()>;

    /// Fetch up to `limit` messages from `chat`, newest first
    async fn fetch_messages(&self, chat: &str, limit: usize) -> TransportResult<Vec<MessageRecord>>;

    async fn fetch_dialogs(&self, limit: usize) -> TransportResult<Vec<Dialog>>;

    async fn get_sender(&self, message: &MessageRecord) -> TransportResult<Option<Entity>>;

    /// Suspend until the connection ends
    async fn run_until_disconnected(&self) -> TransportResult<()>;

    /// Attach the inbound message callback
    fn on_incoming_message(&self, handler: IncomingHandler) -> TransportResult<()>;
}
