//! In-memory transport
//!
//! Messages sent through [`LoopbackTransport`] are stored per recipient and
//! echoed to the registered inbound callback. Used by the CLI and by tests
//! that need a transport without a remote service.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tgecomm_core::{
    Account, Dialog, Entity, IncomingHandler, IncomingMessage, MessageRecord, Transport,
    TransportError, TransportResult,
};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug)]
struct Conversation {
    id: i64,
    messages: Vec<MessageRecord>,
}

pub struct LoopbackTransport {
    account: Account,
    connected: watch::Sender<bool>,
    handler: Mutex<Option<IncomingHandler>>,
    conversations: Mutex<BTreeMap<String, Conversation>>,
    next_id: AtomicI64,
}

impl LoopbackTransport {
    pub fn new(account: Account) -> Self {
        let (connected, _rx) = watch::channel(false);
        Self {
            account,
            connected,
            handler: Mutex::new(None),
            conversations: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn self_entity(&self) -> Entity {
        Entity::User {
            id: self.account.id,
            username: self.account.username.clone(),
            first_name: Some(self.account.first_name.clone()),
            last_name: None,
        }
    }

    fn ensure_connected(&self) -> TransportResult<()> {
        if *self.connected.borrow() {
            Ok(())
        } else {
            Err(TransportError::ConnectionLost {
                reason: "not connected".into(),
            })
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `text` as sent to `recipient` and return the stored record
    fn append(&self, recipient: &str, text: &str) -> MessageRecord {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut conversations = Self::lock(&self.conversations);
        let next_chat_id = conversations.len() as i64 + 1;
        let conversation = conversations
            .entry(recipient.to_string())
            .or_insert_with(|| Conversation {
                id: next_chat_id,
                messages: Vec::new(),
            });

        let record = MessageRecord {
            id,
            chat_id: conversation.id,
            sender_id: Some(self.account.id),
            date: Some(Utc::now()),
            text: Some(text.to_string()),
            media: None,
        };
        conversation.messages.push(record.clone());
        record
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(Account {
            id: 1,
            first_name: "Loopback".into(),
            username: Some("loopback".into()),
        })
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> TransportResult<()> {
        self.connected.send_replace(true);
        debug!("Loopback connected");
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.connected.send_replace(false);
        debug!("Loopback disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        Ok(true)
    }

    async fn authenticate(&self, _phone: &str) -> TransportResult<Account> {
        self.ensure_connected()?;
        Ok(self.account.clone())
    }

    async fn sign_in(&self, _password: &str) -> TransportResult<Account> {
        self.ensure_connected()?;
        Ok(self.account.clone())
    }

    async fn send_message(&self, recipient: &str, text: &str) -> TransportResult<()> {
        self.ensure_connected()?;
        if text.trim().is_empty() {
            return Err(TransportError::EmptyMessage);
        }

        let record = self.append(recipient, text);
        let handler = Self::lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(IncomingMessage {
                chat: Some(Entity::Chat {
                    id: record.chat_id,
                    title: Some(recipient.to_string()),
                }),
                sender: Some(self.self_entity()),
                message: record,
            });
        }
        Ok(())
    }

    async fn fetch_messages(
        &self,
        chat: &str,
        limit: usize,
    ) -> TransportResult<Vec<MessageRecord>> {
        self.ensure_connected()?;
        let conversations = Self::lock(&self.conversations);
        let conversation = conversations
            .get(chat)
            .ok_or_else(|| TransportError::ChatInvalid {
                chat: chat.to_string(),
            })?;

        Ok(conversation
            .messages
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_dialogs(&self, limit: usize) -> TransportResult<Vec<Dialog>> {
        self.ensure_connected()?;
        let conversations = Self::lock(&self.conversations);
        Ok(conversations
            .iter()
            .take(limit)
            .map(|(name, conversation)| Dialog {
                id: conversation.id,
                name: name.clone(),
            })
            .collect())
    }

    async fn get_sender(&self, message: &MessageRecord) -> TransportResult<Option<Entity>> {
        Ok(match message.sender_id {
            Some(id) if id == self.account.id => Some(self.self_entity()),
            Some(id) => Some(Entity::User {
                id,
                username: None,
                first_name: None,
                last_name: None,
            }),
            None => None,
        })
    }

    async fn run_until_disconnected(&self) -> TransportResult<()> {
        self.ensure_connected()?;
        let mut rx = self.connected.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    fn on_incoming_message(&self, handler: IncomingHandler) -> TransportResult<()> {
        let mut slot = Self::lock(&self.handler);
        if slot.is_some() {
            return Err(TransportError::Other("inbound handler already registered".into()));
        }
        *slot = Some(handler);
        Ok(())
    }
}
