//! Scripted transport shared by the runtime integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tgecomm_core::{
    Account, ClientConfig, Dialog, Entity, IncomingHandler, IncomingMessage, MessageRecord,
    MetricsCollector, SessionConfig, Transport, TransportError, TransportResult,
};
use tgecomm_runtime::{SessionBuilder, SessionLifecycleManager, StaticPrompt};
use tokio::sync::Notify;

pub fn test_account() -> Account {
    Account {
        id: 7,
        first_name: "Test".into(),
        username: Some("tester".into()),
    }
}

pub fn valid_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.credentials.api_id = Some(12345);
    config.credentials.api_hash = Some("0123456789abcdef0123456789abcdef".into());
    config.credentials.phone = Some("+1234567890".into());
    config
}

/// Configuration with production cooldown, for paused-clock tests
pub fn paused_clock_config() -> ClientConfig {
    valid_config()
}

/// Configuration with millisecond waits
pub fn fast_config() -> ClientConfig {
    let mut config = valid_config();
    config.session = SessionConfig::testing();
    config
}

pub fn message(id: i64, sender_id: i64, text: &str) -> MessageRecord {
    MessageRecord {
        id,
        chat_id: 100,
        sender_id: Some(sender_id),
        date: None,
        text: Some(text.to_string()),
        media: None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

// ----------------------------------------------------------------------------
// Scripted Transport
// ----------------------------------------------------------------------------

/// Transport whose behaviour is scripted per test and whose calls are counted
#[derive(Default)]
pub struct ScriptedTransport {
    connected: AtomicBool,
    authorized: AtomicBool,
    pub require_password: AtomicBool,
    pub deauthorize_on_drop: AtomicBool,

    run_script: Mutex<VecDeque<TransportResult<()>>>,
    connect_failures: AtomicUsize,
    hang_connects: AtomicBool,
    auth_error: Mutex<Option<TransportError>>,

    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    pub authenticate_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    run_entered: Notify,

    send_delay: Mutex<Duration>,
    send_error: Mutex<Option<TransportError>>,
    sends_in_flight: AtomicUsize,
    pub max_send_overlap: AtomicUsize,
    pub send_calls: AtomicUsize,

    history: Mutex<Vec<MessageRecord>>,
    fetch_error: Mutex<Option<TransportError>>,
    failing_senders: Mutex<HashSet<i64>>,
    dialogs: Mutex<Vec<Dialog>>,

    handler: Mutex<Option<IncomingHandler>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the results of successive `run_until_disconnected` calls.
    /// Once the script is exhausted the call waits until cancelled.
    pub fn script_runs(&self, results: impl IntoIterator<Item = TransportResult<()>>) {
        lock(&self.run_script).extend(results);
    }

    pub fn drop_connection(&self, times: usize) {
        self.script_runs((0..times).map(|_| {
            Err(TransportError::ConnectionLost {
                reason: "network unreachable".into(),
            })
        }));
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make every later `connect` wait forever
    pub fn hang_connects(&self) {
        self.hang_connects.store(true, Ordering::SeqCst);
    }

    pub fn fail_authentication(&self, err: TransportError) {
        *lock(&self.auth_error) = Some(err);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *lock(&self.send_delay) = delay;
    }

    pub fn fail_sends(&self, err: TransportError) {
        *lock(&self.send_error) = Some(err);
    }

    /// Messages in display order; the transport returns them newest first
    pub fn set_history(&self, oldest_first: Vec<MessageRecord>) {
        *lock(&self.history) = oldest_first;
    }

    pub fn fail_fetches(&self, err: TransportError) {
        *lock(&self.fetch_error) = Some(err);
    }

    pub fn fail_sender_lookup(&self, sender_id: i64) {
        lock(&self.failing_senders).insert(sender_id);
    }

    pub fn set_dialogs(&self, dialogs: Vec<Dialog>) {
        *lock(&self.dialogs) = dialogs;
    }

    /// Wait until `run_until_disconnected` has been entered `count` times
    pub async fn wait_for_runs(&self, count: usize) {
        loop {
            let notified = self.run_entered.notified();
            if self.run_calls.load(Ordering::SeqCst) >= count {
                return;
            }
            notified.await;
        }
    }

    /// Deliver an inbound message through the registered callback
    pub fn deliver(&self, incoming: IncomingMessage) -> bool {
        let handler = lock(&self.handler).clone();
        match handler {
            Some(handler) => {
                handler(incoming);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self) -> TransportResult<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_connects.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionLost {
                reason: "connect refused".into(),
            });
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn is_authorized(&self) -> TransportResult<bool> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn authenticate(&self, _phone: &str) -> TransportResult<Account> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.auth_error).clone() {
            return Err(err);
        }
        if self.require_password.load(Ordering::SeqCst) {
            return Err(TransportError::PasswordRequired);
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(test_account())
    }

    async fn sign_in(&self, password: &str) -> TransportResult<Account> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if password != "correct horse" {
            return Err(TransportError::Unauthorized);
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(test_account())
    }

    async fn send_message(&self, _recipient: &str, _text: &str) -> TransportResult<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.sends_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_send_overlap.fetch_max(in_flight, Ordering::SeqCst);

        let delay = *lock(&self.send_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.sends_in_flight.fetch_sub(1, Ordering::SeqCst);
        match lock(&self.send_error).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_messages(
        &self,
        _chat: &str,
        limit: usize,
    ) -> TransportResult<Vec<MessageRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.fetch_error).clone() {
            return Err(err);
        }
        Ok(lock(&self.history).iter().rev().take(limit).cloned().collect())
    }

    async fn fetch_dialogs(&self, limit: usize) -> TransportResult<Vec<Dialog>> {
        Ok(lock(&self.dialogs).iter().take(limit).cloned().collect())
    }

    async fn get_sender(&self, message: &MessageRecord) -> TransportResult<Option<Entity>> {
        let Some(sender_id) = message.sender_id else {
            return Ok(None);
        };
        if lock(&self.failing_senders).contains(&sender_id) {
            return Err(TransportError::NotFound {
                target: sender_id.to_string(),
            });
        }
        Ok(Some(Entity::User {
            id: sender_id,
            username: Some(format!("user{}", sender_id)),
            first_name: None,
            last_name: None,
        }))
    }

    async fn run_until_disconnected(&self) -> TransportResult<()> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.run_entered.notify_waiters();

        let next = lock(&self.run_script).pop_front();
        match next {
            Some(Err(err)) => {
                self.connected.store(false, Ordering::SeqCst);
                if self.deauthorize_on_drop.load(Ordering::SeqCst) {
                    self.authorized.store(false, Ordering::SeqCst);
                }
                Err(err)
            }
            Some(Ok(())) => Ok(()),
            None => std::future::pending().await,
        }
    }

    fn on_incoming_message(&self, handler: IncomingHandler) -> TransportResult<()> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.handler) = Some(handler);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Session Construction
// ----------------------------------------------------------------------------

pub fn session(
    transport: Arc<ScriptedTransport>,
    config: ClientConfig,
) -> (Arc<SessionLifecycleManager>, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new());
    let manager = SessionBuilder::new(transport)
        .with_config(config)
        .with_metrics(metrics.clone())
        .with_prompt(Arc::new(StaticPrompt::new("correct horse")))
        .build()
        .unwrap();
    (Arc::new(manager), metrics)
}
