//! Session lifecycle management
//!
//! [`SessionLifecycleManager`] owns the transport for one session. It drives
//! connect and authentication at start, registers the inbound handler once,
//! exposes the send and fetch operations used by the UI, and keeps the
//! connection alive with a bounded, cancellable reconnect loop.

use crate::fetcher::{sender_display_name, PacingBatchFetcher};
use crate::prompt::CredentialPrompt;
use crate::registrar::HandlerRegistrar;
use crate::sender::SendSerializer;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tgecomm_core::{
    entity_name, metrics::tags, Account, ClientConfig, Dialog, ErrorKind, IncomingHandler,
    IncomingMessage, MessageRecord, MetricsCollector, MetricsSummary, SessionError,
    SessionResult, Transport, TransportError,
};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// States and Outcomes
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    SecondFactorPending,
    HandlersRegistering,
    Running,
    Reconnecting,
    GaveUp,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::SecondFactorPending => "2fa-pending",
            SessionState::HandlersRegistering => "handlers-registering",
            SessionState::Running => "running",
            SessionState::Reconnecting => "reconnecting",
            SessionState::GaveUp => "gave-up",
        };
        f.write_str(name)
    }
}

/// How a call to [`SessionLifecycleManager::run`] ended without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stop was requested by the user
    Stopped,
    /// The remote side closed the connection cleanly
    Closed,
}

/// A fetched message with its sender resolved for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub message: MessageRecord,
    pub sender_name: String,
}

/// An inbound message rendered for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundView {
    pub sender_name: String,
    pub chat_name: String,
    pub body: String,
    pub date: String,
}

impl From<&IncomingMessage> for InboundView {
    fn from(incoming: &IncomingMessage) -> Self {
        Self {
            sender_name: entity_name(incoming.sender.as_ref()),
            chat_name: entity_name(incoming.chat.as_ref()),
            body: incoming.message.body(),
            date: incoming.message.formatted_date(),
        }
    }
}

/// Receives every inbound message after it has been counted
pub type InboundSink = Arc<dyn Fn(InboundView) + Send + Sync>;

// ----------------------------------------------------------------------------
// Stop Signal
// ----------------------------------------------------------------------------

/// Requests a running session to stop
///
/// Cloneable so a signal handler task can hold one while the manager runs.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

async fn wait_for_stop(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ----------------------------------------------------------------------------
// Session Lifecycle Manager
// ----------------------------------------------------------------------------

pub struct SessionLifecycleManager {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    metrics: Arc<MetricsCollector>,
    prompt: Arc<dyn CredentialPrompt>,
    sink: InboundSink,
    registrar: HandlerRegistrar,
    sender: SendSerializer,
    fetcher: PacingBatchFetcher,
    state: Mutex<SessionState>,
    retry_count: AtomicU32,
    stop: StopHandle,
}

impl SessionLifecycleManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        metrics: Arc<MetricsCollector>,
        prompt: Arc<dyn CredentialPrompt>,
        sink: InboundSink,
    ) -> Self {
        let sender = SendSerializer::new(config.limits.max_message_length, metrics.clone());
        let fetcher = PacingBatchFetcher::new(config.session.fetch_pacing, metrics.clone());
        let (tx, _rx) = watch::channel(false);

        Self {
            transport,
            config,
            metrics,
            prompt,
            sink,
            registrar: HandlerRegistrar::new(),
            sender,
            fetcher,
            state: Mutex::new(SessionState::Disconnected),
            retry_count: AtomicU32::new(0),
            stop: StopHandle { tx: Arc::new(tx) },
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            debug!("Session state {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Reconnect attempts made so far, cumulative for the session
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Acquire)
    }

    pub fn handlers_registered(&self) -> bool {
        self.registrar.is_registered()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Ask a running [`run`](Self::run) loop to end
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    // ------------------------------------------------------------------------
    // Start
    // ------------------------------------------------------------------------

    /// Connect, authenticate and register the inbound handler.
    ///
    /// Any failure here is fatal for the session and leaves it
    /// `Disconnected`.
    pub async fn start(&self) -> SessionResult<Account> {
        self.stop.tx.send_replace(false);
        info!("Starting client session '{}'", self.config.credentials.session_name);

        self.set_state(SessionState::Connecting);
        if let Err(err) = self.transport.connect().await {
            let err = SessionError::unrecoverable(err);
            return Err(self.fail_start("connect", ErrorKind::ConnectionLost, err));
        }

        let account = match self.authenticate().await {
            Ok(account) => account,
            Err(err) => return Err(self.fail_start("authenticate", ErrorKind::Authentication, err)),
        };
        info!("Logged in as: {} ({})", account.first_name, account.handle());

        self.set_state(SessionState::HandlersRegistering);
        if let Err(err) = self.register_handlers().await {
            let err = SessionError::unrecoverable(err);
            return Err(self.fail_start("register_handlers", ErrorKind::Transport, err));
        }

        self.set_state(SessionState::Running);
        self.metrics.incr("session_starts");
        Ok(account)
    }

    fn fail_start(&self, stage: &str, kind: ErrorKind, err: SessionError) -> SessionError {
        error!("Failed to start client at {}: {}", stage, err);
        self.metrics.record_error(
            kind.as_str(),
            err.to_string(),
            &[("stage", &stage)],
        );
        self.set_state(SessionState::Disconnected);
        match err {
            SessionError::Unrecoverable { .. } | SessionError::Config(_) => err,
            other => SessionError::unrecoverable(other),
        }
    }

    async fn authenticate(&self) -> SessionResult<Account> {
        self.set_state(SessionState::Authenticating);
        let phone = self.config.phone()?;

        match self.transport.authenticate(phone).await {
            Ok(account) => Ok(account),
            Err(TransportError::PasswordRequired) => {
                self.set_state(SessionState::SecondFactorPending);
                let password = self
                    .prompt
                    .second_factor_password()
                    .await
                    .map_err(|e| {
                        SessionError::unrecoverable(format!("password prompt failed: {}", e))
                    })?;

                let account = self
                    .transport
                    .sign_in(&password)
                    .await
                    .map_err(SessionError::unrecoverable)?;
                info!("2FA authentication successful");
                Ok(account)
            }
            Err(err) => Err(SessionError::unrecoverable(err)),
        }
    }

    async fn register_handlers(&self) -> Result<bool, TransportError> {
        let handler = self.inbound_handler();
        let transport = self.transport.clone();
        self.registrar
            .ensure_registered(move || transport.on_incoming_message(handler))
            .await
    }

    fn inbound_handler(&self) -> IncomingHandler {
        let metrics = self.metrics.clone();
        let sink = self.sink.clone();
        Arc::new(move |incoming: IncomingMessage| {
            let view = InboundView::from(&incoming);
            metrics.incr("messages_received");
            info!("New message from {} in {}", view.sender_name, view.chat_name);
            sink(view);
        })
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    /// Send `message` to `recipient`, returning whether it was delivered
    pub async fn send(&self, recipient: &str, message: &str) -> bool {
        self.try_send(recipient, message).await.is_ok()
    }

    pub async fn try_send(&self, recipient: &str, message: &str) -> SessionResult<()> {
        let transport = &self.transport;
        self.sender
            .send(recipient, message, || transport.send_message(recipient, message))
            .await
    }

    /// Fetch recent messages from `chat`, oldest first
    ///
    /// Failures are recorded and yield an empty list.
    pub async fn fetch_messages(&self, chat: &str, limit: usize) -> Vec<DisplayMessage> {
        self.try_fetch_messages(chat, limit)
            .await
            .unwrap_or_default()
    }

    pub async fn try_fetch_messages(
        &self,
        chat: &str,
        limit: usize,
    ) -> SessionResult<Vec<DisplayMessage>> {
        let limit = self.checked_limit(limit, self.config.limits.max_messages_limit)?;
        let limit_tag = limit.to_string();
        let _timer = self.metrics.time(
            "get_messages",
            tags([("chat", chat), ("limit", limit_tag.as_str())]),
        );

        let mut messages = match self.transport.fetch_messages(chat, limit).await {
            Ok(messages) => messages,
            Err(err) => {
                self.record_fetch_failure(chat, &err);
                return Err(SessionError::from_transport(&err, chat));
            }
        };

        if messages.is_empty() {
            info!("No messages found in {}", chat);
            return Ok(Vec::new());
        }

        messages.reverse();
        let senders = self
            .fetcher
            .fetch_senders_for(
                self.transport.as_ref(),
                &messages,
                self.config.session.fetch_batch_size,
            )
            .await;

        self.metrics
            .increment("messages_retrieved", messages.len() as u64, tags([("chat", chat)]));
        info!("Retrieved {} messages from {}", messages.len(), chat);

        Ok(messages
            .into_iter()
            .zip(senders.iter())
            .map(|(message, sender)| DisplayMessage {
                message,
                sender_name: sender_display_name(sender),
            })
            .collect())
    }

    /// List dialogs, failures yield an empty list
    pub async fn fetch_dialogs(&self, limit: usize) -> Vec<Dialog> {
        self.try_fetch_dialogs(limit).await.unwrap_or_default()
    }

    pub async fn try_fetch_dialogs(&self, limit: usize) -> SessionResult<Vec<Dialog>> {
        let limit = self.checked_limit(limit, self.config.limits.max_dialogs_limit)?;
        let limit_tag = limit.to_string();
        let _timer = self
            .metrics
            .time("get_dialogs", tags([("limit", limit_tag.as_str())]));

        match self.transport.fetch_dialogs(limit).await {
            Ok(dialogs) => {
                self.metrics
                    .increment("dialogs_retrieved", dialogs.len() as u64, tags([]));
                info!("Retrieved {} dialogs", dialogs.len());
                Ok(dialogs)
            }
            Err(err) => {
                error!("Error getting dialogs: {}", err);
                self.metrics.record_error(
                    ErrorKind::Transport.as_str(),
                    err.to_string(),
                    &[("operation", &"get_dialogs"), ("error_type", &err.name())],
                );
                Err(SessionError::from_transport(&err, "dialogs"))
            }
        }
    }

    fn checked_limit(&self, limit: usize, max: usize) -> SessionResult<usize> {
        if limit == 0 {
            warn!("Rejected non-positive limit");
            self.metrics.record_error(
                ErrorKind::Validation.as_str(),
                "Invalid limit",
                &[("limit", &limit)],
            );
            return Err(SessionError::validation("limit must be a positive number"));
        }
        if limit > max {
            warn!("Limit {} exceeds maximum {}, clamping", limit, max);
            return Ok(max);
        }
        Ok(limit)
    }

    fn record_fetch_failure(&self, chat: &str, err: &TransportError) {
        let kind = ErrorKind::for_fetch(err);
        let message = match kind {
            ErrorKind::ChatNotFound => format!("Chat not found: {}", chat),
            _ => err.to_string(),
        };
        error!("Error getting messages from {}: {}", chat, err);
        self.metrics.record_error(
            kind.as_str(),
            message,
            &[("chat", &chat), ("error_type", &err.name())],
        );
    }

    // ------------------------------------------------------------------------
    // Run Loop
    // ------------------------------------------------------------------------

    /// Listen for inbound messages until stopped or retries are exhausted.
    ///
    /// Connection loss is retried up to `max_retries` times over the life of
    /// the session, waiting the configured cooldown before each attempt. A
    /// stop request ends the loop immediately, including during the cooldown
    /// and while a reconnect attempt is in flight.
    pub async fn run(&self, max_retries: u32) -> SessionResult<RunOutcome> {
        info!("Client is now running and listening for messages");

        loop {
            if self.stop.is_stopped() {
                return Ok(self.finish_stopped());
            }

            let result = tokio::select! {
                biased;
                _ = wait_for_stop(self.stop.tx.subscribe()) => None,
                result = self.transport.run_until_disconnected() => Some(result),
            };

            let err = match result {
                None | Some(Err(TransportError::Interrupted)) => {
                    return Ok(self.finish_stopped());
                }
                Some(Ok(())) if self.stop.is_stopped() => {
                    return Ok(self.finish_stopped());
                }
                Some(Ok(())) => {
                    info!("Connection closed by remote");
                    self.set_state(SessionState::Disconnected);
                    return Ok(RunOutcome::Closed);
                }
                Some(Err(err)) => err,
            };

            warn!("Connection lost: {}", err);
            self.metrics.record_error(
                ErrorKind::ConnectionLost.as_str(),
                err.to_string(),
                &[("retry_count", &self.retry_count())],
            );

            if let Some(outcome) = self
                .reconnect_with_cooldown(max_retries, err.to_string())
                .await?
            {
                return Ok(outcome);
            }
        }
    }

    fn finish_stopped(&self) -> RunOutcome {
        info!("Client stopped by user");
        self.set_state(SessionState::Disconnected);
        RunOutcome::Stopped
    }

    /// Retry until a reconnect succeeds, the session is stopped, or the
    /// retry budget runs out
    async fn reconnect_with_cooldown(
        &self,
        max_retries: u32,
        mut last_error: String,
    ) -> SessionResult<Option<RunOutcome>> {
        loop {
            let attempts = self.retry_count();
            if attempts >= max_retries {
                self.set_state(SessionState::GaveUp);
                error!("Max retries ({}) reached, giving up", max_retries);
                self.metrics.record_error(
                    ErrorKind::RetriesExhausted.as_str(),
                    format!("Giving up after {} reconnect attempts", attempts),
                    &[("max_retries", &max_retries), ("last_error", &last_error)],
                );
                return Err(SessionError::unrecoverable(format!(
                    "connection lost after {} reconnect attempts: {}",
                    attempts, last_error
                )));
            }

            self.set_state(SessionState::Reconnecting);
            let cooldown = self.config.session.reconnect_cooldown;
            info!(
                "Reconnecting in {:?} (attempt {}/{})",
                cooldown,
                attempts + 1,
                max_retries
            );

            tokio::select! {
                biased;
                _ = wait_for_stop(self.stop.tx.subscribe()) => {
                    return Ok(Some(self.finish_stopped()));
                }
                _ = sleep(cooldown) => {}
            }

            self.retry_count.fetch_add(1, Ordering::AcqRel);
            self.metrics.incr("reconnect_attempts");

            let attempt = tokio::select! {
                biased;
                _ = wait_for_stop(self.stop.tx.subscribe()) => {
                    return Ok(Some(self.finish_stopped()));
                }
                result = self.reconnect() => result,
            };

            match attempt {
                Ok(()) => {
                    info!("Reconnected successfully");
                    self.metrics.incr("reconnects");
                    self.set_state(SessionState::Running);
                    return Ok(None);
                }
                Err(err) => {
                    warn!("Reconnect failed: {}", err);
                    self.metrics.record_error(
                        ErrorKind::ConnectionLost.as_str(),
                        format!("Reconnect failed: {}", err),
                        &[("retry_count", &self.retry_count())],
                    );
                    last_error = err.to_string();
                }
            }
        }
    }

    async fn reconnect(&self) -> SessionResult<()> {
        if !self.transport.is_connected() {
            self.transport
                .connect()
                .await
                .map_err(|e| SessionError::from_transport(&e, "reconnect"))?;
        }

        let authorized = self
            .transport
            .is_authorized()
            .await
            .map_err(|e| SessionError::from_transport(&e, "reconnect"))?;
        if !authorized {
            info!("Session no longer authorized, re-authenticating");
            self.authenticate().await?;
        }

        // The transport keeps the callback across reconnects, so this only
        // registers when start() never completed registration.
        if self.register_handlers().await.map_err(SessionError::unrecoverable)? {
            warn!("Inbound handler registered during reconnect");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Disconnect
    // ------------------------------------------------------------------------

    /// Disconnect from the remote service, a no-op when already disconnected
    pub async fn disconnect(&self) -> SessionResult<()> {
        self.stop.stop();

        if !self.transport.is_connected() {
            debug!("Disconnect requested while not connected");
            self.set_state(SessionState::Disconnected);
            return Ok(());
        }

        match self.transport.disconnect().await {
            Ok(()) => {
                info!("Client disconnected");
                self.set_state(SessionState::Disconnected);
                Ok(())
            }
            Err(err) => {
                error!("Error disconnecting client: {}", err);
                self.metrics.record_error(
                    ErrorKind::Transport.as_str(),
                    err.to_string(),
                    &[("operation", &"disconnect")],
                );
                Err(SessionError::from_transport(&err, "disconnect"))
            }
        }
    }
}

impl fmt::Debug for SessionLifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLifecycleManager")
            .field("state", &self.state())
            .field("retry_count", &self.retry_count())
            .field("handlers_registered", &self.handlers_registered())
            .finish_non_exhaustive()
    }
}
