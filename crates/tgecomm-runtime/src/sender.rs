//! Serialized outbound sends
//!
//! At most one send is in flight per session. Validation happens before the
//! send lock is taken, and every failure is classified and recorded rather
//! than propagated past this layer.

use std::future::Future;
use std::sync::Arc;
use tgecomm_core::{
    metrics::tags, ErrorKind, MetricsCollector, SessionError, SessionResult, TransportError,
    TransportResult,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub struct SendSerializer {
    lock: Mutex<()>,
    max_message_length: usize,
    metrics: Arc<MetricsCollector>,
}

impl SendSerializer {
    pub fn new(max_message_length: usize, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            lock: Mutex::new(()),
            max_message_length,
            metrics,
        }
    }

    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }

    /// Validate `message` and run `send_fn` while holding the send lock
    pub async fn send<F, Fut>(
        &self,
        recipient: &str,
        message: &str,
        send_fn: F,
    ) -> SessionResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TransportResult<()>>,
    {
        self.validate(recipient, message)?;

        let result = {
            let _permit = self.lock.lock().await;
            let _timer = self
                .metrics
                .time("send_message", tags([("recipient", recipient)]));
            send_fn().await
        };

        match result {
            Ok(()) => {
                self.metrics
                    .increment("messages_sent", 1, tags([("recipient", recipient)]));
                info!("Message sent to {}", recipient);
                Ok(())
            }
            Err(err) => {
                self.record_failure(recipient, &err);
                Err(SessionError::from_transport(&err, recipient))
            }
        }
    }

    fn validate(&self, recipient: &str, message: &str) -> SessionResult<()> {
        if message.trim().is_empty() {
            warn!("Attempted to send empty message");
            self.metrics.record_error(
                ErrorKind::Validation.as_str(),
                "Empty message",
                &[("recipient", &recipient)],
            );
            return Err(SessionError::validation("empty message"));
        }

        let length = message.chars().count();
        if length > self.max_message_length {
            warn!(
                "Message length {} exceeds maximum {}",
                length, self.max_message_length
            );
            self.metrics.record_error(
                ErrorKind::Validation.as_str(),
                "Message too long",
                &[("length", &length), ("max_length", &self.max_message_length)],
            );
            return Err(SessionError::validation(format!(
                "too long (max {} characters)",
                self.max_message_length
            )));
        }

        Ok(())
    }

    fn record_failure(&self, recipient: &str, err: &TransportError) {
        let kind = ErrorKind::for_send(err);
        match err {
            TransportError::RateLimited { seconds } => {
                warn!("Rate limit: wait {} seconds", seconds);
                self.metrics.record_error(
                    kind.as_str(),
                    format!("Rate limit: {}s", seconds),
                    &[("recipient", &recipient), ("cooldown_seconds", seconds)],
                );
            }
            _ => {
                let message = match kind {
                    ErrorKind::RecipientNotFound => format!("Recipient not found: {}", recipient),
                    ErrorKind::RecipientPrivate => format!("Channel is private: {}", recipient),
                    ErrorKind::EmptyPayload => "Message is empty".to_string(),
                    _ => err.to_string(),
                };
                error!("Error sending message to {}: {}", recipient, err);
                self.metrics.record_error(
                    kind.as_str(),
                    message,
                    &[("recipient", &recipient), ("error_type", &err.name())],
                );
            }
        }
    }
}
