//! Session Builder API
//!
//! Provides a builder-style API for consumers (CLI and tests) to assemble a
//! [`SessionLifecycleManager`] around a transport.

use crate::lifecycle::{InboundSink, InboundView, SessionLifecycleManager};
use crate::prompt::{ConsolePrompt, CredentialPrompt};
use std::sync::Arc;
use tgecomm_core::{global_metrics, ClientConfig, MetricsCollector, SessionResult, Transport};
use tracing::info;

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

/// Builder for a session over any [`Transport`]
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    metrics: Option<Arc<MetricsCollector>>,
    prompt: Option<Arc<dyn CredentialPrompt>>,
    sink: Option<InboundSink>,
    validate: bool,
}

impl SessionBuilder {
    /// Create a new session builder
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
            metrics: None,
            prompt: None,
            sink: None,
            validate: true,
        }
    }

    /// Set the client configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Report into `metrics` instead of the process-wide collector
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Source of the second-factor password
    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Receive every inbound message
    pub fn on_message<F>(mut self, sink: F) -> Self
    where
        F: Fn(InboundView) + Send + Sync + 'static,
    {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Skip credential validation (tests with partial configuration)
    pub fn skip_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Validate the configuration and build the session
    pub fn build(self) -> SessionResult<SessionLifecycleManager> {
        if self.validate {
            self.config.validate()?;
        }

        let metrics = self.metrics.unwrap_or_else(global_metrics);
        let prompt = self
            .prompt
            .unwrap_or_else(|| Arc::new(ConsolePrompt::default()));
        let sink = self.sink.unwrap_or_else(|| {
            Arc::new(|view: InboundView| {
                info!("[{}] {}: {}", view.chat_name, view.sender_name, view.body);
            })
        });

        info!(
            "Building session '{}' (max retries {}, cooldown {:?})",
            self.config.credentials.session_name,
            self.config.session.max_retries,
            self.config.session.reconnect_cooldown
        );

        Ok(SessionLifecycleManager::new(
            self.transport,
            self.config,
            metrics,
            prompt,
            sink,
        ))
    }
}
