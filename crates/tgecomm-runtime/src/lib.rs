//! TGecomm Runtime
//!
//! The session engine built on `tgecomm-core`:
//! - `SessionLifecycleManager`: start, run/reconnect loop and disconnect
//! - `HandlerRegistrar`: exactly-once inbound handler registration
//! - `SendSerializer`: validated, serialized outbound sends
//! - `PacingBatchFetcher`: paced batches of concurrent lookups
//! - `LoopbackTransport`: in-memory transport for offline use

pub mod builder;
pub mod fetcher;
pub mod lifecycle;
pub mod loopback;
pub mod prompt;
pub mod registrar;
pub mod sender;

pub use builder::SessionBuilder;
pub use fetcher::{sender_display_name, PacingBatchFetcher, SenderLookup};
pub use lifecycle::{
    DisplayMessage, InboundSink, InboundView, RunOutcome, SessionLifecycleManager, SessionState,
    StopHandle,
};
pub use loopback::LoopbackTransport;
pub use prompt::{ConsolePrompt, CredentialPrompt, StaticPrompt};
pub use registrar::HandlerRegistrar;
pub use sender::SendSerializer;

// Re-export core types for convenience
pub use tgecomm_core::{
    Account, ClientConfig, Dialog, MetricsCollector, MetricsSummary, SessionError, SessionResult,
    Transport, TransportError,
};
