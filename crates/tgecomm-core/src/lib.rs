//! TGecomm Core
//!
//! Foundational types for the TGecomm messaging session: the error taxonomy,
//! the transport capability the session drives, configuration, input
//! validation, and the metrics collector every component reports into.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod media;
pub mod metrics;
pub mod transport;
pub mod validators;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ClientConfig, CredentialsConfig, LimitsConfig, MaskedConfig, SessionConfig};
pub use errors::{
    ConfigError, ErrorKind, SessionError, SessionResult, TransportError, TransportResult,
};
pub use media::{format_media_info, Media, MediaKind};
pub use metrics::{
    format_uptime, global_metrics, reset_global_metrics, tags, ErrorRecord, Metric,
    MetricsCollector, MetricsSummary, Tags, TimingGuard, TimingStat,
};
pub use transport::{
    entity_name, Account, Dialog, Entity, IncomingHandler, IncomingMessage, MessageRecord,
    Transport,
};
