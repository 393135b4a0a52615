//! One-time registration of the inbound message handler
//!
//! Duplicate registration would deliver every inbound notification twice, so
//! the handler is attached at most once per session even when the start path
//! and the second-factor path race to register it.

use std::sync::atomic::{AtomicBool, Ordering};
use tgecomm_core::TransportResult;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Guards the single registration of the inbound callback
///
/// Uses double-checked locking: the flag is read with `Acquire` on the fast
/// path, and written with `Release` only while the registration lock is held,
/// so a caller that observes `true` also observes the completed registration.
#[derive(Debug, Default)]
pub struct HandlerRegistrar {
    registered: AtomicBool,
    lock: Mutex<()>,
}

impl HandlerRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Run `register` unless a registration already succeeded.
    ///
    /// Returns `Ok(true)` when this call performed the registration. A failed
    /// registration leaves the flag unset so a later call can try again.
    pub async fn ensure_registered<F>(&self, register: F) -> TransportResult<bool>
    where
        F: FnOnce() -> TransportResult<()>,
    {
        if self.registered.load(Ordering::Acquire) {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        if self.registered.load(Ordering::Acquire) {
            debug!("Handler registered by a concurrent caller");
            return Ok(false);
        }

        register()?;
        self.registered.store(true, Ordering::Release);
        info!("Inbound message handler registered");
        Ok(true)
    }
}
