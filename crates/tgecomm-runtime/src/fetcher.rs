//! Paced batch fetching
//!
//! Secondary lookups (for example the sender of each fetched message) are
//! dispatched in fixed-size batches. Items inside a batch run concurrently,
//! batches run one after another with a pause between them, and results come
//! back in input order with per-item failures isolated.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tgecomm_core::{
    metrics::tags, Entity, MessageRecord, MetricsCollector, Transport, TransportResult,
};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Outcome of a single sender lookup
pub type SenderLookup = TransportResult<Option<Entity>>;

pub struct PacingBatchFetcher {
    pacing: Duration,
    metrics: Arc<MetricsCollector>,
}

impl PacingBatchFetcher {
    pub fn new(pacing: Duration, metrics: Arc<MetricsCollector>) -> Self {
        Self { pacing, metrics }
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Apply `fetch` to every item, `batch_size` at a time.
    ///
    /// The result vector has one entry per input item, in input order,
    /// regardless of completion order. A batch size of zero is treated as one.
    pub async fn fetch_all<'a, T, R, F, Fut>(
        &self,
        items: &'a [T],
        batch_size: usize,
        fetch: F,
    ) -> Vec<TransportResult<R>>
    where
        F: Fn(&'a T) -> Fut,
        Fut: Future<Output = TransportResult<R>>,
    {
        let batch_size = if batch_size == 0 {
            warn!("Batch size of zero requested, using 1");
            1
        } else {
            batch_size
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, batch) in items.chunks(batch_size).enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }

            let size = batch.len().to_string();
            let _timer = self.metrics.time("fetch_batch", tags([("size", size.as_str())]));
            debug!("Dispatching batch {} with {} items", index + 1, batch.len());
            results.extend(join_all(batch.iter().map(&fetch)).await);
        }

        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            self.metrics
                .increment("batch_item_failures", failures as u64, tags([]));
        }

        results
    }

    /// Resolve the sender of every message through `transport`
    pub async fn fetch_senders_for(
        &self,
        transport: &dyn Transport,
        messages: &[MessageRecord],
        batch_size: usize,
    ) -> Vec<SenderLookup> {
        self.fetch_all(messages, batch_size, |message| transport.get_sender(message))
            .await
    }
}

/// Display name for a sender lookup, falling back to `Unknown`
pub fn sender_display_name(lookup: &SenderLookup) -> String {
    match lookup {
        Ok(Some(entity)) => entity.display_name(),
        Ok(None) => "Unknown".to_string(),
        Err(err) => {
            warn!("Error getting sender info: {}", err);
            "Unknown".to_string()
        }
    }
}
