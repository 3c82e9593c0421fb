//! Store-level event channel.
//!
//! Failures that the sync core recovers from locally (stale feed kept,
//! optimistic change rolled back, badge count left untouched) are reported
//! here so the UI can show a non-fatal notice without handling errors per call.

use tokio::sync::broadcast;
use tracing::debug;

use crate::api::ApiError;
use crate::feed::FeedKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A page fetch failed; the cached feed was left untouched.
    FeedFetchFailed { feed_key: FeedKey, error: ApiError },
    /// The server confirmed a mark-read mutation.
    MarkReadConfirmed {
        correlation_id: String,
        notification_id: String,
    },
    /// A mark-read mutation failed and was rolled back.
    MarkReadFailed {
        correlation_id: String,
        notification_id: String,
        error: ApiError,
    },
    /// The badge count could not be refreshed.
    BadgeFetchFailed { error: ApiError },
}

/// Broadcast sender shared by all components of one sync instance.
#[derive(Clone)]
pub struct SyncEvents {
    tx: broadcast::Sender<SyncEvent>,
}

impl SyncEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: SyncEvent) {
        // No receivers is fine: nobody is showing notices right now.
        if self.tx.send(event).is_err() {
            debug!("Dropped sync event, no subscribers");
        }
    }
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
