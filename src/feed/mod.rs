//! Cursor-paginated notification feed.
//!
//! [`PaginatedFetchController`] drives the feed cache through forward
//! pagination; [`FeedHandle`] is what a screen holds on to.

mod controller;
mod entry;
mod retry_policy;

pub use controller::{FeedCache, FetchOutcome, PaginatedFetchController};
pub use entry::{FeedCacheEntry, FeedKey, FeedView};
pub use retry_policy::RetryPolicy;

use std::sync::Arc;
use tokio::sync::watch;

use crate::api::ApiError;

/// A consumer's handle on one feed.
///
/// Holding a handle keeps the feed's cache slot observed; once every handle
/// for a key is dropped the slot may be evicted.
pub struct FeedHandle {
    controller: Arc<PaginatedFetchController>,
    key: FeedKey,
    rx: watch::Receiver<Option<Arc<FeedCacheEntry>>>,
}

impl FeedHandle {
    pub(crate) fn new(controller: Arc<PaginatedFetchController>, key: FeedKey) -> Self {
        controller.register(&key);
        let rx = controller.cache().subscribe(key.clone());
        Self {
            controller,
            key,
            rx,
        }
    }

    pub fn key(&self) -> &FeedKey {
        &self.key
    }

    /// What to render right now.
    pub fn view(&self) -> FeedView {
        self.rx
            .borrow()
            .as_ref()
            .map(|entry| entry.view())
            .unwrap_or_default()
    }

    /// Wait until the feed changes and return the new view.
    ///
    /// Returns `None` once the cache backing this feed is gone.
    pub async fn changed(&mut self) -> Option<FeedView> {
        self.rx.changed().await.ok()?;
        Some(self.view())
    }

    pub async fn fetch_first_page(&self) -> Result<FetchOutcome, ApiError> {
        self.controller.fetch_first_page(&self.key).await
    }

    pub async fn fetch_next_page(&self) -> Result<FetchOutcome, ApiError> {
        self.controller.fetch_next_page(&self.key).await
    }

    pub async fn refresh(&self) -> Result<FetchOutcome, ApiError> {
        self.controller.refresh(&self.key).await
    }
}
