//! Forward pagination over the feed cache.
//!
//! Every operation is single-flight per feed key: a first-page fetch (initial
//! load or refresh) and a next-page fetch are tracked independently through the
//! flags of the cached [`FeedCacheEntry`], set and checked under the cache lock
//! before any request goes out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::entry::{FeedCacheEntry, FeedKey, FeedView};
use super::retry_policy::RetryPolicy;
use crate::api::{ApiError, NotificationApi};
use crate::cache::CacheStore;
use crate::events::{SyncEvent, SyncEvents};
use crate::misuse::MisusePolicy;
use crate::notifications::Page;

/// The cache holding every feed.
pub type FeedCache = CacheStore<FeedKey, FeedCacheEntry>;

/// Result of a fetch operation that didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page was applied; `records` is the number of records it added.
    Applied { records: usize },
    /// The same operation is already in flight for this feed.
    AlreadyFetching,
    /// There is no next page.
    EndOfData,
    /// The response arrived after the feed was reset or cleared and was dropped.
    Discarded,
    /// Nothing cached needs revalidating.
    UpToDate,
    /// The feed key was never registered.
    NotRegistered,
}

#[derive(Debug, Clone, Copy)]
enum FirstPageMode {
    Initial,
    Refresh,
}

enum NextPageStart {
    Started { cursor: String, generation: u64 },
    Busy,
    End,
    Missing,
}

pub struct PaginatedFetchController {
    api: Arc<dyn NotificationApi>,
    cache: Arc<FeedCache>,
    events: SyncEvents,
    retry: RetryPolicy,
    misuse: MisusePolicy,
    /// Last generation handed to a first page. Outlives cache clears, so a
    /// next page requested before a clear never matches a later entry.
    generation: AtomicU64,
}

impl PaginatedFetchController {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        cache: Arc<FeedCache>,
        events: SyncEvents,
        retry: RetryPolicy,
        misuse: MisusePolicy,
    ) -> Self {
        Self {
            api,
            cache,
            events,
            retry,
            misuse,
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<FeedCache> {
        &self.cache
    }

    /// Create an empty entry for `key` if there is none yet.
    pub fn register(&self, key: &FeedKey) {
        self.cache.try_update(key.clone(), |prev| match prev {
            Some(_) => (None, ()),
            None => (Some(FeedCacheEntry::default()), ()),
        });
    }

    /// Snapshot of what the UI should render for `key`.
    pub fn view(&self, key: &FeedKey) -> FeedView {
        self.cache
            .get(key)
            .map(|entry| entry.view())
            .unwrap_or_default()
    }

    /// Load the first page, replacing whatever is cached with exactly one page.
    pub async fn fetch_first_page(&self, key: &FeedKey) -> Result<FetchOutcome, ApiError> {
        self.load_first_page(key, FirstPageMode::Initial).await
    }

    /// Re-fetch the first page and drop every older page on success.
    ///
    /// Cursors are only meaningful relative to the page that produced them, so
    /// this is a hard reset rather than a merge.
    pub async fn refresh(&self, key: &FeedKey) -> Result<FetchOutcome, ApiError> {
        self.load_first_page(key, FirstPageMode::Refresh).await
    }

    /// Refresh only if the feed was invalidated or never loaded.
    pub async fn revalidate(&self, key: &FeedKey) -> Result<FetchOutcome, ApiError> {
        let loaded = self.cache.get(key).is_some_and(|entry| entry.has_loaded);
        if loaded && !self.cache.is_stale(key) {
            return Ok(FetchOutcome::UpToDate);
        }
        self.refresh(key).await
    }

    async fn load_first_page(
        &self,
        key: &FeedKey,
        mode: FirstPageMode,
    ) -> Result<FetchOutcome, ApiError> {
        let started = self.cache.try_update(key.clone(), |prev| {
            let mut next = prev.cloned().unwrap_or_default();
            if next.is_fetching_first_page() {
                return (None, false);
            }
            match mode {
                FirstPageMode::Refresh if next.has_loaded => next.is_refetching = true,
                _ => next.is_fetching_initial = true,
            }
            (Some(next), true)
        });
        if !started {
            debug!("First page of feed {} already in flight", key);
            return Ok(FetchOutcome::AlreadyFetching);
        }

        match self.request_page(None).await {
            Ok(page) => {
                let records = page.records.len();
                let applied = self.cache.try_update(key.clone(), |prev| match prev {
                    Some(entry) => {
                        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                        (Some(entry.with_first_page(page, generation)), true)
                    }
                    None => (None, false),
                });
                if !applied {
                    debug!("Discarding first page of feed {}, feed was cleared", key);
                    return Ok(FetchOutcome::Discarded);
                }
                self.cache.mark_fresh(key);
                info!("Loaded first page of feed {} ({} records)", key, records);
                Ok(FetchOutcome::Applied { records })
            }
            Err(error) => {
                self.record_failure(key, &error, |entry| {
                    entry.is_fetching_initial = false;
                    entry.is_refetching = false;
                });
                Err(error)
            }
        }
    }

    /// Fetch the page after the last cached one and append it.
    ///
    /// No-op when the end was reached or a next-page fetch is in flight. An
    /// empty page is a valid end-of-data signal, not an error.
    pub async fn fetch_next_page(&self, key: &FeedKey) -> Result<FetchOutcome, ApiError> {
        let start = self.cache.try_update(key.clone(), |prev| {
            let Some(entry) = prev else {
                return (None, NextPageStart::Missing);
            };
            if entry.is_fetching_next {
                return (None, NextPageStart::Busy);
            }
            let cursor = match &entry.next_cursor {
                Some(cursor) if entry.has_loaded => cursor.clone(),
                _ => return (None, NextPageStart::End),
            };
            let mut next = entry.clone();
            next.is_fetching_next = true;
            let generation = entry.generation;
            (Some(next), NextPageStart::Started { cursor, generation })
        });

        let (cursor, generation) = match start {
            NextPageStart::Started { cursor, generation } => (cursor, generation),
            NextPageStart::Busy => {
                debug!("Next page of feed {} already in flight", key);
                return Ok(FetchOutcome::AlreadyFetching);
            }
            NextPageStart::End => return Ok(FetchOutcome::EndOfData),
            NextPageStart::Missing => {
                self.misuse
                    .report(&format!("fetch_next_page on unregistered feed {}", key));
                return Ok(FetchOutcome::NotRegistered);
            }
        };

        match self.request_page(Some(cursor.clone())).await {
            Ok(page) => {
                let outcome = self.cache.try_update(key.clone(), |prev| {
                    let Some(entry) = prev.filter(|e| e.generation == generation) else {
                        // A newer first page owns the entry and its flags.
                        return (None, FetchOutcome::Discarded);
                    };
                    if entry.next_cursor.as_deref() != Some(cursor.as_str()) {
                        let mut next = entry.clone();
                        next.is_fetching_next = false;
                        return (Some(next), FetchOutcome::Discarded);
                    }
                    let (next, records) = entry.with_appended_page(page);
                    (Some(next), FetchOutcome::Applied { records })
                });
                match outcome {
                    FetchOutcome::Applied { records } => {
                        debug!("Appended {} records to feed {}", records, key)
                    }
                    _ => debug!("Discarding stale next page of feed {}", key),
                }
                Ok(outcome)
            }
            Err(error) => {
                let current = self.cache.try_update(key.clone(), |prev| match prev {
                    Some(entry) if entry.generation == generation => {
                        let mut next = entry.clone();
                        next.is_fetching_next = false;
                        next.last_error = Some(error.clone());
                        (Some(next), true)
                    }
                    _ => (None, false),
                });
                if !current {
                    debug!("Ignoring failed next page of feed {}, feed was reset: {}", key, error);
                    return Ok(FetchOutcome::Discarded);
                }
                self.report_failure(key, &error);
                Err(error)
            }
        }
    }

    async fn request_page(&self, cursor: Option<String>) -> Result<Page, ApiError> {
        let mut attempt = 0;
        loop {
            match self.api.fetch_notifications(cursor.clone()).await {
                Ok(page) => return Ok(page),
                Err(error) if self.retry.should_retry(&error, attempt) => {
                    let delay = self.retry.backoff_with_jitter(attempt);
                    debug!(
                        "Page fetch failed ({}), retrying in {:?} (attempt {})",
                        error,
                        delay,
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Clear the in-flight flag and record the error. The cached sequence is
    /// left as it was.
    fn record_failure<F>(&self, key: &FeedKey, error: &ApiError, clear_flags: F)
    where
        F: FnOnce(&mut FeedCacheEntry),
    {
        self.cache.update_existing(key, |entry| {
            let mut next = entry.clone();
            clear_flags(&mut next);
            next.last_error = Some(error.clone());
            Some(next)
        });
        self.report_failure(key, error);
    }

    fn report_failure(&self, key: &FeedKey, error: &ApiError) {
        warn!("Failed to fetch notifications for feed {}: {}", key, error);
        self.events.emit(SyncEvent::FeedFetchFailed {
            feed_key: key.clone(),
            error: error.clone(),
        });
    }
}
