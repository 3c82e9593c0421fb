//! Materialized state of one paginated feed.

use std::collections::HashSet;
use std::fmt;

use crate::api::ApiError;
use crate::notifications::{NotificationRecord, Page};

/// Identifies one logical feed in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedKey(String);

impl FeedKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The user's main notification feed.
    pub fn notifications() -> Self {
        Self::new("notifications")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Cached pages of a feed plus its fetch-state flags.
///
/// Values are never mutated in place: every transition produces a new entry
/// that replaces the old one wholesale in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCacheEntry {
    /// Concatenation of every fetched page, in fetch order.
    pub items: Vec<NotificationRecord>,
    /// Cursor for the next page. `None` once the end was reached (or before
    /// anything was loaded).
    pub next_cursor: Option<String>,
    pub page_count: usize,
    /// Stamped from a counter that never goes backwards, including across a
    /// cache clear, whenever a first-page fetch replaces the page list.
    /// Next-page results requested under an older generation are dropped.
    pub generation: u64,
    /// At least one page has been applied.
    pub has_loaded: bool,
    pub is_fetching_initial: bool,
    pub is_fetching_next: bool,
    pub is_refetching: bool,
    /// Outcome of the most recent failed fetch, cleared by the next success.
    pub last_error: Option<ApiError>,
}

impl FeedCacheEntry {
    pub fn is_fetching_first_page(&self) -> bool {
        self.is_fetching_initial || self.is_refetching
    }

    pub fn has_next_page(&self) -> bool {
        self.has_loaded && self.next_cursor.is_some()
    }

    /// Replace everything with a single freshly fetched first page.
    ///
    /// A next-page fetch still in flight belongs to the old generation, so the
    /// new entry is not marked as fetching one.
    pub(crate) fn with_first_page(&self, page: Page, generation: u64) -> Self {
        Self {
            items: page.records,
            next_cursor: page.next_cursor,
            page_count: 1,
            generation,
            has_loaded: true,
            is_fetching_initial: false,
            is_fetching_next: false,
            is_refetching: false,
            last_error: None,
        }
    }

    /// Append a page fetched with the current cursor.
    ///
    /// Records already present are skipped so ids stay unique within the feed.
    pub(crate) fn with_appended_page(&self, page: Page) -> (Self, usize) {
        let known: HashSet<&str> = self.items.iter().map(|r| r.id.as_str()).collect();
        let fresh: Vec<NotificationRecord> = page
            .records
            .into_iter()
            .filter(|r| !known.contains(r.id.as_str()))
            .collect();
        let appended = fresh.len();

        let mut items = self.items.clone();
        items.extend(fresh);

        let next = Self {
            items,
            next_cursor: page.next_cursor,
            page_count: self.page_count + 1,
            is_fetching_next: false,
            last_error: None,
            ..self.clone()
        };
        (next, appended)
    }

    pub fn find(&self, notification_id: &str) -> Option<&NotificationRecord> {
        self.items.iter().find(|r| r.id == notification_id)
    }

    /// Copy of this entry with the record `notification_id` replaced by the
    /// result of `f`, or `None` if the record isn't cached here.
    pub(crate) fn with_record<F>(&self, notification_id: &str, f: F) -> Option<Self>
    where
        F: FnOnce(&NotificationRecord) -> NotificationRecord,
    {
        let index = self.items.iter().position(|r| r.id == notification_id)?;
        let mut next = self.clone();
        next.items[index] = f(&self.items[index]);
        Some(next)
    }

    pub fn view(&self) -> FeedView {
        FeedView {
            items: self.items.clone(),
            has_next_page: self.has_next_page(),
            is_fetching_next: self.is_fetching_next,
            is_initial_loading: self.is_fetching_initial && !self.has_loaded,
            is_refetching: self.is_refetching,
            last_error: self.last_error.clone(),
        }
    }
}

/// What the UI renders for a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedView {
    pub items: Vec<NotificationRecord>,
    pub has_next_page: bool,
    pub is_fetching_next: bool,
    pub is_initial_loading: bool,
    pub is_refetching: bool,
    pub last_error: Option<ApiError>,
}

impl FeedView {
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|r| !r.is_read()).count()
    }
}
