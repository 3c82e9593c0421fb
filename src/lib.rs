//! Notification Sync Library
//!
//! Client-side synchronisation of a paginated notification feed, an unread
//! badge counter and optimistic read-state mutations.

pub mod api;
pub mod badge;
pub mod cache;
pub mod client;
pub mod config;
pub mod events;
pub mod feed;
pub mod lifecycle;
pub mod misuse;
pub mod mutation;
pub mod notifications;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use api::{ApiError, HttpNotificationApi, NotificationApi};
pub use badge::{BadgeCounterService, BadgeSnapshot};
pub use client::NotificationSync;
pub use events::SyncEvent;
pub use feed::{FeedHandle, FeedKey, FeedView, FetchOutcome};
pub use lifecycle::{AppLifecycle, AppState, ChannelLifecycle};
pub use notifications::NotificationRecord;
