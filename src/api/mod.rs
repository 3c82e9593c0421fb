//! Request layer consumed by the sync core.
//!
//! The core only depends on the [`NotificationApi`] trait; [`HttpNotificationApi`]
//! is the production implementation backed by `reqwest`.

mod http_client;

pub use http_client::HttpNotificationApi;

use crate::notifications::{NotificationRecord, Page};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the request layer.
///
/// All of these are transport errors from the point of view of the sync core:
/// they are recovered locally and reported as non-fatal events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether re-issuing the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Remote notification endpoints.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch one page of the feed. `None` requests the first page.
    async fn fetch_notifications(&self, cursor: Option<String>) -> Result<Page, ApiError>;

    /// Mark a notification as read, returning the server's view of it.
    async fn mark_as_read(&self, notification_id: String) -> Result<NotificationRecord, ApiError>;

    /// Current number of unread notifications.
    async fn badge_count(&self) -> Result<u32, ApiError>;
}
