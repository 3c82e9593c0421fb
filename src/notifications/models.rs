//! Notification data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    Like,
    Comment,
    CommentReply,
    Follow,
    Repost,
    ProfileView,
    /// Anything the client doesn't know how to render specially.
    #[serde(other)]
    Other,
}

/// The account that caused a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub handle: String,
    /// Avatar image reference, if the actor has one.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A single entry of the notification feed.
///
/// `read_at == None` means the notification is unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl NotificationRecord {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// One page of the notification feed as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    pub records: Vec<NotificationRecord>,
    /// Cursor to resume from. `None` signals the end of data.
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Pagination metadata of a `GET /notifications` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Body of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub data: Vec<NotificationRecord>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl From<NotificationsResponse> for Page {
    fn from(response: NotificationsResponse) -> Self {
        // Servers sometimes send an empty string instead of omitting the cursor.
        let next_cursor = response.meta.next_cursor.filter(|c| !c.is_empty());
        Page {
            records: response.data,
            next_cursor,
        }
    }
}

/// Body of `POST /notifications/{id}/read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAsReadResponse {
    pub data: NotificationRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeCountData {
    pub unread_count: u32,
}

/// Body of `GET /notifications/badge-count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeCountResponse {
    pub data: BadgeCountData,
}
