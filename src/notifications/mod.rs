//! Notification feed data models

mod models;

pub use models::{
    Actor, BadgeCountData, BadgeCountResponse, MarkAsReadResponse, NotificationRecord,
    NotificationType, NotificationsResponse, Page, PageMeta,
};
