//! Test data for the fake backend

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use notification_sync::config::SyncSettings;
use notification_sync::feed::RetryPolicy;
use notification_sync::misuse::MisusePolicy;
use notification_sync::notifications::{Actor, NotificationRecord, NotificationType};

use super::constants::SEEDED_COUNT;

/// Unread notification `n-{index}`, newer for lower indices.
pub fn notification(index: usize) -> NotificationRecord {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    NotificationRecord {
        id: format!("n-{}", index),
        notification_type: if index % 2 == 0 {
            NotificationType::Like
        } else {
            NotificationType::Comment
        },
        read_at: None,
        created_at: base - ChronoDuration::minutes(index as i64),
        actor: Actor {
            id: format!("user-{}", index),
            display_name: format!("User {}", index),
            handle: format!("user{}", index),
            avatar: None,
        },
        video_id: Some(format!("video-{}", index)),
        video_container_id: None,
        thumbnail: None,
    }
}

pub fn seeded_notifications() -> Vec<NotificationRecord> {
    (0..SEEDED_COUNT).map(notification).collect()
}

/// Sync settings for tests: no retries, strict misuse checks.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        retry: RetryPolicy::none(),
        misuse_policy: MisusePolicy::Panic,
        ..SyncSettings::default()
    }
}
