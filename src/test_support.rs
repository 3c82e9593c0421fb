//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::api::{ApiError, NotificationApi};
use crate::notifications::{Actor, NotificationRecord, NotificationType, Page};

/// Unread `like` notification with a deterministic timestamp.
pub(crate) fn record(id: &str) -> NotificationRecord {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let offset = id.bytes().map(i64::from).sum::<i64>();
    NotificationRecord {
        id: id.to_string(),
        notification_type: NotificationType::Like,
        read_at: None,
        created_at: base - ChronoDuration::minutes(offset),
        actor: Actor {
            id: format!("actor-{}", id),
            display_name: "Test Actor".to_string(),
            handle: "testactor".to_string(),
            avatar: None,
        },
        video_id: Some(format!("video-{}", id)),
        video_container_id: None,
        thumbnail: None,
    }
}

pub(crate) fn page(ids: &[&str], next_cursor: Option<&str>) -> Page {
    Page {
        records: ids.iter().map(|id| record(id)).collect(),
        next_cursor: next_cursor.map(str::to_string),
    }
}

enum Reply<T> {
    Ready(Result<T, ApiError>),
    Pending(oneshot::Receiver<Result<T, ApiError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ApiError> {
        match self {
            Reply::Ready(result) => result,
            Reply::Pending(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Network("reply dropped".to_string()))),
        }
    }
}

struct Script<T> {
    replies: Mutex<VecDeque<Reply<T>>>,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, result: Result<T, ApiError>) {
        self.replies.lock().unwrap().push_back(Reply::Ready(result));
    }

    fn hold(&self) -> oneshot::Sender<Result<T, ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Reply::Pending(rx));
        tx
    }

    fn next(&self) -> Option<Reply<T>> {
        self.replies.lock().unwrap().pop_front()
    }
}

/// Scripted [`NotificationApi`].
///
/// Replies are consumed in order. `hold_*` queues a reply the test resolves
/// later through the returned sender, which keeps the call in flight.
pub(crate) struct FakeApi {
    pages: Script<Page>,
    marks: Script<NotificationRecord>,
    badges: Script<u32>,
    page_requests: Mutex<Vec<Option<String>>>,
    mark_requests: Mutex<Vec<String>>,
    badge_calls: Mutex<usize>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self {
            pages: Script::new(),
            marks: Script::new(),
            badges: Script::new(),
            page_requests: Mutex::new(Vec::new()),
            mark_requests: Mutex::new(Vec::new()),
            badge_calls: Mutex::new(0),
        }
    }

    pub(crate) fn push_page(&self, result: Result<Page, ApiError>) {
        self.pages.push(result);
    }

    pub(crate) fn hold_page(&self) -> oneshot::Sender<Result<Page, ApiError>> {
        self.pages.hold()
    }

    pub(crate) fn push_mark(&self, result: Result<NotificationRecord, ApiError>) {
        self.marks.push(result);
    }

    pub(crate) fn hold_mark(&self) -> oneshot::Sender<Result<NotificationRecord, ApiError>> {
        self.marks.hold()
    }

    pub(crate) fn push_badge(&self, result: Result<u32, ApiError>) {
        self.badges.push(result);
    }

    pub(crate) fn hold_badge(&self) -> oneshot::Sender<Result<u32, ApiError>> {
        self.badges.hold()
    }

    pub(crate) fn page_requests(&self) -> Vec<Option<String>> {
        self.page_requests.lock().unwrap().clone()
    }

    pub(crate) fn mark_requests(&self) -> Vec<String> {
        self.mark_requests.lock().unwrap().clone()
    }

    pub(crate) fn badge_calls(&self) -> usize {
        *self.badge_calls.lock().unwrap()
    }
}

#[async_trait]
impl NotificationApi for FakeApi {
    async fn fetch_notifications(&self, cursor: Option<String>) -> Result<Page, ApiError> {
        self.page_requests.lock().unwrap().push(cursor);
        match self.pages.next() {
            Some(reply) => reply.resolve().await,
            None => Ok(Page::default()),
        }
    }

    async fn mark_as_read(&self, notification_id: String) -> Result<NotificationRecord, ApiError> {
        self.mark_requests.lock().unwrap().push(notification_id.clone());
        match self.marks.next() {
            Some(reply) => reply.resolve().await,
            None => {
                let mut confirmed = record(&notification_id);
                confirmed.read_at = Some(Utc::now());
                Ok(confirmed)
            }
        }
    }

    async fn badge_count(&self) -> Result<u32, ApiError> {
        *self.badge_calls.lock().unwrap() += 1;
        match self.badges.next() {
            Some(reply) => reply.resolve().await,
            None => Ok(0),
        }
    }
}
