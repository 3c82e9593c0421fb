//! Fake notification backend
//!
//! Serves the notification routes from an in-memory list. Tests can inspect
//! the requests it received and flip failure switches through
//! [`TestServer::state`].

use super::constants::*;
use super::fixtures::seeded_notifications;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use notification_sync::config::HttpSettings;
use notification_sync::notifications::{
    BadgeCountData, BadgeCountResponse, MarkAsReadResponse, NotificationRecord,
    NotificationsResponse, PageMeta,
};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::TcpListener;

/// Everything the fake backend knows, newest notification first.
#[derive(Debug, Default)]
pub struct BackendState {
    pub notifications: Vec<NotificationRecord>,
    /// Respond 503 to list requests.
    pub fail_list: bool,
    /// Respond 500 to mark-read requests.
    pub fail_mark_read: bool,
    /// Respond 503 to badge-count requests.
    pub fail_badge: bool,
    pub list_requests: Vec<Option<String>>,
    pub mark_requests: Vec<String>,
    pub badge_requests: usize,
}

type SharedState = Arc<Mutex<BackendState>>;
type HandlerError = (StatusCode, String);

/// Test server instance with its own backend state
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server seeded with the default notifications on a random port
    pub async fn spawn() -> Self {
        Self::spawn_with(seeded_notifications()).await
    }

    /// Spawns a server serving `notifications` on a random port
    ///
    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready
    /// within timeout.
    pub async fn spawn_with(notifications: Vec<NotificationRecord>) -> Self {
        let state: SharedState = Arc::new(Mutex::new(BackendState {
            notifications,
            ..BackendState::default()
        }));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = make_app(state.clone());

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// HTTP settings pointing at this server, authenticated with [`TEST_TOKEN`]
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            base_url: self.base_url.clone(),
            request_timeout_secs: 5,
            auth_token: Some(TEST_TOKEN.to_string()),
        }
    }

    /// Lock the backend state for inspection or modification
    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    /// Waits for the server to become ready by polling the /health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn make_app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/notifications", get(list_notifications))
        .route("/notifications/badge-count", get(badge_count))
        .route("/notifications/{id}/read", post(mark_as_read))
        .with_state(state)
}

fn check_auth(headers: &HeaderMap) -> Result<(), HandlerError> {
    let expected = format!("Bearer {}", TEST_TOKEN);
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "missing or invalid token".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    cursor: Option<String>,
}

async fn list_notifications(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationsResponse>, HandlerError> {
    check_auth(&headers)?;
    let mut state = state.lock().unwrap();
    state.list_requests.push(query.cursor.clone());

    if state.fail_list {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "feed unavailable".to_string()));
    }

    let offset = match &query.cursor {
        None => 0,
        Some(cursor) => cursor
            .strip_prefix("c")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("bad cursor {}", cursor)))?,
    };
    let total = state.notifications.len();
    let start = offset.min(total);
    let end = (start + PAGE_SIZE).min(total);
    let data = state.notifications[start..end].to_vec();
    let next_cursor = (end < total).then(|| format!("c{}", end));

    Ok(Json(NotificationsResponse {
        data,
        meta: PageMeta { next_cursor },
    }))
}

async fn mark_as_read(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MarkAsReadResponse>, HandlerError> {
    check_auth(&headers)?;
    let mut state = state.lock().unwrap();
    state.mark_requests.push(id.clone());

    if state.fail_mark_read {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "mark failed".to_string()));
    }
    let record = state
        .notifications
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("no notification {}", id)))?;
    if record.read_at.is_none() {
        record.read_at = Some(Utc::now());
    }
    Ok(Json(MarkAsReadResponse {
        data: record.clone(),
    }))
}

async fn badge_count(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<BadgeCountResponse>, HandlerError> {
    check_auth(&headers)?;
    let mut state = state.lock().unwrap();
    state.badge_requests += 1;

    if state.fail_badge {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "badge unavailable".to_string()));
    }
    let unread_count = state.notifications.iter().filter(|r| !r.is_read()).count() as u32;
    Ok(Json(BadgeCountResponse {
        data: BadgeCountData { unread_count },
    }))
}
