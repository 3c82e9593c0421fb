//! Unread badge counter.
//!
//! The counter is refreshed from a lightweight count endpoint, independently
//! of the feed cache. Refreshes are throttled: the poller calls [`fetch`] on a
//! fixed interval and on every foreground transition, and a user flipping the
//! app in and out of the background shouldn't turn into a burst of requests.
//!
//! [`fetch`]: BadgeCounterService::fetch

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::{ApiError, NotificationApi};
use crate::events::{SyncEvent, SyncEvents};

pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(30);

/// What the UI renders for the badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadgeSnapshot {
    pub count: u32,
    pub is_loading: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeCounterState {
    pub count: u32,
    pub last_fetched_at: Option<Instant>,
    pub is_loading: bool,
}

impl BadgeCounterState {
    fn snapshot(&self) -> BadgeSnapshot {
        BadgeSnapshot {
            count: self.count,
            is_loading: self.is_loading,
        }
    }
}

struct Inner {
    state: BadgeCounterState,
    /// Id of the request whose result the state is waiting for. Bumped by
    /// every request that goes out and by `reset`, so only the newest request
    /// writes the count and a fetch that straddles a sign-out is dropped.
    latest_request: u64,
}

pub struct BadgeCounterService {
    api: Arc<dyn NotificationApi>,
    throttle_window: Duration,
    inner: Mutex<Inner>,
    tx: watch::Sender<BadgeSnapshot>,
    events: SyncEvents,
}

/// Clears `is_loading` if a fetch future is dropped before it settles.
struct LoadingGuard<'a> {
    service: &'a BadgeCounterService,
    request: u64,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.service.lock();
        if inner.latest_request == self.request && inner.state.is_loading {
            inner.state.is_loading = false;
            self.service.publish(&inner.state);
        }
    }
}

impl BadgeCounterService {
    pub fn new(api: Arc<dyn NotificationApi>, throttle_window: Duration, events: SyncEvents) -> Self {
        let (tx, _) = watch::channel(BadgeSnapshot::default());
        Self {
            api,
            throttle_window,
            inner: Mutex::new(Inner {
                state: BadgeCounterState::default(),
                latest_request: 0,
            }),
            tx,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &BadgeCounterState) {
        self.tx.send_replace(state.snapshot());
    }

    pub fn state(&self) -> BadgeCounterState {
        self.lock().state.clone()
    }

    pub fn snapshot(&self) -> BadgeSnapshot {
        self.lock().state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<BadgeSnapshot> {
        self.tx.subscribe()
    }

    /// Refresh the unread count.
    ///
    /// Unless `force` is set, a call within the throttle window of the last
    /// successful fetch, or made while another fetch is in flight, returns the
    /// cached count without a request. A forced call always sends its own
    /// request and supersedes any fetch still in flight, whose result is then
    /// dropped. On failure the previous state is kept and the error is
    /// reported on the event channel as well as returned.
    pub async fn fetch(&self, force: bool) -> Result<u32, ApiError> {
        let request = {
            let mut inner = self.lock();
            if !force {
                if inner.state.is_loading {
                    debug!("Badge count fetch already in flight");
                    return Ok(inner.state.count);
                }
                if let Some(last) = inner.state.last_fetched_at {
                    if last.elapsed() < self.throttle_window {
                        debug!("Badge count fetched {:?} ago, throttled", last.elapsed());
                        return Ok(inner.state.count);
                    }
                }
            }
            inner.latest_request += 1;
            inner.state.is_loading = true;
            self.publish(&inner.state);
            inner.latest_request
        };
        let mut guard = LoadingGuard {
            service: self,
            request,
            armed: true,
        };

        let result = self.api.badge_count().await;
        guard.armed = false;

        let mut inner = self.lock();
        if inner.latest_request != request {
            debug!("Discarding badge count from a superseded or reset fetch");
            return Ok(inner.state.count);
        }
        inner.state.is_loading = false;
        match result {
            Ok(count) => {
                inner.state.count = count;
                inner.state.last_fetched_at = Some(Instant::now());
                self.publish(&inner.state);
                debug!("Badge count is now {}", count);
                Ok(count)
            }
            Err(error) => {
                self.publish(&inner.state);
                drop(inner);
                warn!("Failed to fetch badge count: {}", error);
                self.events.emit(SyncEvent::BadgeFetchFailed {
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Zero the counter and forget when it was fetched. Used on sign-out;
    /// doesn't trigger a fetch.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.latest_request += 1;
        inner.state = BadgeCounterState::default();
        self.publish(&inner.state);
    }
}
