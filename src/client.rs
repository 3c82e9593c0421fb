//! Composition root wiring the sync components together.

use futures::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::info;

use crate::api::{ApiError, NotificationApi};
use crate::badge::BadgeCounterService;
use crate::config::SyncSettings;
use crate::events::{SyncEvent, SyncEvents};
use crate::feed::{FeedCache, FeedHandle, FeedKey, FetchOutcome, PaginatedFetchController};
use crate::lifecycle::{AppLifecycle, LifecyclePoller, PollerState};
use crate::mutation::{MutationTicket, OptimisticMutationEngine};

/// One signed-in user's notification state.
///
/// Owns the feed cache and every service operating on it. Create one per
/// session and hand it to whatever needs it.
pub struct NotificationSync {
    settings: SyncSettings,
    events: SyncEvents,
    cache: Arc<FeedCache>,
    controller: Arc<PaginatedFetchController>,
    mutations: Arc<OptimisticMutationEngine>,
    badge: Arc<BadgeCounterService>,
    poller: Mutex<Option<LifecyclePoller>>,
}

impl NotificationSync {
    pub fn create(api: Arc<dyn NotificationApi>, settings: SyncSettings) -> Self {
        let events = SyncEvents::new(settings.event_capacity);
        let cache = Arc::new(FeedCache::new());
        let controller = Arc::new(PaginatedFetchController::new(
            api.clone(),
            cache.clone(),
            events.clone(),
            settings.retry.clone(),
            settings.misuse_policy,
        ));
        let mutations = Arc::new(OptimisticMutationEngine::new(
            api.clone(),
            cache.clone(),
            events.clone(),
            settings.misuse_policy,
        ));
        let badge = Arc::new(BadgeCounterService::new(
            api,
            settings.badge_throttle,
            events.clone(),
        ));

        Self {
            settings,
            events,
            cache,
            controller,
            mutations,
            badge,
            poller: Mutex::new(None),
        }
    }

    fn poller(&self) -> MutexGuard<'_, Option<LifecyclePoller>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn cache(&self) -> &Arc<FeedCache> {
        &self.cache
    }

    pub fn controller(&self) -> &Arc<PaginatedFetchController> {
        &self.controller
    }

    pub fn badge(&self) -> &Arc<BadgeCounterService> {
        &self.badge
    }

    /// Handle on the feed stored under `key`, registering it if needed.
    pub fn feed(&self, key: FeedKey) -> FeedHandle {
        FeedHandle::new(self.controller.clone(), key)
    }

    /// Optimistically mark a notification as read. The returned ticket may be
    /// dropped; failures are reported on the event channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mark_read(&self, notification_id: &str) -> MutationTicket {
        self.mutations.mark_read(notification_id)
    }

    /// Start badge polling driven by `lifecycle`, replacing any running poller.
    pub fn start_poller(&self, lifecycle: &dyn AppLifecycle) {
        let poller = LifecyclePoller::start(self.badge.clone(), lifecycle, self.settings.poll_interval);
        if let Some(previous) = self.poller().replace(poller) {
            previous.teardown();
        }
    }

    pub fn poller_state(&self) -> Option<PollerState> {
        self.poller().as_ref().map(LifecyclePoller::state)
    }

    /// Refresh every cached feed that was invalidated, concurrently.
    pub async fn revalidate_all(&self) -> Vec<(FeedKey, Result<FetchOutcome, ApiError>)> {
        let keys = self.cache.keys();
        let outcomes = join_all(keys.iter().map(|key| self.controller.revalidate(key))).await;
        keys.into_iter().zip(outcomes).collect()
    }

    /// Drop cached feeds nobody holds a handle on. Feeds with mutations in
    /// flight are kept.
    pub fn evict_unobserved(&self) -> usize {
        self.cache
            .keys()
            .iter()
            .filter(|key| self.mutations.pending_count(key) == 0)
            .filter(|key| self.cache.evict_if_unobserved(key))
            .count()
    }

    /// Forget everything belonging to the current user.
    pub fn sign_out(&self) {
        info!("Signing out, clearing notification state");
        self.teardown();
        self.mutations.clear();
        self.badge.reset();
        self.cache.clear();
    }

    /// Stop background work. Idempotent.
    pub fn teardown(&self) {
        if let Some(poller) = self.poller().take() {
            poller.teardown();
        }
    }
}

impl Drop for NotificationSync {
    fn drop(&mut self) {
        self.teardown();
    }
}
