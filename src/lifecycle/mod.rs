//! App lifecycle integration.
//!
//! The host platform's foreground/background notifications are consumed
//! through the [`AppLifecycle`] trait; [`LifecyclePoller`] uses them to gate
//! badge polling.

mod poller;

pub use poller::{LifecyclePoller, PollerState, DEFAULT_POLL_INTERVAL};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Application state as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    /// In the foreground and receiving input.
    Active,
    /// Visible but not receiving input (e.g. a system dialog is on top).
    Inactive,
    Background,
}

impl AppState {
    pub fn is_foreground(self) -> bool {
        self == AppState::Active
    }
}

pub type TransitionHandler = Box<dyn Fn(AppState) + Send + Sync>;

/// Source of app state transitions.
pub trait AppLifecycle: Send + Sync {
    fn current_state(&self) -> AppState;

    /// Register `handler` to be called on every state change. The handler
    /// stays registered until the returned [`Subscription`] is dropped or
    /// unsubscribed.
    fn on_transition(&self, handler: TransitionHandler) -> Subscription;
}

/// Registration returned by [`AppLifecycle::on_transition`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Deregister the handler. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

type HandlerMap = HashMap<u64, Arc<TransitionHandler>>;

/// [`AppLifecycle`] driven explicitly through [`set_state`](Self::set_state).
///
/// Hosts bridge their platform callback into `set_state`; tests call it
/// directly.
pub struct ChannelLifecycle {
    state: Mutex<AppState>,
    handlers: Arc<Mutex<HandlerMap>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelLifecycle {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: Mutex::new(initial),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Record a new app state and notify handlers if it changed.
    pub fn set_state(&self, next: AppState) {
        {
            let mut state = lock(&self.state);
            if *state == next {
                return;
            }
            debug!("App state {:?} -> {:?}", *state, next);
            *state = next;
        }
        // Call handlers outside the lock so they may unsubscribe.
        let handlers: Vec<Arc<TransitionHandler>> = lock(&self.handlers).values().cloned().collect();
        for handler in handlers {
            handler(next);
        }
    }

    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }
}

impl Default for ChannelLifecycle {
    fn default() -> Self {
        Self::new(AppState::Active)
    }
}

impl AppLifecycle for ChannelLifecycle {
    fn current_state(&self) -> AppState {
        *lock(&self.state)
    }

    fn on_transition(&self, handler: TransitionHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).insert(id, Arc::new(handler));

        let handlers = Arc::clone(&self.handlers);
        Subscription::new(move || {
            lock(&handlers).remove(&id);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handlers_receive_changes_only() {
        let lifecycle = ChannelLifecycle::new(AppState::Active);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _subscription = {
            let seen = seen.clone();
            lifecycle.on_transition(Box::new(move |state| seen.lock().unwrap().push(state)))
        };

        lifecycle.set_state(AppState::Active);
        lifecycle.set_state(AppState::Background);
        lifecycle.set_state(AppState::Background);
        lifecycle.set_state(AppState::Active);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![AppState::Background, AppState::Active]
        );
        assert_eq!(lifecycle.current_state(), AppState::Active);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let lifecycle = ChannelLifecycle::default();
        let mut subscription = lifecycle.on_transition(Box::new(|_| {}));
        assert_eq!(lifecycle.handler_count(), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(lifecycle.handler_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_deregisters() {
        let lifecycle = ChannelLifecycle::default();
        {
            let _subscription = lifecycle.on_transition(Box::new(|_| {}));
            assert_eq!(lifecycle.handler_count(), 1);
        }
        assert_eq!(lifecycle.handler_count(), 0);
    }

    #[test]
    fn test_only_active_is_foreground() {
        assert!(AppState::Active.is_foreground());
        assert!(!AppState::Inactive.is_foreground());
        assert!(!AppState::Background.is_foreground());
    }
}
