use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{AppLifecycle, AppState, Subscription};
use crate::badge::BadgeCounterService;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// App is in the foreground; the interval timer is running.
    Active,
    /// App is not in the foreground; no timer is scheduled.
    Idle,
    /// Torn down.
    Stopped,
}

/// Refreshes the badge counter on a fixed interval while the app is in the
/// foreground.
///
/// Construction issues one forced fetch. Going to the background cancels the
/// timer; coming back issues a forced fetch and restarts it. In-flight
/// fetches are never cancelled by a transition.
pub struct LifecyclePoller {
    shutdown_token: CancellationToken,
    subscription: Mutex<Option<Subscription>>,
    state_rx: watch::Receiver<PollerState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LifecyclePoller {
    /// Start polling. Must be called from within a tokio runtime.
    pub fn start(
        badge: Arc<BadgeCounterService>,
        lifecycle: &dyn AppLifecycle,
        interval: Duration,
    ) -> Self {
        let (transition_tx, transition_rx) = mpsc::unbounded_channel();
        let subscription = lifecycle.on_transition(Box::new(move |state| {
            // Closed only after teardown, when nobody is listening anyway.
            let _ = transition_tx.send(state);
        }));

        let shutdown_token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PollerState::Active);

        let task = PollLoop {
            badge,
            interval,
            transitions: transition_rx,
            shutdown_token: shutdown_token.clone(),
            state_tx,
        };
        let task = tokio::spawn(task.run());

        Self {
            shutdown_token,
            subscription: Mutex::new(Some(subscription)),
            state_rx,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    /// Stop the timer and deregister from lifecycle notifications.
    ///
    /// Safe to call any number of times.
    pub fn teardown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut subscription) = subscription else {
            return;
        };
        debug!("Tearing down badge poller");
        subscription.unsubscribe();
        self.shutdown_token.cancel();
    }

    /// Wait for the poll loop to exit after [`teardown`](Self::teardown).
    pub async fn stopped(&self) {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for LifecyclePoller {
    fn drop(&mut self) {
        self.teardown();
    }
}

struct PollLoop {
    badge: Arc<BadgeCounterService>,
    interval: Duration,
    transitions: mpsc::UnboundedReceiver<AppState>,
    shutdown_token: CancellationToken,
    state_tx: watch::Sender<PollerState>,
}

impl PollLoop {
    async fn run(mut self) {
        info!("Starting badge poller (interval {:?})", self.interval);
        self.spawn_fetch(true);
        let mut timer = Some(self.new_timer());

        loop {
            tokio::select! {
                _ = Self::tick(&mut timer) => {
                    debug!("Badge poll interval elapsed");
                    self.spawn_fetch(false);
                }
                Some(app_state) = self.transitions.recv() => {
                    match (timer.is_some(), app_state.is_foreground()) {
                        (false, true) => {
                            info!("App returned to foreground, resuming badge polling");
                            self.spawn_fetch(true);
                            timer = Some(self.new_timer());
                            self.state_tx.send_replace(PollerState::Active);
                        }
                        (true, false) => {
                            info!("App left foreground ({:?}), pausing badge polling", app_state);
                            timer = None;
                            self.state_tx.send_replace(PollerState::Idle);
                        }
                        _ => {}
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    break;
                }
            }
        }

        self.state_tx.send_replace(PollerState::Stopped);
        info!("Badge poller stopped");
    }

    /// First tick lands one full period from now.
    fn new_timer(&self) -> Interval {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    async fn tick(timer: &mut Option<Interval>) {
        match timer {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    fn spawn_fetch(&self, force: bool) {
        let badge = Arc::clone(&self.badge);
        tokio::spawn(async move {
            // Failures are already logged and broadcast by the service.
            let _ = badge.fetch(force).await;
        });
    }
}
