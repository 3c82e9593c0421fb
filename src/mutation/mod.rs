//! Optimistic mutations over the feed cache.
//!
//! A mutation is applied to the cache synchronously, before the request goes
//! out, so the UI reflects it immediately. Each touched feed keeps a stack of
//! pending mutations holding the record as it was before each one; a failure
//! restores that record, a success merges the server's copy.

mod context;

pub use context::{MutationContext, MutationTicket};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use context::StackFrame;
use crate::api::{ApiError, NotificationApi};
use crate::events::{SyncEvent, SyncEvents};
use crate::feed::{FeedCache, FeedKey};
use crate::misuse::MisusePolicy;
use crate::notifications::NotificationRecord;

pub struct OptimisticMutationEngine {
    api: Arc<dyn NotificationApi>,
    cache: Arc<FeedCache>,
    events: SyncEvents,
    misuse: MisusePolicy,
    stacks: Mutex<HashMap<FeedKey, Vec<StackFrame>>>,
}

impl OptimisticMutationEngine {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        cache: Arc<FeedCache>,
        events: SyncEvents,
        misuse: MisusePolicy,
    ) -> Self {
        Self {
            api,
            cache,
            events,
            misuse,
            stacks: Mutex::new(HashMap::new()),
        }
    }

    fn stacks(&self) -> MutexGuard<'_, HashMap<FeedKey, Vec<StackFrame>>> {
        self.stacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a notification as read in every cached feed that holds it.
    ///
    /// The change is visible in the cache when this returns. The request is
    /// sent even if no feed holds the notification.
    ///
    /// Must be called from within a tokio runtime. Outside one it panics
    /// before touching the cache.
    pub fn mark_read(self: &Arc<Self>, notification_id: &str) -> MutationTicket {
        let runtime = Handle::current();
        let context = self.apply_read(self.cache.keys(), notification_id);
        self.dispatch(&runtime, context)
    }

    /// Mark a notification as read in one feed only.
    ///
    /// Returns `None` if `key` has no cache entry. Must be called from within
    /// a tokio runtime.
    pub fn mark_read_in(
        self: &Arc<Self>,
        key: &FeedKey,
        notification_id: &str,
    ) -> Option<MutationTicket> {
        let runtime = Handle::current();
        if !self.cache.contains(key) {
            self.misuse.report(&format!(
                "mark_read of {} in feed {} which has no cache entry",
                notification_id, key
            ));
            return None;
        }
        let context = self.apply_read(vec![key.clone()], notification_id);
        Some(self.dispatch(&runtime, context))
    }

    /// Number of mutations still waiting on the server for `key`.
    pub fn pending_count(&self, key: &FeedKey) -> usize {
        self.stacks().get(key).map_or(0, Vec::len)
    }

    /// Forget every pending mutation. In-flight requests still complete but
    /// no longer roll anything back.
    pub fn clear(&self) {
        self.stacks().clear();
    }

    fn apply_read(&self, keys: Vec<FeedKey>, notification_id: &str) -> MutationContext {
        let correlation_id = Uuid::new_v4().to_string();
        let read_at = Utc::now();

        // Held across the cache writes so a concurrent settle can't observe
        // a frame without its change, or the reverse.
        let mut stacks = self.stacks();
        let mut snapshots = Vec::new();
        for key in keys {
            let mut before = None;
            self.cache.update_existing(&key, |entry| {
                entry.with_record(notification_id, |record| {
                    before = Some(record.clone());
                    NotificationRecord {
                        read_at: record.read_at.or(Some(read_at)),
                        ..record.clone()
                    }
                })
            });
            let Some(before) = before else {
                continue;
            };
            stacks.entry(key.clone()).or_default().push(StackFrame {
                correlation_id: correlation_id.clone(),
                notification_id: notification_id.to_string(),
                restore_to: before.clone(),
            });
            snapshots.push((key, before));
        }
        drop(stacks);

        debug!(
            "Marked {} as read locally in {} feed(s) [{}]",
            notification_id,
            snapshots.len(),
            correlation_id
        );
        MutationContext {
            correlation_id,
            notification_id: notification_id.to_string(),
            snapshots,
        }
    }

    fn dispatch(self: &Arc<Self>, runtime: &Handle, context: MutationContext) -> MutationTicket {
        let engine = Arc::clone(self);
        let correlation_id = context.correlation_id.clone();
        let handle = runtime.spawn(async move {
            let result = engine
                .api
                .mark_as_read(context.notification_id.clone())
                .await;
            match &result {
                Ok(confirmed) => engine.confirm(&context, confirmed),
                Err(error) => engine.roll_back(&context, error),
            }
            result
        });
        MutationTicket::new(correlation_id, handle)
    }

    fn confirm(&self, context: &MutationContext, confirmed: &NotificationRecord) {
        let mut stacks = self.stacks();
        for key in context.touched_keys() {
            if let Some(frames) = stacks.get_mut(key) {
                frames.retain(|frame| frame.correlation_id != context.correlation_id);
            }
        }
        // The server's copy is now the baseline for anything still pending
        // on the same record.
        for frame in stacks
            .values_mut()
            .flatten()
            .filter(|frame| frame.notification_id == context.notification_id)
        {
            frame.restore_to = confirmed.clone();
        }
        stacks.retain(|_, frames| !frames.is_empty());

        for key in self.cache.keys() {
            self.cache.update_existing(&key, |entry| {
                entry.with_record(&context.notification_id, |_| confirmed.clone())
            });
        }
        drop(stacks);

        info!(
            "Notification {} marked as read [{}]",
            context.notification_id, context.correlation_id
        );
        self.events.emit(SyncEvent::MarkReadConfirmed {
            correlation_id: context.correlation_id.clone(),
            notification_id: context.notification_id.clone(),
        });
    }

    fn roll_back(&self, context: &MutationContext, error: &ApiError) {
        let mut stacks = self.stacks();
        for key in context.touched_keys() {
            let Some(frames) = stacks.get_mut(key) else {
                continue;
            };
            let Some(index) = frames
                .iter()
                .position(|frame| frame.correlation_id == context.correlation_id)
            else {
                continue;
            };
            let frame = frames.remove(index);

            // A later mutation of the same record captured our optimistic
            // state; it inherits our snapshot and the cache stays as is.
            match frames[index..]
                .iter_mut()
                .find(|above| above.notification_id == frame.notification_id)
            {
                Some(above) => above.restore_to = frame.restore_to,
                None => {
                    self.cache.update_existing(key, |entry| {
                        entry.with_record(&frame.notification_id, |_| frame.restore_to.clone())
                    });
                }
            }
            if frames.is_empty() {
                stacks.remove(key);
            }
        }
        drop(stacks);

        warn!(
            "Failed to mark notification {} as read, rolled back [{}]: {}",
            context.notification_id, context.correlation_id, error
        );
        self.events.emit(SyncEvent::MarkReadFailed {
            correlation_id: context.correlation_id.clone(),
            notification_id: context.notification_id.clone(),
            error: error.clone(),
        });
    }
}
