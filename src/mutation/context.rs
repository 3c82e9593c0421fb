use tokio::task::JoinHandle;

use crate::api::ApiError;
use crate::feed::FeedKey;
use crate::notifications::NotificationRecord;

/// A mutation that has been applied locally and is waiting on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationContext {
    pub correlation_id: String,
    pub notification_id: String,
    /// The record as it was in each touched feed before the mutation.
    pub snapshots: Vec<(FeedKey, NotificationRecord)>,
}

impl MutationContext {
    pub fn touched_keys(&self) -> impl Iterator<Item = &FeedKey> {
        self.snapshots.iter().map(|(key, _)| key)
    }
}

/// One level of a feed's rollback stack.
#[derive(Debug, Clone)]
pub(crate) struct StackFrame {
    pub(crate) correlation_id: String,
    pub(crate) notification_id: String,
    /// What to restore if this mutation fails. Starts as the captured
    /// snapshot, but can be replaced when a mutation below it settles.
    pub(crate) restore_to: NotificationRecord,
}

/// Handle on a mutation in flight.
///
/// Dropping the ticket does not cancel the mutation; reconciliation happens
/// regardless and failures are reported on the event channel.
pub struct MutationTicket {
    correlation_id: String,
    handle: JoinHandle<Result<NotificationRecord, ApiError>>,
}

impl MutationTicket {
    pub(crate) fn new(
        correlation_id: String,
        handle: JoinHandle<Result<NotificationRecord, ApiError>>,
    ) -> Self {
        Self {
            correlation_id,
            handle,
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Wait for the mutation to be reconciled or rolled back.
    pub async fn settled(self) -> Result<NotificationRecord, ApiError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(ApiError::Network(format!("mutation task aborted: {}", e))),
        }
    }
}
