//! Handling of programmer-misuse errors.
//!
//! Calling the core in a way that can only be a bug (fetching the next page of
//! a feed that was never registered, mutating a feed with no cache entry) is
//! loud in development builds and tolerated as a logged no-op in production.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisusePolicy {
    /// Panic with the misuse message.
    Panic,
    /// Log at `warn` and carry on with a no-op.
    Ignore,
}

impl Default for MisusePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            MisusePolicy::Panic
        } else {
            MisusePolicy::Ignore
        }
    }
}

impl MisusePolicy {
    /// Report a misuse. Returns only under [`MisusePolicy::Ignore`].
    pub fn report(self, message: &str) {
        match self {
            MisusePolicy::Panic => panic!("notification sync misuse: {}", message),
            MisusePolicy::Ignore => warn!("Ignoring notification sync misuse: {}", message),
        }
    }
}
