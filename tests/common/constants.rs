//! Shared constants for end-to-end tests

/// Bearer token the fake backend accepts
pub const TEST_TOKEN: &str = "test-token-123";

/// Records per page served by the fake backend
pub const PAGE_SIZE: usize = 3;

/// Number of notifications seeded by default
pub const SEEDED_COUNT: usize = 7;

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
