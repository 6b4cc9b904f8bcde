//! Shared constants for end-to-end tests

/// Timeout for individual HTTP requests
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// How long to wait for a spawned server to accept requests
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for readiness
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 25;

/// Key encryption secret used by every test server
pub const TEST_KEY_SECRET: &str = "e2e-test-secret";
