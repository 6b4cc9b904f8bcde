//! Execution context handed to tool handlers.

use std::sync::Arc;
use std::time::Instant;

use super::rate_limit::AdminRateLimiter;
use crate::admin_keys::{AdminContext, FileKeyStore, KeyCipher};
use crate::sessions::SessionRegistry;

pub struct ToolContext {
    /// Identity of the calling key, as resolved by the guard.
    pub admin: AdminContext,
    pub sessions: Arc<SessionRegistry>,
    pub key_store: Arc<FileKeyStore>,
    /// Present only when a key encryption secret is configured.
    pub key_cipher: Option<KeyCipher>,
    pub rate_limiter: Arc<AdminRateLimiter>,
    pub server_version: String,
    pub start_time: Instant,
}
