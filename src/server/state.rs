use axum::extract::FromRef;

use crate::admin_keys::{AuthGuard, FileKeyStore, KeyCipher};
use crate::config::AppConfig;
use crate::mcp::handler::McpState;
use crate::sessions::SessionRegistry;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedSessionRegistry = Arc<SessionRegistry>;
pub type GuardedKeyStore = Arc<FileKeyStore>;
pub type GuardedAuthGuard = Arc<AuthGuard>;
pub type OptionalKeyCipher = Option<KeyCipher>;
pub type GuardedMcpState = Arc<McpState>;

#[derive(Clone)]
pub struct ServerState {
    pub config: AppConfig,
    pub start_time: Instant,
    pub sessions: GuardedSessionRegistry,
    pub key_store: GuardedKeyStore,
    pub auth_guard: GuardedAuthGuard,
    pub key_cipher: OptionalKeyCipher,
    pub mcp_state: GuardedMcpState,
}

impl FromRef<ServerState> for AppConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedSessionRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.sessions.clone()
    }
}

impl FromRef<ServerState> for GuardedKeyStore {
    fn from_ref(input: &ServerState) -> Self {
        input.key_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthGuard {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_guard.clone()
    }
}

impl FromRef<ServerState> for OptionalKeyCipher {
    fn from_ref(input: &ServerState) -> Self {
        input.key_cipher.clone()
    }
}

impl FromRef<ServerState> for GuardedMcpState {
    fn from_ref(input: &ServerState) -> Self {
        input.mcp_state.clone()
    }
}
