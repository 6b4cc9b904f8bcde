//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own key registry.

use super::constants::*;
use agent_control_server::admin_keys::{ApiKey, AuthGuard, FileKeyStore, KeyCipher};
use agent_control_server::config::AppConfig;
use agent_control_server::mcp::handler::create_mcp_state;
use agent_control_server::server::server::make_app;
use agent_control_server::server::state::ServerState;
use agent_control_server::server::RequestsLoggingLevel;
use agent_control_server::sessions::SessionRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated key registry
///
/// When dropped, the server gracefully shuts down and temp resources are
/// cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Session registry shared with the server, for seeding sessions in tests
    pub sessions: Arc<SessionRegistry>,

    /// Key store shared with the server, for direct registry access in tests
    pub key_store: Arc<FileKeyStore>,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

fn default_config(keys_file: std::path::PathBuf) -> AppConfig {
    AppConfig {
        keys_file,
        port: 0,
        logging_level: RequestsLoggingLevel::None,
        key_secret: Some(TEST_KEY_SECRET.to_string()),
        heartbeat_timeout_secs: 30,
        idle_retention_secs: 1800,
        sweep_interval_secs: 5,
        rate_limit_general_per_hour: 100,
        rate_limit_sensitive_per_hour: 50,
    }
}

impl TestServer {
    /// Spawns a test server on a random port with the given keys registered.
    pub async fn spawn(keys: Vec<ApiKey>) -> Self {
        Self::spawn_with(keys, |_| {}).await
    }

    /// Like `spawn`, but lets the test adjust the config before startup.
    pub async fn spawn_with(keys: Vec<ApiKey>, configure: impl FnOnce(&mut AppConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let keys_file = temp_dir.path().join("keys.json");

        let key_store = Arc::new(FileKeyStore::initialize(keys_file.clone()));
        for key in keys {
            key_store.insert(key).expect("Failed to register test key");
        }

        let mut config = default_config(keys_file);
        configure(&mut config);

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let sessions = Arc::new(SessionRegistry::new(config.session_policy()));

        let state = ServerState {
            start_time: Instant::now(),
            sessions: sessions.clone(),
            key_store: key_store.clone(),
            auth_guard: Arc::new(AuthGuard::new(key_store.clone())),
            key_cipher: config.key_secret.as_deref().map(KeyCipher::new),
            mcp_state: Arc::new(create_mcp_state(&config)),
            config,
        };

        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            sessions,
            key_store,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the /health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
