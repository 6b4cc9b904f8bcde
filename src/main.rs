use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agent_control_server::admin_keys::{AuthGuard, FileKeyStore, KeyCipher};
use agent_control_server::config::{AppConfig, CliConfig, FileConfig};
use agent_control_server::mcp::handler::create_mcp_state;
use agent_control_server::server::state::ServerState;
use agent_control_server::server::{run_server, RequestsLoggingLevel};
use agent_control_server::sessions::{HeartbeatMonitor, SessionEvent, SessionRegistry};
use tokio_util::sync::CancellationToken;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the JSON file holding the admin API key registry.
    #[clap(value_parser = parse_path)]
    pub keys_file: Option<PathBuf>,

    /// Path to an optional TOML config file. Values in it override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Secret for recoverable key storage. Without it keys cannot be revealed.
    #[clap(long, env = "KEY_SECRET")]
    pub key_secret: Option<String>,

    /// Seconds without a heartbeat before a session is flagged as timed out.
    #[clap(long, default_value_t = 30)]
    pub heartbeat_timeout_secs: u64,

    /// Seconds without activity before a session is evicted.
    #[clap(long, default_value_t = 1800)]
    pub idle_retention_secs: u64,

    /// Seconds between heartbeat monitor sweeps.
    #[clap(long, default_value_t = 5)]
    pub sweep_interval_secs: u64,

    /// Hourly request quota per admin key.
    #[clap(long, default_value_t = 100)]
    pub rate_limit_general_per_hour: u32,

    /// Hourly quota for sensitive tool calls per admin key.
    #[clap(long, default_value_t = 50)]
    pub rate_limit_sensitive_per_hour: u32,
}

/// Interval between rate limiter stale-entry cleanups.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;

    let cli_config = CliConfig {
        keys_file: cli_args.keys_file,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        key_secret: cli_args.key_secret,
        heartbeat_timeout_secs: cli_args.heartbeat_timeout_secs,
        idle_retention_secs: cli_args.idle_retention_secs,
        sweep_interval_secs: cli_args.sweep_interval_secs,
        rate_limit_general_per_hour: cli_args.rate_limit_general_per_hour,
        rate_limit_sensitive_per_hour: cli_args.rate_limit_sensitive_per_hour,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening key registry at {:?}...", config.keys_file);
    let key_store = Arc::new(FileKeyStore::initialize(config.keys_file.clone()));
    if key_store.list().is_empty() {
        warn!("Key registry is empty, no admin can connect. Create keys with cli-keys.");
    }

    let key_cipher = config.key_secret.as_deref().map(KeyCipher::new);
    if key_cipher.is_none() {
        info!("No key secret configured, stored keys will not be recoverable.");
    }

    let sessions = Arc::new(SessionRegistry::new(config.session_policy()));

    let shutdown = CancellationToken::new();

    let (monitor, mut eviction_events) = HeartbeatMonitor::new(sessions.clone());
    tokio::spawn(monitor.run(config.sweep_interval(), shutdown.clone()));

    tokio::spawn(async move {
        loop {
            match eviction_events.recv().await {
                Ok(SessionEvent::Evicted {
                    session_id,
                    agent_id,
                }) => {
                    info!(
                        "Session {} of agent {} evicted after idle timeout",
                        session_id, agent_id
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} eviction events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mcp_state = Arc::new(create_mcp_state(&config));

    let limiter = mcp_state.rate_limiter.clone();
    let cleanup_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cleanup_shutdown.cancelled() => break,
                _ = ticker.tick() => limiter.cleanup_stale_entries(),
            }
        }
    });

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received.");
        ctrl_c_shutdown.cancel();
    });

    let state = ServerState {
        start_time: std::time::Instant::now(),
        sessions,
        key_store: key_store.clone(),
        auth_guard: Arc::new(AuthGuard::new(key_store)),
        key_cipher,
        mcp_state,
        config: config.clone(),
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(state, shutdown).await
}
