use anyhow::Result;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::{log_requests, state::ServerState};
use crate::mcp::handler::mcp_handler;

#[derive(Serialize)]
struct ServerStats {
    pub version: String,
    pub uptime: String,
    pub session_count: usize,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: format_uptime(state.start_time.elapsed()),
        session_count: state.sessions.count(),
    };
    Json(stats)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub fn make_app(state: ServerState) -> Router {
    let admin_routes: Router = Router::new()
        .route("/mcp", post(mcp_handler))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .with_state(state.clone())
        .nest("/v1", admin_routes);

    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    app
}

pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on 127.0.0.1:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
