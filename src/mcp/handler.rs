//! MCP HTTP Handler
//!
//! Dispatches JSON-RPC envelopes arriving on the admin endpoint. The
//! transport is plain HTTP POST: one envelope per request, notifications
//! get an empty 202, everything else a 200 with the response envelope.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

use super::context::ToolContext;
use super::protocol::{
    methods, InitializeParams, InitializeResult, McpError, McpRequest, McpResponse, PingResult,
    RequestId, ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult, ToolsCapability,
    ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use super::rate_limit::{
    AdminRateLimiter, RateKey, RateLimitConfig, RateLimitExceeded, RateLimitStatus, RateTier,
};
use super::registry::{validate_arguments, McpRegistry, ToolCategory};
use crate::admin_keys::AdminContext;
use crate::config::AppConfig;
use crate::server::state::{GuardedMcpState, ServerState};

/// State shared across MCP requests
pub struct McpState {
    pub registry: Arc<McpRegistry>,
    pub rate_limiter: Arc<AdminRateLimiter>,
    /// Keys that completed the initialize handshake. The dispatcher session
    /// is keyed by API key id since the transport is stateless.
    initialized: Mutex<HashSet<String>>,
}

impl McpState {
    fn is_initialized(&self, api_key_id: &str) -> bool {
        self.initialized.lock().unwrap().contains(api_key_id)
    }

    fn mark_initialized(&self, api_key_id: &str) {
        self.initialized
            .lock()
            .unwrap()
            .insert(api_key_id.to_string());
    }
}

/// HTTP entrypoint for the MCP endpoint. Authentication already happened in
/// the extractor; the general quota is charged here for every request,
/// before dispatch, so rejected calls still count.
pub async fn mcp_handler(
    admin: AdminContext,
    State(server_state): State<ServerState>,
    State(mcp_state): State<GuardedMcpState>,
    body: String,
) -> Response {
    let rate_key = RateKey::ApiKey(admin.api_key_id.clone());
    let status = match mcp_state
        .rate_limiter
        .check_and_record(&rate_key, RateTier::General)
    {
        Ok(status) => status,
        Err(exceeded) => return rate_limited_response(exceeded),
    };

    match handle_message(&body, &admin, &server_state, &mcp_state).await {
        Some(response) => {
            let mut http = (StatusCode::OK, axum::Json(response)).into_response();
            apply_rate_headers(&mut http, &status);
            http
        }
        None => {
            let mut http = StatusCode::ACCEPTED.into_response();
            apply_rate_headers(&mut http, &status);
            http
        }
    }
}

fn apply_rate_headers(response: &mut Response, status: &RateLimitStatus) {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(status.limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(status.remaining),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(status.reset_secs),
    );
}

fn rate_limited_response(exceeded: RateLimitExceeded) -> Response {
    let envelope = McpResponse::error(
        Some(RequestId::Null),
        McpError::RateLimited {
            retry_after_secs: exceeded.retry_after_secs,
        },
    );
    let mut http = (StatusCode::TOO_MANY_REQUESTS, axum::Json(envelope)).into_response();
    let headers = http.headers_mut();
    headers.insert(
        HeaderName::from_static("retry-after"),
        HeaderValue::from(exceeded.retry_after_secs),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(exceeded.limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(0u32),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(exceeded.retry_after_secs),
    );
    http
}

/// Handle a single MCP envelope. Returns None for notifications.
pub async fn handle_message(
    text: &str,
    admin: &AdminContext,
    server_state: &ServerState,
    mcp_state: &McpState,
) -> Option<McpResponse> {
    // Parse the request
    let request: McpRequest = match serde_json::from_str(text) {
        Ok(req) => req,
        Err(e) => {
            // The id cannot be trusted out of a broken envelope, echo null.
            return Some(McpResponse::error(
                Some(RequestId::Null),
                McpError::ParseError(e.to_string()),
            ));
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(McpResponse::error(
            request.id,
            McpError::InvalidRequest(format!(
                "Unsupported JSON-RPC version: {}",
                request.jsonrpc
            )),
        ));
    }

    // Requests without an id are notifications and never get a response.
    let request_id = match request.id.clone() {
        Some(id) => id,
        None => {
            match request.method.as_str() {
                methods::INITIALIZED => {
                    debug!("Client for key {} reported initialized", admin.api_key_id)
                }
                methods::SHUTDOWN => {
                    debug!("Client for key {} is shutting down", admin.api_key_id)
                }
                other => debug!("Ignoring notification: {}", other),
            }
            return None;
        }
    };

    let initialized = mcp_state.is_initialized(&admin.api_key_id);

    // Dispatch based on method
    let result = match request.method.as_str() {
        methods::INITIALIZE => handle_initialize(&request, admin, mcp_state),
        // Lifecycle methods sent as requests still get their id echoed.
        methods::INITIALIZED | methods::SHUTDOWN => Ok(serde_json::json!({})),
        // Until the handshake completes, nothing else is accepted.
        _ if !initialized => Err(McpError::InvalidRequest("Not initialized".to_string())),
        methods::PING => handle_ping(),
        methods::TOOLS_LIST => handle_tools_list(admin, mcp_state),
        methods::TOOLS_CALL => handle_tools_call(&request, admin, server_state, mcp_state).await,
        other => Err(McpError::MethodNotFound(other.to_string())),
    };

    Some(match result {
        Ok(value) => McpResponse::success(request_id, value),
        Err(error) => McpResponse::error(Some(request_id), error),
    })
}

fn handle_initialize(
    request: &McpRequest,
    admin: &AdminContext,
    mcp_state: &McpState,
) -> Result<serde_json::Value, McpError> {
    let params = request
        .params
        .clone()
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;
    let params: InitializeParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    if params.protocol_version != MCP_PROTOCOL_VERSION {
        return Err(McpError::InvalidParams(format!(
            "Unsupported protocol version: {}",
            params.protocol_version
        )));
    }
    debug!(
        "Initialize from key {} (client protocol {})",
        admin.api_key_id, params.protocol_version
    );

    mcp_state.mark_initialized(&admin.api_key_id);

    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: None }),
        },
        server_info: ServerInfo {
            name: "agent-control-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

fn handle_ping() -> Result<serde_json::Value, McpError> {
    serde_json::to_value(PingResult {}).map_err(|e| McpError::InternalError(e.to_string()))
}

fn handle_tools_list(
    admin: &AdminContext,
    mcp_state: &McpState,
) -> Result<serde_json::Value, McpError> {
    let tools = mcp_state.registry.visible_tools(admin);

    let result = ToolsListResult { tools };

    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

async fn handle_tools_call(
    request: &McpRequest,
    admin: &AdminContext,
    server_state: &ServerState,
    mcp_state: &McpState,
) -> Result<serde_json::Value, McpError> {
    let params: ToolsCallParams = request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

    let tool = mcp_state
        .registry
        .get(&params.name)
        .ok_or_else(|| McpError::MethodNotFound(format!("Unknown tool: {}", params.name)))?;

    let arguments = params.arguments.unwrap_or_else(|| serde_json::json!({}));
    validate_arguments(&tool.input_schema, &arguments).map_err(McpError::InvalidParams)?;

    server_state
        .auth_guard
        .authorize_tool(admin, &tool.name, &tool.required_permissions)
        .map_err(|e| McpError::PermissionDenied(e.to_string()))?;

    // Sensitive tools are additionally charged against the stricter quota.
    if tool.category == ToolCategory::Sensitive {
        let rate_key = RateKey::ApiKey(admin.api_key_id.clone());
        if let Err(exceeded) = mcp_state
            .rate_limiter
            .check_and_record(&rate_key, RateTier::Sensitive)
        {
            return Err(McpError::RateLimited {
                retry_after_secs: exceeded.retry_after_secs,
            });
        }
    }

    let ctx = ToolContext {
        admin: admin.clone(),
        sessions: server_state.sessions.clone(),
        key_store: server_state.key_store.clone(),
        key_cipher: server_state.key_cipher.clone(),
        rate_limiter: mcp_state.rate_limiter.clone(),
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: server_state.start_time,
    };

    // Business failures become isError tool results inside a successful
    // envelope; contract violations stay protocol-level errors.
    match (tool.handler)(ctx, arguments).await {
        Ok(result) => {
            serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
        }
        Err(McpError::ToolExecutionFailed(msg)) => serde_json::to_value(ToolsCallResult::error(msg))
            .map_err(|e| McpError::InternalError(e.to_string())),
        Err(McpError::NotFound(what)) => {
            serde_json::to_value(ToolsCallResult::error(format!("Not found: {}", what)))
                .map_err(|e| McpError::InternalError(e.to_string()))
        }
        Err(other) => Err(other),
    }
}

/// Create the MCP state with registered tools
pub fn create_mcp_state(config: &AppConfig) -> McpState {
    let mut registry = McpRegistry::new();

    super::tools::register_all_tools(&mut registry);

    info!(
        "MCP registry initialized with {} tools",
        registry.tool_count()
    );

    McpState {
        registry: Arc::new(registry),
        rate_limiter: Arc::new(AdminRateLimiter::new(RateLimitConfig {
            general_per_hour: config.rate_limit_general_per_hour,
            sensitive_per_hour: config.rate_limit_sensitive_per_hour,
            window: Duration::from_secs(3600),
        })),
        initialized: Mutex::new(HashSet::new()),
    }
}
