//! Server status tool.

use serde_json::{json, Value};

use crate::admin_keys::Permission;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::rate_limit::RateKey;
use crate::mcp::registry::{McpRegistry, ToolBuilder, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(
        ToolBuilder::new("server.status")
            .description("Server version, uptime, session count and quota usage for the calling key")
            .input_schema(json!({
                "type": "object",
                "properties": {}
            }))
            .permission(Permission::SessionsRead)
            .build(server_status),
    );
}

async fn server_status(ctx: ToolContext, _params: Value) -> ToolResult {
    let rate_key = RateKey::ApiKey(ctx.admin.api_key_id.clone());
    let (general_used, sensitive_used) = ctx.rate_limiter.get_usage(&rate_key).unwrap_or((0, 0));

    let result = json!({
        "version": ctx.server_version,
        "uptimeSecs": ctx.start_time.elapsed().as_secs(),
        "sessionCount": ctx.sessions.count(),
        "rateUsage": {
            "general": general_used,
            "sensitive": sensitive_used,
        },
    });
    ToolsCallResult::json(&result).map_err(|e| McpError::InternalError(e.to_string()))
}
