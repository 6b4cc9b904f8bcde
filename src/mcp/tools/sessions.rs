//! Session management tools.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, ToolBuilder, ToolCategory, ToolResult};
use crate::admin_keys::Permission;
use crate::sessions::SessionStatus;

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(
        ToolBuilder::new("sessions.list")
            .description("List tracked agent sessions, optionally filtered by status or agent")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "description": "Only return sessions in this handshake state",
                        "enum": ["pending", "confirmed"]
                    },
                    "agent_id": {
                        "type": "string",
                        "description": "Only return sessions belonging to this agent"
                    }
                }
            }))
            .permission(Permission::SessionsRead)
            .build(sessions_list),
    );

    registry.register_tool(
        ToolBuilder::new("sessions.get")
            .description("Get a single session with derived idle and heartbeat state")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session identifier"
                    }
                },
                "required": ["session_id"]
            }))
            .permission(Permission::SessionsRead)
            .build(sessions_get),
    );

    registry.register_tool(
        ToolBuilder::new("sessions.terminate")
            .description("Remove a session from the registry immediately")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session identifier"
                    }
                },
                "required": ["session_id"]
            }))
            .permission(Permission::SessionsWrite)
            .category(ToolCategory::Sensitive)
            .build(sessions_terminate),
    );
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
    agent_id: Option<String>,
}

async fn sessions_list(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ListParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let status_filter = match params.status.as_deref() {
        Some("pending") => Some(SessionStatus::Pending),
        Some("confirmed") => Some(SessionStatus::Confirmed),
        Some(other) => {
            return Err(McpError::InvalidParams(format!(
                "Unknown status: {}",
                other
            )))
        }
        None => None,
    };

    let mut sessions = ctx.sessions.list_all(Utc::now());
    if let Some(status) = status_filter {
        sessions.retain(|s| s.status == status);
    }
    if let Some(agent_id) = &params.agent_id {
        sessions.retain(|s| &s.agent_id == agent_id);
    }
    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let count = sessions.len();
    let result = json!({
        "sessions": sessions,
        "count": count,
    });
    ToolsCallResult::json(&result).map_err(|e| McpError::InternalError(e.to_string()))
}

#[derive(Deserialize)]
struct GetParams {
    session_id: String,
}

async fn sessions_get(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let snapshot = ctx
        .sessions
        .get(&params.session_id, Utc::now())
        .ok_or_else(|| McpError::NotFound(format!("session {}", params.session_id)))?;

    ToolsCallResult::json(&snapshot).map_err(|e| McpError::InternalError(e.to_string()))
}

async fn sessions_terminate(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    if !ctx.sessions.remove(&params.session_id) {
        return Err(McpError::NotFound(format!(
            "session {}",
            params.session_id
        )));
    }

    info!(
        "Session {} terminated by key {}",
        params.session_id, ctx.admin.api_key_id
    );

    let result = json!({
        "sessionId": params.session_id,
        "terminated": true,
    });
    ToolsCallResult::json(&result).map_err(|e| McpError::InternalError(e.to_string()))
}
