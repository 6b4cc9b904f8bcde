//! Admin key management tools.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::admin_keys::{ApiKey, Permission};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, ToolBuilder, ToolCategory, ToolResult};

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(
        ToolBuilder::new("keys.list")
            .description("List registered admin API keys (metadata only, no key material)")
            .input_schema(json!({
                "type": "object",
                "properties": {}
            }))
            .permission(Permission::KeysRead)
            .build(keys_list),
    );

    registry.register_tool(
        ToolBuilder::new("keys.reveal")
            .description("Recover the plaintext value of a stored admin API key")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "key_id": {
                        "type": "string",
                        "description": "Key identifier"
                    }
                },
                "required": ["key_id"]
            }))
            .permission(Permission::KeysAdmin)
            .category(ToolCategory::Sensitive)
            .build(keys_reveal),
    );
}

/// Metadata view of a key. Hashes and ciphertext never leave the store.
fn key_metadata(key: &ApiKey) -> Value {
    json!({
        "id": key.id,
        "description": key.description,
        "createdAt": key.created_at,
        "lastUsedAt": key.last_used_at,
        "revokedAt": key.revoked_at,
        "permissions": key.permissions,
        "allowedTools": key.allowed_tools,
        "enabled": key.enabled,
        "active": key.is_active(),
    })
}

async fn keys_list(ctx: ToolContext, _params: Value) -> ToolResult {
    let keys: Vec<Value> = ctx.key_store.list().iter().map(key_metadata).collect();

    let count = keys.len();
    let result = json!({
        "keys": keys,
        "count": count,
    });
    ToolsCallResult::json(&result).map_err(|e| McpError::InternalError(e.to_string()))
}

#[derive(Deserialize)]
struct RevealParams {
    key_id: String,
}

async fn keys_reveal(ctx: ToolContext, params: Value) -> ToolResult {
    let params: RevealParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let cipher = ctx.key_cipher.as_ref().ok_or_else(|| {
        McpError::ToolExecutionFailed("Key recovery is not configured on this server".to_string())
    })?;

    let key = ctx
        .key_store
        .find_by_id(&params.key_id)
        .ok_or_else(|| McpError::NotFound(format!("key {}", params.key_id)))?;

    if key.encrypted_key.is_empty() {
        return Err(McpError::ToolExecutionFailed(format!(
            "Key {} was created without recoverable storage",
            key.id
        )));
    }

    let plaintext = cipher.decrypt(&key.encrypted_key).map_err(|e| {
        warn!("Failed to decrypt stored key {}: {}", key.id, e);
        McpError::ToolExecutionFailed(format!("Could not recover key {}", key.id))
    })?;

    info!(
        "Key {} revealed to key {}",
        key.id, ctx.admin.api_key_id
    );

    let result = json!({
        "keyId": key.id,
        "key": plaintext,
    });
    ToolsCallResult::json(&result).map_err(|e| McpError::InternalError(e.to_string()))
}
