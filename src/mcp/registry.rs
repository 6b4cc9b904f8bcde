//! MCP Tool Registry
//!
//! Manages registration and lookup of tools, and structural validation of
//! tool call arguments against each tool's declared input schema.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::context::ToolContext;
use super::protocol::{McpError, ToolDefinition, ToolsCallResult};
use crate::admin_keys::AdminContext;
use crate::admin_keys::Permission;

// ============================================================================
// Tool Types
// ============================================================================

/// Result type for tool execution
pub type ToolResult = Result<ToolsCallResult, McpError>;

/// Boxed future for async tool execution
pub type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Tool handler function type
pub type ToolHandler = Arc<dyn Fn(ToolContext, Value) -> ToolFuture + Send + Sync>;

/// A registered tool with metadata and handler
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub required_permissions: Vec<Permission>,
    pub handler: ToolHandler,
    pub category: ToolCategory,
}

/// Tool category for rate limiting. Sensitive tools mutate state and are
/// charged against the stricter quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Read,
    Sensitive,
}

// ============================================================================
// Registry
// ============================================================================

/// Registry for MCP tools. Populated once at startup, immutable afterwards.
pub struct McpRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Names are globally unique.
    pub fn register_tool(&mut self, tool: RegisteredTool) {
        let name = tool.name.clone();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("Replacing previously registered tool: {}", name);
        }
    }

    /// Get the tools visible to a caller: permission requirements satisfied
    /// and, when the key carries an allow-list, listed in it.
    pub fn visible_tools(&self, context: &AdminContext) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .filter(|tool| {
                Permission::satisfies(&context.permissions, &tool.required_permissions)
                    && context.tool_allowed(&tool.name)
            })
            .map(|tool| ToolDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.input_schema.clone(),
            })
            .collect()
    }

    /// Look a tool up by name, with no authorization applied.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Get the number of registered tools
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

impl Default for McpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Argument validation
// ============================================================================

/// Structural validation of call arguments against a tool's input schema:
/// required fields present, declared primitive types respected, no unknown
/// fields. This is deliberately not a full JSON Schema implementation.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    let object = match arguments.as_object() {
        Some(object) => object,
        None => return Err("Arguments must be an object".to_string()),
    };

    let properties = schema.get("properties").and_then(Value::as_object);

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(field) {
                return Err(format!("Missing required argument: {}", field));
            }
        }
    }

    for (name, value) in object {
        let property = match properties.and_then(|p| p.get(name)) {
            Some(property) => property,
            None => return Err(format!("Unknown argument: {}", name)),
        };

        if let Some(expected) = property.get("type").and_then(Value::as_str) {
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!("Argument '{}' must be of type {}", name, expected));
            }
        }
    }

    Ok(())
}

// ============================================================================
// Builder helpers
// ============================================================================

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
    required_permissions: Vec<Permission>,
    category: ToolCategory,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            required_permissions: Vec::new(),
            category: ToolCategory::Read,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn permission(mut self, perm: Permission) -> Self {
        self.required_permissions.push(perm);
        self
    }

    pub fn category(mut self, cat: ToolCategory) -> Self {
        self.category = cat;
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> RegisteredTool
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        RegisteredTool {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            required_permissions: self.required_permissions,
            category: self.category,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }
}
