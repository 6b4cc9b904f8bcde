//! MCP tool implementations, grouped by the resource they operate on.

pub mod keys;
pub mod sessions;
pub mod status;

use super::registry::McpRegistry;

/// Register every tool the server exposes.
pub fn register_all_tools(registry: &mut McpRegistry) {
    sessions::register_tools(registry);
    keys::register_tools(registry);
    status::register_tools(registry);
}
