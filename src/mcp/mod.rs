//! MCP admin endpoint.
//!
//! JSON-RPC 2.0 protocol types, tool registry, per-key rate limiting and the
//! dispatcher wiring them together.

pub mod context;
pub mod handler;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod tools;
