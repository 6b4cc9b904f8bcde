//! Agent Control Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod admin_keys;
pub mod config;
pub mod mcp;
pub mod server;
pub mod sessions;

// Re-export commonly used types for convenience
pub use server::{run_server, RequestsLoggingLevel};
pub use sessions::{SessionRegistry, SessionStatus};
