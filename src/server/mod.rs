pub mod auth;
mod http_layers;
pub mod server;
pub mod state;

pub use http_layers::*;
#[allow(unused_imports)] // Used by main.rs
pub use server::run_server;
