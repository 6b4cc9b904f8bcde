//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with the MCP envelope plumbing: credentials go in the
//! X-API-Key header, one JSON-RPC envelope per POST to /v1/mcp.

use reqwest::Response;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use super::constants::REQUEST_TIMEOUT_SECS;

pub struct McpClient {
    pub client: reqwest::Client,
    pub base_url: String,
    api_key: Option<String>,
    next_id: AtomicI64,
}

impl McpClient {
    /// Creates a client carrying the given API key on every request.
    pub fn new(base_url: String, api_key: &str) -> Self {
        Self::build(base_url, Some(api_key.to_string()))
    }

    /// Creates a client that sends no credentials.
    pub fn unauthenticated(base_url: String) -> Self {
        Self::build(base_url, None)
    }

    fn build(base_url: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            api_key,
            next_id: AtomicI64::new(1),
        }
    }

    /// POSTs a raw body to the MCP endpoint.
    pub async fn post_raw(&self, body: String) -> Response {
        let mut request = self
            .client
            .post(format!("{}/v1/mcp", self.base_url))
            .header("content-type", "application/json")
            .body(body);
        if let Some(api_key) = &self.api_key {
            request = request.header("X-API-Key", api_key);
        }
        request.send().await.expect("Request failed")
    }

    /// Sends a request envelope with a fresh id and returns the HTTP response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Response {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut envelope = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            envelope["params"] = params;
        }
        self.post_raw(envelope.to_string()).await
    }

    /// Sends a notification (no id). The server should return 202.
    pub async fn notify(&self, method: &str) -> Response {
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        self.post_raw(envelope.to_string()).await
    }

    /// Performs the initialize handshake, panicking on failure.
    pub async fn initialize(&self) {
        let response = self
            .request(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "e2e-tests", "version": "0.0.0" }
                })),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.expect("Invalid JSON response");
        assert!(
            body.get("error").is_none(),
            "initialize failed: {:?}",
            body["error"]
        );

        let response = self.notify("notifications/initialized").await;
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }

    /// Sends a request and returns the parsed response envelope.
    pub async fn request_envelope(&self, method: &str, params: Option<Value>) -> Value {
        let response = self.request(method, params).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid JSON response")
    }

    /// Calls a tool and returns the response envelope.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        self.request_envelope(
            "tools/call",
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// Calls a tool expecting success, returning the JSON parsed from the
    /// result's text content.
    pub async fn call_tool_json(&self, name: &str, arguments: Value) -> Value {
        let envelope = self.call_tool(name, arguments).await;
        assert!(
            envelope.get("error").is_none(),
            "tool call failed: {:?}",
            envelope["error"]
        );
        let result = &envelope["result"];
        assert!(
            result.get("isError").is_none(),
            "tool reported an error: {:?}",
            result
        );
        let text = result["content"][0]["text"]
            .as_str()
            .expect("Missing text content");
        serde_json::from_str(text).expect("Tool result is not JSON")
    }
}
