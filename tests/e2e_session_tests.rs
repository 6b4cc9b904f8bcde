//! End-to-end tests for session inspection and termination through the
//! MCP tools, against a registry shared with the test harness.

mod common;

use agent_control_server::admin_keys::Permission;
use agent_control_server::sessions::MetadataPatch;
use chrono::{Duration as ChronoDuration, Utc};
use common::{make_key, McpClient, TestServer};
use serde_json::json;

#[tokio::test]
async fn list_reflects_registry_contents() {
    let key = make_key("k1", "admin-key-value", vec![Permission::Admin], None);
    let server = TestServer::spawn(vec![key]).await;
    let client = McpClient::new(server.base_url.clone(), "admin-key-value");
    client.initialize().await;

    let result = client.call_tool_json("sessions.list", json!({})).await;
    assert_eq!(result["count"], 0);

    let now = Utc::now();
    server.sessions.create("s1", "agent-1", now).unwrap();
    server.sessions.create("s2", "agent-2", now).unwrap();
    server.sessions.confirm("s2").unwrap();

    let result = client.call_tool_json("sessions.list", json!({})).await;
    assert_eq!(result["count"], 2);

    let result = client
        .call_tool_json("sessions.list", json!({"status": "confirmed"}))
        .await;
    assert_eq!(result["count"], 1);
    assert_eq!(result["sessions"][0]["sessionId"], "s2");

    let result = client
        .call_tool_json("sessions.list", json!({"agent_id": "agent-1"}))
        .await;
    assert_eq!(result["count"], 1);
    assert_eq!(result["sessions"][0]["sessionId"], "s1");
    assert_eq!(result["sessions"][0]["status"], "pending");
}

#[tokio::test]
async fn get_returns_derived_fields_and_metadata() {
    let key = make_key("k1", "admin-key-value", vec![Permission::Admin], None);
    let server = TestServer::spawn(vec![key]).await;

    // Created a minute ago, heartbeat well past the 30s timeout.
    let created = Utc::now() - ChronoDuration::seconds(60);
    server.sessions.create("s1", "agent-1", created).unwrap();
    server.sessions.record_heartbeat("s1", created).unwrap();
    server
        .sessions
        .attach_metadata(
            "s1",
            MetadataPatch {
                project_path: Some("/work/project".to_string()),
                claude_version_id: Some("v1".to_string()),
                model_id: None,
            },
        )
        .unwrap();

    let client = McpClient::new(server.base_url.clone(), "admin-key-value");
    client.initialize().await;

    let result = client
        .call_tool_json("sessions.get", json!({"session_id": "s1"}))
        .await;
    assert_eq!(result["sessionId"], "s1");
    assert_eq!(result["agentId"], "agent-1");
    assert_eq!(result["status"], "pending");
    assert_eq!(result["projectPath"], "/work/project");
    assert_eq!(result["claudeVersionId"], "v1");
    assert!(result.get("modelId").is_none());
    assert!(result["idleTimeMs"].as_i64().unwrap() >= 60_000);
    assert_eq!(result["heartbeatTimedOut"], true);
}

#[tokio::test]
async fn get_missing_session_is_tool_error() {
    let key = make_key("k1", "admin-key-value", vec![Permission::Admin], None);
    let server = TestServer::spawn(vec![key]).await;
    let client = McpClient::new(server.base_url.clone(), "admin-key-value");
    client.initialize().await;

    let envelope = client
        .call_tool("sessions.get", json!({"session_id": "ghost"}))
        .await;
    // Business failure: successful envelope with an isError result.
    assert!(envelope.get("error").is_none());
    assert_eq!(envelope["result"]["isError"], true);
}

#[tokio::test]
async fn terminate_removes_from_shared_registry() {
    let key = make_key("k1", "admin-key-value", vec![Permission::Admin], None);
    let server = TestServer::spawn(vec![key]).await;
    server.sessions.create("s1", "agent-1", Utc::now()).unwrap();

    let client = McpClient::new(server.base_url.clone(), "admin-key-value");
    client.initialize().await;

    let result = client
        .call_tool_json("sessions.terminate", json!({"session_id": "s1"}))
        .await;
    assert_eq!(result["terminated"], true);
    assert_eq!(server.sessions.count(), 0);

    // Terminating again reports the missing session as a tool error.
    let envelope = client
        .call_tool("sessions.terminate", json!({"session_id": "s1"}))
        .await;
    assert!(envelope.get("error").is_none());
    assert_eq!(envelope["result"]["isError"], true);
}

#[tokio::test]
async fn fresh_heartbeat_clears_timeout_flag() {
    let key = make_key("k1", "admin-key-value", vec![Permission::Admin], None);
    let server = TestServer::spawn(vec![key]).await;

    let created = Utc::now() - ChronoDuration::seconds(120);
    server.sessions.create("s1", "agent-1", created).unwrap();
    server.sessions.record_heartbeat("s1", created).unwrap();

    let client = McpClient::new(server.base_url.clone(), "admin-key-value");
    client.initialize().await;

    let result = client
        .call_tool_json("sessions.get", json!({"session_id": "s1"}))
        .await;
    assert_eq!(result["heartbeatTimedOut"], true);

    server.sessions.record_heartbeat("s1", Utc::now()).unwrap();
    let result = client
        .call_tool_json("sessions.get", json!({"session_id": "s1"}))
        .await;
    assert_eq!(result["heartbeatTimedOut"], false);
    // Heartbeats are not activity, the idle clock keeps running.
    assert!(result["idleTimeMs"].as_i64().unwrap() >= 120_000);
}
