//! In-memory session registry.
//!
//! Tracks live agent sessions through the pending/confirmed handshake and
//! records activity and heartbeat timestamps. Derived fields (idle time,
//! heartbeat timeout) are computed at read time against a caller-supplied
//! clock, never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Handshake state of a session. The only legal transition is
/// pending -> confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
}

/// Timing policy applied to all sessions in a registry.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// A session whose last heartbeat is older than this is flagged.
    pub heartbeat_timeout: Duration,
    /// A session with no activity for longer than this is evicted.
    pub idle_retention: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(30),
            idle_retention: Duration::from_secs(1800),
        }
    }
}

/// Optional descriptive fields attached after session creation.
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub project_path: Option<String>,
    pub claude_version_id: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    session_id: String,
    agent_id: String,
    status: SessionStatus,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    last_heartbeat: Option<DateTime<Utc>>,
    project_path: Option<String>,
    claude_version_id: Option<String>,
    model_id: Option<String>,
}

/// Point-in-time view of a session, including derived fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub agent_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub idle_time_ms: i64,
    pub heartbeat_timed_out: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Session already exists: {0}")]
    DuplicateSession(String),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

/// Registry of live sessions. All mutations go through the interior lock,
/// so reads never observe a half-applied update.
pub struct SessionRegistry {
    policy: SessionPolicy,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            policy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Register a new session in pending state.
    pub fn create(
        &self,
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, RegistryError> {
        let session_id = session_id.into();
        let mut sessions = self.sessions.write().unwrap();
        if sessions.contains_key(&session_id) {
            return Err(RegistryError::DuplicateSession(session_id));
        }
        let record = SessionRecord {
            session_id: session_id.clone(),
            agent_id: agent_id.into(),
            status: SessionStatus::Pending,
            created_at: now,
            last_activity: now,
            last_heartbeat: None,
            project_path: None,
            claude_version_id: None,
            model_id: None,
        };
        let snapshot = self.snapshot_of(&record, now);
        sessions.insert(session_id, record);
        Ok(snapshot)
    }

    /// Complete the handshake. Confirming an already confirmed session is a
    /// no-op.
    pub fn confirm(&self, session_id: &str) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().unwrap();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))?;
        record.status = SessionStatus::Confirmed;
        Ok(())
    }

    /// Record general activity, resetting the idle clock.
    pub fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().unwrap();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))?;
        record.last_activity = now;
        Ok(())
    }

    /// Record a heartbeat. Heartbeats are liveness signals, not activity:
    /// they do not reset the idle clock.
    pub fn record_heartbeat(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().unwrap();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))?;
        record.last_heartbeat = Some(now);
        Ok(())
    }

    /// Apply a partial metadata update. Absent fields keep their value.
    pub fn attach_metadata(
        &self,
        session_id: &str,
        patch: MetadataPatch,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().unwrap();
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| RegistryError::SessionNotFound(session_id.to_string()))?;
        if let Some(project_path) = patch.project_path {
            record.project_path = Some(project_path);
        }
        if let Some(claude_version_id) = patch.claude_version_id {
            record.claude_version_id = Some(claude_version_id);
        }
        if let Some(model_id) = patch.model_id {
            record.model_id = Some(model_id);
        }
        Ok(())
    }

    pub fn get(&self, session_id: &str, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .get(session_id)
            .map(|record| self.snapshot_of(record, now))
    }

    /// Snapshots of all sessions, taken under a single lock acquisition.
    pub fn list_all(&self, now: DateTime<Utc>) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap();
        sessions
            .values()
            .map(|record| self.snapshot_of(record, now))
            .collect()
    }

    /// Remove a session. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().unwrap().remove(session_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    fn snapshot_of(&self, record: &SessionRecord, now: DateTime<Utc>) -> SessionSnapshot {
        let idle_time_ms = (now - record.last_activity).num_milliseconds().max(0);
        // A session that never sent a heartbeat is not timed out.
        let heartbeat_timed_out = record
            .last_heartbeat
            .map(|hb| (now - hb).num_milliseconds() > self.policy.heartbeat_timeout.as_millis() as i64)
            .unwrap_or(false);
        SessionSnapshot {
            session_id: record.session_id.clone(),
            agent_id: record.agent_id.clone(),
            status: record.status,
            created_at: record.created_at,
            last_activity: record.last_activity,
            last_heartbeat: record.last_heartbeat,
            project_path: record.project_path.clone(),
            claude_version_id: record.claude_version_id.clone(),
            model_id: record.model_id.clone(),
            idle_time_ms,
            heartbeat_timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn make_registry() -> SessionRegistry {
        SessionRegistry::new(SessionPolicy::default())
    }

    #[test]
    fn test_create_starts_pending() {
        let registry = make_registry();
        let snapshot = registry.create("s1", "agent-1", t(0)).unwrap();
        assert_eq!(snapshot.status, SessionStatus::Pending);
        assert_eq!(snapshot.idle_time_ms, 0);
        assert!(!snapshot.heartbeat_timed_out);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_create_duplicate_fails() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        let result = registry.create("s1", "agent-2", t(1));
        assert_eq!(
            result.unwrap_err(),
            RegistryError::DuplicateSession("s1".to_string())
        );
        // First registration is untouched.
        assert_eq!(
            registry.get("s1", t(1)).unwrap().agent_id,
            "agent-1".to_string()
        );
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        registry.confirm("s1").unwrap();
        assert_eq!(
            registry.get("s1", t(1)).unwrap().status,
            SessionStatus::Confirmed
        );
        registry.confirm("s1").unwrap();
        assert_eq!(
            registry.get("s1", t(2)).unwrap().status,
            SessionStatus::Confirmed
        );
    }

    #[test]
    fn test_confirm_missing_session() {
        let registry = make_registry();
        assert_eq!(
            registry.confirm("nope").unwrap_err(),
            RegistryError::SessionNotFound("nope".to_string())
        );
    }

    #[test]
    fn test_idle_time_derived_from_last_activity() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        assert_eq!(registry.get("s1", t(5)).unwrap().idle_time_ms, 5000);

        registry.touch("s1", t(8)).unwrap();
        assert_eq!(registry.get("s1", t(10)).unwrap().idle_time_ms, 2000);
    }

    #[test]
    fn test_heartbeat_timeout_derived() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();

        // No heartbeat ever: never timed out, no matter how old.
        assert!(!registry.get("s1", t(3600)).unwrap().heartbeat_timed_out);

        registry.record_heartbeat("s1", t(3600)).unwrap();
        assert!(!registry.get("s1", t(3620)).unwrap().heartbeat_timed_out);
        assert!(registry.get("s1", t(3631)).unwrap().heartbeat_timed_out);

        // A fresh heartbeat clears the condition.
        registry.record_heartbeat("s1", t(3640)).unwrap();
        assert!(!registry.get("s1", t(3650)).unwrap().heartbeat_timed_out);
    }

    #[test]
    fn test_heartbeat_does_not_reset_idle_clock() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        registry.record_heartbeat("s1", t(100)).unwrap();
        assert_eq!(registry.get("s1", t(100)).unwrap().idle_time_ms, 100_000);
    }

    #[test]
    fn test_attach_metadata_partial_patch() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        registry
            .attach_metadata(
                "s1",
                MetadataPatch {
                    project_path: Some("/work/project".to_string()),
                    claude_version_id: Some("v1".to_string()),
                    model_id: None,
                },
            )
            .unwrap();
        registry
            .attach_metadata(
                "s1",
                MetadataPatch {
                    model_id: Some("model-a".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let snapshot = registry.get("s1", t(1)).unwrap();
        assert_eq!(snapshot.project_path, Some("/work/project".to_string()));
        assert_eq!(snapshot.claude_version_id, Some("v1".to_string()));
        assert_eq!(snapshot.model_id, Some("model-a".to_string()));
    }

    #[test]
    fn test_remove_reports_existence() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        assert!(registry.remove("s1"));
        assert!(!registry.remove("s1"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_list_all_snapshots() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        registry.create("s2", "agent-2", t(5)).unwrap();

        let snapshots = registry.list_all(t(10));
        assert_eq!(snapshots.len(), 2);
        // Mutations after the snapshot do not affect it.
        registry.remove("s1");
        assert_eq!(snapshots.len(), 2);
    }

    #[test]
    fn test_snapshots_consistent_under_concurrent_writes() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(make_registry());
        registry.create("s1", "agent-1", t(0)).unwrap();
        registry.create("s2", "agent-2", t(0)).unwrap();

        // One writer per session: activity is always recorded before the
        // matching heartbeat, with the same monotonically increasing clock.
        let mut handles = Vec::new();
        for id in ["s1", "s2"] {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for i in 1..=500 {
                    registry.touch(id, t(i)).unwrap();
                    registry.record_heartbeat(id, t(i)).unwrap();
                }
            }));
        }

        let now = t(1_000);
        let timeout_ms = SessionPolicy::default().heartbeat_timeout.as_millis() as i64;
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    for snapshot in registry.list_all(now) {
                        // Derived fields must agree with the stored fields of
                        // the same snapshot.
                        assert_eq!(
                            snapshot.idle_time_ms,
                            (now - snapshot.last_activity).num_milliseconds()
                        );
                        if let Some(heartbeat) = snapshot.last_heartbeat {
                            assert!(heartbeat <= snapshot.last_activity);
                            assert_eq!(
                                snapshot.heartbeat_timed_out,
                                (now - heartbeat).num_milliseconds() > timeout_ms
                            );
                        }
                    }
                    let snapshot = registry.get("s1", now).unwrap();
                    assert_eq!(
                        snapshot.idle_time_ms,
                        (now - snapshot.last_activity).num_milliseconds()
                    );
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let registry = make_registry();
        registry.create("s1", "agent-1", t(0)).unwrap();
        let value = serde_json::to_value(registry.get("s1", t(2)).unwrap()).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["agentId"], "agent-1");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["idleTimeMs"], 2000);
        assert_eq!(value["heartbeatTimedOut"], false);
        // Unset optionals are omitted entirely.
        assert!(value.get("lastHeartbeat").is_none());
        assert!(value.get("projectPath").is_none());
    }
}
