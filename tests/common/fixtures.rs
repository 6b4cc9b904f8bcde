//! Key fixtures for end-to-end tests

use agent_control_server::admin_keys::{hash_key_value, ApiKey, KeyCipher, Permission};
use chrono::Utc;

use super::constants::TEST_KEY_SECRET;

/// Build a key registry entry for the given plaintext, encrypted with the
/// test secret so keys.reveal works against it.
pub fn make_key(
    id: &str,
    plaintext: &str,
    permissions: Vec<Permission>,
    allowed_tools: Option<Vec<String>>,
) -> ApiKey {
    ApiKey {
        id: id.to_string(),
        key_hash: hash_key_value(plaintext),
        encrypted_key: KeyCipher::new(TEST_KEY_SECRET).encrypt(plaintext),
        description: format!("e2e key {}", id),
        created_at: Utc::now(),
        last_used_at: None,
        revoked_at: None,
        permissions,
        allowed_tools,
        enabled: true,
    }
}
