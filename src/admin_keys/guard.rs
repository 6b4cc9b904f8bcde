//! Authentication and per-tool authorization for admin API keys.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use rand::Rng;
use rand_distr::Alphanumeric;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::key_store::FileKeyStore;
use super::permissions::Permission;

const KEY_VALUE_LENGTH: usize = 64;
const CIPHER_NONCE_LENGTH: usize = 16;

/// Generate a fresh API key value.
pub fn generate_key_value() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_VALUE_LENGTH)
        .map(char::from)
        .collect()
}

/// One-way digest used to look keys up without storing plaintext.
pub fn hash_key_value(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Recoverable at-rest cipher for issued key values. The keystream is
/// derived from a configured secret plus a per-encryption nonce.
#[derive(Clone)]
pub struct KeyCipher {
    secret: String,
}

impl KeyCipher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn keystream(&self, nonce: &[u8], len: usize) -> Vec<u8> {
        let mut stream = Vec::with_capacity(len + 32);
        let mut counter: u32 = 0;
        while stream.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(self.secret.as_bytes());
            hasher.update(nonce);
            hasher.update(counter.to_be_bytes());
            stream.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        stream.truncate(len);
        stream
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let nonce: [u8; CIPHER_NONCE_LENGTH] = rand::rng().random();
        let stream = self.keystream(&nonce, plaintext.len());
        let mut blob = nonce.to_vec();
        blob.extend(
            plaintext
                .bytes()
                .zip(stream)
                .map(|(byte, key)| byte ^ key),
        );
        BASE64.encode(blob)
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = BASE64.decode(encoded).context("Invalid ciphertext encoding")?;
        if blob.len() < CIPHER_NONCE_LENGTH {
            bail!("Ciphertext too short");
        }
        let (nonce, cipher) = blob.split_at(CIPHER_NONCE_LENGTH);
        let stream = self.keystream(nonce, cipher.len());
        let plain: Vec<u8> = cipher
            .iter()
            .zip(stream)
            .map(|(byte, key)| byte ^ key)
            .collect();
        String::from_utf8(plain).context("Decrypted key is not valid UTF-8")
    }
}

/// Identity resolved from a presented credential.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub api_key_id: String,
    pub permissions: Vec<Permission>,
    pub allowed_tools: Option<Vec<String>>,
}

impl AdminContext {
    pub fn has_permission(&self, permission: Permission) -> bool {
        Permission::satisfies(&self.permissions, &[permission])
    }

    /// An absent or empty allow-list places no restriction.
    pub fn tool_allowed(&self, tool_name: &str) -> bool {
        match &self.allowed_tools {
            Some(allowed) if !allowed.is_empty() => allowed.iter().any(|t| t == tool_name),
            _ => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
}

pub struct AuthGuard {
    store: Arc<FileKeyStore>,
}

impl AuthGuard {
    pub fn new(store: Arc<FileKeyStore>) -> Self {
        Self { store }
    }

    /// Resolve a presented key value to an admin context. Revoked and
    /// disabled keys fail exactly like unknown ones.
    pub fn authenticate(&self, credential: &str) -> Result<AdminContext, AuthError> {
        let key_hash = hash_key_value(credential);
        let key = self
            .store
            .find_by_hash(&key_hash)
            .ok_or(AuthError::Unauthenticated)?;

        if !key.is_active() {
            debug!("Rejected revoked/disabled key {}", key.id);
            return Err(AuthError::Unauthenticated);
        }

        // Not critical for authentication, continue on failure.
        if let Err(e) = self.store.touch_last_used(&key.id, Utc::now()) {
            debug!("Failed to update key last_used timestamp: {}", e);
        }

        Ok(AdminContext {
            api_key_id: key.id,
            permissions: key.permissions,
            allowed_tools: key.allowed_tools,
        })
    }

    /// Per-tool authorization: allow-list membership plus the full required
    /// permission set.
    pub fn authorize_tool(
        &self,
        context: &AdminContext,
        tool_name: &str,
        required: &[Permission],
    ) -> Result<(), AuthError> {
        if !context.tool_allowed(tool_name) {
            return Err(AuthError::Forbidden(format!(
                "Tool not in allow-list: {}",
                tool_name
            )));
        }
        if !Permission::satisfies(&context.permissions, required) {
            return Err(AuthError::Forbidden(format!(
                "Missing permission for tool: {}",
                tool_name
            )));
        }
        Ok(())
    }
}
