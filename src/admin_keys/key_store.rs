//! File-backed API key registry.
//!
//! Keys are kept in a single JSON document, loaded once at startup and
//! cached in memory. Every mutation rewrites the whole file.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{Read, Write},
    path::PathBuf,
    sync::Mutex,
};

pub const KEY_REGISTRY_VERSION: u32 = 1;

use super::permissions::Permission;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    /// SHA-256 hex digest of the key value. The plaintext is never stored.
    pub key_hash: String,
    /// Recoverable ciphertext of the key value, empty when no secret was
    /// configured at creation time.
    #[serde(default)]
    pub encrypted_key: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    pub permissions: Vec<Permission>,
    /// When present and non-empty, the key may only call these tools.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.enabled && self.revoked_at.is_none()
    }
}

#[derive(Serialize, Deserialize)]
struct Dump {
    version: u32,
    keys: Vec<ApiKey>,
}

impl Default for Dump {
    fn default() -> Self {
        Self {
            version: KEY_REGISTRY_VERSION,
            keys: Vec::new(),
        }
    }
}

pub struct FileKeyStore {
    file_path: PathBuf,
    dump: Mutex<Dump>,
}

impl FileKeyStore {
    fn load_dump_from_file(file_path: &PathBuf) -> Result<Dump> {
        let mut file = File::open(file_path)?;

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Open the registry file, starting empty when it does not exist yet.
    pub fn initialize(file_path: PathBuf) -> FileKeyStore {
        FileKeyStore {
            file_path: file_path.clone(),
            dump: Mutex::new(Self::load_dump_from_file(&file_path).unwrap_or_default()),
        }
    }

    /// Re-read the registry from disk, replacing the cached contents.
    pub fn reload(&self) -> Result<()> {
        let dump = Self::load_dump_from_file(&self.file_path)?;
        *self.dump.lock().unwrap() = dump;
        Ok(())
    }

    fn save_dump(&self) -> Result<()> {
        let json_string = serde_json::to_string_pretty(&*self.dump.lock().unwrap())?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    pub fn find_by_hash(&self, key_hash: &str) -> Option<ApiKey> {
        self.dump
            .lock()
            .unwrap()
            .keys
            .iter()
            .find(|k| k.key_hash == key_hash)
            .cloned()
    }

    pub fn find_by_id(&self, id: &str) -> Option<ApiKey> {
        self.dump
            .lock()
            .unwrap()
            .keys
            .iter()
            .find(|k| k.id == id)
            .cloned()
    }

    pub fn list(&self) -> Vec<ApiKey> {
        self.dump.lock().unwrap().keys.clone()
    }

    pub fn insert(&self, key: ApiKey) -> Result<()> {
        {
            let mut dump = self.dump.lock().unwrap();
            if dump.keys.iter().any(|k| k.id == key.id) {
                bail!("Key already exists: {}", key.id);
            }
            dump.keys.push(key);
        }
        self.save_dump()
    }

    /// Revoke a key. Revocation is permanent.
    pub fn revoke(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        {
            let mut dump = self.dump.lock().unwrap();
            let key = match dump.keys.iter_mut().find(|k| k.id == id) {
                Some(key) => key,
                None => bail!("Key not found: {}", id),
            };
            key.revoked_at = Some(now);
            key.enabled = false;
        }
        self.save_dump()
    }

    /// Update a key's last-used timestamp in memory only. The value rides
    /// along to disk with the next explicit mutation; the authentication hot
    /// path must never rewrite the registry file.
    pub fn touch_last_used(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut dump = self.dump.lock().unwrap();
        let key = match dump.keys.iter_mut().find(|k| k.id == id) {
            Some(key) => key,
            None => bail!("Key not found: {}", id),
        };
        key.last_used_at = Some(now);
        Ok(())
    }
}
