//! Permission scopes granted to admin API keys.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "sessions:read")]
    SessionsRead,
    #[serde(rename = "sessions:write")]
    SessionsWrite,
    #[serde(rename = "keys:read")]
    KeysRead,
    #[serde(rename = "keys:admin")]
    KeysAdmin,
    /// Wildcard scope, satisfies any requirement.
    #[serde(rename = "admin:*")]
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 5] = [
        Permission::SessionsRead,
        Permission::SessionsWrite,
        Permission::KeysRead,
        Permission::KeysAdmin,
        Permission::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::SessionsRead => "sessions:read",
            Permission::SessionsWrite => "sessions:write",
            Permission::KeysRead => "keys:read",
            Permission::KeysAdmin => "keys:admin",
            Permission::Admin => "admin:*",
        }
    }

    /// True when every required scope is covered by the granted set.
    pub fn satisfies(granted: &[Permission], required: &[Permission]) -> bool {
        if granted.contains(&Permission::Admin) {
            return true;
        }
        required.iter().all(|p| granted.contains(p))
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown permission: {}", s))
    }
}
