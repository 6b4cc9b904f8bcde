pub mod guard;
pub mod key_store;
pub mod permissions;

pub use guard::{
    generate_key_value, hash_key_value, AdminContext, AuthError, AuthGuard, KeyCipher,
};
pub use key_store::{ApiKey, FileKeyStore, KEY_REGISTRY_VERSION};
pub use permissions::Permission;
