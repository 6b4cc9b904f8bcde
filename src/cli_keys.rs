//! Admin key management CLI.
//!
//! Creates, lists and revokes entries in the JSON key registry used by the
//! control server. The plaintext key value is printed exactly once, at
//! creation time.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agent_control_server::admin_keys::{
    generate_key_value, hash_key_value, ApiKey, FileKeyStore, KeyCipher, Permission,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the JSON file holding the admin API key registry.
    #[clap(value_parser = parse_path)]
    pub keys_file: PathBuf,

    /// Secret for recoverable key storage. Must match the server's secret
    /// for keys.reveal to work.
    #[clap(long, env = "KEY_SECRET")]
    pub key_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a new admin key and prints its value.
    Create {
        /// Human readable description of the key's purpose.
        #[clap(long)]
        description: String,

        /// Comma separated permissions, e.g. "sessions:read,keys:read".
        #[clap(long, value_delimiter = ',', required = true)]
        permissions: Vec<Permission>,

        /// Comma separated tool names the key is restricted to. Unrestricted
        /// when omitted.
        #[clap(long, value_delimiter = ',')]
        allowed_tools: Option<Vec<String>>,
    },

    /// Lists all keys in the registry.
    List,

    /// Revokes a key. Revocation is permanent.
    Revoke { id: String },
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let store = FileKeyStore::initialize(cli_args.keys_file.clone());

    match cli_args.command {
        Command::Create {
            description,
            permissions,
            allowed_tools,
        } => {
            if permissions.is_empty() {
                bail!("At least one permission is required");
            }

            let plaintext = generate_key_value();
            let encrypted_key = cli_args
                .key_secret
                .as_deref()
                .map(KeyCipher::new)
                .map(|cipher| cipher.encrypt(&plaintext))
                .unwrap_or_default();

            let key = ApiKey {
                id: uuid::Uuid::new_v4().to_string(),
                key_hash: hash_key_value(&plaintext),
                encrypted_key,
                description,
                created_at: Utc::now(),
                last_used_at: None,
                revoked_at: None,
                permissions,
                allowed_tools,
                enabled: true,
            };
            let id = key.id.clone();
            store
                .insert(key)
                .with_context(|| format!("Failed to write {:?}", cli_args.keys_file))?;

            println!("Created key {}", id);
            println!();
            println!("  {}", plaintext);
            println!();
            if cli_args.key_secret.is_some() {
                println!("The key is stored encrypted and can be recovered via keys.reveal.");
            } else {
                println!("No --key-secret given: this value cannot be recovered later.");
            }
        }

        Command::List => {
            let keys = store.list();
            if keys.is_empty() {
                println!("No keys in {:?}", cli_args.keys_file);
                return Ok(());
            }
            for key in keys {
                let state = if key.is_active() { "active" } else { "revoked" };
                let permissions: Vec<&str> =
                    key.permissions.iter().map(Permission::as_str).collect();
                println!(
                    "{}  [{}]  {}  permissions: {}",
                    key.id,
                    state,
                    key.description,
                    permissions.join(",")
                );
                if let Some(tools) = &key.allowed_tools {
                    println!("    allowed tools: {}", tools.join(","));
                }
                if let Some(last_used) = key.last_used_at {
                    println!("    last used: {}", last_used);
                }
            }
        }

        Command::Revoke { id } => {
            store.revoke(&id, Utc::now())?;
            println!("Key {} revoked.", id);
        }
    }

    Ok(())
}
