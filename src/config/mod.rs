//! Configuration for the relay and the dashboard client

pub mod node;
mod store;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use node::NodeConfig;
pub use store::ConfigStore;

/// Relay path the browser uses instead of talking to the node with a credential
pub const SEND_SIGNED_PATH: &str = "/api/send-signed";

/// Network the dashboard targets
pub const DEFAULT_GENESIS_ID: &str = "testnet-v1.0";
pub const DEFAULT_GENESIS_HASH: &str = "SGO1GKSzyE7IEPItTxCByw9x8FmnrCDexi9/cOUJOiI=";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_APP_CONFIG_PATH: &str = "app_config.json";
const DEFAULT_ENV_FILE: &str = ".env";

/// Environment variable names
mod env_vars {
    pub const APP_ID: &str = "APP_ID";
    pub const APP_CONFIG_PATH: &str = "APP_CONFIG_PATH";
    pub const WALLETCONNECT_PROJECT_ID: &str = "WALLETCONNECT_PROJECT_ID";
    pub const GENESIS_ID: &str = "GENESIS_ID";
    pub const GENESIS_HASH: &str = "GENESIS_HASH";
    pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
    pub const PORT: &str = "PORT";
    pub const STATIC_DIR: &str = "STATIC_DIR";
    pub const DOTENV_PATH: &str = "DOTENV_PATH";
}

/// Browser-facing configuration served at `GET /api/config`
///
/// Never carries the node credential. `algod_token_indirection` names the
/// relay path that holds the credential on the browser's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicConfig {
    /// Deployed application id (0 when not deployed yet)
    #[serde(default)]
    pub app_id: u64,
    /// Upstream node URL (public information)
    pub algod_url: String,
    /// Relay submission path
    pub algod_token_indirection: String,
    /// Network genesis id, e.g. `testnet-v1.0`
    pub genesis_id: String,
    /// Network genesis hash (base64)
    #[serde(default)]
    pub genesis_hash: String,
    /// WalletConnect cloud project id
    #[serde(default)]
    pub walletconnect_project_id: String,
}

/// Relay server configuration
#[derive(Debug)]
pub struct ServerConfig {
    /// Upstream node settings
    pub node: Arc<NodeConfig>,
    /// Fallback application id from `APP_ID`
    pub app_id: u64,
    /// File that overrides the application id after deployment
    pub app_config_path: PathBuf,
    /// WalletConnect cloud project id
    pub walletconnect_project_id: String,
    /// Network genesis id
    pub genesis_id: String,
    /// Network genesis hash
    pub genesis_hash: String,
    /// Listen address
    pub bind_address: SocketAddr,
    /// Directory holding the dashboard's static assets
    pub static_dir: Option<PathBuf>,
    /// Env file re-read for the browser-facing values on every request
    pub env_file: PathBuf,
}

impl ServerConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration through an environment lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let node = NodeConfig::from_lookup(&lookup)?;

        let app_id = lookup(env_vars::APP_ID)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let bind_address = match lookup(env_vars::BIND_ADDRESS) {
            Some(raw) => raw.trim().parse::<SocketAddr>().map_err(|e| {
                Error::Config(format!("Invalid {}: {}", env_vars::BIND_ADDRESS, e))
            })?,
            None => {
                let port = match lookup(env_vars::PORT) {
                    Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                        Error::Config(format!("Invalid {}: {}", env_vars::PORT, e))
                    })?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        Ok(Self {
            node: Arc::new(node),
            app_id,
            app_config_path: lookup(env_vars::APP_CONFIG_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_CONFIG_PATH)),
            walletconnect_project_id: lookup(env_vars::WALLETCONNECT_PROJECT_ID)
                .unwrap_or_default(),
            genesis_id: lookup(env_vars::GENESIS_ID)
                .unwrap_or_else(|| DEFAULT_GENESIS_ID.to_string()),
            genesis_hash: lookup(env_vars::GENESIS_HASH)
                .unwrap_or_else(|| DEFAULT_GENESIS_HASH.to_string()),
            bind_address,
            static_dir: lookup(env_vars::STATIC_DIR).map(PathBuf::from),
            env_file: lookup(env_vars::DOTENV_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
        })
    }

    /// Current application id
    ///
    /// The deployment file is re-read on every call so a fresh deployment is
    /// picked up without restarting the relay.
    pub fn current_app_id(&self) -> u64 {
        self.app_id_with(&self.env_file_values())
    }

    fn app_id_with(&self, env_file: &HashMap<String, String>) -> u64 {
        read_app_config(&self.app_config_path)
            .or_else(|| {
                env_file
                    .get(env_vars::APP_ID)
                    .and_then(|raw| raw.trim().parse::<u64>().ok())
            })
            .unwrap_or(self.app_id)
    }

    /// Current contents of the env file; empty when it is missing
    ///
    /// Values here win over the ones captured at startup, so edits apply
    /// without restarting the relay. The process environment is not touched.
    fn env_file_values(&self) -> HashMap<String, String> {
        match dotenvy::from_path_iter(&self.env_file) {
            Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
            Err(_) => HashMap::new(),
        }
    }

    /// Configuration served to the browser
    pub fn public_config(&self) -> PublicConfig {
        let env_file = self.env_file_values();
        let refreshed = |key: &str, current: &String| {
            env_file.get(key).cloned().unwrap_or_else(|| current.clone())
        };

        PublicConfig {
            app_id: self.app_id_with(&env_file),
            algod_url: self.node.address().to_string(),
            algod_token_indirection: SEND_SIGNED_PATH.to_string(),
            genesis_id: refreshed(env_vars::GENESIS_ID, &self.genesis_id),
            genesis_hash: refreshed(env_vars::GENESIS_HASH, &self.genesis_hash),
            walletconnect_project_id: refreshed(
                env_vars::WALLETCONNECT_PROJECT_ID,
                &self.walletconnect_project_id,
            ),
        }
    }
}

/// Read `app_id` from a deployment file
///
/// Accepts a number or a string of digits; anything else yields `None`.
pub fn read_app_config(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    let data: serde_json::Value = serde_json::from_str(&content).ok()?;
    match data.get("app_id")? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}
