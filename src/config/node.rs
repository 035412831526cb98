//! Upstream node endpoint configuration
//!
//! The relay is the only process that talks to the node with its access
//! credential. Settings come from environment variables:
//! 1. `ALGOD_ADDRESS` - node base URL (required)
//! 2. `ALGOD_TOKEN` - access credential, sent in `ALGOD_TOKEN_HEADER`
//! 3. `ALGOD_HEADER_KV` - extra upstream headers as `key=value;key:value`
//!
//! # Examples
//!
//! ```bash
//! export ALGOD_ADDRESS="https://testnet-algorand.api.purestake.io/ps2"
//! export ALGOD_TOKEN="YOUR_KEY"
//! export ALGOD_HEADER_KV="X-Tenant=droppay"
//! ```
//!
//! SECURITY NOTE:
//! - The token is held in a `SecretString` and is redacted from `Debug` output
//! - Nothing in this module is ever serialized into a browser-facing response

use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Environment variable names
pub(crate) mod env_vars {
    pub const ALGOD_ADDRESS: &str = "ALGOD_ADDRESS";
    pub const ALGOD_TOKEN: &str = "ALGOD_TOKEN";
    pub const ALGOD_TOKEN_HEADER: &str = "ALGOD_TOKEN_HEADER";
    pub const ALGOD_HEADER_KV: &str = "ALGOD_HEADER_KV";
}

/// Header used for the credential when `ALGOD_TOKEN_HEADER` is not set
pub const DEFAULT_TOKEN_HEADER: &str = "X-API-Key";

/// Raw transaction broadcast path on the node
pub const TRANSACTIONS_PATH: &str = "v2/transactions";

/// Suggested-params path on the node
pub const PARAMS_PATH: &str = "v2/transactions/params";

/// Node connection settings
#[derive(Debug)]
pub struct NodeConfig {
    /// Node base URL
    address: Url,
    /// Access credential (never leaves the relay)
    token: Option<SecretString>,
    /// Header name carrying the credential
    token_header: String,
    /// Additional static headers for every upstream request
    headers: Vec<(String, String)>,
}

impl NodeConfig {
    /// Create node settings from explicit values
    pub fn new(address: Url, token: Option<SecretString>) -> Self {
        Self {
            address,
            token,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            headers: Vec::new(),
        }
    }

    /// Override the credential header name
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = header.into();
        self
    }

    /// Add extra upstream headers
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Read node settings through an environment lookup
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_address = lookup(env_vars::ALGOD_ADDRESS)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} must be set before starting the relay",
                    env_vars::ALGOD_ADDRESS
                ))
            })?;

        let address = Url::parse(raw_address.trim()).map_err(|e| {
            Error::Config(format!("Invalid {}: {}", env_vars::ALGOD_ADDRESS, e))
        })?;

        let token = lookup(env_vars::ALGOD_TOKEN)
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        if token.is_none() {
            tracing::warn!("No ALGOD_TOKEN configured, upstream requests are unauthenticated");
        }

        let token_header = lookup(env_vars::ALGOD_TOKEN_HEADER)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_string());

        let headers = lookup(env_vars::ALGOD_HEADER_KV)
            .map(|raw| parse_header_kv(&raw))
            .unwrap_or_default();
        if !headers.is_empty() {
            tracing::debug!(count = headers.len(), "Using extra upstream headers");
        }

        Ok(Self::new(address, token)
            .with_token_header(token_header.trim())
            .with_headers(headers))
    }

    /// Node base URL as configured
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// Full URL of an endpoint below the node base URL
    ///
    /// The base may carry a path prefix (e.g. `/ps2`), which is preserved.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.address.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Headers to attach to every upstream request, credential included
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();
        if let Some(token) = &self.token {
            headers.push((
                self.token_header.clone(),
                token.expose_secret().to_string(),
            ));
        }
        headers
    }

    /// Whether a credential is configured
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

/// Parse `key=value;key:value` pairs, skipping malformed entries
pub fn parse_header_kv(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter(|kv| !kv.trim().is_empty())
        .filter_map(|kv| kv.split_once('=').or_else(|| kv.split_once(':')))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
