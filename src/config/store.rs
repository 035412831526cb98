//! Client-side cache of the relay's public configuration
//!
//! The dashboard must load `GET /api/config` before any wallet or submission
//! call that depends on it. Reads before the first successful load fail with
//! `Error::ConfigNotLoaded`.

use super::PublicConfig;
use crate::{Error, Result};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

/// Path of the configuration endpoint on the relay
pub const CONFIG_PATH: &str = "/api/config";

/// Loaded-once configuration shared by adapters and submitters
pub struct ConfigStore {
    client: Client,
    /// Origin of the relay serving the dashboard
    base_url: Url,
    loaded: RwLock<Option<Arc<PublicConfig>>>,
}

impl ConfigStore {
    /// Create an empty store for the relay at `base_url`
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
            loaded: RwLock::new(None),
        }
    }

    /// Create a store that already holds a configuration
    pub fn preloaded(base_url: Url, config: PublicConfig) -> Self {
        Self {
            client: Client::new(),
            base_url,
            loaded: RwLock::new(Some(Arc::new(config))),
        }
    }

    /// Relay origin this store loads from
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the configuration from the relay and cache it
    ///
    /// A failed fetch leaves any previously cached value in place.
    pub async fn load(&self) -> Result<Arc<PublicConfig>> {
        let url = self
            .base_url
            .join(CONFIG_PATH)
            .map_err(|e| Error::Config(format!("Invalid relay URL: {}", e)))?;

        let config: PublicConfig = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Failed to load config");
                e
            })?;

        tracing::info!(
            app_id = config.app_id,
            genesis_id = %config.genesis_id,
            "Config loaded"
        );

        let config = Arc::new(config);
        *self.loaded.write().await = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Cached configuration, or `ConfigNotLoaded`
    pub async fn get(&self) -> Result<Arc<PublicConfig>> {
        self.loaded
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(Error::ConfigNotLoaded)
    }

    /// Whether a configuration has been loaded
    pub async fn is_loaded(&self) -> bool {
        self.loaded.read().await.is_some()
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}
