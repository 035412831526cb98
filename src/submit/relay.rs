//! Browser-side submission through the relay
//!
//! The dashboard never holds the node credential. It posts base64 blobs to
//! the relay path advertised in the loaded config (`algod_token_indirection`),
//! and the relay forwards them upstream.

use super::{SubmitReceipt, TransactionSink};
use crate::config::ConfigStore;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Relay path proxying suggested transaction parameters
pub const PARAMS_PATH: &str = "/api/params";

#[derive(Debug, Serialize)]
struct SendSignedRequest {
    signed: Vec<String>,
}

#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    config: Arc<ConfigStore>,
}

impl RelayClient {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .base_url()
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid relay path {}: {}", path, e)))
    }

    /// Suggested transaction parameters via the relay
    pub async fn fetch_params(&self) -> Result<serde_json::Value> {
        let response = self.client.get(self.url(PARAMS_PATH)?).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::SubmitRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TransactionSink for RelayClient {
    async fn send_raw(&self, payload: Vec<u8>) -> Result<SubmitReceipt> {
        let config = self.config.get().await?;
        let url = self.url(&config.algod_token_indirection)?;

        // The relay concatenates entries; one entry keeps the payload intact
        let request = SendSignedRequest {
            signed: vec![BASE64_STANDARD.encode(&payload)],
        };

        let response = self.client.post(url.clone()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "Relay rejected submission");
            return Err(Error::SubmitRejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(url = %url, status = status.as_u16(), "Submitted through relay");
        Ok(SubmitReceipt::new(status.as_u16(), body))
    }
}
