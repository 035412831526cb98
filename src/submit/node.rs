//! Direct client for the upstream node
//!
//! Used by the relay, which holds the node credential.
//!
//! SECURITY NOTE:
//! - Credential headers are attached here and nowhere else
//! - Upstream bodies are passed through untouched, never logged in full

use super::{SubmitReceipt, TransactionSink};
use crate::config::node::{PARAMS_PATH, TRANSACTIONS_PATH};
use crate::config::NodeConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder};
use std::sync::Arc;

/// Content type of raw signed-transaction bodies
pub const RAW_TRANSACTION_CONTENT_TYPE: &str = "application/x-binary";

/// Upstream reply, kept verbatim for relaying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    async fn read(response: reqwest::Response) -> Result<Self> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();
        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct NodeClient {
    client: Client,
    node: Arc<NodeConfig>,
}

impl NodeClient {
    pub fn new(node: Arc<NodeConfig>) -> Self {
        Self {
            client: Client::new(),
            node,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        self.node
            .request_headers()
            .into_iter()
            .fold(request, |request, (key, value)| request.header(key, value))
    }

    /// POST raw signed bytes to the node's broadcast endpoint
    ///
    /// Any upstream status is returned as-is; only transport failures are
    /// errors.
    pub async fn forward(&self, payload: Vec<u8>) -> Result<UpstreamResponse> {
        let url = self.node.endpoint(TRANSACTIONS_PATH);
        let bytes = payload.len();

        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, RAW_TRANSACTION_CONTENT_TYPE)
            .body(payload);

        let response = self.authorized(request).send().await.map_err(|e| {
            tracing::error!(url = %url, error = %e, "Upstream node unreachable");
            e
        })?;

        let upstream = UpstreamResponse::read(response).await?;
        tracing::info!(bytes, status = upstream.status, "Forwarded signed transactions");
        Ok(upstream)
    }

    /// Suggested transaction parameters, verbatim
    pub async fn params(&self) -> Result<UpstreamResponse> {
        let request = self.client.get(self.node.endpoint(PARAMS_PATH));
        let response = self.authorized(request).send().await?;
        UpstreamResponse::read(response).await
    }

    /// Suggested transaction parameters as JSON
    pub async fn suggested_params(&self) -> Result<serde_json::Value> {
        let upstream = self.params().await?;
        if !upstream.is_success() {
            return Err(Error::SubmitRejected {
                status: upstream.status,
                body: upstream.body_text(),
            });
        }
        Ok(serde_json::from_slice(&upstream.body)?)
    }
}

#[async_trait]
impl TransactionSink for NodeClient {
    async fn send_raw(&self, payload: Vec<u8>) -> Result<SubmitReceipt> {
        let upstream = self.forward(payload).await?;
        if !upstream.is_success() {
            return Err(Error::SubmitRejected {
                status: upstream.status,
                body: upstream.body_text(),
            });
        }
        Ok(SubmitReceipt::new(upstream.status, upstream.body_text()))
    }
}
