//! WalletConnect adapter
//!
//! Sessions are opened through a bridge: the adapter asks the bridge for a
//! pairing, then waits for the peer's `Connected` event. Signing goes through
//! the `algo_signTxn` custom request with a single array of base64 encodings
//! as its only parameter. The peer may end the session at any time; that
//! arrives as a `Disconnected` event on [`WalletAdapter::events`].

use super::{
    check_len, decode_signed, encode_base64, first_account, Account, ProviderEvent,
    ProviderFault, ProviderId, WalletAdapter,
};
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// JSON-RPC method used for transaction signing
pub const SIGN_METHOD: &str = "algo_signTxn";

/// Custom JSON-RPC request sent to the peer wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRequest {
    pub method: String,
    pub params: Value,
}

impl CustomRequest {
    /// Signing request for base64-encoded transactions
    pub fn sign(encoded: Vec<String>) -> Self {
        Self {
            method: SIGN_METHOD.to_string(),
            params: json!([encoded]),
        }
    }
}

/// WalletConnect bridge connector
#[async_trait]
pub trait WalletConnectBridge: Send + Sync {
    /// Whether a session with a peer is already established
    fn is_connected(&self) -> bool;

    /// Accounts of the established session
    fn accounts(&self) -> Vec<String>;

    /// Start pairing (shows the QR code modal)
    async fn create_session(&self) -> std::result::Result<(), ProviderFault>;

    /// Session lifecycle events
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    async fn send_custom_request(
        &self,
        request: CustomRequest,
    ) -> std::result::Result<Value, ProviderFault>;

    async fn kill_session(&self) -> std::result::Result<(), ProviderFault>;
}

pub struct WalletConnectAdapter {
    bridge: Option<Arc<dyn WalletConnectBridge>>,
}

impl WalletConnectAdapter {
    pub fn new(bridge: Option<Arc<dyn WalletConnectBridge>>) -> Self {
        Self { bridge }
    }

    fn bridge(&self) -> Result<&Arc<dyn WalletConnectBridge>> {
        self.bridge.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable("WalletConnect modules could not be loaded".to_string())
        })
    }
}

/// Wait for the peer to approve or refuse the pairing
async fn await_approval(events: &mut broadcast::Receiver<ProviderEvent>) -> Result<Vec<String>> {
    loop {
        match events.recv().await {
            Ok(ProviderEvent::Connected { accounts }) => return Ok(accounts),
            Ok(ProviderEvent::Disconnected { reason }) => {
                return Err(Error::ConnectRejected(format!(
                    "WalletConnect: {}",
                    reason.unwrap_or_else(|| "session closed before approval".to_string())
                )))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "WalletConnect event stream lagged");
            }
            Err(RecvError::Closed) => {
                return Err(Error::ProviderError(
                    "WalletConnect: bridge closed the event stream".to_string(),
                ))
            }
        }
    }
}

/// Parse the `algo_signTxn` result: an array of base64 strings or nulls
fn parse_sign_result(result: Value) -> Result<Vec<Option<String>>> {
    let Value::Array(entries) = result else {
        return Err(Error::ProviderError(
            "WalletConnect: signing result is not an array".to_string(),
        ));
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            other => Err(Error::ProviderError(format!(
                "WalletConnect: unexpected signing result entry {}",
                other
            ))),
        })
        .collect()
}

#[async_trait]
impl WalletAdapter for WalletConnectAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::WalletConnect
    }

    async fn connect(&mut self) -> Result<Account> {
        let bridge = self.bridge()?;

        let accounts = if bridge.is_connected() {
            bridge.accounts()
        } else {
            // Subscribe first so the approval cannot be missed
            let mut events = bridge.subscribe();
            bridge
                .create_session()
                .await
                .map_err(|e| e.on_connect(ProviderId::WalletConnect))?;
            tracing::debug!("WalletConnect pairing started");
            await_approval(&mut events).await?
        };

        first_account(ProviderId::WalletConnect, accounts)
    }

    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        let request = CustomRequest::sign(encode_base64(transactions));
        let result = self
            .bridge()?
            .send_custom_request(request)
            .await
            .map_err(|e| e.on_sign(ProviderId::WalletConnect))?;

        let signed = check_len(
            ProviderId::WalletConnect,
            transactions.len(),
            parse_sign_result(result)?,
        )?;
        decode_signed(ProviderId::WalletConnect, signed)
    }

    async fn disconnect(&self) -> Result<()> {
        self.bridge()?
            .kill_session()
            .await
            .map_err(|e| e.on_connect(ProviderId::WalletConnect))
    }

    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        self.bridge.as_ref().map(|b| b.subscribe())
    }
}
