//! AlgoSigner extension adapter
//!
//! AlgoSigner takes structured records (`{txn: base64}`) and returns
//! `{blob: base64}` records, with `null` for anything it did not sign.
//! Accounts are requested per ledger, derived from the loaded config.

use super::{
    check_len, decode_signed, encode_base64, first_account, Account, ProviderFault, ProviderId,
    WalletAdapter,
};
use crate::config::ConfigStore;
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoSignerAccount {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgoSignerTxn {
    pub txn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgoSignerSigned {
    #[serde(rename = "txID", default)]
    pub tx_id: Option<String>,
    pub blob: String,
}

/// The `window.AlgoSigner` extension object
#[async_trait]
pub trait AlgoSignerExtension: Send + Sync {
    /// Ask the user to grant this site access
    async fn connect(&self) -> std::result::Result<(), ProviderFault>;

    /// Accounts available on a ledger (`TestNet`, `MainNet`, ...)
    async fn accounts(
        &self,
        ledger: &str,
    ) -> std::result::Result<Vec<AlgoSignerAccount>, ProviderFault>;

    async fn sign_txn(
        &self,
        transactions: Vec<AlgoSignerTxn>,
    ) -> std::result::Result<Vec<Option<AlgoSignerSigned>>, ProviderFault>;
}

/// Ledger name AlgoSigner expects for a genesis id
pub fn ledger_name(genesis_id: &str) -> String {
    match genesis_id.split('-').next().unwrap_or_default() {
        "mainnet" => "MainNet".to_string(),
        "testnet" => "TestNet".to_string(),
        "betanet" => "BetaNet".to_string(),
        _ => genesis_id.to_string(),
    }
}

pub struct AlgoSignerAdapter {
    extension: Option<Arc<dyn AlgoSignerExtension>>,
    config: Arc<ConfigStore>,
}

impl AlgoSignerAdapter {
    pub fn new(extension: Option<Arc<dyn AlgoSignerExtension>>, config: Arc<ConfigStore>) -> Self {
        Self { extension, config }
    }

    fn extension(&self) -> Result<&Arc<dyn AlgoSignerExtension>> {
        self.extension.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable(
                "AlgoSigner not found. Install the AlgoSigner extension.".to_string(),
            )
        })
    }
}

#[async_trait]
impl WalletAdapter for AlgoSignerAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::AlgoSigner
    }

    async fn connect(&mut self) -> Result<Account> {
        let extension = self.extension()?;
        let ledger = ledger_name(&self.config.get().await?.genesis_id);

        extension
            .connect()
            .await
            .map_err(|e| e.on_connect(ProviderId::AlgoSigner))?;

        let accounts = extension
            .accounts(&ledger)
            .await
            .map_err(|e| e.on_connect(ProviderId::AlgoSigner))?;

        tracing::debug!(ledger = %ledger, count = accounts.len(), "AlgoSigner accounts");
        first_account(
            ProviderId::AlgoSigner,
            accounts.into_iter().map(|a| a.address).collect(),
        )
    }

    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        let request = encode_base64(transactions)
            .into_iter()
            .map(|txn| AlgoSignerTxn { txn })
            .collect();

        let signed = self
            .extension()?
            .sign_txn(request)
            .await
            .map_err(|e| e.on_sign(ProviderId::AlgoSigner))?;

        let signed = check_len(ProviderId::AlgoSigner, transactions.len(), signed)?;
        decode_signed(
            ProviderId::AlgoSigner,
            signed.into_iter().map(|s| s.map(|s| s.blob)).collect(),
        )
    }
}
