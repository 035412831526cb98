//! MyAlgo Connect adapter
//!
//! MyAlgo is structured: it takes `{txn: bytes}` records and answers with
//! `{txID, blob: bytes}` records. It signs everything or fails the call.

use super::{check_len, first_account, Account, ProviderFault, ProviderId, WalletAdapter};
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyAlgoAccount {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyAlgoTxn {
    pub txn: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyAlgoSigned {
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub blob: Vec<u8>,
}

/// MyAlgo Connect client object
#[async_trait]
pub trait MyAlgoConnect: Send + Sync {
    async fn connect(&self) -> std::result::Result<Vec<MyAlgoAccount>, ProviderFault>;

    async fn sign_transactions(
        &self,
        transactions: Vec<MyAlgoTxn>,
    ) -> std::result::Result<Vec<MyAlgoSigned>, ProviderFault>;
}

pub struct MyAlgoAdapter {
    wallet: Option<Arc<dyn MyAlgoConnect>>,
}

impl MyAlgoAdapter {
    pub fn new(wallet: Option<Arc<dyn MyAlgoConnect>>) -> Self {
        Self { wallet }
    }

    fn wallet(&self) -> Result<&Arc<dyn MyAlgoConnect>> {
        self.wallet.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable(
                "Please include MyAlgo extension or check network.".to_string(),
            )
        })
    }
}

#[async_trait]
impl WalletAdapter for MyAlgoAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::MyAlgo
    }

    async fn connect(&mut self) -> Result<Account> {
        let accounts = self
            .wallet()?
            .connect()
            .await
            .map_err(|e| e.on_connect(ProviderId::MyAlgo))?;
        first_account(
            ProviderId::MyAlgo,
            accounts.into_iter().map(|a| a.address).collect(),
        )
    }

    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        let request = transactions
            .iter()
            .map(|t| MyAlgoTxn { txn: t.encode() })
            .collect();

        let signed = self
            .wallet()?
            .sign_transactions(request)
            .await
            .map_err(|e| e.on_sign(ProviderId::MyAlgo))?;

        let signed = check_len(ProviderId::MyAlgo, transactions.len(), signed)?;
        Ok(signed
            .into_iter()
            .map(|s| Some(SignedBlob::new(s.blob)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::MockTransaction;

    struct ScriptedMyAlgo {
        accounts: Vec<MyAlgoAccount>,
        /// Drop the last signed record to simulate a misbehaving wallet
        truncate: bool,
    }

    #[async_trait]
    impl MyAlgoConnect for ScriptedMyAlgo {
        async fn connect(&self) -> std::result::Result<Vec<MyAlgoAccount>, ProviderFault> {
            Ok(self.accounts.clone())
        }

        async fn sign_transactions(
            &self,
            transactions: Vec<MyAlgoTxn>,
        ) -> std::result::Result<Vec<MyAlgoSigned>, ProviderFault> {
            let mut signed: Vec<MyAlgoSigned> = transactions
                .into_iter()
                .enumerate()
                .map(|(i, t)| {
                    let mut blob = b"ma:".to_vec();
                    blob.extend(t.txn);
                    MyAlgoSigned {
                        tx_id: format!("TX{}", i),
                        blob,
                    }
                })
                .collect();
            if self.truncate {
                signed.pop();
            }
            Ok(signed)
        }
    }

    fn wallet(truncate: bool) -> Arc<dyn MyAlgoConnect> {
        Arc::new(ScriptedMyAlgo {
            accounts: vec![MyAlgoAccount {
                address: "MYALGO1".into(),
                name: Some("main".into()),
            }],
            truncate,
        })
    }

    #[tokio::test]
    async fn test_connect_and_sign_raw_bytes() {
        let mut adapter = MyAlgoAdapter::new(Some(wallet(false)));
        assert_eq!(adapter.connect().await.unwrap().as_str(), "MYALGO1");

        let pay = MockTransaction::new(b"pay");
        let call = MockTransaction::new(b"call");
        let signed = adapter.sign(&[&pay, &call]).await.unwrap();

        assert_eq!(signed[0].as_ref().unwrap().as_bytes(), b"ma:pay");
        assert_eq!(signed[1].as_ref().unwrap().as_bytes(), b"ma:call");
    }

    #[tokio::test]
    async fn test_short_response_is_provider_error() {
        let adapter = MyAlgoAdapter::new(Some(wallet(true)));

        let pay = MockTransaction::new(b"pay");
        let call = MockTransaction::new(b"call");
        assert!(matches!(
            adapter.sign(&[&pay, &call]).await,
            Err(Error::ProviderError(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_without_client() {
        let adapter = MyAlgoAdapter::new(None);
        let pay = MockTransaction::new(b"pay");
        assert!(matches!(
            adapter.sign(&[&pay]).await,
            Err(Error::ProviderUnavailable(_))
        ));
    }
}
