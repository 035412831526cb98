//! Pera Wallet adapter
//!
//! Pera is byte-oriented: transactions go out as base64 strings and come back
//! as base64 signed blobs, one per input.

use super::{
    check_len, decode_signed, encode_base64, first_account, Account, ProviderFault, ProviderId,
    WalletAdapter,
};
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Pera Connect runtime object
#[async_trait]
pub trait PeraConnect: Send + Sync {
    /// Open the extension or mobile pairing flow and return approved accounts
    async fn connect(&self) -> std::result::Result<Vec<String>, ProviderFault>;

    /// Sign base64-encoded transactions
    async fn sign_transaction(
        &self,
        transactions: Vec<String>,
    ) -> std::result::Result<Vec<Option<String>>, ProviderFault>;

    /// End the pairing session
    async fn disconnect(&self) -> std::result::Result<(), ProviderFault>;
}

pub struct PeraAdapter {
    wallet: Option<Arc<dyn PeraConnect>>,
}

impl PeraAdapter {
    /// Create an adapter; `None` means Pera could not be loaded
    pub fn new(wallet: Option<Arc<dyn PeraConnect>>) -> Self {
        Self { wallet }
    }

    fn wallet(&self) -> Result<&Arc<dyn PeraConnect>> {
        self.wallet.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable(
                "Make sure the Pera Wallet extension or mobile app is available".to_string(),
            )
        })
    }
}

#[async_trait]
impl WalletAdapter for PeraAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Pera
    }

    async fn connect(&mut self) -> Result<Account> {
        let accounts = self
            .wallet()?
            .connect()
            .await
            .map_err(|e| e.on_connect(ProviderId::Pera))?;
        first_account(ProviderId::Pera, accounts)
    }

    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        let wallet = self.wallet()?;
        let signed = wallet
            .sign_transaction(encode_base64(transactions))
            .await
            .map_err(|e| e.on_sign(ProviderId::Pera))?;

        let signed = check_len(ProviderId::Pera, transactions.len(), signed)?;
        decode_signed(ProviderId::Pera, signed)
    }

    async fn disconnect(&self) -> Result<()> {
        self.wallet()?
            .disconnect()
            .await
            .map_err(|e| e.on_connect(ProviderId::Pera))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::test_support::MockTransaction;
    use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
    use std::sync::Mutex;

    /// Pera stand-in that "signs" by prefixing each payload
    struct ScriptedPera {
        accounts: Vec<String>,
        reject_sign: bool,
        received: Mutex<Vec<String>>,
    }

    impl ScriptedPera {
        fn new(accounts: &[&str]) -> Self {
            Self {
                accounts: accounts.iter().map(|a| a.to_string()).collect(),
                reject_sign: false,
                received: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PeraConnect for ScriptedPera {
        async fn connect(&self) -> std::result::Result<Vec<String>, ProviderFault> {
            Ok(self.accounts.clone())
        }

        async fn sign_transaction(
            &self,
            transactions: Vec<String>,
        ) -> std::result::Result<Vec<Option<String>>, ProviderFault> {
            if self.reject_sign {
                return Err(ProviderFault::Rejected("user closed the modal".into()));
            }
            self.received.lock().unwrap().extend(transactions.clone());
            Ok(transactions
                .iter()
                .map(|t| {
                    let mut bytes = b"sig:".to_vec();
                    bytes.extend(BASE64_STANDARD.decode(t).unwrap());
                    Some(BASE64_STANDARD.encode(bytes))
                })
                .collect())
        }

        async fn disconnect(&self) -> std::result::Result<(), ProviderFault> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_missing_runtime_is_unavailable() {
        let mut adapter = PeraAdapter::new(None);
        assert!(matches!(
            adapter.connect().await,
            Err(Error::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_returns_first_account() {
        let mut adapter = PeraAdapter::new(Some(Arc::new(ScriptedPera::new(&["PERA1", "PERA2"]))));
        assert_eq!(adapter.connect().await.unwrap().as_str(), "PERA1");
    }

    #[tokio::test]
    async fn test_zero_accounts_is_rejected() {
        let mut adapter = PeraAdapter::new(Some(Arc::new(ScriptedPera::new(&[]))));
        assert!(matches!(
            adapter.connect().await,
            Err(Error::ConnectRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_preserves_order_and_marshals_base64() {
        let pera = Arc::new(ScriptedPera::new(&["PERA1"]));
        let adapter = PeraAdapter::new(Some(pera.clone()));

        let first = MockTransaction::new(b"one");
        let second = MockTransaction::new(b"two");
        let signed = adapter.sign(&[&first, &second]).await.unwrap();

        assert_eq!(signed.len(), 2);
        assert_eq!(signed[0].as_ref().unwrap().as_bytes(), b"sig:one");
        assert_eq!(signed[1].as_ref().unwrap().as_bytes(), b"sig:two");
        assert_eq!(
            *pera.received.lock().unwrap(),
            vec![BASE64_STANDARD.encode("one"), BASE64_STANDARD.encode("two")]
        );
    }

    #[tokio::test]
    async fn test_declined_signature_is_sign_rejected() {
        let mut pera = ScriptedPera::new(&["PERA1"]);
        pera.reject_sign = true;
        let adapter = PeraAdapter::new(Some(Arc::new(pera)));

        let txn = MockTransaction::new(b"one");
        assert!(matches!(
            adapter.sign(&[&txn]).await,
            Err(Error::SignRejected(_))
        ));
    }
}
