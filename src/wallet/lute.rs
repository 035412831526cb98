//! Lute wallet adapter
//!
//! Connecting works against the configured network. Signing is not wired up
//! for Lute and reports `SignUnsupported` without touching the transactions.

use super::{first_account, Account, ProviderId, ProviderFault, WalletAdapter};
use crate::config::ConfigStore;
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Lute Connect client object
#[async_trait]
pub trait LuteConnect: Send + Sync {
    /// Connect for the network identified by `genesis_id`
    async fn connect(&self, genesis_id: &str) -> std::result::Result<Vec<String>, ProviderFault>;
}

pub struct LuteAdapter {
    lute: Option<Arc<dyn LuteConnect>>,
    config: Arc<ConfigStore>,
}

impl LuteAdapter {
    pub fn new(lute: Option<Arc<dyn LuteConnect>>, config: Arc<ConfigStore>) -> Self {
        Self { lute, config }
    }
}

#[async_trait]
impl WalletAdapter for LuteAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Lute
    }

    async fn connect(&mut self) -> Result<Account> {
        let config = self.config.get().await?;
        let lute = self.lute.as_ref().ok_or_else(|| {
            Error::ProviderUnavailable("lute-connect could not be loaded".to_string())
        })?;

        let accounts = lute
            .connect(&config.genesis_id)
            .await
            .map_err(|e| e.on_connect(ProviderId::Lute))?;
        first_account(ProviderId::Lute, accounts)
    }

    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        tracing::warn!(count = transactions.len(), "Lute signing requested");
        Err(Error::SignUnsupported(ProviderId::Lute.display_name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublicConfig;
    use crate::transaction::test_support::MockTransaction;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Default)]
    struct ScriptedLute {
        genesis: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LuteConnect for ScriptedLute {
        async fn connect(
            &self,
            genesis_id: &str,
        ) -> std::result::Result<Vec<String>, ProviderFault> {
            *self.genesis.lock().unwrap() = Some(genesis_id.to_string());
            Ok(vec!["LUTE1".to_string()])
        }
    }

    fn store(loaded: bool) -> Arc<ConfigStore> {
        let base = Url::parse("http://localhost:3000").unwrap();
        if !loaded {
            return Arc::new(ConfigStore::new(base));
        }
        Arc::new(ConfigStore::preloaded(
            base,
            PublicConfig {
                app_id: 0,
                algod_url: "https://node.example".into(),
                algod_token_indirection: "/api/send-signed".into(),
                genesis_id: "testnet-v1.0".into(),
                genesis_hash: String::new(),
                walletconnect_project_id: String::new(),
            },
        ))
    }

    #[tokio::test]
    async fn test_connect_passes_genesis_id() {
        let lute = Arc::new(ScriptedLute::default());
        let mut adapter = LuteAdapter::new(Some(lute.clone()), store(true));

        assert_eq!(adapter.connect().await.unwrap().as_str(), "LUTE1");
        assert_eq!(lute.genesis.lock().unwrap().as_deref(), Some("testnet-v1.0"));
    }

    #[tokio::test]
    async fn test_connect_before_config_fails() {
        let mut adapter = LuteAdapter::new(Some(Arc::new(ScriptedLute::default())), store(false));
        assert!(matches!(
            adapter.connect().await,
            Err(Error::ConfigNotLoaded)
        ));
    }

    #[tokio::test]
    async fn test_sign_is_unsupported() {
        let adapter = LuteAdapter::new(Some(Arc::new(ScriptedLute::default())), store(true));
        let txn = MockTransaction::new(b"optin");

        let err = adapter.sign(&[&txn]).await.unwrap_err();
        assert!(matches!(err, Error::SignUnsupported(_)));
        assert!(err.to_string().contains("Lute"));
    }
}
