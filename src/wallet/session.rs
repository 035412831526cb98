//! Active wallet session
//!
//! Tracks which provider is connected and which account it shared. There is
//! at most one active session; connecting replaces it only once the new
//! provider has handed over an account, so a failed connect leaves the
//! previous session untouched.

use super::{
    Account, AlgoSignerAdapter, AlgoSignerExtension, LuteAdapter, LuteConnect, MyAlgoAdapter,
    MyAlgoConnect, PeraAdapter, PeraConnect, ProviderEvent, ProviderId, WalletAdapter,
    WalletConnectAdapter, WalletConnectBridge,
};
use crate::config::ConfigStore;
use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Runtime objects available to the dashboard, one slot per provider
///
/// An empty slot means the provider could not be loaded; its adapter reports
/// `ProviderUnavailable` when used.
#[derive(Clone, Default)]
pub struct WalletProviders {
    pera: Option<Arc<dyn PeraConnect>>,
    algosigner: Option<Arc<dyn AlgoSignerExtension>>,
    myalgo: Option<Arc<dyn MyAlgoConnect>>,
    walletconnect: Option<Arc<dyn WalletConnectBridge>>,
    lute: Option<Arc<dyn LuteConnect>>,
}

impl WalletProviders {
    pub fn with_pera(mut self, pera: Arc<dyn PeraConnect>) -> Self {
        self.pera = Some(pera);
        self
    }

    pub fn with_algosigner(mut self, extension: Arc<dyn AlgoSignerExtension>) -> Self {
        self.algosigner = Some(extension);
        self
    }

    pub fn with_myalgo(mut self, myalgo: Arc<dyn MyAlgoConnect>) -> Self {
        self.myalgo = Some(myalgo);
        self
    }

    pub fn with_walletconnect(mut self, bridge: Arc<dyn WalletConnectBridge>) -> Self {
        self.walletconnect = Some(bridge);
        self
    }

    pub fn with_lute(mut self, lute: Arc<dyn LuteConnect>) -> Self {
        self.lute = Some(lute);
        self
    }

    /// Fresh adapter for a provider
    pub fn adapter(&self, id: ProviderId, config: &Arc<ConfigStore>) -> Box<dyn WalletAdapter> {
        match id {
            ProviderId::Pera => Box::new(PeraAdapter::new(self.pera.clone())),
            ProviderId::AlgoSigner => Box::new(AlgoSignerAdapter::new(
                self.algosigner.clone(),
                Arc::clone(config),
            )),
            ProviderId::MyAlgo => Box::new(MyAlgoAdapter::new(self.myalgo.clone())),
            ProviderId::WalletConnect => {
                Box::new(WalletConnectAdapter::new(self.walletconnect.clone()))
            }
            ProviderId::Lute => Box::new(LuteAdapter::new(self.lute.clone(), Arc::clone(config))),
        }
    }
}

struct ActiveSession {
    id: Uuid,
    provider: ProviderId,
    account: Account,
    handle: Arc<dyn WalletAdapter>,
    watcher: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

type SharedState = Arc<RwLock<Option<ActiveSession>>>;

/// The dashboard's wallet connection
pub struct WalletSession {
    providers: WalletProviders,
    config: Arc<ConfigStore>,
    state: SharedState,
}

impl WalletSession {
    pub fn new(providers: WalletProviders, config: Arc<ConfigStore>) -> Self {
        Self {
            providers,
            config,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Connect a provider and make it the active session
    ///
    /// On failure the previous session (if any) stays active.
    pub async fn connect(&self, id: ProviderId) -> Result<Account> {
        let mut adapter = self.providers.adapter(id, &self.config);
        // Subscribe before connecting so a close right after approval is seen
        let mut events = adapter.events();
        let account = adapter.connect().await.map_err(|e| {
            tracing::warn!(provider = %id, error = %e, "Wallet connect failed");
            e
        })?;
        let handle: Arc<dyn WalletAdapter> = Arc::from(adapter);

        let session_id = Uuid::new_v4();
        let mut state = self.state.write().await;

        if let Some(reason) = events.as_mut().and_then(closed_while_connecting) {
            tracing::warn!(provider = %id, reason = %reason, "Peer closed session during connect");
            return Err(Error::ConnectRejected(format!(
                "{}: {}",
                id.display_name(),
                reason
            )));
        }

        if let Some(mut previous) = state.take() {
            previous.stop_watcher();
            tracing::info!(
                provider = %previous.provider,
                account = %previous.account,
                "Replacing wallet session"
            );
        }

        let watcher = events
            .map(|events| spawn_disconnect_watcher(Arc::clone(&self.state), session_id, events));

        *state = Some(ActiveSession {
            id: session_id,
            provider: id,
            account: account.clone(),
            handle,
            watcher,
        });

        tracing::info!(provider = %id, account = %account, "Wallet connected");
        Ok(account)
    }

    /// Account of the active session
    pub async fn current_account(&self) -> Result<Account> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|s| s.account.clone())
            .ok_or(Error::NotConnected)
    }

    pub async fn provider(&self) -> Option<ProviderId> {
        self.state.read().await.as_ref().map(|s| s.provider)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Forget the active session and close it on the provider side
    pub async fn disconnect(&self) {
        let Some(mut session) = self.state.write().await.take() else {
            return;
        };
        session.stop_watcher();

        if let Err(e) = session.handle.disconnect().await {
            tracing::warn!(provider = %session.provider, error = %e, "Provider disconnect failed");
        }
        tracing::info!(provider = %session.provider, "Wallet disconnected");
    }

    /// Sign with the active provider
    pub async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>> {
        let (provider, handle) = {
            let state = self.state.read().await;
            let session = state.as_ref().ok_or(Error::NotConnected)?;
            (session.provider, Arc::clone(&session.handle))
        };

        tracing::debug!(provider = %provider, count = transactions.len(), "Requesting signatures");
        handle.sign(transactions).await
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_write() {
            if let Some(session) = state.as_mut() {
                session.stop_watcher();
            }
        }
    }
}

/// Drain events queued during connect; `Some(reason)` if the peer is gone
fn closed_while_connecting(events: &mut broadcast::Receiver<ProviderEvent>) -> Option<String> {
    let mut closed = None;
    loop {
        match events.try_recv() {
            Ok(ProviderEvent::Disconnected { reason }) => {
                closed = Some(reason.unwrap_or_else(|| "session closed".to_string()));
            }
            Ok(ProviderEvent::Connected { .. }) => closed = None,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return closed,
        }
    }
}

/// Clear the session when the provider reports a disconnect
///
/// Only the session that spawned the watcher is cleared; a newer session
/// under the same state is left alone.
fn spawn_disconnect_watcher(
    state: SharedState,
    session_id: Uuid,
    mut events: broadcast::Receiver<ProviderEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ProviderEvent::Disconnected { reason }) => {
                    let mut state = state.write().await;
                    if state.as_ref().is_some_and(|s| s.id == session_id) {
                        *state = None;
                        tracing::info!(
                            reason = reason.as_deref().unwrap_or("none"),
                            "Provider ended wallet session"
                        );
                    }
                    return;
                }
                Ok(ProviderEvent::Connected { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Wallet event stream lagged");
                }
                Err(RecvError::Closed) => return,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::super::walletconnect::tests::ScriptedBridge;
    use super::*;
    use crate::transaction::test_support::MockTransaction;
    use crate::wallet::ProviderFault;
    use async_trait::async_trait;
    use std::time::Duration;
    use url::Url;

    struct StaticPera(Vec<String>);

    #[async_trait]
    impl PeraConnect for StaticPera {
        async fn connect(&self) -> std::result::Result<Vec<String>, ProviderFault> {
            Ok(self.0.clone())
        }

        async fn sign_transaction(
            &self,
            transactions: Vec<String>,
        ) -> std::result::Result<Vec<Option<String>>, ProviderFault> {
            Ok(transactions.into_iter().map(Some).collect())
        }

        async fn disconnect(&self) -> std::result::Result<(), ProviderFault> {
            Ok(())
        }
    }

    fn config() -> Arc<ConfigStore> {
        Arc::new(ConfigStore::new(Url::parse("http://localhost:3000").unwrap()))
    }

    fn session(pera_accounts: &[&str], bridge: Arc<ScriptedBridge>) -> WalletSession {
        let providers = WalletProviders::default()
            .with_pera(Arc::new(StaticPera(
                pera_accounts.iter().map(|a| a.to_string()).collect(),
            )))
            .with_walletconnect(bridge);
        WalletSession::new(providers, config())
    }

    async fn wait_until_disconnected(session: &WalletSession) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while session.is_connected().await {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("session should clear");
    }

    #[tokio::test]
    async fn test_connect_sets_account() {
        let session = session(&["PERA1"], Arc::new(ScriptedBridge::new(&["WC1"], true)));
        assert!(matches!(
            session.current_account().await,
            Err(Error::NotConnected)
        ));

        let account = session.connect(ProviderId::Pera).await.unwrap();
        assert_eq!(account.as_str(), "PERA1");
        assert_eq!(session.current_account().await.unwrap(), account);
        assert_eq!(session.provider().await, Some(ProviderId::Pera));
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_previous_session() {
        let session = session(&[], Arc::new(ScriptedBridge::new(&["WC1"], true)));

        assert_eq!(
            session.connect(ProviderId::WalletConnect).await.unwrap().as_str(),
            "WC1"
        );
        // Pera shares zero accounts
        assert!(session.connect(ProviderId::Pera).await.is_err());
        assert_eq!(session.provider().await, Some(ProviderId::WalletConnect));
    }

    #[tokio::test]
    async fn test_zero_accounts_leaves_session_unset() {
        let session = session(&[], Arc::new(ScriptedBridge::new(&["WC1"], true)));
        assert!(matches!(
            session.connect(ProviderId::Pera).await,
            Err(Error::ConnectRejected(_))
        ));
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_peer_disconnect_clears_session() {
        let bridge = Arc::new(ScriptedBridge::new(&["WC1"], true));
        let session = session(&["PERA1"], bridge.clone());

        session.connect(ProviderId::WalletConnect).await.unwrap();
        bridge.drop_session();

        wait_until_disconnected(&session).await;
        assert!(matches!(
            session.current_account().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_right_after_approval_is_not_a_session() {
        let mut bridge = ScriptedBridge::new(&["WC1"], true);
        bridge.close_after_approval = true;
        let bridge = Arc::new(bridge);
        let session = session(&["PERA1"], bridge.clone());

        assert!(matches!(
            session.connect(ProviderId::WalletConnect).await,
            Err(Error::ConnectRejected(_))
        ));
        assert!(!bridge.is_connected());
        assert!(!session.is_connected().await);
        assert!(matches!(
            session.current_account().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_after_approval_keeps_previous_session() {
        let mut bridge = ScriptedBridge::new(&["WC1"], true);
        bridge.close_after_approval = true;
        let session = session(&["PERA1"], Arc::new(bridge));

        session.connect(ProviderId::Pera).await.unwrap();
        assert!(session.connect(ProviderId::WalletConnect).await.is_err());
        assert_eq!(session.provider().await, Some(ProviderId::Pera));
    }

    #[tokio::test]
    async fn test_stale_disconnect_does_not_clear_new_session() {
        let bridge = Arc::new(ScriptedBridge::new(&["WC1"], true));
        let session = session(&["PERA1"], bridge.clone());

        session.connect(ProviderId::WalletConnect).await.unwrap();
        session.connect(ProviderId::Pera).await.unwrap();
        bridge.drop_session();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.provider().await, Some(ProviderId::Pera));
    }

    #[tokio::test]
    async fn test_sign_requires_session() {
        let session = session(&["PERA1"], Arc::new(ScriptedBridge::new(&["WC1"], true)));
        let txn = MockTransaction::new(b"pay");
        assert!(matches!(
            session.sign(&[&txn]).await,
            Err(Error::NotConnected)
        ));

        session.connect(ProviderId::Pera).await.unwrap();
        let signed = session.sign(&[&txn]).await.unwrap();
        assert_eq!(signed[0].as_ref().unwrap().as_bytes(), b"pay");
    }

    #[tokio::test]
    async fn test_disconnect_closes_provider_session() {
        let bridge = Arc::new(ScriptedBridge::new(&["WC1"], true));
        let session = session(&["PERA1"], bridge.clone());

        session.connect(ProviderId::WalletConnect).await.unwrap();
        session.disconnect().await;

        assert!(!session.is_connected().await);
        assert!(!bridge.is_connected());
    }
}
