//! Wallet provider adapters
//!
//! Each supported wallet (browser extension, mobile app over a bridge, or
//! pairing session) speaks its own connect/sign protocol. The adapters here
//! normalize those protocols to one contract:
//! - `connect()` returns the first account the user approved
//! - `sign()` returns one optional signed blob per input, in input order
//!
//! SECURITY NOTE:
//! - Keys never enter this crate; signing is delegated to the provider
//! - Only canonical transaction encodings cross the provider boundary

mod algosigner;
mod lute;
mod myalgo;
mod pera;
mod session;
mod walletconnect;

pub use algosigner::{
    ledger_name, AlgoSignerAccount, AlgoSignerAdapter, AlgoSignerExtension, AlgoSignerSigned,
    AlgoSignerTxn,
};
pub use lute::{LuteAdapter, LuteConnect};
pub use myalgo::{MyAlgoAccount, MyAlgoAdapter, MyAlgoConnect, MyAlgoSigned, MyAlgoTxn};
pub use pera::{PeraAdapter, PeraConnect};
pub use session::{WalletProviders, WalletSession};
pub use walletconnect::{CustomRequest, WalletConnectAdapter, WalletConnectBridge, SIGN_METHOD};

use crate::transaction::{SignedBlob, UnsignedTransaction};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio::sync::broadcast;

/// Supported wallet providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Pera,
    AlgoSigner,
    MyAlgo,
    WalletConnect,
    Lute,
}

impl ProviderId {
    pub const ALL: [ProviderId; 5] = [
        ProviderId::Pera,
        ProviderId::AlgoSigner,
        ProviderId::MyAlgo,
        ProviderId::WalletConnect,
        ProviderId::Lute,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderId::Pera => "pera",
            ProviderId::AlgoSigner => "algosigner",
            ProviderId::MyAlgo => "myalgo",
            ProviderId::WalletConnect => "walletconnect",
            ProviderId::Lute => "lute",
        }
    }

    /// Human-readable name for user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Pera => "Pera",
            ProviderId::AlgoSigner => "AlgoSigner",
            ProviderId::MyAlgo => "MyAlgo",
            ProviderId::WalletConnect => "WalletConnect",
            ProviderId::Lute => "Lute",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProviderId::ALL
            .into_iter()
            .find(|id| id.name() == s.to_lowercase())
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown wallet provider: {}", s)))
    }
}

/// Address of a wallet-held key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure reported by a provider's own API
///
/// Adapters translate these into the crate taxonomy depending on whether the
/// failing call was a connect or a sign.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFault {
    /// Runtime object, extension or module could not be reached
    #[error("{0}")]
    Unavailable(String),
    /// The user declined or closed the wallet UI
    #[error("{0}")]
    Rejected(String),
    /// Transport or protocol failure talking to the provider
    #[error("{0}")]
    Transport(String),
}

impl ProviderFault {
    pub(crate) fn on_connect(self, provider: ProviderId) -> Error {
        match self {
            ProviderFault::Unavailable(msg) => {
                Error::ProviderUnavailable(format!("{}: {}", provider.display_name(), msg))
            }
            ProviderFault::Rejected(msg) => {
                Error::ConnectRejected(format!("{}: {}", provider.display_name(), msg))
            }
            ProviderFault::Transport(msg) => {
                Error::ProviderError(format!("{}: {}", provider.display_name(), msg))
            }
        }
    }

    pub(crate) fn on_sign(self, provider: ProviderId) -> Error {
        match self {
            ProviderFault::Rejected(msg) => {
                Error::SignRejected(format!("{}: {}", provider.display_name(), msg))
            }
            ProviderFault::Unavailable(msg) | ProviderFault::Transport(msg) => {
                Error::ProviderError(format!("{}: {}", provider.display_name(), msg))
            }
        }
    }
}

/// Asynchronous notification raised by a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The peer approved a session with these accounts
    Connected { accounts: Vec<String> },
    /// The peer closed the session
    Disconnected { reason: Option<String> },
}

/// Uniform connect/sign contract over one wallet provider
///
/// Calls may suspend indefinitely while the user interacts with the wallet;
/// there is no internal timeout.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Which provider this adapter talks to
    fn provider(&self) -> ProviderId;

    /// Establish a provider session and return the first approved account
    async fn connect(&mut self) -> Result<Account>;

    /// Sign transactions in order
    ///
    /// The output has exactly one entry per input; `None` marks a
    /// transaction the provider did not sign.
    async fn sign(
        &self,
        transactions: &[&dyn UnsignedTransaction],
    ) -> Result<Vec<Option<SignedBlob>>>;

    /// Close the provider session
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Inbound provider events, for providers that can end a session on
    /// their own
    fn events(&self) -> Option<broadcast::Receiver<ProviderEvent>> {
        None
    }
}

/// First account of a connect response, or `ConnectRejected` when empty
pub(crate) fn first_account(provider: ProviderId, accounts: Vec<String>) -> Result<Account> {
    accounts
        .into_iter()
        .find(|a| !a.is_empty())
        .map(Account::new)
        .ok_or_else(|| {
            Error::ConnectRejected(format!(
                "{}: no accounts were shared",
                provider.display_name()
            ))
        })
}

/// Base64 canonical encodings, in order
pub(crate) fn encode_base64(transactions: &[&dyn UnsignedTransaction]) -> Vec<String> {
    transactions
        .iter()
        .map(|t| BASE64_STANDARD.encode(t.encode()))
        .collect()
}

/// Decode base64 provider output, keeping holes in place
pub(crate) fn decode_signed(
    provider: ProviderId,
    signed: Vec<Option<String>>,
) -> Result<Vec<Option<SignedBlob>>> {
    signed
        .into_iter()
        .map(|entry| match entry {
            Some(encoded) => SignedBlob::from_base64(&encoded).map(Some).map_err(|e| {
                Error::ProviderError(format!(
                    "{} returned an undecodable blob: {}",
                    provider.display_name(),
                    e
                ))
            }),
            None => Ok(None),
        })
        .collect()
}

/// Enforce one output entry per input transaction
pub(crate) fn check_len<T>(provider: ProviderId, expected: usize, signed: Vec<T>) -> Result<Vec<T>> {
    if signed.len() != expected {
        return Err(Error::ProviderError(format!(
            "{} returned {} signed transactions for {} inputs",
            provider.display_name(),
            signed.len(),
            expected
        )));
    }
    Ok(signed)
}
