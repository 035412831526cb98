//! DropPay dashboard backend
//!
//! Wallet adapters, atomic transaction groups and a signed-transaction relay
//! for the DropPay distribution app:
//! - Connect one of several wallet providers and sign through it
//! - Group related transactions so they succeed or fail together
//! - Relay signed transactions to the node without exposing its credential
//!
//! # Security Model
//!
//! - Signing keys stay in the wallet; this crate only sees signed blobs
//! - The node credential lives in the relay process only
//! - Group members are never submitted separately

pub mod actions;
pub mod config;
pub mod relay;
pub mod submit;
pub mod transaction;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use actions::{Dashboard, TransactionBuilder};
pub use config::{ConfigStore, NodeConfig, PublicConfig, ServerConfig};
pub use error::{Error, Result};
pub use submit::{GroupSubmitter, RelayClient, SubmitReceipt};
pub use transaction::{SignedBlob, TransactionGroup, UnsignedTransaction};
pub use wallet::{Account, ProviderId, WalletAdapter, WalletSession};
