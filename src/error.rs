//! Error types for the wallet dashboard and relay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Wallet provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Connection rejected: {0}")]
    ConnectRejected(String),

    #[error("Signing rejected: {0}")]
    SignRejected(String),

    #[error("Signing not implemented for {0}")]
    SignUnsupported(String),

    #[error("Wallet provider error: {0}")]
    ProviderError(String),

    #[error("Node rejected submission ({status}): {body}")]
    SubmitRejected { status: u16, body: String },

    #[error("No wallet connected")]
    NotConnected,

    #[error("Configuration not loaded yet")]
    ConfigNotLoaded,

    #[error("Group signing incomplete: missing signatures at positions {missing:?}")]
    IncompleteGroup { missing: Vec<usize> },

    #[error("Invalid transaction group: {0}")]
    InvalidGroup(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
