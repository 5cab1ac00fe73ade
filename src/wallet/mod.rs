//! Wallet primitives shared by the chain backends
//!
//! This module holds the backend-native error type every connector reports
//! and the key-backed EVM wallet used by the local key connector.

pub mod evm;

/// Backend-native wallet error.
///
/// These are produced by connectors and adapters and travel through the
/// controller untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("No wallet is connected")]
    NotConnected,

    #[error("Connector {0} is already connected")]
    AlreadyConnected(String),

    #[error("A connect request is already pending")]
    ConnectInProgress,

    #[error("Chain {0} is not configured")]
    ChainNotConfigured(u64),

    #[error("Chain mismatch: requested {expected}, wallet is on {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WalletError::Rpc(format!("Timeout: {}", err))
        } else if err.is_connect() {
            WalletError::Rpc(format!("Connection failed: {}", err))
        } else {
            WalletError::Rpc(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(err: serde_json::Error) -> Self {
        WalletError::Rpc(format!("Malformed response: {}", err))
    }
}

pub use evm::EvmWallet;
