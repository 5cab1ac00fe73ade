//! EVM wallet connector interface

use async_trait::async_trait;

use super::transport::HttpTransport;
use crate::types::{EvmTransactionRequest, SignableMessage};
use crate::wallet::WalletError;

/// Accounts and chain granted by a wallet on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmSession {
    pub accounts: Vec<String>,
    pub chain_id: u64,
}

/// A single EVM wallet the user can connect.
///
/// Implementations own whatever protocol talks to the wallet; the adapter only
/// tracks which connector is active and what it reported.
#[async_trait]
pub trait EvmConnector: Send + Sync {
    /// Stable identifier, unique among a category's connectors
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Ask the wallet for access, preferring `chain_id` when given
    async fn connect(&self, chain_id: Option<u64>) -> Result<EvmSession, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    /// Move the wallet to `chain_id`, returning the chain it ended up on
    async fn switch_chain(&self, chain_id: u64) -> Result<u64, WalletError>;

    /// EIP-191 sign `message` with `account`
    async fn sign_message(
        &self,
        account: &str,
        message: &SignableMessage,
    ) -> Result<String, WalletError>;

    /// Sign and submit `request` from `account` on the transport's chain
    async fn send_transaction(
        &self,
        account: &str,
        request: &EvmTransactionRequest,
        transport: &HttpTransport,
    ) -> Result<String, WalletError>;
}

/// Lowercase, dash-separated connector id derived from a display name
pub fn connector_id(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_id() {
        assert_eq!(connector_id("MetaMask"), "metamask");
        assert_eq!(connector_id("Coinbase  Wallet"), "coinbase-wallet");
    }
}
