//! Common types for the controller and its backends
//!
//! These types describe configuration input, account state and the
//! payloads passed through to category backends.

use ethers_core::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::backend::ConnectorHandle;
use crate::category::{Category, ChainIdOrName};

// =========================================================================
// Configuration Input
// =========================================================================

/// A chain the application wants to talk to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// Display name
    pub name: String,
    /// Chain id (EVM) or chain name (other categories)
    #[serde(default)]
    pub id: Option<ChainIdOrName>,
    /// RPC endpoint
    #[serde(default)]
    pub rpc_url: String,
    /// Icon reference
    #[serde(default)]
    pub icon: Option<String>,
    /// Chain family
    pub category: Category,
}

/// A wallet offered to the user
#[derive(Debug, Clone)]
pub struct WalletDescriptor {
    /// Display name, unique within each category
    pub name: String,
    /// Icon reference
    pub icon: Option<String>,
    /// Underlying connection handle
    pub connector: ConnectorHandle,
    /// Categories the wallet supports
    pub categories: Vec<Category>,
}

impl WalletDescriptor {
    pub fn new(name: &str, connector: ConnectorHandle, categories: &[Category]) -> Self {
        Self {
            name: name.to_string(),
            icon: None,
            connector,
            categories: categories.to_vec(),
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn supports(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Read-only view of a configured connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorInfo {
    /// `<category>:<connector id>`
    pub uid: String,
    pub name: String,
    pub icon: Option<String>,
    pub category: Category,
}

impl ConnectorInfo {
    pub(crate) fn new(category: Category, id: &str, wallet: &WalletDescriptor) -> Self {
        Self {
            uid: format!("{}:{}", category, id),
            name: wallet.name.clone(),
            icon: wallet.icon.clone(),
            category,
        }
    }
}

// =========================================================================
// Account State
// =========================================================================

/// Connection status reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Disconnected => write!(f, "disconnected"),
            AccountStatus::Connecting => write!(f, "connecting"),
            AccountStatus::Connected => write!(f, "connected"),
            AccountStatus::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Account snapshot of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub category: Category,
    pub status: AccountStatus,
    /// Connected addresses, first one is the active account
    pub addresses: Option<Vec<String>>,
    pub chain_id: Option<u64>,
    /// Name of the connector behind the connection
    pub connector: Option<String>,
}

impl Account {
    pub fn disconnected(category: Category) -> Self {
        Self {
            category,
            status: AccountStatus::Disconnected,
            addresses: None,
            chain_id: None,
            connector: None,
        }
    }

    /// Active address
    pub fn address(&self) -> Option<&str> {
        self.addresses
            .as_ref()
            .and_then(|addresses| addresses.first())
            .map(String::as_str)
    }

    pub fn is_connected(&self) -> bool {
        self.status == AccountStatus::Connected
    }
}

// =========================================================================
// Operation Payloads
// =========================================================================

/// Result of a successful connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResult {
    pub accounts: Vec<String>,
    pub chain_id: Option<u64>,
}

/// Message to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignableMessage {
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Raw(Vec<u8>),
}

impl SignableMessage {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SignableMessage::Text(text) => text.as_bytes(),
            SignableMessage::Raw(bytes) => bytes,
        }
    }
}

impl From<&str> for SignableMessage {
    fn from(text: &str) -> Self {
        SignableMessage::Text(text.to_string())
    }
}

impl From<String> for SignableMessage {
    fn from(text: String) -> Self {
        SignableMessage::Text(text)
    }
}

/// Category-specific transaction payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    Evm(EvmTransactionRequest),
    /// Payload for a category without a typed request yet
    Opaque(serde_json::Value),
}

/// EVM transaction as requested by the application.
///
/// Nonce and gas price are filled in by the connector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransactionRequest {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Option<Bytes>,
    /// Gas limit, estimated when absent
    #[serde(default)]
    pub gas: Option<U256>,
}

impl EvmTransactionRequest {
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            ..Default::default()
        }
    }
}

impl From<EvmTransactionRequest> for TransactionPayload {
    fn from(request: EvmTransactionRequest) -> Self {
        TransactionPayload::Evm(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_serializes_like_wallet_state() {
        let account = Account {
            category: Category::Evm,
            status: AccountStatus::Connected,
            addresses: Some(vec!["0xabc".to_string()]),
            chain_id: Some(8453),
            connector: Some("MetaMask".to_string()),
        };

        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["status"], "connected");
        assert_eq!(value["chainId"], 8453);
        assert_eq!(value["category"], "evm");
        assert_eq!(account.address(), Some("0xabc"));
    }

    #[test]
    fn test_disconnected_account() {
        let account = Account::disconnected(Category::Solana);
        assert_eq!(account.status, AccountStatus::Disconnected);
        assert_eq!(account.address(), None);
        assert!(!account.is_connected());
    }

    #[test]
    fn test_chain_descriptor_from_json() {
        let chain: ChainDescriptor = serde_json::from_str(
            r#"{"name": "Base", "id": 8453, "rpc_url": "https://mainnet.base.org", "category": "evm"}"#,
        )
        .unwrap();

        assert_eq!(chain.id, Some(ChainIdOrName::Id(8453)));
        assert_eq!(chain.category, Category::Evm);
        assert_eq!(chain.icon, None);
    }

    #[test]
    fn test_transaction_request_defaults() {
        let request: EvmTransactionRequest = serde_json::from_str(
            r#"{"to": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"}"#,
        )
        .unwrap();

        assert_eq!(request.value, U256::zero());
        assert!(request.data.is_none());
        assert!(request.gas.is_none());
    }
}
