//! Category backends
//!
//! Every category is served by one backend implementing [`WalletBackend`].
//! The controller stores them as the closed [`Backend`] enum so adding a
//! category forces every dispatch site to handle it.

pub mod evm;
pub mod unimplemented;

use std::sync::Arc;

use async_trait::async_trait;

use crate::category::{Category, ChainIdOrName};
use crate::error::ControllerError;
use crate::types::{
    Account, ChainDescriptor, ConnectResult, ConnectorInfo, SignableMessage, TransactionPayload,
    WalletDescriptor,
};
use crate::watch::{AccountListener, Unwatch};

pub use evm::{EvmAdapter, EvmConnector};
pub use unimplemented::UnimplementedBackend;

/// Uniform wallet capability set of one category
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Category served by this backend
    fn category(&self) -> Category;

    /// Configured connectors, in configuration order
    fn connectors(&self) -> &[ConnectorInfo];

    fn has_connector(&self, name: &str) -> bool {
        self.connectors().iter().any(|info| info.name == name)
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect the named wallet
    async fn connect(&self, wallet: &str) -> Result<ConnectResult, ControllerError>;

    /// Disconnect the active wallet
    async fn disconnect(&self) -> Result<(), ControllerError>;

    /// Current account snapshot
    fn get_account(&self) -> Result<Account, ControllerError>;

    /// Currently selected chain
    fn get_chain_id(&self) -> Result<Option<ChainIdOrName>, ControllerError>;

    /// Switch the selected chain, returning the chain now in use
    async fn switch_chain(&self, chain: &ChainIdOrName) -> Result<ChainIdOrName, ControllerError>;

    // =========================================================================
    // Signing
    // =========================================================================

    /// Sign a message with the active account, returning a hex signature
    async fn sign_message(&self, message: &SignableMessage) -> Result<String, ControllerError>;

    /// Send a transaction, returning its hash.
    ///
    /// `chain` pins the chain the transaction is meant for.
    async fn send_transaction(
        &self,
        chain: Option<&ChainIdOrName>,
        payload: &TransactionPayload,
    ) -> Result<String, ControllerError>;

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Subscribe to account changes
    fn watch_account(&self, listener: AccountListener) -> Unwatch;
}

/// Connection handle supplied by the host application
#[derive(Clone)]
pub enum ConnectorHandle {
    /// EVM wallet connector
    Evm(Arc<dyn EvmConnector>),
    /// Wallet of a category without a native backend
    Detached { id: String },
}

impl ConnectorHandle {
    pub fn id(&self) -> &str {
        match self {
            ConnectorHandle::Evm(connector) => connector.id(),
            ConnectorHandle::Detached { id } => id,
        }
    }

    pub fn as_evm(&self) -> Option<&Arc<dyn EvmConnector>> {
        match self {
            ConnectorHandle::Evm(connector) => Some(connector),
            ConnectorHandle::Detached { .. } => None,
        }
    }
}

impl std::fmt::Debug for ConnectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorHandle::Evm(connector) => f
                .debug_struct("Evm")
                .field("id", &connector.id())
                .field("name", &connector.name())
                .finish(),
            ConnectorHandle::Detached { id } => {
                f.debug_struct("Detached").field("id", id).finish()
            }
        }
    }
}

/// Backend of one configured category
pub enum Backend {
    Evm(EvmAdapter),
    Solana(UnimplementedBackend),
    Bitcoin(UnimplementedBackend),
    Starknet(UnimplementedBackend),
    Benfen(UnimplementedBackend),
}

impl Backend {
    /// Build the backend of `category` from that category's chains and wallets
    pub fn build(
        category: Category,
        chains: &[ChainDescriptor],
        wallets: &[WalletDescriptor],
    ) -> Result<Self, ControllerError> {
        Ok(match category {
            Category::Evm => Backend::Evm(EvmAdapter::new(chains, wallets)?),
            Category::Solana => Backend::Solana(UnimplementedBackend::new(category, wallets)),
            Category::Bitcoin => Backend::Bitcoin(UnimplementedBackend::new(category, wallets)),
            Category::Starknet => Backend::Starknet(UnimplementedBackend::new(category, wallets)),
            Category::Benfen => Backend::Benfen(UnimplementedBackend::new(category, wallets)),
        })
    }

    pub fn as_backend(&self) -> &dyn WalletBackend {
        match self {
            Backend::Evm(adapter) => adapter,
            Backend::Solana(backend)
            | Backend::Bitcoin(backend)
            | Backend::Starknet(backend)
            | Backend::Benfen(backend) => backend,
        }
    }

    pub fn as_evm(&self) -> Option<&EvmAdapter> {
        match self {
            Backend::Evm(adapter) => Some(adapter),
            _ => None,
        }
    }
}
