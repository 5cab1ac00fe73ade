//! Backend for categories without a native implementation
//!
//! Lists its configured wallets so they can be shown, but fails every
//! wallet operation with `NotImplemented`.

use async_trait::async_trait;

use crate::backend::WalletBackend;
use crate::category::{Category, ChainIdOrName};
use crate::error::ControllerError;
use crate::types::{
    Account, ConnectResult, ConnectorInfo, SignableMessage, TransactionPayload, WalletDescriptor,
};
use crate::watch::{AccountListener, Unwatch};

pub struct UnimplementedBackend {
    category: Category,
    connectors: Vec<ConnectorInfo>,
}

impl UnimplementedBackend {
    pub fn new(category: Category, wallets: &[WalletDescriptor]) -> Self {
        let connectors = wallets
            .iter()
            .map(|wallet| ConnectorInfo::new(category, wallet.connector.id(), wallet))
            .collect();

        Self {
            category,
            connectors,
        }
    }

    fn fail<T>(&self, operation: &'static str) -> Result<T, ControllerError> {
        Err(ControllerError::not_implemented(self.category, operation))
    }
}

#[async_trait]
impl WalletBackend for UnimplementedBackend {
    fn category(&self) -> Category {
        self.category
    }

    fn connectors(&self) -> &[ConnectorInfo] {
        &self.connectors
    }

    async fn connect(&self, _wallet: &str) -> Result<ConnectResult, ControllerError> {
        self.fail("connect")
    }

    async fn disconnect(&self) -> Result<(), ControllerError> {
        self.fail("disconnect")
    }

    fn get_account(&self) -> Result<Account, ControllerError> {
        self.fail("getAccount")
    }

    fn get_chain_id(&self) -> Result<Option<ChainIdOrName>, ControllerError> {
        self.fail("getChainId")
    }

    async fn switch_chain(&self, _chain: &ChainIdOrName) -> Result<ChainIdOrName, ControllerError> {
        self.fail("switchChain")
    }

    async fn sign_message(&self, _message: &SignableMessage) -> Result<String, ControllerError> {
        self.fail("signMessage")
    }

    async fn send_transaction(
        &self,
        _chain: Option<&ChainIdOrName>,
        _payload: &TransactionPayload,
    ) -> Result<String, ControllerError> {
        self.fail("sendTransaction")
    }

    // Nothing here ever changes, so the listener is never called.
    fn watch_account(&self, _listener: AccountListener) -> Unwatch {
        Unwatch::inert()
    }
}
