//! Category-dispatch controller
//!
//! The [`Controller`] owns one backend per configured category and routes
//! every wallet operation to the right one. It keeps no account state of its
//! own: results and errors come straight from the backend.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::backend::{Backend, WalletBackend};
use crate::category::{Category, CategoryRegistry, ChainIdOrName};
use crate::error::ControllerError;
use crate::types::{
    Account, ChainDescriptor, ConnectResult, ConnectorInfo, SignableMessage, TransactionPayload,
    WalletDescriptor,
};
use crate::watch::{change_stream, AccountChangeStream, AccountListener, AccountWatch};

/// Input of [`Controller::create`]
#[derive(Debug, Clone, Default)]
pub struct CreateConfigParameters {
    pub chains: Vec<ChainDescriptor>,
    pub wallets: Vec<WalletDescriptor>,
}

/// Which backend an operation is for.
///
/// An explicit category wins over the category inferred from the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub category: Option<Category>,
    pub chain: Option<ChainIdOrName>,
}

impl Target {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            chain: None,
        }
    }

    pub fn chain(chain: impl Into<ChainIdOrName>) -> Self {
        Self {
            category: None,
            chain: Some(chain.into()),
        }
    }

    pub fn with_chain(mut self, chain: impl Into<ChainIdOrName>) -> Self {
        self.chain = Some(chain.into());
        self
    }
}

impl From<Category> for Target {
    fn from(category: Category) -> Self {
        Target::category(category)
    }
}

impl From<ChainIdOrName> for Target {
    fn from(chain: ChainIdOrName) -> Self {
        Target::chain(chain)
    }
}

impl From<u64> for Target {
    fn from(chain_id: u64) -> Self {
        Target::chain(chain_id)
    }
}

impl From<(Category, ChainIdOrName)> for Target {
    fn from((category, chain): (Category, ChainIdOrName)) -> Self {
        Target::category(category).with_chain(chain)
    }
}

/// Cross-category wallet controller
pub struct Controller {
    backends: BTreeMap<Category, Backend>,
    registry: CategoryRegistry,
}

impl Controller {
    /// Build one backend for every category that has at least one wallet.
    ///
    /// Categories without wallets are left out; their chains are only used to
    /// resolve chain names.
    pub fn create(params: CreateConfigParameters) -> Result<Self, ControllerError> {
        let registry = CategoryRegistry::from_chains(&params.chains);
        let mut backends = BTreeMap::new();

        for category in Category::ALL {
            let mut wallets: Vec<WalletDescriptor> = Vec::new();
            for wallet in params.wallets.iter().filter(|w| w.supports(category)) {
                // Connector uids are derived from the id, so ids must be unique too
                if wallets
                    .iter()
                    .any(|w| w.name == wallet.name || w.connector.id() == wallet.connector.id())
                {
                    return Err(ControllerError::DuplicateWallet {
                        category,
                        wallet: wallet.name.clone(),
                    });
                }
                wallets.push(wallet.clone());
            }
            if wallets.is_empty() {
                continue;
            }

            let chains: Vec<ChainDescriptor> = params
                .chains
                .iter()
                .filter(|chain| chain.category == category)
                .cloned()
                .collect();
            let backend = Backend::build(category, &chains, &wallets)?;
            debug!(
                "Configured {} with {} chains and {} wallets",
                category,
                chains.len(),
                wallets.len()
            );
            backends.insert(category, backend);
        }

        info!(
            "Controller ready: categories {:?}",
            backends.keys().collect::<Vec<_>>()
        );
        Ok(Self { backends, registry })
    }

    /// Configured categories, in declaration order
    pub fn categories(&self) -> Vec<Category> {
        self.backends.keys().copied().collect()
    }

    /// Every connector of every configured backend
    pub fn connectors(&self) -> Vec<ConnectorInfo> {
        self.backends
            .values()
            .flat_map(|backend| backend.as_backend().connectors().iter().cloned())
            .collect()
    }

    pub fn backend(&self, category: Category) -> Option<&Backend> {
        self.backends.get(&category)
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Category a target resolves to
    pub fn resolve(&self, target: &Target) -> Result<Category, ControllerError> {
        match (&target.category, &target.chain) {
            (Some(category), _) => Ok(*category),
            (None, Some(chain)) => self.registry.category_of(chain),
            (None, None) => Err(ControllerError::MissingTarget),
        }
    }

    fn route(&self, target: &Target) -> Result<&dyn WalletBackend, ControllerError> {
        let category = self.resolve(target)?;
        let backend = self
            .backends
            .get(&category)
            .ok_or(ControllerError::NoBackendForCategory(category))?;
        debug!("Dispatching to {} backend", category);
        Ok(backend.as_backend())
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Connect the named wallet of the target's category
    pub async fn connect(
        &self,
        target: impl Into<Target>,
        wallet: &str,
    ) -> Result<ConnectResult, ControllerError> {
        let backend = self.route(&target.into())?;
        if !backend.has_connector(wallet) {
            return Err(ControllerError::WalletNotFound {
                category: backend.category(),
                wallet: wallet.to_string(),
            });
        }
        backend.connect(wallet).await
    }

    pub async fn disconnect(&self, target: impl Into<Target>) -> Result<(), ControllerError> {
        self.route(&target.into())?.disconnect().await
    }

    pub fn get_account(&self, target: impl Into<Target>) -> Result<Account, ControllerError> {
        self.route(&target.into())?.get_account()
    }

    pub fn get_chain_id(
        &self,
        target: impl Into<Target>,
    ) -> Result<Option<ChainIdOrName>, ControllerError> {
        self.route(&target.into())?.get_chain_id()
    }

    /// Switch to `chain`, resolving its category from the chain itself
    pub async fn switch_chain(
        &self,
        chain: impl Into<ChainIdOrName>,
    ) -> Result<ChainIdOrName, ControllerError> {
        let chain = chain.into();
        self.route(&Target::chain(chain.clone()))?
            .switch_chain(&chain)
            .await
    }

    pub async fn sign_message(
        &self,
        target: impl Into<Target>,
        message: impl Into<SignableMessage>,
    ) -> Result<String, ControllerError> {
        let message = message.into();
        self.route(&target.into())?.sign_message(&message).await
    }

    /// Send a transaction. A chain in the target pins the transaction to it.
    pub async fn send_transaction(
        &self,
        target: impl Into<Target>,
        payload: impl Into<TransactionPayload>,
    ) -> Result<String, ControllerError> {
        let target = target.into();
        let payload = payload.into();
        self.route(&target)?
            .send_transaction(target.chain.as_ref(), &payload)
            .await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Watch account changes on every configured backend
    pub fn watch_account(
        &self,
        on_change: impl Fn(&Account, &Account) + Send + Sync + 'static,
    ) -> AccountWatch {
        let listener: AccountListener = std::sync::Arc::new(on_change);
        self.subscribe_all(listener)
    }

    /// Account changes of every configured backend as a stream.
    ///
    /// Dropping the stream unwatches.
    pub fn account_changes(&self) -> AccountChangeStream {
        change_stream(|listener| self.subscribe_all(listener))
    }

    fn subscribe_all(&self, listener: AccountListener) -> AccountWatch {
        AccountWatch::new(
            self.backends
                .values()
                .map(|backend| backend.as_backend().watch_account(listener.clone()))
                .collect(),
        )
    }
}
