//! EVM backend
//!
//! Tracks the connection state of the EVM category the way browser wallet
//! kits do: one selected chain, at most one active connector, and a status
//! that moves through `connecting` while a wallet prompt is open. Every state
//! change is published to account listeners.

mod connector;
mod local;
mod mock;
mod transport;

pub use connector::{connector_id, EvmConnector, EvmSession};
pub use local::LocalKeyConnector;
pub use mock::{MockCall, MockConnector, DEFAULT_MOCK_ACCOUNT, DEFAULT_MOCK_CHAIN_ID};
pub use transport::HttpTransport;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::backend::WalletBackend;
use crate::category::{Category, ChainIdOrName};
use crate::error::ControllerError;
use crate::types::{
    Account, AccountStatus, ChainDescriptor, ConnectResult, ConnectorInfo, SignableMessage,
    TransactionPayload, WalletDescriptor,
};
use crate::wallet::WalletError;
use crate::watch::{lock, AccountListener, ListenerRegistry, Unwatch};

/// Active wallet connection
#[derive(Debug, Clone)]
struct Connection {
    /// Index into the adapter's connectors
    connector: usize,
    accounts: Vec<String>,
    chain_id: u64,
}

#[derive(Debug, Clone, Default)]
struct EvmState {
    status: AccountStatus,
    connection: Option<Connection>,
    /// Selected chain, the first configured chain until switched
    chain_id: Option<u64>,
}

struct ConnectorEntry {
    info: ConnectorInfo,
    connector: Arc<dyn EvmConnector>,
}

/// Backend for EVM wallets
pub struct EvmAdapter {
    /// Configured chain ids, in configuration order
    chains: Vec<u64>,
    transports: BTreeMap<u64, HttpTransport>,
    connectors: Vec<ConnectorEntry>,
    infos: Vec<ConnectorInfo>,
    state: Mutex<EvmState>,
    listeners: ListenerRegistry,
}

impl EvmAdapter {
    /// Build the adapter from EVM chains and wallets.
    ///
    /// Every chain needs a numeric id and a usable RPC url; every wallet
    /// needs an EVM connector handle.
    pub fn new(
        chains: &[ChainDescriptor],
        wallets: &[WalletDescriptor],
    ) -> Result<Self, ControllerError> {
        let mut chain_ids = Vec::with_capacity(chains.len());
        let mut transports = BTreeMap::new();
        for chain in chains {
            let Some(ChainIdOrName::Id(chain_id)) = chain.id else {
                return Err(ControllerError::InvalidChainId {
                    chain: chain.name.clone(),
                });
            };
            if transports.contains_key(&chain_id) {
                warn!("Chain {} ({}) configured twice, keeping the first", chain.name, chain_id);
                continue;
            }
            let transport = HttpTransport::new(chain_id, &chain.rpc_url).map_err(|reason| {
                ControllerError::InvalidRpcUrl {
                    chain: chain.name.clone(),
                    reason,
                }
            })?;
            transports.insert(chain_id, transport);
            chain_ids.push(chain_id);
        }

        let mut connectors = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let connector = wallet.connector.as_evm().cloned().ok_or_else(|| {
                ControllerError::InvalidConnector {
                    wallet: wallet.name.clone(),
                    category: Category::Evm,
                }
            })?;
            connectors.push(ConnectorEntry {
                info: ConnectorInfo::new(Category::Evm, connector.id(), wallet),
                connector,
            });
        }
        let infos = connectors.iter().map(|entry| entry.info.clone()).collect();

        info!(
            "EVM backend ready: {} chains, {} connectors",
            chain_ids.len(),
            connectors.len()
        );

        Ok(Self {
            state: Mutex::new(EvmState {
                chain_id: chain_ids.first().copied(),
                ..Default::default()
            }),
            chains: chain_ids,
            transports,
            connectors,
            infos,
            listeners: ListenerRegistry::new(),
        })
    }

    /// Configured chain ids
    pub fn chains(&self) -> &[u64] {
        &self.chains
    }

    pub fn transport(&self, chain_id: u64) -> Option<&HttpTransport> {
        self.transports.get(&chain_id)
    }

    fn connector_index(&self, name: &str) -> Option<usize> {
        self.connectors
            .iter()
            .position(|entry| entry.info.name == name)
    }

    fn account_of(&self, state: &EvmState) -> Account {
        match &state.connection {
            Some(connection) => Account {
                category: Category::Evm,
                status: state.status,
                addresses: Some(connection.accounts.clone()),
                chain_id: Some(connection.chain_id),
                connector: Some(self.connectors[connection.connector].info.name.clone()),
            },
            None => Account {
                status: state.status,
                ..Account::disconnected(Category::Evm)
            },
        }
    }

    /// Mutate state and publish the account change, if any.
    ///
    /// Listeners run after the lock is released.
    fn update<R>(&self, f: impl FnOnce(&mut EvmState) -> R) -> R {
        let (previous, current, out) = {
            let mut state = lock(&self.state);
            let previous = self.account_of(&state);
            let out = f(&mut state);
            (previous, self.account_of(&state), out)
        };
        if current != previous {
            debug!("EVM account {} -> {}", previous.status, current.status);
            self.listeners.notify(&current, &previous);
        }
        out
    }

    /// Undo a pending connect. The selected chain is left alone.
    fn restore(&self, (status, connection): (AccountStatus, Option<Connection>)) {
        self.update(|state| {
            state.status = status;
            state.connection = connection;
        });
    }

    /// Active connector and its first account
    fn active(&self) -> Result<(Arc<dyn EvmConnector>, String, u64), WalletError> {
        let state = lock(&self.state);
        let connection = match (&state.connection, state.status) {
            (Some(connection), AccountStatus::Connected) => connection,
            _ => return Err(WalletError::NotConnected),
        };
        let account = connection
            .accounts
            .first()
            .cloned()
            .ok_or(WalletError::NotConnected)?;
        Ok((
            self.connectors[connection.connector].connector.clone(),
            account,
            connection.chain_id,
        ))
    }
}

fn numeric(chain: &ChainIdOrName) -> Result<u64, ControllerError> {
    chain.as_id().ok_or_else(|| {
        ControllerError::InvariantViolation(format!("EVM chain {} has no numeric id", chain))
    })
}

#[async_trait]
impl WalletBackend for EvmAdapter {
    fn category(&self) -> Category {
        Category::Evm
    }

    fn connectors(&self) -> &[ConnectorInfo] {
        &self.infos
    }

    async fn connect(&self, wallet: &str) -> Result<ConnectResult, ControllerError> {
        let index = self
            .connector_index(wallet)
            .ok_or_else(|| ControllerError::WalletNotFound {
                category: Category::Evm,
                wallet: wallet.to_string(),
            })?;

        let (mut restore, chain_id, replaced) = self.update(|state| {
            if state.status == AccountStatus::Connecting {
                return Err(WalletError::ConnectInProgress);
            }
            let replaced = match &state.connection {
                Some(c) if c.connector == index => {
                    return Err(WalletError::AlreadyConnected(wallet.to_string()))
                }
                Some(c) => Some(c.connector),
                None => None,
            };
            let restore = (state.status, state.connection.clone());
            state.status = AccountStatus::Connecting;
            Ok((restore, state.chain_id, replaced))
        })?;

        // Only one EVM connector is active at a time.
        if let Some(previous) = replaced {
            let entry = &self.connectors[previous];
            if let Err(err) = entry.connector.disconnect().await {
                self.restore(restore);
                return Err(err.into());
            }
            info!("Disconnected {} before connecting {}", entry.info.name, wallet);
            self.update(|state| state.connection = None);
            restore = (AccountStatus::Disconnected, None);
        }

        let connector = self.connectors[index].connector.clone();
        let session = match connector.connect(chain_id).await {
            Ok(session) if session.accounts.is_empty() => Err(WalletError::Internal(format!(
                "{} returned no accounts",
                wallet
            ))),
            other => other,
        };

        match session {
            Ok(session) => {
                info!("Connected {} on chain {}", wallet, session.chain_id);
                self.update(|state| {
                    state.status = AccountStatus::Connected;
                    state.chain_id = Some(session.chain_id);
                    state.connection = Some(Connection {
                        connector: index,
                        accounts: session.accounts.clone(),
                        chain_id: session.chain_id,
                    });
                });
                Ok(ConnectResult {
                    accounts: session.accounts,
                    chain_id: Some(session.chain_id),
                })
            }
            Err(err) => {
                self.restore(restore);
                Err(err.into())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ControllerError> {
        let active = lock(&self.state)
            .connection
            .as_ref()
            .map(|connection| connection.connector);
        let Some(index) = active else {
            return Ok(());
        };

        self.connectors[index].connector.disconnect().await?;
        info!("Disconnected {}", self.connectors[index].info.name);
        self.update(|state| {
            state.status = AccountStatus::Disconnected;
            state.connection = None;
        });
        Ok(())
    }

    fn get_account(&self) -> Result<Account, ControllerError> {
        Ok(self.account_of(&lock(&self.state)))
    }

    fn get_chain_id(&self) -> Result<Option<ChainIdOrName>, ControllerError> {
        Ok(lock(&self.state).chain_id.map(ChainIdOrName::Id))
    }

    async fn switch_chain(&self, chain: &ChainIdOrName) -> Result<ChainIdOrName, ControllerError> {
        let chain_id = numeric(chain)?;
        if !self.transports.contains_key(&chain_id) {
            return Err(WalletError::ChainNotConfigured(chain_id).into());
        }

        if lock(&self.state).status == AccountStatus::Connecting {
            return Err(WalletError::ConnectInProgress.into());
        }

        let active = self.active().ok();
        let switched = match active {
            Some((connector, _, _)) => connector.switch_chain(chain_id).await?,
            None => chain_id,
        };

        self.update(|state| {
            state.chain_id = Some(switched);
            if let Some(connection) = state.connection.as_mut() {
                connection.chain_id = switched;
            }
        });
        Ok(ChainIdOrName::Id(switched))
    }

    async fn sign_message(&self, message: &SignableMessage) -> Result<String, ControllerError> {
        let (connector, account, _) = self.active()?;
        Ok(connector.sign_message(&account, message).await?)
    }

    async fn send_transaction(
        &self,
        chain: Option<&ChainIdOrName>,
        payload: &TransactionPayload,
    ) -> Result<String, ControllerError> {
        let TransactionPayload::Evm(request) = payload else {
            return Err(WalletError::InvalidPayload(
                "expected an EVM transaction request".to_string(),
            )
            .into());
        };
        let (connector, account, connected_chain) = self.active()?;

        if let Some(chain) = chain {
            let expected = numeric(chain)?;
            if expected != connected_chain {
                return Err(WalletError::ChainMismatch {
                    expected,
                    actual: connected_chain,
                }
                .into());
            }
        }
        let transport = self
            .transports
            .get(&connected_chain)
            .ok_or(WalletError::ChainNotConfigured(connected_chain))?;

        Ok(connector
            .send_transaction(&account, request, transport)
            .await?)
    }

    fn watch_account(&self, listener: AccountListener) -> Unwatch {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ConnectorHandle;
    use ethers_core::types::{Address, U256};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn base() -> ChainDescriptor {
        ChainDescriptor {
            name: "Base".to_string(),
            id: Some(ChainIdOrName::Id(8453)),
            rpc_url: "https://mainnet.base.org".to_string(),
            icon: None,
            category: Category::Evm,
        }
    }

    fn optimism() -> ChainDescriptor {
        ChainDescriptor {
            name: "OP Mainnet".to_string(),
            id: Some(ChainIdOrName::Id(10)),
            rpc_url: "https://mainnet.optimism.io".to_string(),
            icon: None,
            category: Category::Evm,
        }
    }

    fn adapter_with(mock: Arc<MockConnector>) -> EvmAdapter {
        let wallet = WalletDescriptor::new("MetaMask", ConnectorHandle::Evm(mock), &[Category::Evm]);
        EvmAdapter::new(&[base(), optimism()], &[wallet]).unwrap()
    }

    fn metamask() -> Arc<MockConnector> {
        Arc::new(MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]))
    }

    #[test]
    fn test_requires_numeric_chain_ids() {
        let mut chain = base();
        chain.id = Some(ChainIdOrName::from("base"));
        let wallet =
            WalletDescriptor::new("MetaMask", ConnectorHandle::Evm(metamask()), &[Category::Evm]);

        let err = EvmAdapter::new(&[chain], &[wallet.clone()]).err().unwrap();
        assert_eq!(
            err,
            ControllerError::InvalidChainId {
                chain: "Base".to_string()
            }
        );

        let mut chain = base();
        chain.id = None;
        assert!(matches!(
            EvmAdapter::new(&[chain], &[wallet]),
            Err(ControllerError::InvalidChainId { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_rpc_url_and_detached_wallets() {
        let mut chain = base();
        chain.rpc_url = "mainnet.base.org".to_string();
        assert!(matches!(
            EvmAdapter::new(&[chain], &[]),
            Err(ControllerError::InvalidRpcUrl { .. })
        ));

        let wallet = WalletDescriptor::new(
            "Phantom",
            ConnectorHandle::Detached {
                id: "phantom".to_string(),
            },
            &[Category::Evm],
        );
        assert!(matches!(
            EvmAdapter::new(&[base()], &[wallet]),
            Err(ControllerError::InvalidConnector { .. })
        ));
    }

    #[test]
    fn test_one_transport_per_chain() {
        let adapter = EvmAdapter::new(&[base(), optimism(), base()], &[]).unwrap();
        assert_eq!(adapter.chains(), &[8453, 10]);
        assert_eq!(adapter.transport(10).unwrap().chain_id(), 10);
        assert!(adapter.transport(1).is_none());
        assert_eq!(
            adapter.get_chain_id().unwrap(),
            Some(ChainIdOrName::Id(8453))
        );
    }

    #[tokio::test]
    async fn test_connect_lifecycle_notifies() {
        let mock = metamask();
        let adapter = adapter_with(mock.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let _watch = adapter.watch_account(Arc::new(move |current: &Account, previous: &Account| {
            log.lock().unwrap().push((previous.status, current.status));
        }));

        let result = assert_ok!(adapter.connect("MetaMask").await);
        assert_eq!(result.chain_id, Some(8453));
        assert_eq!(mock.calls(), vec![MockCall::Connect(Some(8453))]);

        let account = adapter.get_account().unwrap();
        assert!(account.is_connected());
        assert_eq!(account.address(), Some(DEFAULT_MOCK_ACCOUNT));
        assert_eq!(account.connector.as_deref(), Some("MetaMask"));

        assert_ok!(adapter.disconnect().await);
        assert_eq!(
            adapter.get_account().unwrap(),
            Account::disconnected(Category::Evm)
        );

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (AccountStatus::Disconnected, AccountStatus::Connecting),
                (AccountStatus::Connecting, AccountStatus::Connected),
                (AccountStatus::Connected, AccountStatus::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_connect_restores_state() {
        let mock = Arc::new(MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]).rejecting_connect());
        let adapter = adapter_with(mock);

        let err = assert_err!(adapter.connect("MetaMask").await);
        assert!(matches!(
            err,
            ControllerError::Backend(WalletError::UserRejected(_))
        ));
        assert_eq!(
            adapter.get_account().unwrap().status,
            AccountStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_connect_guards() {
        let adapter = adapter_with(metamask());
        assert_ok!(adapter.connect("MetaMask").await);

        assert_eq!(
            adapter.connect("MetaMask").await,
            Err(ControllerError::Backend(WalletError::AlreadyConnected(
                "MetaMask".to_string()
            )))
        );
        assert!(matches!(
            adapter.connect("Rabby").await,
            Err(ControllerError::WalletNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_in_progress_is_rejected() {
        let adapter = adapter_with(metamask());
        lock(&adapter.state).status = AccountStatus::Connecting;

        assert_eq!(
            adapter.connect("MetaMask").await,
            Err(ControllerError::Backend(WalletError::ConnectInProgress))
        );
    }

    #[tokio::test]
    async fn test_switch_chain() {
        let mock = metamask();
        let adapter = adapter_with(mock.clone());

        // Not connected: only the selected chain moves
        assert_eq!(
            adapter.switch_chain(&ChainIdOrName::Id(10)).await,
            Ok(ChainIdOrName::Id(10))
        );
        assert!(mock.calls().is_empty());

        adapter.connect("MetaMask").await.unwrap();
        assert_eq!(adapter.get_account().unwrap().chain_id, Some(10));

        assert_ok!(adapter.switch_chain(&ChainIdOrName::Id(8453)).await);
        assert_eq!(mock.calls().last(), Some(&MockCall::SwitchChain(8453)));
        assert_eq!(adapter.get_account().unwrap().chain_id, Some(8453));

        assert_eq!(
            adapter.switch_chain(&ChainIdOrName::Id(1)).await,
            Err(ControllerError::Backend(WalletError::ChainNotConfigured(1)))
        );
        assert!(matches!(
            adapter.switch_chain(&ChainIdOrName::from("base")).await,
            Err(ControllerError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_and_send_require_connection() {
        let adapter = adapter_with(metamask());
        let payload = TransactionPayload::Evm(crate::types::EvmTransactionRequest::transfer(
            Address::zero(),
            U256::one(),
        ));

        assert_eq!(
            adapter.sign_message(&"hi".into()).await,
            Err(ControllerError::Backend(WalletError::NotConnected))
        );
        assert_eq!(
            adapter.send_transaction(None, &payload).await,
            Err(ControllerError::Backend(WalletError::NotConnected))
        );

        adapter.connect("MetaMask").await.unwrap();
        assert_ok!(adapter.sign_message(&"hi".into()).await);
        assert_ok!(adapter.send_transaction(None, &payload).await);
        assert_ok!(
            adapter
                .send_transaction(Some(&ChainIdOrName::Id(8453)), &payload)
                .await
        );
        assert_eq!(
            adapter
                .send_transaction(Some(&ChainIdOrName::Id(10)), &payload)
                .await,
            Err(ControllerError::Backend(WalletError::ChainMismatch {
                expected: 10,
                actual: 8453
            }))
        );
        assert!(matches!(
            adapter
                .send_transaction(None, &TransactionPayload::Opaque(serde_json::json!({})))
                .await,
            Err(ControllerError::Backend(WalletError::InvalidPayload(_)))
        ));
    }

    #[tokio::test]
    async fn test_unwatched_listener_is_silent() {
        let adapter = adapter_with(metamask());
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handle = adapter.watch_account(Arc::new(move |_: &Account, _: &Account| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        handle.unwatch();
        adapter.connect("MetaMask").await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    fn two_wallets(first: Arc<MockConnector>, second: Arc<MockConnector>) -> EvmAdapter {
        let wallets = [
            WalletDescriptor::new("MetaMask", ConnectorHandle::Evm(first), &[Category::Evm]),
            WalletDescriptor::new("Rabby", ConnectorHandle::Evm(second), &[Category::Evm]),
        ];
        EvmAdapter::new(&[base(), optimism()], &wallets).unwrap()
    }

    #[tokio::test]
    async fn test_connecting_another_wallet_disconnects_the_first() {
        let metamask = metamask();
        let rabby = Arc::new(MockConnector::new(
            "Rabby",
            &["0x70997970C51812dc3A010C7d01b50e0d17dc79C8"],
        ));
        let adapter = two_wallets(metamask.clone(), rabby.clone());

        adapter.connect("MetaMask").await.unwrap();
        adapter.connect("Rabby").await.unwrap();

        assert_eq!(
            metamask.calls(),
            vec![MockCall::Connect(Some(8453)), MockCall::Disconnect]
        );
        let account = adapter.get_account().unwrap();
        assert_eq!(account.connector.as_deref(), Some("Rabby"));
        assert_eq!(
            account.address(),
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );

        assert_ok!(adapter.disconnect().await);
        assert_eq!(
            rabby.calls(),
            vec![MockCall::Connect(Some(8453)), MockCall::Disconnect]
        );
        assert_eq!(metamask.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_replacement_leaves_nothing_connected() {
        let metamask = metamask();
        let rabby =
            Arc::new(MockConnector::new("Rabby", &[DEFAULT_MOCK_ACCOUNT]).rejecting_connect());
        let adapter = two_wallets(metamask.clone(), rabby);
        adapter.connect("MetaMask").await.unwrap();

        assert!(matches!(
            adapter.connect("Rabby").await,
            Err(ControllerError::Backend(WalletError::UserRejected(_)))
        ));
        assert_eq!(
            adapter.get_account().unwrap(),
            Account::disconnected(Category::Evm)
        );
        assert_eq!(metamask.calls().last(), Some(&MockCall::Disconnect));
    }

    #[tokio::test]
    async fn test_switch_chain_rejected_while_connect_pending() {
        let mock = Arc::new(
            MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT])
                .pending_connect(5)
                .rejecting_connect(),
        );
        let adapter = adapter_with(mock);
        let optimism = ChainIdOrName::Id(10);

        let (connected, switched) =
            tokio::join!(adapter.connect("MetaMask"), adapter.switch_chain(&optimism));

        assert!(matches!(
            connected,
            Err(ControllerError::Backend(WalletError::UserRejected(_)))
        ));
        assert_eq!(
            switched,
            Err(ControllerError::Backend(WalletError::ConnectInProgress))
        );
        assert_eq!(
            adapter.get_chain_id().unwrap(),
            Some(ChainIdOrName::Id(8453))
        );
        assert_eq!(
            adapter.get_account().unwrap().status,
            AccountStatus::Disconnected
        );

        // Settled: the switch goes through and sticks
        assert_ok!(adapter.switch_chain(&optimism).await);
        assert_eq!(adapter.get_chain_id().unwrap(), Some(optimism));
    }

    #[tokio::test]
    async fn test_pending_connect_keeps_selected_chain() {
        let mock =
            Arc::new(MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]).pending_connect(3));
        let adapter = adapter_with(mock.clone());
        let optimism = ChainIdOrName::Id(10);

        let (connected, switched) =
            tokio::join!(adapter.connect("MetaMask"), adapter.switch_chain(&optimism));

        assert_eq!(assert_ok!(connected).chain_id, Some(8453));
        assert!(switched.is_err());
        assert_eq!(
            adapter.get_chain_id().unwrap(),
            Some(ChainIdOrName::Id(8453))
        );
        assert_eq!(mock.calls(), vec![MockCall::Connect(Some(8453))]);
    }
}
