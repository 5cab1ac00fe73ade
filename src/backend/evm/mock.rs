//! In-memory EVM connector
//!
//! Behaves like a wallet that approves (or rejects) everything instantly.
//! Signatures and transaction hashes are deterministic. Every call is
//! recorded so callers can check what reached the wallet.

use std::sync::Mutex;

use async_trait::async_trait;
use ethers_core::utils::keccak256;

use super::connector::{connector_id, EvmConnector, EvmSession};
use super::transport::HttpTransport;
use crate::types::{EvmTransactionRequest, SignableMessage};
use crate::wallet::WalletError;
use crate::watch::lock;

/// Account handed out when none are configured
pub const DEFAULT_MOCK_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Chain a mock wallet starts on when none is requested
pub const DEFAULT_MOCK_CHAIN_ID: u64 = 1;

/// A call that reached the mock wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect(Option<u64>),
    Disconnect,
    SwitchChain(u64),
    SignMessage { account: String, message: Vec<u8> },
    SendTransaction { account: String, chain_id: u64 },
}

#[derive(Debug, Default)]
struct MockState {
    chain_id: Option<u64>,
    sent: u64,
    calls: Vec<MockCall>,
}

/// Deterministic in-memory wallet
#[derive(Debug)]
pub struct MockConnector {
    id: String,
    name: String,
    accounts: Vec<String>,
    reject_connect: bool,
    reject_signatures: bool,
    connect_yields: usize,
    state: Mutex<MockState>,
}

impl MockConnector {
    pub fn new(name: &str, accounts: &[&str]) -> Self {
        Self {
            id: connector_id(name),
            name: name.to_string(),
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            reject_connect: false,
            reject_signatures: false,
            connect_yields: 0,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Reject every connect request as if the user dismissed the prompt
    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    /// Reject every signature and transaction request
    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signatures = true;
        self
    }

    /// Keep connect requests pending for `yields` scheduler turns, like an
    /// open wallet prompt
    pub fn pending_connect(mut self, yields: usize) -> Self {
        self.connect_yields = yields;
        self
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.state).calls.clone()
    }

    fn record(&self, call: MockCall) {
        lock(&self.state).calls.push(call);
    }

    fn connected_chain(&self) -> Result<u64, WalletError> {
        lock(&self.state).chain_id.ok_or(WalletError::NotConnected)
    }
}

#[async_trait]
impl EvmConnector for MockConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, chain_id: Option<u64>) -> Result<EvmSession, WalletError> {
        self.record(MockCall::Connect(chain_id));
        for _ in 0..self.connect_yields {
            tokio::task::yield_now().await;
        }
        if self.reject_connect {
            return Err(WalletError::UserRejected(format!(
                "{} connection request rejected",
                self.name
            )));
        }

        let chain_id = chain_id.unwrap_or(DEFAULT_MOCK_CHAIN_ID);
        lock(&self.state).chain_id = Some(chain_id);
        Ok(EvmSession {
            accounts: self.accounts.clone(),
            chain_id,
        })
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        let mut state = lock(&self.state);
        state.calls.push(MockCall::Disconnect);
        state.chain_id = None;
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<u64, WalletError> {
        self.record(MockCall::SwitchChain(chain_id));
        let mut state = lock(&self.state);
        if state.chain_id.is_none() {
            return Err(WalletError::NotConnected);
        }
        state.chain_id = Some(chain_id);
        Ok(chain_id)
    }

    async fn sign_message(
        &self,
        account: &str,
        message: &SignableMessage,
    ) -> Result<String, WalletError> {
        self.record(MockCall::SignMessage {
            account: account.to_string(),
            message: message.as_bytes().to_vec(),
        });
        self.connected_chain()?;
        if self.reject_signatures {
            return Err(WalletError::UserRejected("signature request rejected".to_string()));
        }

        let mut preimage = account.to_lowercase().into_bytes();
        preimage.extend_from_slice(message.as_bytes());
        let digest = keccak256(&preimage);

        let mut signature = Vec::with_capacity(65);
        signature.extend_from_slice(&digest);
        signature.extend_from_slice(&keccak256(digest));
        signature.push(27);
        Ok(format!("0x{}", hex::encode(signature)))
    }

    async fn send_transaction(
        &self,
        account: &str,
        request: &EvmTransactionRequest,
        transport: &HttpTransport,
    ) -> Result<String, WalletError> {
        let chain_id = transport.chain_id();
        self.record(MockCall::SendTransaction {
            account: account.to_string(),
            chain_id,
        });
        self.connected_chain()?;
        if self.reject_signatures {
            return Err(WalletError::UserRejected("transaction rejected".to_string()));
        }

        let nonce = {
            let mut state = lock(&self.state);
            state.sent += 1;
            state.sent
        };
        let preimage = format!(
            "{}:{}:{:?}:{}:{}",
            chain_id, account, request.to, request.value, nonce
        );
        Ok(format!("0x{}", hex::encode(keccak256(preimage.as_bytes()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers_core::types::{Address, U256};

    fn transport() -> HttpTransport {
        HttpTransport::new(8453, "https://mainnet.base.org").unwrap()
    }

    #[tokio::test]
    async fn test_connect_uses_requested_chain() {
        let mock = MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]);

        let session = mock.connect(Some(8453)).await.unwrap();
        assert_eq!(session.chain_id, 8453);
        assert_eq!(session.accounts, vec![DEFAULT_MOCK_ACCOUNT.to_string()]);

        let session = mock.connect(None).await.unwrap();
        assert_eq!(session.chain_id, DEFAULT_MOCK_CHAIN_ID);
        assert_eq!(mock.calls(), vec![MockCall::Connect(Some(8453)), MockCall::Connect(None)]);
    }

    #[tokio::test]
    async fn test_rejecting_connect() {
        let mock = MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]).rejecting_connect();
        let err = mock.connect(Some(1)).await.unwrap_err();
        assert!(matches!(err, WalletError::UserRejected(_)));
    }

    #[tokio::test]
    async fn test_signatures_are_deterministic() {
        let mock = MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]);
        mock.connect(None).await.unwrap();

        let message = SignableMessage::from("hello");
        let first = mock.sign_message(DEFAULT_MOCK_ACCOUNT, &message).await.unwrap();
        let second = mock.sign_message(DEFAULT_MOCK_ACCOUNT, &message).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2 + 65 * 2);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let mock = MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]);
        let err = mock
            .sign_message(DEFAULT_MOCK_ACCOUNT, &"hello".into())
            .await
            .unwrap_err();
        assert_eq!(err, WalletError::NotConnected);
        assert_eq!(mock.switch_chain(10).await, Err(WalletError::NotConnected));
    }

    #[tokio::test]
    async fn test_transaction_hashes_differ_per_send() {
        let mock = MockConnector::new("MetaMask", &[DEFAULT_MOCK_ACCOUNT]);
        mock.connect(Some(8453)).await.unwrap();
        let request = EvmTransactionRequest::transfer(Address::zero(), U256::from(1u64));

        let first = mock
            .send_transaction(DEFAULT_MOCK_ACCOUNT, &request, &transport())
            .await
            .unwrap();
        let second = mock
            .send_transaction(DEFAULT_MOCK_ACCOUNT, &request, &transport())
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(mock.calls().contains(&MockCall::SendTransaction {
            account: DEFAULT_MOCK_ACCOUNT.to_string(),
            chain_id: 8453
        }));
    }
}
