//! Private-key EVM connector
//!
//! Signs locally with an [`EvmWallet`] and talks to the chain through the
//! adapter's JSON-RPC transport.

use std::sync::Mutex;

use async_trait::async_trait;
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::TransactionRequest;
use tracing::info;

use super::connector::{connector_id, EvmConnector, EvmSession};
use super::transport::HttpTransport;
use crate::types::{EvmTransactionRequest, SignableMessage};
use crate::wallet::{EvmWallet, WalletError};
use crate::watch::lock;

/// Connector backed by a private key held in memory
#[derive(Debug)]
pub struct LocalKeyConnector {
    id: String,
    name: String,
    wallet: EvmWallet,
    chain_id: Mutex<Option<u64>>,
}

impl LocalKeyConnector {
    pub fn new(name: &str, wallet: EvmWallet) -> Self {
        Self {
            id: connector_id(name),
            name: name.to_string(),
            wallet,
            chain_id: Mutex::new(None),
        }
    }

    pub fn address(&self) -> String {
        self.wallet.address_string()
    }

    fn check_account(&self, account: &str) -> Result<(), WalletError> {
        if lock(&self.chain_id).is_none() {
            return Err(WalletError::NotConnected);
        }
        if !account.eq_ignore_ascii_case(&self.address()) {
            return Err(WalletError::InvalidAddress(format!(
                "{} is not controlled by {}",
                account, self.name
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EvmConnector for LocalKeyConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, chain_id: Option<u64>) -> Result<EvmSession, WalletError> {
        let chain_id = chain_id.unwrap_or_else(|| self.wallet.chain_id());
        *lock(&self.chain_id) = Some(chain_id);
        Ok(EvmSession {
            accounts: vec![self.address()],
            chain_id,
        })
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        *lock(&self.chain_id) = None;
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<u64, WalletError> {
        let mut current = lock(&self.chain_id);
        if current.is_none() {
            return Err(WalletError::NotConnected);
        }
        *current = Some(chain_id);
        Ok(chain_id)
    }

    async fn sign_message(
        &self,
        account: &str,
        message: &SignableMessage,
    ) -> Result<String, WalletError> {
        self.check_account(account)?;
        let signature = self.wallet.sign_message(message.as_bytes()).await?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    async fn send_transaction(
        &self,
        account: &str,
        request: &EvmTransactionRequest,
        transport: &HttpTransport,
    ) -> Result<String, WalletError> {
        self.check_account(account)?;
        let from = self.wallet.address();

        let nonce = transport.transaction_count(from).await?;
        let gas_price = transport.gas_price().await?;

        let mut tx = TransactionRequest::new()
            .from(from)
            .to(request.to)
            .value(request.value)
            .nonce(nonce)
            .gas_price(gas_price)
            .chain_id(transport.chain_id());
        if let Some(data) = &request.data {
            tx = tx.data(data.clone());
        }
        let gas = match request.gas {
            Some(gas) => gas,
            None => transport.estimate_gas(&tx).await?,
        };
        let tx: TypedTransaction = tx.gas(gas).into();

        let signature = self.wallet.sign_transaction(&tx)?;
        let hash = transport.send_raw_transaction(&tx.rlp_signed(&signature)).await?;
        info!("{} submitted {} on chain {}", self.name, hash, transport.chain_id());
        Ok(hash)
    }
}
