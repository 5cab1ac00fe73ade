//! JSON-RPC transport bound to one EVM chain

use std::sync::atomic::{AtomicU64, Ordering};

use ethers_core::types::{Address, Bytes, TransactionRequest, U256};
use ethers_core::utils::to_checksum;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wallet::WalletError;

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC endpoint of one chain
#[derive(Debug)]
pub struct HttpTransport {
    chain_id: u64,
    url: Url,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Bind `rpc_url` to `chain_id`. Only http(s) endpoints are accepted.
    pub fn new(chain_id: u64, rpc_url: &str) -> Result<Self, String> {
        let url = Url::parse(rpc_url).map_err(|e| e.to_string())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme {}", url.scheme()));
        }

        Ok(Self {
            chain_id,
            url,
            client: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Perform one JSON-RPC call
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, WalletError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("RPC {} -> {} (chain {})", method, self.url, self.chain_id);

        let response: RpcResponse<R> = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(WalletError::Rpc(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        response
            .result
            .ok_or_else(|| WalletError::Rpc(format!("{} returned no result", method)))
    }

    pub async fn transaction_count(&self, address: Address) -> Result<U256, WalletError> {
        self.request(
            "eth_getTransactionCount",
            (to_checksum(&address, None), "pending"),
        )
        .await
    }

    pub async fn gas_price(&self) -> Result<U256, WalletError> {
        self.request("eth_gasPrice", [(); 0]).await
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<U256, WalletError> {
        self.request("eth_estimateGas", [tx]).await
    }

    /// Broadcast a signed transaction, returning its hash
    pub async fn send_raw_transaction(&self, raw: &Bytes) -> Result<String, WalletError> {
        self.request("eth_sendRawTransaction", [raw]).await
    }
}
