//! EVM Wallet Implementation
//!
//! Key-backed wallet for EVM-compatible chains using ethers-rs.

use ethers_core::types::{transaction::eip2718::TypedTransaction, Address, Signature};
use ethers_core::utils::to_checksum;
use ethers_signers::{LocalWallet, Signer};

use super::WalletError;

/// EVM wallet holding a private key
pub struct EvmWallet {
    /// The underlying wallet (private key)
    wallet: LocalWallet,
    /// Chain the wallet signs for unless told otherwise
    chain_id: u64,
}

impl EvmWallet {
    /// Create a new wallet from a private key (hex string, with or without 0x prefix)
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self, WalletError> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let wallet: LocalWallet = key
            .parse()
            .map_err(|e| WalletError::InvalidPrivateKey(format!("{}", e)))?;

        Ok(Self {
            wallet: wallet.with_chain_id(chain_id),
            chain_id,
        })
    }

    /// Get the wallet address
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Get the EIP-55 checksummed address
    pub fn address_string(&self) -> String {
        to_checksum(&self.wallet.address(), None)
    }

    /// Get the default chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a message (personal_sign / EIP-191 format)
    pub async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        self.wallet
            .sign_message(message)
            .await
            .map_err(|e| WalletError::SigningFailed(format!("{}", e)))
    }

    /// Sign a fully populated transaction.
    ///
    /// The transaction's own chain id is used for replay protection.
    pub fn sign_transaction(&self, tx: &TypedTransaction) -> Result<Signature, WalletError> {
        self.wallet
            .sign_transaction_sync(tx)
            .map_err(|e| WalletError::SigningFailed(format!("{}", e)))
    }
}

impl std::fmt::Debug for EvmWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmWallet")
            .field("address", &self.address_string())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
