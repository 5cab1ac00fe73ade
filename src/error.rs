//! Controller Error Types
//!
//! Every failure the controller can surface. Backend-native errors are
//! carried transparently so callers see exactly what the wallet reported.

use crate::category::{Category, ChainIdOrName};
use crate::wallet::WalletError;

/// Errors returned by controller operations and backend construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// A chain identifier could not be mapped to a category
    #[error("Unknown chain {0}: cannot determine its category")]
    UnresolvedCategory(String),

    /// The category was never configured
    #[error("No backend configured for {0}")]
    NoBackendForCategory(Category),

    /// No connector with that name exists in the category
    #[error("Can't find connector {wallet} for {category}")]
    WalletNotFound { category: Category, wallet: String },

    /// A configured chain lacks the id its category requires
    #[error("Chain {chain} has no numeric chain id")]
    InvalidChainId { chain: String },

    /// The category's backend is a stub
    #[error("{operation} is not implemented for {category}")]
    NotImplemented {
        category: Category,
        operation: &'static str,
    },

    /// Internal consistency check failed
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Neither a category nor a chain was given
    #[error("Must specify chain or category")]
    MissingTarget,

    /// A chain's RPC endpoint could not be bound
    #[error("Invalid RPC url for chain {chain}: {reason}")]
    InvalidRpcUrl { chain: String, reason: String },

    /// A wallet's connector handle does not fit the category's backend
    #[error("Wallet {wallet} has no {category} connector")]
    InvalidConnector { wallet: String, category: Category },

    /// Two wallets of one category share a name
    #[error("Duplicate wallet {wallet} for {category}")]
    DuplicateWallet { category: Category, wallet: String },

    /// Error reported by the backend itself
    #[error(transparent)]
    Backend(#[from] WalletError),
}

impl ControllerError {
    pub(crate) fn not_implemented(category: Category, operation: &'static str) -> Self {
        ControllerError::NotImplemented {
            category,
            operation,
        }
    }

    pub(crate) fn unresolved(chain: &ChainIdOrName) -> Self {
        ControllerError::UnresolvedCategory(chain.to_string())
    }
}
