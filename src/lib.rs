//! omniconnect - one wallet API across chain families
//!
//! A [`Controller`] groups configured chains and wallets by [`Category`] and
//! routes connect, sign and send calls to the backend of that category.

pub mod backend;
pub mod category;
pub mod config;
pub mod controller;
pub mod error;
pub mod types;
pub mod wallet;
pub mod watch;

pub use backend::{Backend, ConnectorHandle, WalletBackend};
pub use category::{category_of, Category, CategoryRegistry, ChainIdOrName};
pub use config::{ConfigError, ConfigFile};
pub use controller::{Controller, CreateConfigParameters, Target};
pub use error::ControllerError;
pub use types::{
    Account, AccountStatus, ChainDescriptor, ConnectResult, ConnectorInfo, EvmTransactionRequest,
    SignableMessage, TransactionPayload, WalletDescriptor,
};
pub use wallet::WalletError;
pub use watch::{AccountChange, AccountChangeStream, AccountWatch, Unwatch};
