//! JSON configuration files
//!
//! Wallets in a file name a connector kind instead of carrying a live handle;
//! [`ConfigFile::into_parameters`] builds the handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::backend::evm::{
    connector_id, LocalKeyConnector, MockConnector, DEFAULT_MOCK_ACCOUNT, DEFAULT_MOCK_CHAIN_ID,
};
use crate::backend::ConnectorHandle;
use crate::category::Category;
use crate::controller::CreateConfigParameters;
use crate::types::{ChainDescriptor, WalletDescriptor};
use crate::wallet::{EvmWallet, WalletError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Requests a mock wallet rejects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockRejection {
    Connect,
    Signatures,
    All,
}

/// How to build a wallet's connector
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectorSpec {
    /// In-memory EVM wallet
    Mock {
        #[serde(default)]
        accounts: Vec<String>,
        #[serde(default)]
        reject: Option<MockRejection>,
    },
    /// EVM key read from an environment variable
    PrivateKey {
        env: String,
        #[serde(default)]
        chain_id: Option<u64>,
    },
    /// Listed but not connectable
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WalletEntry {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub categories: Vec<Category>,
    pub connector: ConnectorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub chains: Vec<ChainDescriptor>,
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {:?}", path);
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build controller parameters, reading keys from the environment
    pub fn into_parameters(self) -> Result<CreateConfigParameters, ConfigError> {
        self.into_parameters_with(|name| std::env::var(name).ok())
    }

    /// Build controller parameters with a custom environment lookup
    pub fn into_parameters_with(
        self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<CreateConfigParameters, ConfigError> {
        let wallets = self
            .wallets
            .into_iter()
            .map(|entry| {
                let connector = build_connector(&entry.name, &entry.connector, &env)?;
                Ok(WalletDescriptor {
                    name: entry.name,
                    icon: entry.icon,
                    connector,
                    categories: entry.categories,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(CreateConfigParameters {
            chains: self.chains,
            wallets,
        })
    }
}

fn build_connector(
    name: &str,
    spec: &ConnectorSpec,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<ConnectorHandle, ConfigError> {
    Ok(match spec {
        ConnectorSpec::Mock { accounts, reject } => {
            let accounts: Vec<&str> = if accounts.is_empty() {
                vec![DEFAULT_MOCK_ACCOUNT]
            } else {
                accounts.iter().map(String::as_str).collect()
            };
            let mut mock = MockConnector::new(name, &accounts);
            if matches!(reject, Some(MockRejection::Connect | MockRejection::All)) {
                mock = mock.rejecting_connect();
            }
            if matches!(reject, Some(MockRejection::Signatures | MockRejection::All)) {
                mock = mock.rejecting_signatures();
            }
            ConnectorHandle::Evm(Arc::new(mock))
        }
        ConnectorSpec::PrivateKey { env: var, chain_id } => {
            let key = env(var.as_str()).ok_or_else(|| ConfigError::MissingEnv(var.clone()))?;
            let wallet =
                EvmWallet::from_private_key(&key, chain_id.unwrap_or(DEFAULT_MOCK_CHAIN_ID))?;
            ConnectorHandle::Evm(Arc::new(LocalKeyConnector::new(name, wallet)))
        }
        ConnectorSpec::Detached => ConnectorHandle::Detached {
            id: connector_id(name),
        },
    })
}
