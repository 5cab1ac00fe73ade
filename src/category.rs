//! Chain categories and identifier resolution
//!
//! Every supported chain belongs to exactly one [`Category`]. Numeric chain
//! identifiers are EVM chain ids. Named chains only resolve when the
//! configuration binds them to a category explicitly.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ControllerError;
use crate::types::ChainDescriptor;

/// Blockchain family with its own connection backend
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Evm,
    Solana,
    Bitcoin,
    Starknet,
    Benfen,
}

impl Category {
    /// Every category, in declaration order
    pub const ALL: [Category; 5] = [
        Category::Evm,
        Category::Solana,
        Category::Bitcoin,
        Category::Starknet,
        Category::Benfen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Evm => "evm",
            Category::Solana => "solana",
            Category::Bitcoin => "bitcoin",
            Category::Starknet => "starknet",
            Category::Benfen => "benfen",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

/// A numeric chain id (EVM) or a chain name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainIdOrName {
    Id(u64),
    Name(String),
}

impl ChainIdOrName {
    pub fn as_id(&self) -> Option<u64> {
        match self {
            ChainIdOrName::Id(id) => Some(*id),
            ChainIdOrName::Name(_) => None,
        }
    }
}

impl fmt::Display for ChainIdOrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIdOrName::Id(id) => write!(f, "{}", id),
            ChainIdOrName::Name(name) => f.write_str(name),
        }
    }
}

/// Digits parse as an id, anything else as a name.
impl FromStr for ChainIdOrName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(id) => ChainIdOrName::Id(id),
            Err(_) => ChainIdOrName::Name(s.to_string()),
        })
    }
}

impl From<u64> for ChainIdOrName {
    fn from(id: u64) -> Self {
        ChainIdOrName::Id(id)
    }
}

impl From<&str> for ChainIdOrName {
    fn from(name: &str) -> Self {
        ChainIdOrName::Name(name.to_string())
    }
}

impl From<String> for ChainIdOrName {
    fn from(name: String) -> Self {
        ChainIdOrName::Name(name)
    }
}

/// Resolve the category of a chain with no configured bindings.
///
/// Numeric ids are always EVM; names never resolve.
pub fn category_of(chain: &ChainIdOrName) -> Result<Category, ControllerError> {
    match chain {
        ChainIdOrName::Id(_) => Ok(Category::Evm),
        ChainIdOrName::Name(_) => Err(ControllerError::unresolved(chain)),
    }
}

/// Identifier-to-category rule plus explicit bindings for named chains
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    named: HashMap<String, Category>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every named chain in the configuration to its category
    pub fn from_chains(chains: &[ChainDescriptor]) -> Self {
        let mut registry = Self::new();
        for chain in chains {
            if let Some(ChainIdOrName::Name(name)) = &chain.id {
                registry.bind(name, chain.category);
            }
        }
        registry
    }

    /// Bind a chain name. The first binding of a name wins.
    pub fn bind(&mut self, name: &str, category: Category) -> bool {
        match self.named.get(name) {
            Some(existing) if *existing != category => {
                warn!(
                    "Chain name {} already bound to {}, ignoring {}",
                    name, existing, category
                );
                false
            }
            Some(_) => false,
            None => {
                self.named.insert(name.to_string(), category);
                true
            }
        }
    }

    pub fn category_of(&self, chain: &ChainIdOrName) -> Result<Category, ControllerError> {
        match chain {
            ChainIdOrName::Id(_) => Ok(Category::Evm),
            ChainIdOrName::Name(name) => self
                .named
                .get(name)
                .copied()
                .ok_or_else(|| ControllerError::unresolved(chain)),
        }
    }

    pub fn len(&self) -> usize {
        self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named.is_empty()
    }
}
