//! Chain Registry
//!
//! Maps universal chain ids (`<network>.<chain-id>`) to chain metadata.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::address::{AddressCodec, ChainFamily};
use crate::config::{ChainConfig, ZkgmConfig};
use crate::error::{AddressError, RegistryError};
use crate::token::TokenMetadata;

/// Globally unique chain identifier, e.g. `ethereum.11155111` or `union.union-testnet-10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UniversalChainId(String);

impl UniversalChainId {
    pub fn parse(id: &str) -> Result<Self, RegistryError> {
        match id.split_once('.') {
            Some((network, chain_id)) if !network.is_empty() && !chain_id.is_empty() => {
                Ok(Self(id.to_string()))
            }
            _ => Err(RegistryError::InvalidId(id.to_string())),
        }
    }

    pub fn network(&self) -> &str {
        self.0.split_once('.').map(|(n, _)| n).unwrap_or(&self.0)
    }

    /// The chain-native id after the network prefix.
    pub fn chain_id(&self) -> &str {
        self.0.split_once('.').map(|(_, c)| c).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniversalChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UniversalChainId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UniversalChainId {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<UniversalChainId> for String {
    fn from(id: UniversalChainId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeToken {
    pub denom: String,
    #[serde(flatten)]
    pub metadata: TokenMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub universal_chain_id: UniversalChainId,
    pub family: ChainFamily,
    pub display_name: String,
    /// Bech32 prefix, Cosmos only
    pub address_prefix: Option<String>,
    pub native_token: NativeToken,
    /// UCS03 zkgm contract (EVM/Cosmos address, Move package or Sui object)
    pub zkgm_contract: String,
}

impl ChainMetadata {
    pub fn address_codec(&self) -> Result<AddressCodec, AddressError> {
        match self.family {
            ChainFamily::Evm => Ok(AddressCodec::Evm),
            ChainFamily::Cosmos => {
                let prefix = self
                    .address_prefix
                    .clone()
                    .ok_or_else(|| AddressError::MissingPrefix(self.universal_chain_id.to_string()))?;
                Ok(AddressCodec::Cosmos { prefix })
            }
            ChainFamily::Sui => Ok(AddressCodec::Sui),
            ChainFamily::Aptos => Ok(AddressCodec::Aptos),
        }
    }
}

pub trait ChainRegistry: Send + Sync {
    fn lookup(&self, id: &UniversalChainId) -> Result<ChainMetadata, RegistryError>;
}

/// Registry over a fixed chain list, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticChainRegistry {
    chains: HashMap<UniversalChainId, ChainMetadata>,
}

impl StaticChainRegistry {
    pub fn new(chains: impl IntoIterator<Item = ChainMetadata>) -> Self {
        Self {
            chains: chains
                .into_iter()
                .map(|meta| (meta.universal_chain_id.clone(), meta))
                .collect(),
        }
    }

    pub fn from_config(config: &ZkgmConfig) -> Self {
        Self::new(config.chains.iter().map(ChainConfig::metadata))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl ChainRegistry for StaticChainRegistry {
    fn lookup(&self, id: &UniversalChainId) -> Result<ChainMetadata, RegistryError> {
        self.chains
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }
}
