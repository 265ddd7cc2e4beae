//! Configuration Management Module
//!
//! Loads the client configuration from TOML: receipt waiting and RPC retry settings,
//! the optional packet indexer, and one `[[chain]]` entry per supported chain.
//! Secrets (EVM private keys) are read from the environment variable a chain entry
//! names, never from the file itself.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::ChainFamily;
use crate::chains::{ReceiptWait, RetryPolicy};
use crate::registry::{ChainMetadata, NativeToken, UniversalChainId};

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZkgmConfig {
    /// Receipt waiting and RPC read retry settings
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Packet indexer (omit to stop the lifecycle stream at the receipt)
    #[serde(default)]
    pub indexer: Option<IndexerConfig>,
    /// Chains (use [[chain]] in TOML, one per chain)
    #[serde(default, rename = "chain")]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Delay between receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Local receipt wait budget in milliseconds (distinct from the on-chain packet timeout)
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Backoff for idempotent RPC reads
    #[serde(default)]
    pub rpc_retry: RetryPolicy,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            rpc_retry: RetryPolicy::default(),
        }
    }
}

impl TransferConfig {
    pub fn receipt_wait(&self) -> ReceiptWait {
        ReceiptWait {
            poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            timeout: Duration::from_millis(self.receipt_timeout_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// GraphQL endpoint (e.g., "https://graphql.union.build/v1/graphql")
    pub graphql_url: String,
    #[serde(default = "default_indexer_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Lookups before the stream gives up on the Indexed event
    #[serde(default = "default_indexer_max_attempts")]
    pub max_attempts: u32,
}

/// Chain entry. Use the `type` field to select the family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChainConfig {
    #[serde(rename = "evm")]
    Evm(EvmChainConfig),
    #[serde(rename = "cosmos")]
    Cosmos(CosmosChainConfig),
    #[serde(rename = "sui")]
    Sui(SuiChainConfig),
    #[serde(rename = "aptos")]
    Aptos(AptosChainConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmChainConfig {
    pub universal_chain_id: UniversalChainId,
    pub display_name: String,
    pub rpc_url: String,
    /// EIP-155 chain id (e.g., 11155111 for Sepolia)
    pub chain_id: u64,
    /// UCS03 zkgm contract address
    pub zkgm_contract: String,
    pub native_token: NativeToken,
    /// Environment variable name containing the EVM private key
    pub private_key_env: String,
    #[serde(default = "default_evm_gas_limit")]
    pub gas_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosChainConfig {
    pub universal_chain_id: UniversalChainId,
    pub display_name: String,
    /// LCD (REST) endpoint for queries and tx lookup
    pub lcd_url: String,
    /// Tendermint RPC endpoint passed to the daemon CLI as --node
    pub node_url: String,
    pub chain_id: String,
    pub address_prefix: Option<String>,
    pub zkgm_contract: String,
    pub native_token: NativeToken,
    /// Daemon CLI binary (e.g., "uniond")
    #[serde(default = "default_cosmos_cli")]
    pub cli_binary: String,
    /// Keyring key used to sign
    pub key_name: String,
    #[serde(default = "default_cosmos_gas_prices")]
    pub gas_prices: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiChainConfig {
    pub universal_chain_id: UniversalChainId,
    pub display_name: String,
    pub rpc_url: String,
    /// zkgm Move package id
    pub zkgm_contract: String,
    /// Shared relay store object passed to `zkgm::send`
    pub relay_store: String,
    pub native_token: NativeToken,
    #[serde(default = "default_sui_cli")]
    pub cli_binary: String,
    #[serde(default = "default_sui_gas_budget")]
    pub gas_budget: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AptosChainConfig {
    pub universal_chain_id: UniversalChainId,
    pub display_name: String,
    /// Fullnode REST endpoint, including /v1
    pub rest_url: String,
    /// Module address of the deployed ibc_app
    pub zkgm_contract: String,
    pub native_token: NativeToken,
    #[serde(default = "default_aptos_cli")]
    pub cli_binary: String,
    /// Aptos CLI profile name used to sign
    pub profile: String,
}

fn default_receipt_poll_interval_ms() -> u64 {
    2_000
}

fn default_receipt_timeout_ms() -> u64 {
    300_000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_indexer_poll_interval_ms() -> u64 {
    3_000
}

fn default_indexer_max_attempts() -> u32 {
    40
}

fn default_evm_gas_limit() -> u64 {
    2_000_000
}

fn default_cosmos_cli() -> String {
    "uniond".to_string()
}

fn default_cosmos_gas_prices() -> String {
    "0.025muno".to_string()
}

fn default_sui_cli() -> String {
    "sui".to_string()
}

fn default_sui_gas_budget() -> u64 {
    100_000_000
}

fn default_aptos_cli() -> String {
    "aptos".to_string()
}

// ============================================================================
// CHAIN ENTRY ACCESSORS
// ============================================================================

impl ChainConfig {
    pub fn universal_chain_id(&self) -> &UniversalChainId {
        match self {
            ChainConfig::Evm(cfg) => &cfg.universal_chain_id,
            ChainConfig::Cosmos(cfg) => &cfg.universal_chain_id,
            ChainConfig::Sui(cfg) => &cfg.universal_chain_id,
            ChainConfig::Aptos(cfg) => &cfg.universal_chain_id,
        }
    }

    pub fn family(&self) -> ChainFamily {
        match self {
            ChainConfig::Evm(_) => ChainFamily::Evm,
            ChainConfig::Cosmos(_) => ChainFamily::Cosmos,
            ChainConfig::Sui(_) => ChainFamily::Sui,
            ChainConfig::Aptos(_) => ChainFamily::Aptos,
        }
    }

    /// Registry view of this entry.
    pub fn metadata(&self) -> ChainMetadata {
        let (display_name, address_prefix, native_token, zkgm_contract) = match self {
            ChainConfig::Evm(cfg) => (&cfg.display_name, None, &cfg.native_token, &cfg.zkgm_contract),
            ChainConfig::Cosmos(cfg) => (
                &cfg.display_name,
                cfg.address_prefix.clone(),
                &cfg.native_token,
                &cfg.zkgm_contract,
            ),
            ChainConfig::Sui(cfg) => (&cfg.display_name, None, &cfg.native_token, &cfg.zkgm_contract),
            ChainConfig::Aptos(cfg) => (&cfg.display_name, None, &cfg.native_token, &cfg.zkgm_contract),
        };
        ChainMetadata {
            universal_chain_id: self.universal_chain_id().clone(),
            family: self.family(),
            display_name: display_name.clone(),
            address_prefix,
            native_token: native_token.clone(),
            zkgm_contract: zkgm_contract.clone(),
        }
    }
}

// ============================================================================
// LOADING AND VALIDATION
// ============================================================================

impl ZkgmConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Uses `path` if given, else `ZKGM_CONFIG_PATH`, else `config/zkgm.toml`.
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("ZKGM_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/zkgm.toml".to_string());

        if !std::path::Path::new(&config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/zkgm.template.toml config/zkgm.toml\n\
                Then edit config/zkgm.toml with your actual values.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: ZkgmConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn chain(&self, id: &UniversalChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.universal_chain_id() == id)
    }

    /// Validates the configuration for consistency.
    ///
    /// Checks:
    /// - Universal chain ids are unique
    /// - Cosmos chains carry a non-empty bech32 prefix
    /// - Poll intervals and retry attempts are non-zero
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.universal_chain_id()) {
                anyhow::bail!(
                    "Configuration error: Chain {} is configured more than once",
                    chain.universal_chain_id()
                );
            }
            if let ChainConfig::Cosmos(cfg) = chain {
                let has_prefix = cfg
                    .address_prefix
                    .as_deref()
                    .is_some_and(|p| !p.trim().is_empty());
                if !has_prefix {
                    anyhow::bail!(
                        "Configuration error: Cosmos chain {} has no address_prefix",
                        cfg.universal_chain_id
                    );
                }
            }
        }

        if self.transfer.receipt_poll_interval_ms == 0 {
            anyhow::bail!("Configuration error: transfer.receipt_poll_interval_ms must be > 0");
        }
        if self.transfer.rpc_retry.max_attempts == 0 {
            anyhow::bail!("Configuration error: transfer.rpc_retry.max_attempts must be > 0");
        }
        if let Some(indexer) = &self.indexer {
            if indexer.poll_interval_ms == 0 {
                anyhow::bail!("Configuration error: indexer.poll_interval_ms must be > 0");
            }
        }

        Ok(())
    }
}
