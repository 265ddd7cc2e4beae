//! Shared test helpers for zkgm client tests
//!
//! This module provides constants and helper functions used across the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use zkgm_client::address::ChainFamily;
use zkgm_client::chains::{ChainReceipt, ReceiptPoller, ReceiptWait, Tracking};
use zkgm_client::error::TransportError;
use zkgm_client::registry::{ChainMetadata, NativeToken, UniversalChainId};
use zkgm_client::token::TokenMetadata;

// ============================================================================
// CONSTANTS
// ============================================================================

// --------------------------------- CHAINS ---------------------------------

/// Dummy EVM universal chain id (Sepolia)
pub const DUMMY_EVM_CHAIN: &str = "ethereum.11155111";

/// EIP-155 chain id matching DUMMY_EVM_CHAIN
pub const DUMMY_EVM_CHAIN_ID: u64 = 11155111;

/// Dummy Cosmos universal chain id
pub const DUMMY_COSMOS_CHAIN: &str = "union.union-testnet-10";

/// Cosmos chain id matching DUMMY_COSMOS_CHAIN
pub const DUMMY_COSMOS_CHAIN_ID: &str = "union-testnet-10";

/// Bech32 prefix of DUMMY_COSMOS_CHAIN
pub const DUMMY_COSMOS_PREFIX: &str = "union";

/// Dummy Sui universal chain id (chain identifier 4c78adac)
pub const DUMMY_SUI_CHAIN: &str = "sui.4c78adac";

/// Dummy Aptos universal chain id (chain id 2)
pub const DUMMY_APTOS_CHAIN: &str = "aptos.2";

// -------------------------------- USERS ---------------------------------

/// Dummy sender address (EVM format, 40 hex characters)
pub const DUMMY_SENDER_ADDR_EVM: &str = "0x0000000000000000000000000000000000000006";

/// Dummy receiver address (EVM format, 40 hex characters)
pub const DUMMY_RECEIVER_ADDR_EVM: &str = "0x0000000000000000000000000000000000000009";

/// Bech32 address over 20 bytes of 0x11
pub const DUMMY_SENDER_ADDR_COSMOS: &str = "union1zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3t2k2u7";

/// Bech32 address over 20 bytes of 0x22
pub const DUMMY_RECEIVER_ADDR_COSMOS: &str = "union1yg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyhnv5f";

/// The bytes behind DUMMY_SENDER_ADDR_COSMOS, re-encoded with the `cosmos` prefix
pub const DUMMY_SENDER_ADDR_COSMOS_HUB: &str = "cosmos1zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3pahzj0";

/// Dummy sender address (Move format, 64 hex characters)
pub const DUMMY_SENDER_ADDR_MOVE: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000004";

/// Dummy receiver address (Move format, 64 hex characters)
pub const DUMMY_RECEIVER_ADDR_MOVE: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000005";

// ------------------------- TOKENS AND CONTRACTS -------------------------

/// Dummy ERC-20 token address (EVM format, 40 hex characters)
pub const DUMMY_TOKEN_ADDR_EVM: &str = "0x000000000000000000000000000000000000000a";

/// Dummy zkgm contract address (EVM format, 40 hex characters)
pub const DUMMY_ZKGM_CONTRACT_EVM: &str = "0x000000000000000000000000000000000000000e";

/// Bech32 contract address over 32 bytes of 0x33 (used as the zkgm contract)
pub const DUMMY_ZKGM_CONTRACT_COSMOS: &str =
    "union1xvenxvenxvenxvenxvenxvenxvenxvenxvenxvenxvenxvenxvescnrt0j";

/// Bech32 contract address over 32 bytes of 0x44 (used as a cw20 token)
pub const DUMMY_CW20_ADDR_COSMOS: &str =
    "union1g3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zyg3zqdhdgnv";

/// Dummy zkgm package / module address (Move format, 64 hex characters)
pub const DUMMY_ZKGM_CONTRACT_MOVE: &str =
    "0x000000000000000000000000000000000000000000000000000000000000000e";

/// Dummy Sui relay store object id
pub const DUMMY_RELAY_STORE_SUI: &str =
    "0x000000000000000000000000000000000000000000000000000000000000000f";

/// Dummy coin type on Sui
pub const DUMMY_COIN_TYPE_SUI: &str =
    "0x000000000000000000000000000000000000000000000000000000000000000a::usdc::USDC";

// ------------------------------ TRANSACTIONS ------------------------------

/// Dummy transaction hash (64 hex characters)
pub const DUMMY_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000011";

/// Dummy packet hash (64 hex characters)
pub const DUMMY_PACKET_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000012";

/// Dummy Hardhat account #0 private key (never holds real funds)
pub const DUMMY_EVM_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

// ============================================================================
// CHAIN METADATA
// ============================================================================

fn native(denom: &str, name: &str, symbol: &str, decimals: u8) -> NativeToken {
    NativeToken {
        denom: denom.to_string(),
        metadata: TokenMetadata {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        },
    }
}

pub fn evm_chain() -> ChainMetadata {
    ChainMetadata {
        universal_chain_id: UniversalChainId::parse(DUMMY_EVM_CHAIN).unwrap(),
        family: ChainFamily::Evm,
        display_name: "Sepolia".to_string(),
        address_prefix: None,
        native_token: native("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee", "Ether", "ETH", 18),
        zkgm_contract: DUMMY_ZKGM_CONTRACT_EVM.to_string(),
    }
}

pub fn cosmos_chain() -> ChainMetadata {
    ChainMetadata {
        universal_chain_id: UniversalChainId::parse(DUMMY_COSMOS_CHAIN).unwrap(),
        family: ChainFamily::Cosmos,
        display_name: "Union Testnet".to_string(),
        address_prefix: Some(DUMMY_COSMOS_PREFIX.to_string()),
        native_token: native("muno", "Union", "UNO", 6),
        zkgm_contract: DUMMY_ZKGM_CONTRACT_COSMOS.to_string(),
    }
}

pub fn sui_chain() -> ChainMetadata {
    ChainMetadata {
        universal_chain_id: UniversalChainId::parse(DUMMY_SUI_CHAIN).unwrap(),
        family: ChainFamily::Sui,
        display_name: "Sui Testnet".to_string(),
        address_prefix: None,
        native_token: native("0x2::sui::SUI", "Sui", "SUI", 9),
        zkgm_contract: DUMMY_ZKGM_CONTRACT_MOVE.to_string(),
    }
}

pub fn aptos_chain() -> ChainMetadata {
    ChainMetadata {
        universal_chain_id: UniversalChainId::parse(DUMMY_APTOS_CHAIN).unwrap(),
        family: ChainFamily::Aptos,
        display_name: "Aptos Testnet".to_string(),
        address_prefix: None,
        native_token: native("0x1::aptos_coin::AptosCoin", "Aptos Coin", "APT", 8),
        zkgm_contract: DUMMY_ZKGM_CONTRACT_MOVE.to_string(),
    }
}

// ============================================================================
// RECEIPTS
// ============================================================================

/// Receipt wait short enough for tests.
pub fn fast_receipt_wait() -> ReceiptWait {
    ReceiptWait {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_millis(200),
    }
}

/// Poller that replays a scripted sequence, repeating the last entry once exhausted.
pub struct ScriptedReceipts {
    script: Mutex<VecDeque<Option<ChainReceipt>>>,
    last: Mutex<Option<ChainReceipt>>,
}

impl ScriptedReceipts {
    pub fn new(script: Vec<Option<ChainReceipt>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }

    /// Included and successful on the first poll.
    pub fn confirmed(block_height: u64) -> Self {
        Self::new(vec![Some(success_receipt(block_height))])
    }
}

#[async_trait]
impl ReceiptPoller for ScriptedReceipts {
    async fn poll_receipt(&self, _tx_hash: &str) -> Result<Option<ChainReceipt>, TransportError> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(entry) => {
                *self.last.lock().unwrap() = entry.clone();
                Ok(entry)
            }
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

pub fn success_receipt(block_height: u64) -> ChainReceipt {
    ChainReceipt {
        success: true,
        block_height: Some(block_height),
        reason: None,
    }
}

pub fn reverted_receipt(reason: &str) -> ChainReceipt {
    ChainReceipt {
        success: false,
        block_height: Some(1),
        reason: Some(reason.to_string()),
    }
}

/// Tracking over a scripted poller.
pub fn scripted_tracking(poller: ScriptedReceipts) -> Tracking {
    Tracking::new(Arc::new(poller), fast_receipt_wait())
}
