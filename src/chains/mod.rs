//! Chain Client Adapters
//!
//! One [`ChainClient`] implementation per execution environment. Each adapter pairs a
//! shared read client (JSON-RPC or REST) with a family-specific wallet that signs and
//! broadcasts. All of them submit the same zkgm `send` call, only the transport differs.

pub mod aptos;
pub mod cli;
pub mod cosmos;
pub mod evm;
pub mod lifecycle;
pub mod rpc;
pub mod sui;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethereum_types::U256;
use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::crypto::generate_salt;
use crate::error::RequestError;
use crate::registry::{ChainMetadata, UniversalChainId};
use crate::token::TokenMetadata;
use crate::token_order::TokenOrderV1Draft;
use crate::ucs03::instruction::{self, Batch, Forward, Instruction};

pub use lifecycle::{
    ChainReceipt, LifecycleEvent, ReceiptPoller, ReceiptWait, ResponseHandle, Tracking,
};
pub use rpc::{JsonRpcClient, RestClient, RetryPolicy};

/// Packets time out on the destination this long after submission.
pub const PACKET_TIMEOUT_HOURS: i64 = 24;

/// Which optional transfer phases a backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub network_switch: bool,
    pub approval: bool,
}

/// Native funds attached to the call (EVM `value`, Cosmos coins, Sui coin objects).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funds {
    pub denom: String,
    pub amount: U256,
}

/// An instruction tree that may still contain v1 orders awaiting token metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingInstruction {
    Ready(Instruction),
    TokenOrderV1(TokenOrderV1Draft),
    Batch(Vec<PendingInstruction>),
    Forward {
        path: U256,
        timeout_height: u64,
        timeout_timestamp: u64,
        instruction: Box<PendingInstruction>,
    },
}

impl From<Instruction> for PendingInstruction {
    fn from(instruction: Instruction) -> Self {
        PendingInstruction::Ready(instruction)
    }
}

impl From<TokenOrderV1Draft> for PendingInstruction {
    fn from(draft: TokenOrderV1Draft) -> Self {
        PendingInstruction::TokenOrderV1(draft)
    }
}

impl PendingInstruction {
    /// Fills every v1 draft with live metadata read through `client`.
    pub fn resolve<'a, C>(&'a self, client: &'a C) -> BoxFuture<'a, Result<Instruction, RequestError>>
    where
        C: ChainClient + ?Sized,
    {
        async move {
            match self {
                PendingInstruction::Ready(instruction) => Ok(instruction.clone()),
                PendingInstruction::TokenOrderV1(draft) => {
                    let metadata = client.read_token_metadata(&draft.base_token).await?;
                    debug!(
                        "Resolved base token metadata: {} ({}, {} decimals)",
                        metadata.name, metadata.symbol, metadata.decimals
                    );
                    Ok(draft.clone().complete(&metadata))
                }
                PendingInstruction::Batch(items) => {
                    let mut instructions = Vec::with_capacity(items.len());
                    for item in items {
                        instructions.push(item.resolve(client).await?);
                    }
                    Ok(Instruction::Batch(Batch { instructions }))
                }
                PendingInstruction::Forward {
                    path,
                    timeout_height,
                    timeout_timestamp,
                    instruction,
                } => Ok(Instruction::Forward(Forward {
                    path: *path,
                    timeout_height: *timeout_height,
                    timeout_timestamp: *timeout_timestamp,
                    instruction: Box::new(instruction.resolve(client).await?),
                })),
            }
        }
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub source_chain: UniversalChainId,
    pub destination_chain: UniversalChainId,
    pub channel_id: u32,
    /// zkgm contract to call; the chain's configured contract when empty
    pub contract_address: String,
    pub instruction: PendingInstruction,
    pub funds: Vec<Funds>,
}

/// A `send` call ready for a chain-native transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSend {
    pub contract_address: String,
    pub channel_id: u32,
    pub timeout_height: u64,
    pub timeout_timestamp: u64,
    pub salt: [u8; 32],
    pub instruction: Instruction,
    /// Full `(version, opcode, operand)` encoding
    pub encoded: Vec<u8>,
    /// Operand alone, for entry points taking version and opcode as separate arguments
    pub operand: Vec<u8>,
}

/// Resolves, encodes, salts and timestamps a request for `client`.
pub async fn prepare_send<C>(client: &C, request: &ExecuteRequest) -> Result<PreparedSend, RequestError>
where
    C: ChainClient + ?Sized,
{
    let chain = client.chain();
    if request.source_chain != chain.universal_chain_id {
        return Err(RequestError::ChainMismatch {
            requested: request.source_chain.to_string(),
            served: chain.universal_chain_id.to_string(),
        });
    }
    if request.channel_id == 0 {
        return Err(RequestError::Invalid("channel id must be non-zero".to_string()));
    }

    let instruction = request.instruction.resolve(client).await?;
    let encoded = instruction::encode(&instruction)?;
    let operand = instruction::encode_operand(&instruction)?;
    let contract_address = if request.contract_address.is_empty() {
        chain.zkgm_contract.clone()
    } else {
        request.contract_address.clone()
    };

    Ok(PreparedSend {
        contract_address,
        channel_id: request.channel_id,
        timeout_height: 0,
        timeout_timestamp: packet_timeout_timestamp(Utc::now())?,
        salt: generate_salt(),
        instruction,
        encoded,
        operand,
    })
}

/// `now + 24h` in nanoseconds since the epoch.
pub fn packet_timeout_timestamp(now: DateTime<Utc>) -> Result<u64, RequestError> {
    (now + chrono::Duration::hours(PACKET_TIMEOUT_HOURS))
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .ok_or_else(|| RequestError::Invalid("timeout timestamp out of range".to_string()))
}

/// Chain-specific submission path for zkgm instructions.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> &ChainMetadata;

    fn capabilities(&self) -> Capabilities;

    /// Verifies the RPC endpoint serves the configured chain.
    async fn ensure_network(&self) -> Result<(), RequestError>;

    /// Submits allowance approvals for every non-native base token the instruction
    /// spends. Returns the approval transaction hashes (empty when nothing was needed).
    async fn approve(&self, instruction: &Instruction) -> Result<Vec<String>, RequestError>;

    /// Reads name, symbol and decimals for a base token given its zkgm bytes.
    async fn read_token_metadata(&self, token: &[u8]) -> Result<TokenMetadata, RequestError>;

    async fn execute(&self, request: ExecuteRequest) -> Result<ResponseHandle, RequestError>;

    /// Follows an already submitted transaction.
    fn track(&self, tx_hash: &str) -> ResponseHandle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timeout_is_24h_in_nanos() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            packet_timeout_timestamp(now).unwrap(),
            (1_700_000_000u64 + 86_400) * 1_000_000_000
        );
    }
}
