//! Sui Chain Client
//!
//! Reads over Sui JSON-RPC and submits `zkgm::send` as a Move call through a
//! [`SuiWallet`]. Sui has no allowance model and no wallet-side network switch, so
//! both optional transfer phases are skipped.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::cli;
use super::lifecycle::{ChainReceipt, ReceiptPoller, ResponseHandle, Tracking};
use super::rpc::JsonRpcClient;
use super::{prepare_send, Capabilities, ChainClient, ExecuteRequest};
use crate::config::{ChainConfig, SuiChainConfig, TransferConfig};
use crate::error::{RequestError, TransportError};
use crate::indexer::{Indexer, IndexerPolling};
use crate::registry::ChainMetadata;
use crate::token::TokenMetadata;
use crate::ucs03::instruction::Instruction;
use crate::utils::to_hex;

const ZKGM_MODULE: &str = "zkgm";
const SEND_FUNCTION: &str = "send";

// ============================================================================
// WALLET
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiMoveCall {
    pub package: String,
    pub module: String,
    pub function: String,
    pub type_args: Vec<String>,
    pub args: Vec<String>,
}

#[async_trait]
pub trait SuiWallet: Send + Sync {
    fn address(&self) -> &str;

    /// Executes the Move call, returning the transaction digest.
    async fn move_call(&self, call: SuiMoveCall) -> Result<String, TransportError>;
}

/// Wallet backed by the active address of the `sui` CLI keystore.
pub struct CliSuiWallet {
    binary: String,
    address: String,
    gas_budget: u64,
}

impl CliSuiWallet {
    pub fn new(binary: impl Into<String>, address: impl Into<String>, gas_budget: u64) -> Self {
        Self {
            binary: binary.into(),
            address: address.into(),
            gas_budget,
        }
    }

    pub async fn from_active_address(config: &SuiChainConfig) -> Result<Self, TransportError> {
        let output = cli::run(
            &config.cli_binary,
            &["client".to_string(), "active-address".to_string()],
        )
        .await?;
        Ok(Self::new(&config.cli_binary, output.trim(), config.gas_budget))
    }
}

#[async_trait]
impl SuiWallet for CliSuiWallet {
    fn address(&self) -> &str {
        &self.address
    }

    async fn move_call(&self, call: SuiMoveCall) -> Result<String, TransportError> {
        let mut args = vec![
            "client".to_string(),
            "call".to_string(),
            "--package".to_string(),
            call.package,
            "--module".to_string(),
            call.module,
            "--function".to_string(),
            call.function,
        ];
        if !call.type_args.is_empty() {
            args.push("--type-args".to_string());
            args.extend(call.type_args);
        }
        if !call.args.is_empty() {
            args.push("--args".to_string());
            args.extend(call.args);
        }
        args.extend([
            "--gas-budget".to_string(),
            self.gas_budget.to_string(),
            "--json".to_string(),
        ]);

        let output = cli::run(&self.binary, &args).await?;
        parse_digest(&output)
    }
}

/// Transaction digest from `sui client call --json` output.
pub fn parse_digest(output: &str) -> Result<String, TransportError> {
    let json: Value = serde_json::from_str(output.trim())
        .map_err(|e| TransportError::Wallet(format!("Unparseable sui output: {}", e)))?;
    json.get("digest")
        .or_else(|| json.pointer("/effects/transactionDigest"))
        .and_then(|d| d.as_str())
        .map(str::to_string)
        .ok_or_else(|| TransportError::Wallet("sui output has no digest".to_string()))
}

// ============================================================================
// RECEIPTS
// ============================================================================

pub struct SuiReceipts {
    rpc: Arc<JsonRpcClient>,
}

impl SuiReceipts {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ReceiptPoller for SuiReceipts {
    async fn poll_receipt(&self, digest: &str) -> Result<Option<ChainReceipt>, TransportError> {
        let block: Value = match self
            .rpc
            .read(
                "sui_getTransactionBlock",
                vec![json!(digest), json!({ "showEffects": true })],
            )
            .await
        {
            Ok(block) => block,
            Err(TransportError::Rpc { message, .. }) if message.contains("Could not find") => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let Some(status) = block.pointer("/effects/status") else {
            return Ok(None);
        };
        let success = status.get("status").and_then(|s| s.as_str()) == Some("success");
        let block_height = block
            .get("checkpoint")
            .and_then(|c| c.as_str())
            .and_then(|c| c.parse().ok());
        Ok(Some(ChainReceipt {
            success,
            block_height,
            reason: (!success).then(|| {
                status
                    .get("error")
                    .and_then(|e| e.as_str())
                    .unwrap_or("execution failed")
                    .to_string()
            }),
        }))
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct SuiClient {
    chain: ChainMetadata,
    relay_store: String,
    rpc: Arc<JsonRpcClient>,
    wallet: Arc<dyn SuiWallet>,
    tracking: Tracking,
}

impl SuiClient {
    pub fn new(
        chain: ChainMetadata,
        relay_store: impl Into<String>,
        rpc: Arc<JsonRpcClient>,
        wallet: Arc<dyn SuiWallet>,
        tracking: Tracking,
    ) -> Self {
        Self {
            chain,
            relay_store: relay_store.into(),
            rpc,
            wallet,
            tracking,
        }
    }

    pub async fn from_config(config: &SuiChainConfig, transfer: &TransferConfig) -> anyhow::Result<Self> {
        let rpc = Arc::new(JsonRpcClient::new(
            config.rpc_url.clone(),
            transfer.request_timeout(),
            transfer.rpc_retry,
        )?);
        let wallet = Arc::new(CliSuiWallet::from_active_address(config).await?);
        info!("Sui wallet for {}: {}", config.universal_chain_id, wallet.address());
        let tracking = Tracking::new(Arc::new(SuiReceipts::new(rpc.clone())), transfer.receipt_wait());
        Ok(Self::new(
            ChainConfig::Sui(config.clone()).metadata(),
            config.relay_store.clone(),
            rpc,
            wallet,
            tracking,
        ))
    }

    pub fn with_tracking(mut self, tracking: Tracking) -> Self {
        self.tracking = tracking;
        self
    }

    /// Extends the lifecycle stream with an `Indexed` event.
    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>, polling: IndexerPolling) -> Self {
        self.tracking = self.tracking.with_indexer(indexer, polling);
        self
    }
}

/// Coin types spent by the instruction, in first-seen order.
fn coin_type_args(instruction: &Instruction) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for order in instruction.token_orders() {
        if let Ok(coin_type) = std::str::from_utf8(order.base_token()) {
            if !types.iter().any(|t| t == coin_type) {
                types.push(coin_type.to_string());
            }
        }
    }
    types
}

#[async_trait]
impl ChainClient for SuiClient {
    fn chain(&self) -> &ChainMetadata {
        &self.chain
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn ensure_network(&self) -> Result<(), RequestError> {
        let identifier: String = self.rpc.read("sui_getChainIdentifier", vec![]).await?;
        let expected = self.chain.universal_chain_id.chain_id();
        if identifier != expected {
            return Err(TransportError::WrongNetwork {
                expected: expected.to_string(),
                actual: identifier,
            }
            .into());
        }
        Ok(())
    }

    async fn approve(&self, _instruction: &Instruction) -> Result<Vec<String>, RequestError> {
        Ok(Vec::new())
    }

    async fn read_token_metadata(&self, token: &[u8]) -> Result<TokenMetadata, RequestError> {
        let coin_type = std::str::from_utf8(token)
            .map_err(|_| RequestError::Invalid("Sui coin type is not UTF-8".to_string()))?;
        let metadata: Option<Value> = self
            .rpc
            .read("suix_getCoinMetadata", vec![json!(coin_type)])
            .await?;
        let metadata =
            metadata.ok_or_else(|| RequestError::Invalid(format!("No coin metadata for {}", coin_type)))?;
        serde_json::from_value(metadata)
            .map_err(|e| TransportError::InvalidResponse(format!("coin metadata: {}", e)).into())
    }

    async fn execute(&self, request: ExecuteRequest) -> Result<ResponseHandle, RequestError> {
        let prepared = prepare_send(self, &request).await?;

        let mut args = vec![
            self.relay_store.clone(),
            prepared.channel_id.to_string(),
            prepared.timeout_height.to_string(),
            prepared.timeout_timestamp.to_string(),
            to_hex(prepared.salt),
            prepared.instruction.version().to_string(),
            prepared.instruction.opcode().to_string(),
            to_hex(&prepared.operand),
        ];
        args.extend(request.funds.iter().map(|f| f.denom.clone()));

        let digest = self
            .wallet
            .move_call(SuiMoveCall {
                package: prepared.contract_address.clone(),
                module: ZKGM_MODULE.to_string(),
                function: SEND_FUNCTION.to_string(),
                type_args: coin_type_args(&prepared.instruction),
                args,
            })
            .await?;
        info!(
            "Submitted zkgm send {} on {} (channel {})",
            digest, self.chain.universal_chain_id, prepared.channel_id
        );

        Ok(ResponseHandle::new(
            digest.clone(),
            Some(digest),
            self.tracking.clone(),
        ))
    }

    fn track(&self, digest: &str) -> ResponseHandle {
        ResponseHandle::new(digest, None, self.tracking.clone())
    }
}
