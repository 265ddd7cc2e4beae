//! Aptos Chain Client
//!
//! Reads through the fullnode REST API (`/view`, `/transactions/by_hash`) and submits
//! `ibc_app::send` through an [`AptosWallet`]. The bundled [`CliAptosWallet`] signs
//! with an `aptos` CLI profile.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::cli::{self, check_vm_status_success, extract_transaction_hash};
use super::lifecycle::{ChainReceipt, ReceiptPoller, ResponseHandle, Tracking};
use super::rpc::RestClient;
use super::{prepare_send, Capabilities, ChainClient, ExecuteRequest};
use crate::config::{AptosChainConfig, ChainConfig, TransferConfig};
use crate::error::{RequestError, TransportError};
use crate::indexer::{Indexer, IndexerPolling};
use crate::registry::ChainMetadata;
use crate::token::TokenMetadata;
use crate::ucs03::instruction::Instruction;
use crate::utils::to_hex;

const FUNGIBLE_ASSET_METADATA: &str = "0x1::fungible_asset::Metadata";

// ============================================================================
// WALLET
// ============================================================================

#[async_trait]
pub trait AptosWallet: Send + Sync {
    /// Runs an entry function, returning the transaction hash. `args` use the CLI's
    /// `type:value` form.
    async fn run_function(&self, function_id: &str, args: &[String]) -> Result<String, TransportError>;
}

/// Wallet signing with an `aptos` CLI profile.
pub struct CliAptosWallet {
    binary: String,
    profile: String,
}

impl CliAptosWallet {
    pub fn new(binary: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            profile: profile.into(),
        }
    }
}

#[async_trait]
impl AptosWallet for CliAptosWallet {
    async fn run_function(&self, function_id: &str, args: &[String]) -> Result<String, TransportError> {
        let mut cli_args = vec![
            "move".to_string(),
            "run".to_string(),
            "--function-id".to_string(),
            function_id.to_string(),
        ];
        if !args.is_empty() {
            cli_args.push("--args".to_string());
            cli_args.extend(args.iter().cloned());
        }
        cli_args.extend([
            "--profile".to_string(),
            self.profile.clone(),
            "--assume-yes".to_string(),
        ]);

        let output = cli::run(&self.binary, &cli_args).await?;
        let tx_hash = extract_transaction_hash(&output)
            .ok_or_else(|| TransportError::Wallet(format!("No transaction hash in output: {}", output)))?;

        // The receipt reports the abort; the hash is still the call's identity.
        if !check_vm_status_success(&output) {
            warn!("Aptos transaction {} failed VM execution", tx_hash);
        }
        Ok(tx_hash)
    }
}

// ============================================================================
// RECEIPTS
// ============================================================================

pub struct AptosReceipts {
    rest: Arc<RestClient>,
}

impl AptosReceipts {
    pub fn new(rest: Arc<RestClient>) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ReceiptPoller for AptosReceipts {
    async fn poll_receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, TransportError> {
        let Some(tx) = self
            .rest
            .get_json(&format!("/transactions/by_hash/{}", tx_hash))
            .await?
        else {
            return Ok(None);
        };
        if tx.get("type").and_then(|t| t.as_str()) == Some("pending_transaction") {
            return Ok(None);
        }

        let success = tx.get("success").and_then(|s| s.as_bool()).unwrap_or(false);
        let block_height = tx
            .get("version")
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok());
        Ok(Some(ChainReceipt {
            success,
            block_height,
            reason: (!success).then(|| {
                tx.get("vm_status")
                    .and_then(|s| s.as_str())
                    .unwrap_or("unknown vm status")
                    .to_string()
            }),
        }))
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct AptosClient {
    chain: ChainMetadata,
    rest: Arc<RestClient>,
    wallet: Arc<dyn AptosWallet>,
    tracking: Tracking,
}

impl AptosClient {
    pub fn new(
        chain: ChainMetadata,
        rest: Arc<RestClient>,
        wallet: Arc<dyn AptosWallet>,
        tracking: Tracking,
    ) -> Self {
        Self {
            chain,
            rest,
            wallet,
            tracking,
        }
    }

    pub fn from_config(config: &AptosChainConfig, transfer: &TransferConfig) -> anyhow::Result<Self> {
        let rest = Arc::new(RestClient::new(
            config.rest_url.clone(),
            transfer.request_timeout(),
            transfer.rpc_retry,
        )?);
        let wallet = Arc::new(CliAptosWallet::new(&config.cli_binary, &config.profile));
        let tracking = Tracking::new(Arc::new(AptosReceipts::new(rest.clone())), transfer.receipt_wait());
        Ok(Self::new(
            ChainConfig::Aptos(config.clone()).metadata(),
            rest,
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

    /// Calls a Move view function and returns its first result.
    async fn view(&self, function: &str, type_arg: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        let result = self
            .rest
            .post_json(
                "/view",
                &json!({
                    "function": function,
                    "type_arguments": [type_arg],
                    "arguments": args,
                }),
            )
            .await?;
        result
            .as_array()
            .and_then(|values| values.first())
            .cloned()
            .ok_or_else(|| TransportError::InvalidResponse(format!("{} returned no value", function)))
    }

    async fn view_string(&self, function: &str, type_arg: &str, args: Vec<Value>) -> Result<String, TransportError> {
        self.view(function, type_arg, args)
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TransportError::InvalidResponse(format!("{} is not a string", function)))
    }
}

#[async_trait]
impl ChainClient for AptosClient {
    fn chain(&self) -> &ChainMetadata {
        &self.chain
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn ensure_network(&self) -> Result<(), RequestError> {
        let ledger = self
            .rest
            .get_json("")
            .await?
            .ok_or_else(|| TransportError::InvalidResponse("ledger info not available".to_string()))?;
        let actual = ledger
            .get("chain_id")
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let expected = self.chain.universal_chain_id.chain_id();
        if actual != expected {
            return Err(TransportError::WrongNetwork {
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    async fn approve(&self, _instruction: &Instruction) -> Result<Vec<String>, RequestError> {
        Ok(Vec::new())
    }

    async fn read_token_metadata(&self, token: &[u8]) -> Result<TokenMetadata, RequestError> {
        // Coin types travel as UTF-8 `addr::module::Name`, fungible assets as 32 raw bytes.
        let (module, type_arg, args) = match std::str::from_utf8(token) {
            Ok(coin_type) if coin_type.contains("::") => ("0x1::coin", coin_type.to_string(), vec![]),
            _ if token.len() == 32 => (
                "0x1::fungible_asset",
                FUNGIBLE_ASSET_METADATA.to_string(),
                vec![json!(to_hex(token))],
            ),
            _ => {
                return Err(RequestError::Invalid(format!(
                    "Aptos token must be a coin type or a 32-byte object address, got {} bytes",
                    token.len()
                )))
            }
        };

        let name = self
            .view_string(&format!("{}::name", module), &type_arg, args.clone())
            .await?;
        let symbol = self
            .view_string(&format!("{}::symbol", module), &type_arg, args.clone())
            .await?;
        let decimals = self
            .view(&format!("{}::decimals", module), &type_arg, args)
            .await?
            .as_u64()
            .and_then(|d| u8::try_from(d).ok())
            .ok_or_else(|| TransportError::InvalidResponse("decimals is not a u8".to_string()))?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    /// `ibc_app::send` withdraws the base amounts from the signer itself, so attached
    /// funds are rejected rather than ignored.
    async fn execute(&self, request: ExecuteRequest) -> Result<ResponseHandle, RequestError> {
        if !request.funds.is_empty() {
            return Err(RequestError::Invalid(
                "Aptos send withdraws from the signer; attached funds are not supported".to_string(),
            ));
        }
        let prepared = prepare_send(self, &request).await?;
        let function_id = format!("{}::ibc_app::send", prepared.contract_address);
        let args = vec![
            format!("u32:{}", prepared.channel_id),
            format!("u64:{}", prepared.timeout_height),
            format!("u64:{}", prepared.timeout_timestamp),
            format!("hex:{}", to_hex(prepared.salt)),
            format!("u8:{}", prepared.instruction.version()),
            format!("u8:{}", prepared.instruction.opcode()),
            format!("hex:{}", to_hex(&prepared.operand)),
        ];

        let tx_hash = self.wallet.run_function(&function_id, &args).await?;
        info!(
            "Submitted zkgm send {} on {} (channel {})",
            tx_hash, self.chain.universal_chain_id, prepared.channel_id
        );

        Ok(ResponseHandle::new(
            tx_hash.clone(),
            Some(tx_hash),
            self.tracking.clone(),
        ))
    }

    fn track(&self, tx_hash: &str) -> ResponseHandle {
        ResponseHandle::new(tx_hash, None, self.tracking.clone())
    }
}
