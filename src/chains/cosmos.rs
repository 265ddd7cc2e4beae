//! Cosmos Chain Client
//!
//! Reads through the LCD REST gateway (CosmWasm smart queries, bank denom metadata,
//! tx lookup, node info) and submits `MsgExecuteContract` through a [`CosmosWallet`].
//! The bundled [`CliCosmosWallet`] shells out to the chain daemon's `tx wasm execute`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use ethereum_types::U256;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::cli;
use super::lifecycle::{ChainReceipt, ReceiptPoller, ResponseHandle, Tracking};
use super::rpc::RestClient;
use super::{prepare_send, Capabilities, ChainClient, ExecuteRequest, Funds};
use crate::address::AddressCodec;
use crate::config::{ChainConfig, CosmosChainConfig, TransferConfig};
use crate::error::{RequestError, TransportError};
use crate::indexer::{Indexer, IndexerPolling};
use crate::registry::ChainMetadata;
use crate::token::TokenMetadata;
use crate::ucs03::instruction::Instruction;
use crate::utils::to_hex;

// ============================================================================
// WALLET
// ============================================================================

#[async_trait]
pub trait CosmosWallet: Send + Sync {
    /// Bech32 address of the signer
    fn address(&self) -> &str;

    /// Executes `msg` on `contract` with `funds` attached, returning the tx hash.
    async fn execute_contract(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Funds],
    ) -> Result<String, TransportError>;
}

/// Wallet signing with a key from the daemon CLI keyring.
pub struct CliCosmosWallet {
    binary: String,
    key_name: String,
    address: String,
    chain_id: String,
    node_url: String,
    gas_prices: String,
}

impl CliCosmosWallet {
    pub fn new(config: &CosmosChainConfig, address: String) -> Self {
        Self {
            binary: config.cli_binary.clone(),
            key_name: config.key_name.clone(),
            address,
            chain_id: config.chain_id.clone(),
            node_url: config.node_url.clone(),
            gas_prices: config.gas_prices.clone(),
        }
    }

    /// Looks the signer address up in the keyring (`<daemon> keys show <key> -a`).
    pub async fn from_keyring(config: &CosmosChainConfig) -> Result<Self, TransportError> {
        let output = cli::run(
            &config.cli_binary,
            &[
                "keys".to_string(),
                "show".to_string(),
                config.key_name.clone(),
                "-a".to_string(),
            ],
        )
        .await?;
        Ok(Self::new(config, output.trim().to_string()))
    }
}

#[async_trait]
impl CosmosWallet for CliCosmosWallet {
    fn address(&self) -> &str {
        &self.address
    }

    async fn execute_contract(
        &self,
        contract: &str,
        msg: &Value,
        funds: &[Funds],
    ) -> Result<String, TransportError> {
        let mut args = vec![
            "tx".to_string(),
            "wasm".to_string(),
            "execute".to_string(),
            contract.to_string(),
            msg.to_string(),
            "--from".to_string(),
            self.key_name.clone(),
            "--chain-id".to_string(),
            self.chain_id.clone(),
            "--node".to_string(),
            self.node_url.clone(),
            "--gas".to_string(),
            "auto".to_string(),
            "--gas-adjustment".to_string(),
            "1.4".to_string(),
            "--gas-prices".to_string(),
            self.gas_prices.clone(),
            "--output".to_string(),
            "json".to_string(),
            "-y".to_string(),
        ];
        if !funds.is_empty() {
            args.push("--amount".to_string());
            args.push(format_coins(funds));
        }

        let output = cli::run(&self.binary, &args).await?;
        parse_broadcast_output(&output)
    }
}

/// `<amount><denom>` pairs sorted by denom, comma separated.
pub fn format_coins(funds: &[Funds]) -> String {
    let mut coins: Vec<&Funds> = funds.iter().collect();
    coins.sort_by(|a, b| a.denom.cmp(&b.denom));
    coins
        .iter()
        .map(|f| format!("{}{}", f.amount, f.denom))
        .collect::<Vec<_>>()
        .join(",")
}

/// Tx hash from `--output json` broadcast output. A non-zero `code` is a CheckTx rejection.
pub fn parse_broadcast_output(output: &str) -> Result<String, TransportError> {
    let json: Value = serde_json::from_str(output.trim())
        .map_err(|e| TransportError::Wallet(format!("Unparseable broadcast output: {}", e)))?;
    let code = json.get("code").and_then(|c| c.as_u64()).unwrap_or(0);
    if code != 0 {
        let log = json.get("raw_log").and_then(|l| l.as_str()).unwrap_or("");
        return Err(TransportError::Wallet(format!(
            "Broadcast rejected with code {}: {}",
            code, log
        )));
    }
    json.get("txhash")
        .and_then(|h| h.as_str())
        .map(str::to_string)
        .ok_or_else(|| TransportError::Wallet("Broadcast output has no txhash".to_string()))
}

// ============================================================================
// RECEIPTS
// ============================================================================

pub struct CosmosReceipts {
    lcd: Arc<RestClient>,
}

impl CosmosReceipts {
    pub fn new(lcd: Arc<RestClient>) -> Self {
        Self { lcd }
    }
}

#[async_trait]
impl ReceiptPoller for CosmosReceipts {
    async fn poll_receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, TransportError> {
        let Some(body) = self
            .lcd
            .get_json(&format!("/cosmos/tx/v1beta1/txs/{}", tx_hash))
            .await?
        else {
            return Ok(None);
        };
        let Some(tx) = body.get("tx_response") else {
            return Ok(None);
        };

        let code = tx.get("code").and_then(|c| c.as_u64()).unwrap_or(0);
        let block_height = tx
            .get("height")
            .and_then(|h| h.as_str())
            .and_then(|h| h.parse().ok());
        Ok(Some(ChainReceipt {
            success: code == 0,
            block_height,
            reason: (code != 0).then(|| {
                let log = tx.get("raw_log").and_then(|l| l.as_str()).unwrap_or("");
                format!("code {}: {}", code, log)
            }),
        }))
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct CosmosClient {
    chain: ChainMetadata,
    chain_id: String,
    codec: AddressCodec,
    lcd: Arc<RestClient>,
    wallet: Arc<dyn CosmosWallet>,
    tracking: Tracking,
}

impl CosmosClient {
    pub fn new(
        chain: ChainMetadata,
        chain_id: String,
        lcd: Arc<RestClient>,
        wallet: Arc<dyn CosmosWallet>,
        tracking: Tracking,
    ) -> Result<Self, RequestError> {
        let codec = chain.address_codec()?;
        Ok(Self {
            chain,
            chain_id,
            codec,
            lcd,
            wallet,
            tracking,
        })
    }

    pub async fn from_config(config: &CosmosChainConfig, transfer: &TransferConfig) -> anyhow::Result<Self> {
        let lcd = Arc::new(RestClient::new(
            config.lcd_url.clone(),
            transfer.request_timeout(),
            transfer.rpc_retry,
        )?);
        let wallet = Arc::new(CliCosmosWallet::from_keyring(config).await?);
        info!("Cosmos wallet for {}: {}", config.universal_chain_id, wallet.address());
        let tracking = Tracking::new(Arc::new(CosmosReceipts::new(lcd.clone())), transfer.receipt_wait());
        Ok(Self::new(
            ChainConfig::Cosmos(config.clone()).metadata(),
            config.chain_id.clone(),
            lcd,
            wallet,
            tracking,
        )?)
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

    /// CosmWasm smart query; `query` is base64url-encoded into the path.
    async fn smart_query(&self, contract: &str, query: &Value) -> Result<Value, TransportError> {
        let encoded = general_purpose::URL_SAFE.encode(query.to_string());
        let body = self
            .lcd
            .get_json(&format!(
                "/cosmwasm/wasm/v1/contract/{}/smart/{}",
                contract, encoded
            ))
            .await?
            .ok_or_else(|| TransportError::InvalidResponse(format!("contract {} not found", contract)))?;
        body.get("data")
            .cloned()
            .ok_or_else(|| TransportError::InvalidResponse("smart query response has no data".to_string()))
    }

    /// The cw20 contract address if `token` names one on this chain.
    fn as_cw20(&self, token: &[u8]) -> Option<String> {
        let denom = std::str::from_utf8(token).ok()?;
        self.codec.display_to_canonical(denom).ok()?;
        Some(denom.to_string())
    }

    async fn bank_metadata(&self, denom: &str) -> Result<TokenMetadata, RequestError> {
        let body = self
            .lcd
            .get_json(&format!(
                "/cosmos/bank/v1beta1/denoms_metadata_by_query_string?denom={}",
                denom
            ))
            .await?
            .ok_or_else(|| RequestError::Invalid(format!("No bank metadata for denom {}", denom)))?;
        let metadata = body
            .get("metadata")
            .ok_or_else(|| TransportError::InvalidResponse("missing metadata".to_string()))?;

        let decimals = metadata
            .get("denom_units")
            .and_then(|u| u.as_array())
            .and_then(|units| {
                units
                    .iter()
                    .filter_map(|u| u.get("exponent").and_then(|e| e.as_u64()))
                    .max()
            })
            .unwrap_or(0);
        let text = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(TokenMetadata {
            name: text("name").or_else(|| text("display")).unwrap_or_else(|| denom.to_string()),
            symbol: text("symbol").or_else(|| text("display")).unwrap_or_else(|| denom.to_string()),
            decimals: u8::try_from(decimals)
                .map_err(|_| TransportError::InvalidResponse(format!("exponent {} too large", decimals)))?,
        })
    }
}

#[async_trait]
impl ChainClient for CosmosClient {
    fn chain(&self) -> &ChainMetadata {
        &self.chain
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            network_switch: true,
            approval: true,
        }
    }

    async fn ensure_network(&self) -> Result<(), RequestError> {
        let body = self
            .lcd
            .get_json("/cosmos/base/tendermint/v1beta1/node_info")
            .await?
            .ok_or_else(|| TransportError::InvalidResponse("node_info not available".to_string()))?;
        let network = body
            .pointer("/default_node_info/network")
            .and_then(|n| n.as_str())
            .unwrap_or_default();
        if network != self.chain_id {
            return Err(TransportError::WrongNetwork {
                expected: self.chain_id.clone(),
                actual: network.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn approve(&self, instruction: &Instruction) -> Result<Vec<String>, RequestError> {
        let spender = &self.chain.zkgm_contract;

        let mut spend: BTreeMap<String, U256> = BTreeMap::new();
        for order in instruction.token_orders() {
            let Some(cw20) = self.as_cw20(order.base_token()) else {
                continue;
            };
            let total = spend.entry(cw20).or_default();
            *total = total.saturating_add(order.base_amount());
        }

        let mut hashes = Vec::new();
        for (cw20, amount) in spend {
            let allowance = self
                .smart_query(
                    &cw20,
                    &json!({ "allowance": { "owner": self.wallet.address(), "spender": spender } }),
                )
                .await?;
            let current = allowance
                .get("allowance")
                .and_then(|a| a.as_str())
                .and_then(|a| U256::from_dec_str(a).ok())
                .unwrap_or_default();
            if current >= amount {
                debug!("cw20 allowance on {} already covers {}", cw20, amount);
                continue;
            }

            let msg = json!({
                "increase_allowance": {
                    "spender": spender,
                    "amount": (amount - current).to_string(),
                }
            });
            let tx_hash = self.wallet.execute_contract(&cw20, &msg, &[]).await?;
            info!("Submitted cw20 allowance {} on {}", tx_hash, cw20);

            ResponseHandle::new(tx_hash.clone(), None, self.tracking.clone())
                .wait_for_receipt()
                .await
                .map_err(|e| RequestError::Approval {
                    tx_hash: tx_hash.clone(),
                    reason: e.to_string(),
                })?;
            hashes.push(tx_hash);
        }
        Ok(hashes)
    }

    async fn read_token_metadata(&self, token: &[u8]) -> Result<TokenMetadata, RequestError> {
        if let Some(cw20) = self.as_cw20(token) {
            let info = self.smart_query(&cw20, &json!({ "token_info": {} })).await?;
            let parsed: TokenMetadata = serde_json::from_value(info)
                .map_err(|e| TransportError::InvalidResponse(format!("token_info: {}", e)))?;
            return Ok(parsed);
        }

        let denom = std::str::from_utf8(token)
            .map_err(|_| RequestError::Invalid("Cosmos denom is not UTF-8".to_string()))?;
        if denom == self.chain.native_token.denom {
            return Ok(self.chain.native_token.metadata.clone());
        }
        self.bank_metadata(denom).await
    }

    async fn execute(&self, request: ExecuteRequest) -> Result<ResponseHandle, RequestError> {
        let prepared = prepare_send(self, &request).await?;
        let msg = json!({
            "send": {
                "channel_id": prepared.channel_id,
                "timeout_height": prepared.timeout_height.to_string(),
                "timeout_timestamp": prepared.timeout_timestamp.to_string(),
                "salt": to_hex(prepared.salt),
                "instruction": to_hex(&prepared.encoded),
            }
        });

        let tx_hash = self
            .wallet
            .execute_contract(&prepared.contract_address, &msg, &request.funds)
            .await?;
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
