//! EVM Chain Client
//!
//! Reads over JSON-RPC (`eth_call`, `eth_chainId`, `eth_getTransactionReceipt`) and
//! submits through an [`EvmWallet`]. The bundled [`LocalKeyWallet`] signs legacy
//! EIP-155 transactions locally and broadcasts them with `eth_sendRawTransaction`,
//! so it works against public RPCs that hold no keys.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ethereum_types::U256;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use tracing::{debug, info};

use super::lifecycle::{ChainReceipt, ReceiptPoller, ResponseHandle, Tracking};
use super::rpc::{parse_hex_u64, JsonRpcClient};
use super::{prepare_send, Capabilities, ChainClient, ExecuteRequest};
use crate::address::{parse_evm_address, to_checksum_address};
use crate::config::{EvmChainConfig, TransferConfig};
use crate::crypto::EvmSigningKey;
use crate::error::{RequestError, TransportError};
use crate::indexer::{Indexer, IndexerPolling};
use crate::registry::ChainMetadata;
use crate::token::{TokenMetadata, EVM_NATIVE_TOKEN};
use crate::ucs03::abi::{encode_params, AbiReader, AbiType, AbiValue};
use crate::ucs03::instruction::Instruction;
use crate::utils::{hex_to_bytes, to_hex};

const SEND_SIGNATURE: &str = "send(uint32,uint64,uint64,bytes32,(uint8,uint8,bytes))";

// ============================================================================
// WALLET
// ============================================================================

/// Unsigned call as handed to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTransaction {
    pub to: [u8; 20],
    pub value: U256,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait EvmWallet: Send + Sync {
    fn address(&self) -> [u8; 20];

    /// Signs and broadcasts `tx`, returning its hash.
    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, TransportError>;
}

/// Wallet holding a secp256k1 key in memory.
pub struct LocalKeyWallet {
    key: EvmSigningKey,
    rpc: Arc<JsonRpcClient>,
    chain_id: u64,
    gas_limit: u64,
}

impl LocalKeyWallet {
    pub fn new(key: EvmSigningKey, rpc: Arc<JsonRpcClient>, chain_id: u64, gas_limit: u64) -> Self {
        Self {
            key,
            rpc,
            chain_id,
            gas_limit,
        }
    }
}

#[async_trait]
impl EvmWallet for LocalKeyWallet {
    fn address(&self) -> [u8; 20] {
        self.key.address()
    }

    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, TransportError> {
        let from = to_hex(self.key.address());

        // 1. Fetch nonce and gas price
        let nonce_hex: String = self
            .rpc
            .read("eth_getTransactionCount", vec![json!(from), json!("pending")])
            .await?;
        let nonce = parse_hex_u64(&nonce_hex)?;
        let gas_price_hex: String = self.rpc.read("eth_gasPrice", vec![]).await?;
        let gas_price = parse_hex_u64(&gas_price_hex)?;

        let mut value = [0u8; 32];
        tx.value.to_big_endian(&mut value);

        // 2. RLP-encode unsigned tx for EIP-155 signing:
        //    [nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
        let unsigned_items: Vec<Vec<u8>> = vec![
            trim_be(&nonce.to_be_bytes()),
            trim_be(&gas_price.to_be_bytes()),
            trim_be(&self.gas_limit.to_be_bytes()),
            tx.to.to_vec(),
            trim_be(&value),
            tx.data.clone(),
            trim_be(&self.chain_id.to_be_bytes()),
            vec![],
            vec![],
        ];
        let sighash: [u8; 32] = Keccak256::digest(rlp_encode_list(&unsigned_items)).into();

        // 3. Sign; EIP-155 v = recovery_id + chainId * 2 + 35
        let (r, s, recovery_id) = self.key.sign_prehash(&sighash)?;
        let v = u64::from(recovery_id) + self.chain_id * 2 + 35;

        let signed_items: Vec<Vec<u8>> = vec![
            trim_be(&nonce.to_be_bytes()),
            trim_be(&gas_price.to_be_bytes()),
            trim_be(&self.gas_limit.to_be_bytes()),
            tx.to.to_vec(),
            trim_be(&value),
            tx.data,
            trim_be(&v.to_be_bytes()),
            trim_be(&r),
            trim_be(&s),
        ];
        let raw_tx = to_hex(rlp_encode_list(&signed_items));

        debug!(
            "EVM raw tx: nonce={}, gas_price={}, chain_id={}, from={}",
            nonce, gas_price, self.chain_id, from
        );

        // 4. Broadcast once; a retried broadcast could land twice
        self.rpc
            .call_once("eth_sendRawTransaction", &[json!(raw_tx)])
            .await
    }
}

// ============================================================================
// RECEIPTS
// ============================================================================

pub struct EvmReceipts {
    rpc: Arc<JsonRpcClient>,
}

impl EvmReceipts {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ReceiptPoller for EvmReceipts {
    async fn poll_receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, TransportError> {
        let receipt: Option<Value> = self
            .rpc
            .read("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await?;

        Ok(receipt.map(|receipt| {
            let status = receipt
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("0x0");
            let block_height = receipt
                .get("blockNumber")
                .and_then(|b| b.as_str())
                .and_then(|b| parse_hex_u64(b).ok());
            ChainReceipt {
                success: status == "0x1",
                block_height,
                reason: (status != "0x1").then(|| format!("status {}", status)),
            }
        }))
    }
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct EvmClient {
    chain: ChainMetadata,
    chain_id: u64,
    rpc: Arc<JsonRpcClient>,
    wallet: Arc<dyn EvmWallet>,
    tracking: Tracking,
}

impl EvmClient {
    pub fn new(
        chain: ChainMetadata,
        chain_id: u64,
        rpc: Arc<JsonRpcClient>,
        wallet: Arc<dyn EvmWallet>,
        tracking: Tracking,
    ) -> Self {
        Self {
            chain,
            chain_id,
            rpc,
            wallet,
            tracking,
        }
    }

    /// Builds a client with a [`LocalKeyWallet`] whose key is read from `private_key_env`.
    pub fn from_config(config: &EvmChainConfig, transfer: &TransferConfig) -> anyhow::Result<Self> {
        let rpc = Arc::new(JsonRpcClient::new(
            config.rpc_url.clone(),
            transfer.request_timeout(),
            transfer.rpc_retry,
        )?);
        let key = EvmSigningKey::from_env(&config.private_key_env)?;
        info!(
            "EVM wallet for {}: {}",
            config.universal_chain_id,
            to_checksum_address(&key.address())
        );
        let wallet = Arc::new(LocalKeyWallet::new(key, rpc.clone(), config.chain_id, config.gas_limit));
        let tracking = Tracking::new(Arc::new(EvmReceipts::new(rpc.clone())), transfer.receipt_wait());
        Ok(Self::new(
            crate::config::ChainConfig::Evm(config.clone()).metadata(),
            config.chain_id,
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

    /// Address of the token the destination mints for `token` arriving over `channel_id`.
    pub async fn predict_wrapped_token(
        &self,
        path: U256,
        channel_id: u32,
        token: &[u8],
    ) -> Result<[u8; 20], RequestError> {
        let data = call_data(
            "predictWrappedToken(uint256,uint32,bytes)",
            &[
                AbiValue::Uint(path),
                AbiValue::uint(channel_id),
                AbiValue::Bytes(token.to_vec()),
            ],
        );
        let result = self.eth_call(&self.zkgm_contract()?, &data).await?;
        let mut r = AbiReader::decode(&[AbiType::Uint(160), AbiType::FixedBytes32], &result)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let word = r
            .uint()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(word_to_address(word))
    }

    async fn eth_call(&self, to: &[u8; 20], data: &[u8]) -> Result<Vec<u8>, TransportError> {
        let result: String = self
            .rpc
            .read(
                "eth_call",
                vec![json!({ "to": to_hex(to), "data": to_hex(data) }), json!("latest")],
            )
            .await?;
        hex_to_bytes(&result).map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    fn zkgm_contract(&self) -> Result<[u8; 20], RequestError> {
        Ok(parse_evm_address(&self.chain.zkgm_contract)?)
    }

    async fn erc20_string(&self, token: &[u8; 20], signature: &str) -> Result<String, TransportError> {
        let result = self.eth_call(token, &call_data(signature, &[])).await?;
        if let Ok(mut r) = AbiReader::decode(&[AbiType::String], &result) {
            if let Ok(s) = r.string() {
                return Ok(s);
            }
        }
        // pre-standard tokens return bytes32
        if result.len() == 32 {
            let end = result.iter().position(|b| *b == 0).unwrap_or(32);
            if let Ok(s) = std::str::from_utf8(&result[..end]) {
                return Ok(s.to_string());
            }
        }
        Err(TransportError::InvalidResponse(format!(
            "{} returned an undecodable value",
            signature
        )))
    }

    async fn allowance(&self, token: &[u8; 20], spender: &[u8; 20]) -> Result<U256, TransportError> {
        let data = call_data(
            "allowance(address,address)",
            &[address_value(&self.wallet.address()), address_value(spender)],
        );
        let result = self.eth_call(token, &data).await?;
        AbiReader::decode(&[AbiType::Uint(256)], &result)
            .and_then(|mut r| r.uint())
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for EvmClient {
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
        let chain_id_hex: String = self.rpc.read("eth_chainId", vec![]).await?;
        let actual = parse_hex_u64(&chain_id_hex)?;
        if actual != self.chain_id {
            return Err(TransportError::WrongNetwork {
                expected: self.chain_id.to_string(),
                actual: actual.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn approve(&self, instruction: &Instruction) -> Result<Vec<String>, RequestError> {
        let spender = self.zkgm_contract()?;
        let native = parse_evm_address(EVM_NATIVE_TOKEN)?;

        let mut spend: BTreeMap<[u8; 20], U256> = BTreeMap::new();
        for order in instruction.token_orders() {
            let Ok(token) = <[u8; 20]>::try_from(order.base_token()) else {
                continue;
            };
            if token == native {
                continue;
            }
            let total = spend.entry(token).or_default();
            *total = total.saturating_add(order.base_amount());
        }

        let mut hashes = Vec::new();
        for (token, amount) in spend {
            let current = self.allowance(&token, &spender).await?;
            if current >= amount {
                debug!("Allowance for {} already covers {}", to_hex(token), amount);
                continue;
            }

            let data = call_data(
                "approve(address,uint256)",
                &[address_value(&spender), AbiValue::Uint(amount)],
            );
            let tx_hash = self
                .wallet
                .send_transaction(EvmTransaction {
                    to: token,
                    value: U256::zero(),
                    data,
                })
                .await?;
            info!("Submitted approval {} for token {}", tx_hash, to_hex(token));

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
        let token: [u8; 20] = token
            .try_into()
            .map_err(|_| RequestError::Invalid(format!("EVM token must be 20 bytes, got {}", token.len())))?;
        if token == parse_evm_address(EVM_NATIVE_TOKEN)? {
            return Ok(self.chain.native_token.metadata.clone());
        }

        let name = self.erc20_string(&token, "name()").await?;
        let symbol = self.erc20_string(&token, "symbol()").await?;
        let decimals_raw = self.eth_call(&token, &call_data("decimals()", &[])).await?;
        let decimals = AbiReader::decode(&[AbiType::Uint(8)], &decimals_raw)
            .and_then(|mut r| r.u8())
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    async fn execute(&self, request: ExecuteRequest) -> Result<ResponseHandle, RequestError> {
        let prepared = prepare_send(self, &request).await?;
        let to = parse_evm_address(&prepared.contract_address)?;

        let data = call_data(
            SEND_SIGNATURE,
            &[
                AbiValue::uint(prepared.channel_id),
                AbiValue::uint(prepared.timeout_height),
                AbiValue::uint(prepared.timeout_timestamp),
                AbiValue::FixedBytes(prepared.salt),
                AbiValue::Tuple(vec![
                    AbiValue::uint(prepared.instruction.version()),
                    AbiValue::uint(prepared.instruction.opcode()),
                    AbiValue::Bytes(prepared.operand.clone()),
                ]),
            ],
        );

        let native_denom = &self.chain.native_token.denom;
        let value = request
            .funds
            .iter()
            .filter(|f| &f.denom == native_denom || f.denom.eq_ignore_ascii_case(EVM_NATIVE_TOKEN))
            .fold(U256::zero(), |acc, f| acc.saturating_add(f.amount));

        let tx_hash = self
            .wallet
            .send_transaction(EvmTransaction { to, value, data })
            .await?;
        info!(
            "Submitted zkgm send {} on {} (channel {}, salt {})",
            tx_hash,
            self.chain.universal_chain_id,
            prepared.channel_id,
            to_hex(prepared.salt)
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

// ============================================================================
// ABI AND RLP HELPERS
// ============================================================================

/// keccak256(signature)[0..4] followed by the encoded arguments.
pub fn call_data(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut data = Keccak256::digest(signature.as_bytes())[..4].to_vec();
    data.extend(encode_params(args));
    data
}

fn address_value(address: &[u8; 20]) -> AbiValue {
    AbiValue::Uint(U256::from_big_endian(address))
}

fn word_to_address(word: U256) -> [u8; 20] {
    let mut full = [0u8; 32];
    word.to_big_endian(&mut full);
    let mut address = [0u8; 20];
    address.copy_from_slice(&full[12..]);
    address
}

/// Big-endian integer bytes without leading zeros (RLP integer format).
fn trim_be(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// RLP-encode a single byte-string item.
fn rlp_encode_item(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else if data.len() <= 55 {
        let mut out = vec![0x80 + data.len() as u8];
        out.extend_from_slice(data);
        out
    } else {
        let len_bytes = trim_be(&(data.len() as u64).to_be_bytes());
        let mut out = vec![0xb7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend_from_slice(data);
        out
    }
}

/// RLP-encode a list of raw byte strings.
fn rlp_encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.iter().flat_map(|item| rlp_encode_item(item)).collect();
    if payload.len() <= 55 {
        let mut out = vec![0xc0 + payload.len() as u8];
        out.extend(payload);
        out
    } else {
        let len_bytes = trim_be(&(payload.len() as u64).to_be_bytes());
        let mut out = vec![0xf7 + len_bytes.len() as u8];
        out.extend_from_slice(&len_bytes);
        out.extend(payload);
        out
    }
}
