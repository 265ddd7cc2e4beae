//! Unit tests for the EVM chain client

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::U256;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zkgm_client::address::parse_evm_address;
use zkgm_client::chains::evm::{call_data, EvmClient, EvmReceipts, EvmTransaction, EvmWallet};
use zkgm_client::chains::{
    ChainClient, ExecuteRequest, Funds, JsonRpcClient, RetryPolicy, Tracking,
};
use zkgm_client::error::{OnChainError, RequestError, ResponseError, TransportError};
use zkgm_client::registry::UniversalChainId;
use zkgm_client::ucs03::abi::{encode_params, AbiReader, AbiType, AbiValue};
use zkgm_client::ucs03::instruction::{
    self, Batch, Instruction, TokenOrder, TokenOrderKind, TokenOrderV2,
};

mod helpers;
use helpers::{
    evm_chain, fast_receipt_wait, DUMMY_COSMOS_CHAIN, DUMMY_EVM_CHAIN, DUMMY_EVM_CHAIN_ID,
    DUMMY_RECEIVER_ADDR_COSMOS, DUMMY_SENDER_ADDR_EVM, DUMMY_TOKEN_ADDR_EVM, DUMMY_TX_HASH,
    DUMMY_ZKGM_CONTRACT_EVM,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Wallet that records transactions instead of signing them.
struct RecordingWallet {
    sent: Mutex<Vec<EvmTransaction>>,
}

impl RecordingWallet {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<EvmTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvmWallet for RecordingWallet {
    fn address(&self) -> [u8; 20] {
        parse_evm_address(DUMMY_SENDER_ADDR_EVM).unwrap()
    }

    async fn send_transaction(&self, tx: EvmTransaction) -> Result<String, TransportError> {
        self.sent.lock().unwrap().push(tx);
        Ok(DUMMY_TX_HASH.to_string())
    }
}

fn create_client(mock_server: &MockServer, wallet: Arc<RecordingWallet>) -> EvmClient {
    let rpc = Arc::new(
        JsonRpcClient::new(mock_server.uri(), Duration::from_secs(5), RetryPolicy::no_retry())
            .unwrap(),
    );
    let tracking = Tracking::new(Arc::new(EvmReceipts::new(rpc.clone())), fast_receipt_wait());
    EvmClient::new(evm_chain(), DUMMY_EVM_CHAIN_ID, rpc, wallet, tracking)
}

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

async fn mount_eth_call(mock_server: &MockServer, selector: &str, result: Vec<u8>) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{"data": selector}]
        })))
        .respond_with(rpc_result(json!(format!("0x{}", hex::encode(result)))))
        .mount(mock_server)
        .await;
}

async fn mount_receipt(mock_server: &MockServer, status: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
        .respond_with(rpc_result(json!({
            "transactionHash": DUMMY_TX_HASH,
            "status": status,
            "blockNumber": "0x10"
        })))
        .mount(mock_server)
        .await;
}

fn token_order(amount: u64) -> Instruction {
    Instruction::TokenOrder(TokenOrder::V2(TokenOrderV2 {
        sender: parse_evm_address(DUMMY_SENDER_ADDR_EVM).unwrap().to_vec(),
        receiver: DUMMY_RECEIVER_ADDR_COSMOS.as_bytes().to_vec(),
        base_token: parse_evm_address(DUMMY_TOKEN_ADDR_EVM).unwrap().to_vec(),
        base_amount: U256::from(amount),
        quote_token: b"muno".to_vec(),
        quote_amount: U256::from(amount),
        kind: TokenOrderKind::Escrow,
        metadata: Vec::new(),
    }))
}

fn request(instruction: Instruction, funds: Vec<Funds>) -> ExecuteRequest {
    ExecuteRequest {
        source_chain: UniversalChainId::parse(DUMMY_EVM_CHAIN).unwrap(),
        destination_chain: UniversalChainId::parse(DUMMY_COSMOS_CHAIN).unwrap(),
        channel_id: 3,
        contract_address: String::new(),
        instruction: instruction.into(),
        funds,
    }
}

// ============================================================================
// NETWORK
// ============================================================================

/// 1. Test: ensure_network accepts the configured chain id
#[tokio::test]
async fn test_ensure_network_matches() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_chainId"})))
        .respond_with(rpc_result(json!("0xaa36a7")))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server, RecordingWallet::new());
    client.ensure_network().await.unwrap();
}

/// 2. Test: ensure_network rejects a different chain
/// Why: Submitting to the wrong network would spend funds on a chain the user did not pick.
#[tokio::test]
async fn test_ensure_network_wrong_chain() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_chainId"})))
        .respond_with(rpc_result(json!("0x1")))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let err = client.ensure_network().await.unwrap_err();
    assert_eq!(
        err,
        RequestError::Transport(TransportError::WrongNetwork {
            expected: DUMMY_EVM_CHAIN_ID.to_string(),
            actual: "1".to_string(),
        })
    );
}

// ============================================================================
// TOKEN METADATA
// ============================================================================

/// 3. Test: ERC-20 metadata is read through eth_call
#[tokio::test]
async fn test_read_erc20_metadata() {
    let mock_server = MockServer::start().await;
    mount_eth_call(
        &mock_server,
        "0x06fdde03",
        encode_params(&[AbiValue::String("USD Coin".to_string())]),
    )
    .await;
    mount_eth_call(
        &mock_server,
        "0x95d89b41",
        encode_params(&[AbiValue::String("USDC".to_string())]),
    )
    .await;
    mount_eth_call(&mock_server, "0x313ce567", encode_params(&[AbiValue::uint(6u8)])).await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let token = parse_evm_address(DUMMY_TOKEN_ADDR_EVM).unwrap();
    let metadata = client.read_token_metadata(&token).await.unwrap();

    assert_eq!(metadata.name, "USD Coin");
    assert_eq!(metadata.symbol, "USDC");
    assert_eq!(metadata.decimals, 6);
}

/// 4. Test: bytes32 name and symbol are accepted
/// Why: Pre-standard tokens such as MKR return bytes32 instead of string.
#[tokio::test]
async fn test_read_bytes32_metadata() {
    let mut name = [0u8; 32];
    name[..5].copy_from_slice(b"Maker");
    let mut symbol = [0u8; 32];
    symbol[..3].copy_from_slice(b"MKR");

    let mock_server = MockServer::start().await;
    mount_eth_call(&mock_server, "0x06fdde03", name.to_vec()).await;
    mount_eth_call(&mock_server, "0x95d89b41", symbol.to_vec()).await;
    mount_eth_call(&mock_server, "0x313ce567", encode_params(&[AbiValue::uint(18u8)])).await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let token = parse_evm_address(DUMMY_TOKEN_ADDR_EVM).unwrap();
    let metadata = client.read_token_metadata(&token).await.unwrap();

    assert_eq!(metadata.name, "Maker");
    assert_eq!(metadata.symbol, "MKR");
    assert_eq!(metadata.decimals, 18);
}

/// 5. Test: Native sentinel uses the configured native metadata without any RPC call
#[tokio::test]
async fn test_native_metadata_is_local() {
    let mock_server = MockServer::start().await;
    let client = create_client(&mock_server, RecordingWallet::new());

    let metadata = client.read_token_metadata(&[0xee; 20]).await.unwrap();
    assert_eq!(metadata.symbol, "ETH");
    assert_eq!(metadata.decimals, 18);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// APPROVAL
// ============================================================================

/// 6. Test: Missing allowance triggers an approve transaction
/// Verifies the approval goes to the token contract, names the zkgm contract as spender
/// and waits for its receipt.
#[tokio::test]
async fn test_approve_when_allowance_short() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(rpc_result(json!(format!(
            "0x{}",
            hex::encode(encode_params(&[AbiValue::uint(10u8)]))
        ))))
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x1").await;

    let wallet = RecordingWallet::new();
    let client = create_client(&mock_server, wallet.clone());
    let hashes = client.approve(&token_order(1_000)).await.unwrap();

    assert_eq!(hashes, vec![DUMMY_TX_HASH.to_string()]);
    let sent = wallet.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, parse_evm_address(DUMMY_TOKEN_ADDR_EVM).unwrap());
    assert_eq!(sent[0].value, U256::zero());

    let spender = parse_evm_address(DUMMY_ZKGM_CONTRACT_EVM).unwrap();
    let expected = call_data(
        "approve(address,uint256)",
        &[
            AbiValue::Uint(U256::from_big_endian(&spender)),
            AbiValue::uint(1_000u64),
        ],
    );
    assert_eq!(sent[0].data, expected);
}

/// 7. Test: Sufficient allowance sends nothing
#[tokio::test]
async fn test_approve_skips_covered_allowance() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(rpc_result(json!(format!(
            "0x{}",
            hex::encode(encode_params(&[AbiValue::uint(5_000u64)]))
        ))))
        .mount(&mock_server)
        .await;

    let wallet = RecordingWallet::new();
    let client = create_client(&mock_server, wallet.clone());
    let hashes = client.approve(&token_order(1_000)).await.unwrap();

    assert!(hashes.is_empty());
    assert!(wallet.sent().is_empty());
}

/// 8. Test: Reverted approval is reported as an approval failure
#[tokio::test]
async fn test_approve_revert_is_approval_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(rpc_result(json!(format!("0x{}", "00".repeat(32)))))
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x0").await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let err = client.approve(&token_order(1_000)).await.unwrap_err();
    assert!(matches!(err, RequestError::Approval { ref tx_hash, .. } if tx_hash == DUMMY_TX_HASH));
}

// ============================================================================
// EXECUTE
// ============================================================================

/// 9. Test: execute calls send() on the zkgm contract with the encoded instruction
/// Verifies the calldata decodes back to channel, timeouts, salt and the original
/// instruction, native funds become the call value, and the handle reports the receipt.
#[tokio::test]
async fn test_execute_encodes_send_call() {
    let mock_server = MockServer::start().await;
    mount_receipt(&mock_server, "0x1").await;

    let wallet = RecordingWallet::new();
    let client = create_client(&mock_server, wallet.clone());
    let order = token_order(42);
    let funds = vec![Funds {
        denom: evm_chain().native_token.denom,
        amount: U256::from(7u8),
    }];

    let mut handle = client.execute(request(order.clone(), funds)).await.unwrap();
    assert_eq!(handle.tx_hash(), DUMMY_TX_HASH);
    assert_eq!(handle.wait_for_receipt().await.unwrap(), Some(16));

    let sent = wallet.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, parse_evm_address(DUMMY_ZKGM_CONTRACT_EVM).unwrap());
    assert_eq!(sent[0].value, U256::from(7u8));

    let selector = &call_data("send(uint32,uint64,uint64,bytes32,(uint8,uint8,bytes))", &[])[..4];
    assert_eq!(&sent[0].data[..4], selector);
    let mut r = AbiReader::decode(
        &[
            AbiType::Uint(32),
            AbiType::Uint(64),
            AbiType::Uint(64),
            AbiType::FixedBytes32,
            AbiType::Tuple(vec![AbiType::Uint(8), AbiType::Uint(8), AbiType::Bytes]),
        ],
        &sent[0].data[4..],
    )
    .unwrap();
    assert_eq!(r.uint().unwrap(), U256::from(3u8));
    assert_eq!(r.u64().unwrap(), 0);
    assert!(r.u64().unwrap() > 0);
    assert_ne!(r.fixed_bytes().unwrap(), [0u8; 32]);
    let mut inner = r.tuple().unwrap();
    let version = inner.u8().unwrap();
    let opcode = inner.u8().unwrap();
    let operand = inner.bytes().unwrap();
    assert_eq!(instruction::decode_operand(version, opcode, &operand).unwrap(), order);
}

/// 10. Test: Reverted send surfaces as an on-chain error
#[tokio::test]
async fn test_execute_revert() {
    let mock_server = MockServer::start().await;
    mount_receipt(&mock_server, "0x0").await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let mut handle = client.execute(request(token_order(1), Vec::new())).await.unwrap();
    let err = handle.wait_for_receipt().await.unwrap_err();
    assert_eq!(
        err,
        ResponseError::OnChain(OnChainError::Reverted {
            tx_hash: DUMMY_TX_HASH.to_string(),
            reason: "status 0x0".to_string(),
        })
    );
}

/// 11. Test: execute refuses requests for another chain
#[tokio::test]
async fn test_execute_chain_mismatch() {
    let mock_server = MockServer::start().await;
    let wallet = RecordingWallet::new();
    let client = create_client(&mock_server, wallet.clone());

    let mut req = request(token_order(1), Vec::new());
    req.source_chain = UniversalChainId::parse(DUMMY_COSMOS_CHAIN).unwrap();
    assert!(matches!(
        client.execute(req).await,
        Err(RequestError::ChainMismatch { .. })
    ));
    assert!(wallet.sent().is_empty());
}

// ============================================================================
// WRAPPED TOKENS
// ============================================================================

/// 12. Test: predict_wrapped_token asks the zkgm contract for the wrapped address
/// Verifies the call goes to the zkgm contract with the encoded (path, channel, token)
/// arguments and that the address word is taken from the result.
#[tokio::test]
async fn test_predict_wrapped_token() {
    let mock_server = MockServer::start().await;
    let expected_data = format!(
        "0x{}",
        hex::encode(call_data(
            "predictWrappedToken(uint256,uint32,bytes)",
            &[
                AbiValue::Uint(U256::zero()),
                AbiValue::uint(4u32),
                AbiValue::Bytes(b"muno".to_vec()),
            ],
        ))
    );
    let wrapped = [0xabu8; 20];
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&wrapped);
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_call",
            "params": [{"to": DUMMY_ZKGM_CONTRACT_EVM, "data": expected_data}]
        })))
        .respond_with(rpc_result(json!(format!(
            "0x{}",
            hex::encode(encode_params(&[
                AbiValue::Uint(U256::from_big_endian(&word)),
                AbiValue::FixedBytes([0x01; 32]),
            ]))
        ))))
        .mount(&mock_server)
        .await;

    let client = create_client(&mock_server, RecordingWallet::new());
    let predicted = client
        .predict_wrapped_token(U256::zero(), 4, b"muno")
        .await
        .unwrap();
    assert_eq!(predicted, wrapped);
}

// ============================================================================
// BATCHED APPROVAL
// ============================================================================

/// 13. Test: Orders spending the same token are approved for their sum
/// Verifies an allowance that covers each order alone but not both together leads to a
/// single approve for the combined amount, after a single allowance read.
/// Why: The contract pulls every order in the batch from one allowance.
#[tokio::test]
async fn test_approve_sums_batch_orders_per_token() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_call"})))
        .respond_with(rpc_result(json!(format!(
            "0x{}",
            hex::encode(encode_params(&[AbiValue::uint(1_500u64)]))
        ))))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_receipt(&mock_server, "0x1").await;

    let wallet = RecordingWallet::new();
    let client = create_client(&mock_server, wallet.clone());
    let batch = Instruction::Batch(Batch {
        instructions: vec![token_order(1_000), token_order(1_000)],
    });
    let hashes = client.approve(&batch).await.unwrap();

    assert_eq!(hashes, vec![DUMMY_TX_HASH.to_string()]);
    let sent = wallet.sent();
    assert_eq!(sent.len(), 1);
    let spender = parse_evm_address(DUMMY_ZKGM_CONTRACT_EVM).unwrap();
    let expected = call_data(
        "approve(address,uint256)",
        &[
            AbiValue::Uint(U256::from_big_endian(&spender)),
            AbiValue::uint(2_000u64),
        ],
    );
    assert_eq!(sent[0].data, expected);
}
