//! Unit tests for the instruction codec

use ethereum_types::U256;
use zkgm_client::error::{DecodeError, EncodeError};
use zkgm_client::ucs03::abi::{encode_params, AbiValue};
use zkgm_client::ucs03::instruction::{
    self, Batch, Call, Forward, Instruction, TokenOrder, TokenOrderKind, TokenOrderV1,
    TokenOrderV2, ZkgmPacket, MAX_INSTRUCTION_DEPTH, OP_CALL, OP_FORWARD,
};

mod helpers;
use helpers::{DUMMY_RECEIVER_ADDR_EVM, DUMMY_SENDER_ADDR_EVM, DUMMY_TOKEN_ADDR_EVM};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn evm_bytes(address: &str) -> Vec<u8> {
    hex::decode(address.trim_start_matches("0x")).unwrap()
}

fn solve_order() -> Instruction {
    Instruction::TokenOrder(TokenOrder::V2(TokenOrderV2 {
        sender: evm_bytes(DUMMY_SENDER_ADDR_EVM),
        receiver: evm_bytes(DUMMY_RECEIVER_ADDR_EVM),
        base_token: evm_bytes(DUMMY_TOKEN_ADDR_EVM),
        base_amount: U256::from(1000u64) * U256::exp10(18),
        quote_token: b"muno".to_vec(),
        quote_amount: U256::from(1000u64) * U256::exp10(6),
        kind: TokenOrderKind::Solve,
        metadata: Vec::new(),
    }))
}

fn sample_call() -> Instruction {
    Instruction::Call(Call {
        sender: evm_bytes(DUMMY_SENDER_ADDR_EVM),
        eureka: false,
        contract_address: b"union1contract".to_vec(),
        contract_calldata: br#"{"ping":{}}"#.to_vec(),
    })
}

fn v1_order(path: u64) -> Instruction {
    Instruction::TokenOrder(TokenOrder::V1(TokenOrderV1 {
        sender: evm_bytes(DUMMY_SENDER_ADDR_EVM),
        receiver: evm_bytes(DUMMY_RECEIVER_ADDR_EVM),
        base_token: evm_bytes(DUMMY_TOKEN_ADDR_EVM),
        base_amount: U256::from(5_000_000u64),
        base_token_symbol: "USDC".to_string(),
        base_token_name: "USD Coin".to_string(),
        base_token_decimals: 6,
        base_token_path: U256::from(path),
        quote_token: evm_bytes(DUMMY_TOKEN_ADDR_EVM),
        quote_amount: U256::from(4_990_000u64),
    }))
}

/// Wraps `inner` in `levels` Forward instructions.
fn nest_forward(inner: Instruction, levels: usize) -> Instruction {
    (0..levels).fold(inner, |acc, i| {
        Instruction::Forward(Forward {
            path: U256::from(i + 1),
            timeout_height: 0,
            timeout_timestamp: 1_700_000_000_000_000_000,
            instruction: Box::new(acc),
        })
    })
}

/// Hand-packs `levels` Forward layers around a call, bypassing the encoder's depth check.
fn raw_nested_forward(levels: usize) -> Vec<u8> {
    let call_operand = encode_params(&[
        AbiValue::Bytes(vec![1]),
        AbiValue::Bool(false),
        AbiValue::Bytes(vec![2]),
        AbiValue::Bytes(vec![3]),
    ]);
    let mut fields = vec![
        AbiValue::uint(0u8),
        AbiValue::uint(OP_CALL),
        AbiValue::Bytes(call_operand),
    ];
    for _ in 0..levels {
        let operand = encode_params(&[
            AbiValue::uint(1u8),
            AbiValue::uint(0u8),
            AbiValue::uint(0u8),
            AbiValue::Tuple(fields),
        ]);
        fields = vec![
            AbiValue::uint(0u8),
            AbiValue::uint(OP_FORWARD),
            AbiValue::Bytes(operand),
        ];
    }
    encode_params(&fields)
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// 1. Test: Batch of a solve TokenOrder and a Call survives a round trip
/// Verifies that a Batch containing a v2 solve order (1000 * 10^18 base amount, EVM
/// sender/receiver, bank-denom quote) and a Call decodes to exactly two instructions
/// in their original order with every field intact.
/// Why: Batches are the common multi-step transfer shape; reordering or dropping an
/// element would misroute funds.
#[test]
fn test_batch_with_solve_order_and_call_round_trips() {
    let batch = Instruction::Batch(Batch {
        instructions: vec![solve_order(), sample_call()],
    });

    let encoded = instruction::encode(&batch).unwrap();
    let decoded = instruction::decode(&encoded).unwrap();

    let Instruction::Batch(decoded_batch) = &decoded else {
        panic!("expected a batch, got {:?}", decoded);
    };
    assert_eq!(decoded_batch.instructions.len(), 2);
    assert_eq!(decoded_batch.instructions[0], solve_order());
    assert_eq!(decoded_batch.instructions[1], sample_call());
    assert_eq!(decoded, batch);
}

/// 2. Test: Unknown opcode fails with a DecodeError
/// Verifies that a well-formed `(version, opcode, operand)` buffer with opcode 0xFF is
/// rejected as UnknownInstruction.
/// Why: Unknown wire data must surface as a typed error, never as a panic or a
/// silently misread instruction.
#[test]
fn test_unknown_opcode_rejected() {
    let bytes = encode_params(&[
        AbiValue::uint(0u8),
        AbiValue::uint(0xffu8),
        AbiValue::Bytes(vec![0u8; 64]),
    ]);
    assert_eq!(
        instruction::decode(&bytes),
        Err(DecodeError::UnknownInstruction {
            opcode: 0xff,
            version: 0
        })
    );
}

/// 3. Test: Unknown version of a known opcode is rejected
/// Why: TokenOrder v3 does not exist; decoding it with the v2 layout would be a guess.
#[test]
fn test_unknown_version_rejected() {
    let operand = instruction::encode_operand(&solve_order()).unwrap();
    let bytes = encode_params(&[AbiValue::uint(3u8), AbiValue::uint(3u8), AbiValue::Bytes(operand)]);
    assert!(matches!(
        instruction::decode(&bytes),
        Err(DecodeError::UnknownInstruction { opcode: 3, version: 3 })
    ));
}

// ============================================================================
// WIRE LAYOUT
// ============================================================================

/// 4. Test: Kind codes are pinned
/// Verifies initialize=0, escrow=1, unescrow=2, solve=3 in the encoded operand.
/// Why: The codes are part of the wire format and must never be renumbered.
#[test]
fn test_kind_codes_pinned() {
    for (kind, code) in [
        (TokenOrderKind::Initialize, 0u8),
        (TokenOrderKind::Escrow, 1),
        (TokenOrderKind::Unescrow, 2),
        (TokenOrderKind::Solve, 3),
    ] {
        assert_eq!(kind.code(), code);
        let Instruction::TokenOrder(TokenOrder::V2(mut order)) = solve_order() else {
            unreachable!()
        };
        order.kind = kind;
        let operand =
            instruction::encode_operand(&Instruction::TokenOrder(TokenOrder::V2(order))).unwrap();
        // kind is the 7th head word of the v2 operand
        assert_eq!(operand[6 * 32 + 31], code);
        assert!(operand[6 * 32..6 * 32 + 31].iter().all(|b| *b == 0));
    }
}

/// 5. Test: Instruction header words
/// Verifies the outer encoding starts with the version word, then the opcode word,
/// then the offset of the operand (0x60).
#[test]
fn test_header_layout() {
    let encoded = instruction::encode(&solve_order()).unwrap();
    assert_eq!(encoded[31], 2);
    assert_eq!(encoded[63], 3);
    assert_eq!(encoded[95], 0x60);
}

/// 6. Test: Decoding a bare operand
/// Why: Move chains pass version, opcode and operand as separate arguments.
#[test]
fn test_decode_operand_matches_full_decode() {
    let call = sample_call();
    let operand = instruction::encode_operand(&call).unwrap();
    assert_eq!(
        instruction::decode_operand(call.version(), call.opcode(), &operand).unwrap(),
        call
    );
}

/// 7. Test: V1 order with a path round-trips
#[test]
fn test_v1_order_round_trips() {
    let order = v1_order(7);
    let decoded = instruction::decode(&instruction::encode(&order).unwrap()).unwrap();
    assert_eq!(decoded, order);
}

/// 8. Test: Packet round-trip
/// Verifies the `(salt, path, instruction)` packet body decodes to its source.
#[test]
fn test_packet_round_trips() {
    let packet = ZkgmPacket {
        salt: [0x5a; 32],
        path: U256::from(42u64),
        instruction: nest_forward(v1_order(0), 2),
    };
    let encoded = packet.encode().unwrap();
    assert_eq!(ZkgmPacket::decode(&encoded).unwrap(), packet);
}

// ============================================================================
// MALFORMED INPUT
// ============================================================================

/// 9. Test: Truncated input is rejected
#[test]
fn test_truncated_input_rejected() {
    let encoded = instruction::encode(&solve_order()).unwrap();
    let result = instruction::decode(&encoded[..encoded.len() - 1]);
    assert!(result.is_err(), "truncated buffer decoded: {:?}", result);
}

/// 10. Test: Non-canonical uint8 padding is rejected
/// Why: Accepting garbage in the padding would make two byte strings decode to the
/// same instruction.
#[test]
fn test_dirty_padding_rejected() {
    let mut encoded = instruction::encode(&sample_call()).unwrap();
    encoded[0] = 1;
    assert!(matches!(
        instruction::decode(&encoded),
        Err(DecodeError::NonCanonicalInteger { .. })
    ));
}

/// 11. Test: Empty input is rejected
#[test]
fn test_empty_input_rejected() {
    assert!(instruction::decode(&[]).is_err());
}

// ============================================================================
// DEPTH CEILING
// ============================================================================

/// 12. Test: Maximum depth encodes and decodes
#[test]
fn test_max_depth_accepted() {
    let deep = nest_forward(sample_call(), MAX_INSTRUCTION_DEPTH - 1);
    assert_eq!(deep.depth(), MAX_INSTRUCTION_DEPTH);
    let decoded = instruction::decode(&instruction::encode(&deep).unwrap()).unwrap();
    assert_eq!(decoded, deep);
}

/// 13. Test: Encoder rejects trees past the ceiling
#[test]
fn test_encode_depth_exceeded() {
    let too_deep = nest_forward(sample_call(), MAX_INSTRUCTION_DEPTH);
    assert_eq!(
        instruction::encode(&too_deep),
        Err(EncodeError::DepthExceeded {
            max: MAX_INSTRUCTION_DEPTH
        })
    );
}

/// 14. Test: Decoder rejects adversarially deep input
/// Why: Wire input is untrusted; recursion must be bounded before it can exhaust the stack.
#[test]
fn test_decode_depth_exceeded() {
    let bytes = raw_nested_forward(MAX_INSTRUCTION_DEPTH);
    assert_eq!(
        instruction::decode(&bytes),
        Err(DecodeError::DepthExceeded {
            max: MAX_INSTRUCTION_DEPTH
        })
    );

    let ok = raw_nested_forward(MAX_INSTRUCTION_DEPTH - 1);
    assert!(instruction::decode(&ok).is_ok());
}

/// 15. Test: token_orders walks nested trees
#[test]
fn test_token_orders_collects_nested_orders() {
    let tree = Instruction::Batch(Batch {
        instructions: vec![solve_order(), sample_call(), nest_forward(v1_order(0), 1)],
    });
    let orders = tree.token_orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].base_amount(), U256::from(1000u64) * U256::exp10(18));
    assert_eq!(orders[1].base_amount(), U256::from(5_000_000u64));
}
