//! Unit tests for the TokenOrder builder

use ethereum_types::U256;
use zkgm_client::error::OrderField;
use zkgm_client::token::{Token, TokenKind, TokenMetadata};
use zkgm_client::token_order::{v1_base_token_path, TokenOrderBuilder, TokenOrderOptions};
use zkgm_client::ucs03::{Instruction, TokenOrder, TokenOrderKind};

mod helpers;
use helpers::{
    cosmos_chain, evm_chain, DUMMY_CW20_ADDR_COSMOS, DUMMY_RECEIVER_ADDR_COSMOS,
    DUMMY_SENDER_ADDR_COSMOS, DUMMY_SENDER_ADDR_EVM, DUMMY_TOKEN_ADDR_EVM,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// EVM -> Cosmos order with every field set.
fn complete_builder(kind: TokenOrderKind) -> TokenOrderBuilder {
    TokenOrderBuilder::new()
        .modify(TokenOrderOptions {
            source: Some(evm_chain()),
            destination: Some(cosmos_chain()),
            source_channel: Some(7),
            sender: Some(DUMMY_SENDER_ADDR_EVM.to_string()),
            receiver: Some(DUMMY_RECEIVER_ADDR_COSMOS.to_string()),
            base_token: Some(Token::contract(DUMMY_TOKEN_ADDR_EVM)),
            base_amount: Some("1000000".to_string()),
            quote_token: Some(Token::contract(DUMMY_CW20_ADDR_COSMOS)),
            quote_amount: Some("999000".to_string()),
            kind: Some(kind),
            metadata: None,
        })
        .unwrap()
}

fn usdc() -> TokenMetadata {
    TokenMetadata {
        name: "USD Coin".to_string(),
        symbol: "USDC".to_string(),
        decimals: 6,
    }
}

// ============================================================================
// V1 PATH RULE
// ============================================================================

/// 1. Test: Unescrow carries the source channel as its path
/// Verifies that a v1 unescrow order built with channel 7 has baseTokenPath = 7.
/// Why: Unescrow releases a wrapped token, which the destination locates by the
/// channel it was originally sent over.
#[test]
fn test_v1_unescrow_path_is_source_channel() {
    let instruction = complete_builder(TokenOrderKind::Unescrow)
        .encode_v1(&usdc())
        .unwrap();
    let Instruction::TokenOrder(TokenOrder::V1(order)) = instruction else {
        panic!("expected a v1 order");
    };
    assert_eq!(order.base_token_path, U256::from(7u32));
    assert_eq!(order.base_token_symbol, "USDC");
    assert_eq!(order.base_token_decimals, 6);
}

/// 2. Test: Every other kind has a zero path
#[test]
fn test_v1_path_zero_for_other_kinds() {
    for kind in [
        TokenOrderKind::Initialize,
        TokenOrderKind::Escrow,
        TokenOrderKind::Solve,
    ] {
        let draft = complete_builder(kind).pending_v1().unwrap();
        assert_eq!(draft.base_token_path, U256::zero(), "kind {:?}", kind);
    }
}

/// 3. Test: Unescrow without a channel is rejected
#[test]
fn test_v1_unescrow_requires_channel() {
    let err = v1_base_token_path(TokenOrderKind::Unescrow, None).unwrap_err();
    assert_eq!(err.field, OrderField::SourceChannel);
    assert_eq!(
        v1_base_token_path(TokenOrderKind::Unescrow, Some(3)).unwrap(),
        U256::from(3u32)
    );
}

// ============================================================================
// COPY ON WRITE
// ============================================================================

/// 4. Test: Setters leave the original builder untouched
/// Why: Builders are shared between UI states; mutation through one handle must not
/// leak into another.
#[test]
fn test_setters_are_copy_on_write() {
    let original = complete_builder(TokenOrderKind::Escrow);
    let snapshot = original.clone();

    let updated = original.set_base_amount("42").unwrap();
    assert_eq!(updated.base_amount(), Some(U256::from(42u32)));
    assert_eq!(original, snapshot);
    assert_eq!(original.base_amount(), Some(U256::from(1_000_000u32)));
}

/// 5. Test: A failed setter does not change the builder
#[test]
fn test_failed_setter_keeps_builder() {
    let original = complete_builder(TokenOrderKind::Escrow);
    let err = original.set_sender("not an address").unwrap_err();
    assert_eq!(err.field, OrderField::Sender);
    assert_eq!(original.sender(), Some(DUMMY_SENDER_ADDR_EVM));
}

/// 6. Test: modify aborts on the first failing field
/// Verifies that no field from a failing `modify` call is applied.
#[test]
fn test_modify_is_all_or_nothing() {
    let original = complete_builder(TokenOrderKind::Escrow);
    let err = original
        .modify(TokenOrderOptions {
            base_amount: Some("5".to_string()),
            quote_amount: Some("-1".to_string()),
            ..Default::default()
        })
        .unwrap_err();
    assert_eq!(err.field, OrderField::QuoteAmount);
    assert_eq!(original.base_amount(), Some(U256::from(1_000_000u32)));
}

// ============================================================================
// VALIDATION
// ============================================================================

/// 7. Test: Sender is checked against the source family
/// Verifies a bech32 sender is rejected on an EVM source and accepted on a Cosmos one.
#[test]
fn test_sender_checked_against_source() {
    let builder = TokenOrderBuilder::new().set_source(evm_chain()).unwrap();
    assert_eq!(
        builder.set_sender(DUMMY_SENDER_ADDR_COSMOS).unwrap_err().field,
        OrderField::Sender
    );

    let builder = TokenOrderBuilder::new().set_source(cosmos_chain()).unwrap();
    assert!(builder.set_sender(DUMMY_SENDER_ADDR_COSMOS).is_ok());
}

/// 8. Test: Changing a chain re-checks dependent fields
/// Why: A receiver valid on one destination may be meaningless on the next.
#[test]
fn test_switching_destination_rechecks_receiver() {
    let builder = complete_builder(TokenOrderKind::Escrow);
    let err = builder.set_destination(evm_chain()).unwrap_err();
    assert_eq!(err.field, OrderField::Receiver);
}

/// 9. Test: Amount parsing rejects signs, decimals and overflow
#[test]
fn test_amount_validation() {
    let builder = TokenOrderBuilder::new();
    assert!(builder.set_base_amount("-5").is_err());
    assert!(builder.set_base_amount("1.5").is_err());
    assert!(builder.set_base_amount("").is_err());
    let too_big = format!("1{}", "0".repeat(78));
    assert!(builder.set_base_amount(&too_big).is_err());
    assert_eq!(
        builder.set_base_amount("0").unwrap().base_amount(),
        Some(U256::zero())
    );
}

/// 10. Test: Zero channel is rejected
#[test]
fn test_zero_channel_rejected() {
    let err = TokenOrderBuilder::new().set_source_channel(0).unwrap_err();
    assert_eq!(err.field, OrderField::SourceChannel);
}

/// 11. Test: Encoding reports the first missing field
#[test]
fn test_encode_reports_missing_field() {
    let builder = TokenOrderBuilder::new()
        .set_source(evm_chain())
        .unwrap()
        .set_destination(cosmos_chain())
        .unwrap();
    let err = builder.encode_v2().unwrap_err();
    assert_eq!(err.field, OrderField::Sender);
    assert_eq!(err.reason, "not set");
}

// ============================================================================
// ENCODING
// ============================================================================

/// 12. Test: V2 encoding uses each chain's zkgm forms
/// Verifies EVM fields are raw 20 bytes and Cosmos fields are bech32 text.
#[test]
fn test_v2_uses_zkgm_forms() {
    let instruction = complete_builder(TokenOrderKind::Solve)
        .set_metadata(vec![0xaa, 0xbb])
        .unwrap()
        .encode_v2()
        .unwrap();
    let Instruction::TokenOrder(TokenOrder::V2(order)) = instruction else {
        panic!("expected a v2 order");
    };
    assert_eq!(order.sender.len(), 20);
    assert_eq!(order.receiver, DUMMY_RECEIVER_ADDR_COSMOS.as_bytes());
    assert_eq!(order.quote_token, DUMMY_CW20_ADDR_COSMOS.as_bytes());
    assert_eq!(order.kind, TokenOrderKind::Solve);
    assert_eq!(order.metadata, vec![0xaa, 0xbb]);
}

/// 13. Test: Native bank denom as quote token
#[test]
fn test_bank_denom_quote_token() {
    let instruction = complete_builder(TokenOrderKind::Escrow)
        .set_quote_token(Token::new("muno", TokenKind::Native))
        .unwrap()
        .encode_v2()
        .unwrap();
    let Instruction::TokenOrder(TokenOrder::V2(order)) = instruction else {
        panic!("expected a v2 order");
    };
    assert_eq!(order.quote_token, b"muno".to_vec());
}
