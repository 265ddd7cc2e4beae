//! Acknowledgement Codec
//!
//! An ack is `(uint256 tag, bytes inner)`. The inner payload cannot be decoded on its
//! own: its layout depends on the instruction the ack answers, so decoding takes the
//! [`AckShape`] of that instruction.

use ethereum_types::U256;
use serde::Serialize;

use super::abi::{encode_params, AbiReader, AbiType, AbiValue};
use super::instruction::{Instruction, TokenOrder};
use crate::error::DecodeError;
use crate::utils::hex_bytes;

pub const TAG_ACK_FAILURE: u64 = 0;
pub const TAG_ACK_SUCCESS: u64 = 1;

pub const FILL_TYPE_PROTOCOL: u64 = 0xb0cad0;
pub const FILL_TYPE_MARKETMAKER: u64 = 0xd1cec45e;

/// The part of an instruction that determines its ack layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckShape {
    Forward,
    Call { eureka: bool },
    Batch(Vec<AckShape>),
    TokenOrder { version: u8 },
}

impl AckShape {
    pub fn of(instruction: &Instruction) -> Self {
        match instruction {
            Instruction::Forward(_) => AckShape::Forward,
            Instruction::Call(call) => AckShape::Call {
                eureka: call.eureka,
            },
            Instruction::Batch(batch) => {
                AckShape::Batch(batch.instructions.iter().map(AckShape::of).collect())
            }
            Instruction::TokenOrder(TokenOrder::V1(_)) => AckShape::TokenOrder { version: 1 },
            Instruction::TokenOrder(TokenOrder::V2(_)) => AckShape::TokenOrder { version: 2 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "ack", rename_all = "snake_case")]
pub enum Ack {
    Success(RootAck),
    /// Failure payloads are opaque and surfaced verbatim.
    Failure(#[serde(with = "hex_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RootAck {
    Batch(Vec<Ack>),
    TokenOrder(TokenOrderAck),
    Call(CallAck),
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "fill", content = "market_maker", rename_all = "snake_case")]
pub enum TokenOrderAck {
    Protocol,
    MarketMaker(#[serde(with = "hex_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", content = "return_data", rename_all = "snake_case")]
pub enum CallAck {
    NonEureka,
    Eureka(#[serde(with = "hex_bytes")] Vec<u8>),
}

// ============================================================================
// ENCODING
// ============================================================================

pub fn encode(ack: &Ack) -> Vec<u8> {
    let (tag, inner) = match ack {
        Ack::Failure(payload) => (TAG_ACK_FAILURE, payload.clone()),
        Ack::Success(root) => (TAG_ACK_SUCCESS, encode_inner(root)),
    };
    encode_params(&[AbiValue::uint(tag), AbiValue::Bytes(inner)])
}

fn encode_inner(root: &RootAck) -> Vec<u8> {
    match root {
        RootAck::Batch(acks) => encode_params(&[AbiValue::Array(
            acks.iter().map(|ack| AbiValue::Bytes(encode(ack))).collect(),
        )]),
        RootAck::TokenOrder(TokenOrderAck::Protocol) => {
            encode_params(&[AbiValue::uint(FILL_TYPE_PROTOCOL), AbiValue::Bytes(Vec::new())])
        }
        RootAck::TokenOrder(TokenOrderAck::MarketMaker(maker)) => encode_params(&[
            AbiValue::uint(FILL_TYPE_MARKETMAKER),
            AbiValue::Bytes(maker.clone()),
        ]),
        RootAck::Call(CallAck::NonEureka) | RootAck::Forward => Vec::new(),
        RootAck::Call(CallAck::Eureka(data)) => data.clone(),
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes an ack answering an instruction of the given shape.
pub fn decode(bytes: &[u8], shape: &AckShape) -> Result<Ack, DecodeError> {
    let mut r = AbiReader::decode(&[AbiType::Uint(256), AbiType::Bytes], bytes)?;
    let tag = r.uint()?;
    let inner = r.bytes()?;

    if tag == U256::from(TAG_ACK_FAILURE) {
        return Ok(Ack::Failure(inner));
    }
    if tag != U256::from(TAG_ACK_SUCCESS) {
        return Err(DecodeError::UnknownAckTag(tag));
    }

    let root = match shape {
        AckShape::Forward => {
            expect_empty(&inner, "forward")?;
            RootAck::Forward
        }
        AckShape::Call { eureka: false } => {
            expect_empty(&inner, "call")?;
            RootAck::Call(CallAck::NonEureka)
        }
        AckShape::Call { eureka: true } => RootAck::Call(CallAck::Eureka(inner)),
        AckShape::TokenOrder { .. } => RootAck::TokenOrder(decode_token_order(&inner)?),
        AckShape::Batch(children) => {
            let mut r = AbiReader::decode(&[AbiType::Array(Box::new(AbiType::Bytes))], &inner)?;
            let entries = r.array()?;
            if entries.len() != children.len() {
                return Err(DecodeError::BatchArityMismatch {
                    expected: children.len(),
                    actual: entries.len(),
                });
            }
            let acks = entries
                .into_iter()
                .zip(children)
                .map(|(entry, child)| match entry {
                    AbiValue::Bytes(bytes) => decode(&bytes, child),
                    _ => Err(DecodeError::TypeMismatch { expected: "bytes" }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            RootAck::Batch(acks)
        }
    };

    Ok(Ack::Success(root))
}

fn decode_token_order(inner: &[u8]) -> Result<TokenOrderAck, DecodeError> {
    let mut r = AbiReader::decode(&[AbiType::Uint(256), AbiType::Bytes], inner)?;
    let fill_type = r.uint()?;
    let market_maker = r.bytes()?;

    if fill_type == U256::from(FILL_TYPE_PROTOCOL) {
        expect_empty(&market_maker, "protocol fill")?;
        Ok(TokenOrderAck::Protocol)
    } else if fill_type == U256::from(FILL_TYPE_MARKETMAKER) {
        Ok(TokenOrderAck::MarketMaker(market_maker))
    } else {
        Err(DecodeError::UnknownFillType(fill_type))
    }
}

fn expect_empty(inner: &[u8], what: &'static str) -> Result<(), DecodeError> {
    if inner.is_empty() {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedAckPayload(what))
    }
}
