//! Instruction Codec
//!
//! UCS03 instructions are a closed, nested set of versioned variants. On the wire every
//! instruction is the ABI parameter list `(uint8 version, uint8 opcode, bytes operand)`
//! and the operand layout is selected by `(opcode, version)`.

use ethereum_types::U256;
use serde::Serialize;

use super::abi::{encode_params, AbiReader, AbiType, AbiValue};
use crate::error::{DecodeError, EncodeError};
use crate::utils::hex_bytes;

pub const OP_FORWARD: u8 = 0x00;
pub const OP_CALL: u8 = 0x01;
pub const OP_BATCH: u8 = 0x02;
pub const OP_TOKEN_ORDER: u8 = 0x03;

pub const INSTR_VERSION_0: u8 = 0x00;
pub const INSTR_VERSION_1: u8 = 0x01;
pub const INSTR_VERSION_2: u8 = 0x02;

/// Deepest allowed Batch/Forward nesting; a lone instruction has depth 1.
pub const MAX_INSTRUCTION_DEPTH: usize = 16;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    TokenOrder(TokenOrder),
    Batch(Batch),
    Call(Call),
    Forward(Forward),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "version")]
pub enum TokenOrder {
    #[serde(rename = "1")]
    V1(TokenOrderV1),
    #[serde(rename = "2")]
    V2(TokenOrderV2),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenOrderV1 {
    #[serde(with = "hex_bytes")]
    pub sender: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub receiver: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub base_token: Vec<u8>,
    pub base_amount: U256,
    pub base_token_symbol: String,
    pub base_token_name: String,
    pub base_token_decimals: u8,
    pub base_token_path: U256,
    #[serde(with = "hex_bytes")]
    pub quote_token: Vec<u8>,
    pub quote_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenOrderV2 {
    #[serde(with = "hex_bytes")]
    pub sender: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub receiver: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub base_token: Vec<u8>,
    pub base_amount: U256,
    #[serde(with = "hex_bytes")]
    pub quote_token: Vec<u8>,
    pub quote_amount: U256,
    pub kind: TokenOrderKind,
    #[serde(with = "hex_bytes")]
    pub metadata: Vec<u8>,
}

/// How the destination settles a TokenOrder. The codes are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOrderKind {
    Initialize,
    Escrow,
    Unescrow,
    Solve,
}

impl TokenOrderKind {
    pub fn code(self) -> u8 {
        match self {
            TokenOrderKind::Initialize => 0,
            TokenOrderKind::Escrow => 1,
            TokenOrderKind::Unescrow => 2,
            TokenOrderKind::Solve => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, DecodeError> {
        match code {
            0 => Ok(TokenOrderKind::Initialize),
            1 => Ok(TokenOrderKind::Escrow),
            2 => Ok(TokenOrderKind::Unescrow),
            3 => Ok(TokenOrderKind::Solve),
            other => Err(DecodeError::UnknownTokenOrderKind(other)),
        }
    }
}

impl std::str::FromStr for TokenOrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(TokenOrderKind::Initialize),
            "escrow" => Ok(TokenOrderKind::Escrow),
            "unescrow" => Ok(TokenOrderKind::Unescrow),
            "solve" => Ok(TokenOrderKind::Solve),
            other => Err(format!("unknown token order kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    #[serde(with = "hex_bytes")]
    pub sender: Vec<u8>,
    pub eureka: bool,
    #[serde(with = "hex_bytes")]
    pub contract_address: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub contract_calldata: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forward {
    pub path: U256,
    pub timeout_height: u64,
    pub timeout_timestamp: u64,
    pub instruction: Box<Instruction>,
}

/// Top-level packet body: a salted instruction routed along `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZkgmPacket {
    #[serde(with = "hex_bytes::array")]
    pub salt: [u8; 32],
    pub path: U256,
    pub instruction: Instruction,
}

impl Instruction {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Forward(_) => OP_FORWARD,
            Instruction::Call(_) => OP_CALL,
            Instruction::Batch(_) => OP_BATCH,
            Instruction::TokenOrder(_) => OP_TOKEN_ORDER,
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            Instruction::TokenOrder(TokenOrder::V1(_)) => INSTR_VERSION_1,
            Instruction::TokenOrder(TokenOrder::V2(_)) => INSTR_VERSION_2,
            Instruction::Forward(_) | Instruction::Call(_) | Instruction::Batch(_) => {
                INSTR_VERSION_0
            }
        }
    }

    /// Nesting depth, counting this instruction.
    pub fn depth(&self) -> usize {
        match self {
            Instruction::Batch(batch) => {
                1 + batch
                    .instructions
                    .iter()
                    .map(Instruction::depth)
                    .max()
                    .unwrap_or(0)
            }
            Instruction::Forward(forward) => 1 + forward.instruction.depth(),
            Instruction::TokenOrder(_) | Instruction::Call(_) => 1,
        }
    }

    /// Every TokenOrder in this tree, depth first.
    pub fn token_orders(&self) -> Vec<&TokenOrder> {
        match self {
            Instruction::TokenOrder(order) => vec![order],
            Instruction::Batch(batch) => batch
                .instructions
                .iter()
                .flat_map(Instruction::token_orders)
                .collect(),
            Instruction::Forward(forward) => forward.instruction.token_orders(),
            Instruction::Call(_) => Vec::new(),
        }
    }
}

impl TokenOrder {
    pub fn base_token(&self) -> &[u8] {
        match self {
            TokenOrder::V1(order) => &order.base_token,
            TokenOrder::V2(order) => &order.base_token,
        }
    }

    pub fn base_amount(&self) -> U256 {
        match self {
            TokenOrder::V1(order) => order.base_amount,
            TokenOrder::V2(order) => order.base_amount,
        }
    }
}

// ============================================================================
// ENCODING
// ============================================================================

fn instruction_type() -> AbiType {
    AbiType::Tuple(vec![AbiType::Uint(8), AbiType::Uint(8), AbiType::Bytes])
}

fn token_order_v1_types() -> Vec<AbiType> {
    vec![
        AbiType::Bytes,
        AbiType::Bytes,
        AbiType::Bytes,
        AbiType::Uint(256),
        AbiType::String,
        AbiType::String,
        AbiType::Uint(8),
        AbiType::Uint(256),
        AbiType::Bytes,
        AbiType::Uint(256),
    ]
}

fn token_order_v2_types() -> Vec<AbiType> {
    vec![
        AbiType::Bytes,
        AbiType::Bytes,
        AbiType::Bytes,
        AbiType::Uint(256),
        AbiType::Bytes,
        AbiType::Uint(256),
        AbiType::Uint(8),
        AbiType::Bytes,
    ]
}

fn call_types() -> Vec<AbiType> {
    vec![AbiType::Bytes, AbiType::Bool, AbiType::Bytes, AbiType::Bytes]
}

fn forward_types() -> Vec<AbiType> {
    vec![
        AbiType::Uint(256),
        AbiType::Uint(64),
        AbiType::Uint(64),
        instruction_type(),
    ]
}

fn batch_types() -> Vec<AbiType> {
    vec![AbiType::Array(Box::new(instruction_type()))]
}

/// Encodes an instruction to its `(version, opcode, operand)` wire form.
pub fn encode(instruction: &Instruction) -> Result<Vec<u8>, EncodeError> {
    check_depth(instruction)?;
    Ok(encode_params(&instruction_fields(instruction)))
}

/// Encodes only the operand, for chains whose entry point takes version and opcode apart.
pub fn encode_operand(instruction: &Instruction) -> Result<Vec<u8>, EncodeError> {
    check_depth(instruction)?;
    Ok(operand(instruction))
}

fn check_depth(instruction: &Instruction) -> Result<(), EncodeError> {
    if instruction.depth() > MAX_INSTRUCTION_DEPTH {
        return Err(EncodeError::DepthExceeded {
            max: MAX_INSTRUCTION_DEPTH,
        });
    }
    Ok(())
}

fn instruction_fields(instruction: &Instruction) -> Vec<AbiValue> {
    vec![
        AbiValue::uint(instruction.version()),
        AbiValue::uint(instruction.opcode()),
        AbiValue::Bytes(operand(instruction)),
    ]
}

fn to_abi(instruction: &Instruction) -> AbiValue {
    AbiValue::Tuple(instruction_fields(instruction))
}

fn operand(instruction: &Instruction) -> Vec<u8> {
    match instruction {
        Instruction::TokenOrder(TokenOrder::V1(order)) => encode_params(&[
            AbiValue::Bytes(order.sender.clone()),
            AbiValue::Bytes(order.receiver.clone()),
            AbiValue::Bytes(order.base_token.clone()),
            AbiValue::Uint(order.base_amount),
            AbiValue::String(order.base_token_symbol.clone()),
            AbiValue::String(order.base_token_name.clone()),
            AbiValue::uint(order.base_token_decimals),
            AbiValue::Uint(order.base_token_path),
            AbiValue::Bytes(order.quote_token.clone()),
            AbiValue::Uint(order.quote_amount),
        ]),
        Instruction::TokenOrder(TokenOrder::V2(order)) => encode_params(&[
            AbiValue::Bytes(order.sender.clone()),
            AbiValue::Bytes(order.receiver.clone()),
            AbiValue::Bytes(order.base_token.clone()),
            AbiValue::Uint(order.base_amount),
            AbiValue::Bytes(order.quote_token.clone()),
            AbiValue::Uint(order.quote_amount),
            AbiValue::uint(order.kind.code()),
            AbiValue::Bytes(order.metadata.clone()),
        ]),
        Instruction::Batch(batch) => encode_params(&[AbiValue::Array(
            batch.instructions.iter().map(to_abi).collect(),
        )]),
        Instruction::Call(call) => encode_params(&[
            AbiValue::Bytes(call.sender.clone()),
            AbiValue::Bool(call.eureka),
            AbiValue::Bytes(call.contract_address.clone()),
            AbiValue::Bytes(call.contract_calldata.clone()),
        ]),
        Instruction::Forward(forward) => encode_params(&[
            AbiValue::Uint(forward.path),
            AbiValue::uint(forward.timeout_height),
            AbiValue::uint(forward.timeout_timestamp),
            to_abi(&forward.instruction),
        ]),
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes wire bytes into an instruction tree.
pub fn decode(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let mut reader = AbiReader::decode(
        &[AbiType::Uint(8), AbiType::Uint(8), AbiType::Bytes],
        bytes,
    )?;
    decode_parts(&mut reader, 1)
}

/// Decodes an operand given its version and opcode.
pub fn decode_operand(version: u8, opcode: u8, operand: &[u8]) -> Result<Instruction, DecodeError> {
    decode_fields(version, opcode, operand, 1)
}

fn decode_parts(reader: &mut AbiReader, depth: usize) -> Result<Instruction, DecodeError> {
    let version = reader.u8()?;
    let opcode = reader.u8()?;
    let operand = reader.bytes()?;
    decode_fields(version, opcode, &operand, depth)
}

fn decode_fields(
    version: u8,
    opcode: u8,
    operand: &[u8],
    depth: usize,
) -> Result<Instruction, DecodeError> {
    if depth > MAX_INSTRUCTION_DEPTH {
        return Err(DecodeError::DepthExceeded {
            max: MAX_INSTRUCTION_DEPTH,
        });
    }

    match (opcode, version) {
        (OP_TOKEN_ORDER, INSTR_VERSION_1) => {
            let mut r = AbiReader::decode(&token_order_v1_types(), operand)?;
            Ok(Instruction::TokenOrder(TokenOrder::V1(TokenOrderV1 {
                sender: r.bytes()?,
                receiver: r.bytes()?,
                base_token: r.bytes()?,
                base_amount: r.uint()?,
                base_token_symbol: r.string()?,
                base_token_name: r.string()?,
                base_token_decimals: r.u8()?,
                base_token_path: r.uint()?,
                quote_token: r.bytes()?,
                quote_amount: r.uint()?,
            })))
        }
        (OP_TOKEN_ORDER, INSTR_VERSION_2) => {
            let mut r = AbiReader::decode(&token_order_v2_types(), operand)?;
            Ok(Instruction::TokenOrder(TokenOrder::V2(TokenOrderV2 {
                sender: r.bytes()?,
                receiver: r.bytes()?,
                base_token: r.bytes()?,
                base_amount: r.uint()?,
                quote_token: r.bytes()?,
                quote_amount: r.uint()?,
                kind: TokenOrderKind::from_code(r.u8()?)?,
                metadata: r.bytes()?,
            })))
        }
        (OP_BATCH, INSTR_VERSION_0) => {
            let mut r = AbiReader::decode(&batch_types(), operand)?;
            let instructions = r
                .array()?
                .into_iter()
                .map(|item| match item {
                    AbiValue::Tuple(fields) => {
                        decode_parts(&mut AbiReader::new(fields), depth + 1)
                    }
                    _ => Err(DecodeError::TypeMismatch { expected: "tuple" }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Instruction::Batch(Batch { instructions }))
        }
        (OP_CALL, INSTR_VERSION_0) => {
            let mut r = AbiReader::decode(&call_types(), operand)?;
            Ok(Instruction::Call(Call {
                sender: r.bytes()?,
                eureka: r.bool()?,
                contract_address: r.bytes()?,
                contract_calldata: r.bytes()?,
            }))
        }
        (OP_FORWARD, INSTR_VERSION_0) => {
            let mut r = AbiReader::decode(&forward_types(), operand)?;
            let path = r.uint()?;
            let timeout_height = r.u64()?;
            let timeout_timestamp = r.u64()?;
            let instruction = decode_parts(&mut r.tuple()?, depth + 1)?;
            Ok(Instruction::Forward(Forward {
                path,
                timeout_height,
                timeout_timestamp,
                instruction: Box::new(instruction),
            }))
        }
        (opcode, version) => Err(DecodeError::UnknownInstruction { opcode, version }),
    }
}

// ============================================================================
// PACKET
// ============================================================================

impl ZkgmPacket {
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        check_depth(&self.instruction)?;
        Ok(encode_params(&[
            AbiValue::FixedBytes(self.salt),
            AbiValue::Uint(self.path),
            to_abi(&self.instruction),
        ]))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = AbiReader::decode(
            &[AbiType::FixedBytes32, AbiType::Uint(256), instruction_type()],
            bytes,
        )?;
        Ok(ZkgmPacket {
            salt: r.fixed_bytes()?,
            path: r.uint()?,
            instruction: decode_parts(&mut r.tuple()?, 1)?,
        })
    }
}
