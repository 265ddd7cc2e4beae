//! Error Types
//!
//! Typed error taxonomy for the codec, the builder, and the chain adapters.
//!
//! - `EncodeError` / `DecodeError`: malformed or unknown wire data, always fatal
//! - `ValidationError`: builder input failed a local check, fatal to that call only
//! - `TransportError`: failure before the chain accepted anything, safe to retry
//! - `OnChainError`: rejected after submission, a retry needs a fresh salt
//! - `IndexingError`: the indexer has not caught up yet (a polling condition)

use std::fmt;

use ethereum_types::U256;
use thiserror::Error;

// ============================================================================
// WIRE CODEC ERRORS
// ============================================================================

/// Errors raised while encoding an instruction or acknowledgement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Instruction nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },
}

/// Errors raised while decoding wire bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Buffer truncated: need {needed} bytes at offset {offset}, have {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("Offset or length word out of range at offset {offset}")]
    InvalidOffset { offset: usize },

    #[error("Non-canonical padding for uint{bits} at offset {offset}")]
    NonCanonicalInteger { offset: usize, bits: usize },

    #[error("Invalid bool word at offset {offset}")]
    InvalidBool { offset: usize },

    #[error("String field is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unknown instruction: opcode 0x{opcode:02x}, version {version}")]
    UnknownInstruction { opcode: u8, version: u8 },

    #[error("Unknown token order kind code {0}")]
    UnknownTokenOrderKind(u8),

    #[error("Unknown acknowledgement tag {0}")]
    UnknownAckTag(U256),

    #[error("Unknown token order fill type {0}")]
    UnknownFillType(U256),

    #[error("Batch acknowledgement has {actual} entries, originating batch has {expected}")]
    BatchArityMismatch { expected: usize, actual: usize },

    #[error("Unexpected acknowledgement payload for {0}")]
    UnexpectedAckPayload(&'static str),

    #[error("Instruction nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("Decoded value is not a {expected}")]
    TypeMismatch { expected: &'static str },
}

// ============================================================================
// ADDRESS ERRORS
// ============================================================================

/// Errors raised by the address codec and token parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid hex address '{0}'")]
    InvalidHex(String),

    #[error("Invalid address length: expected {expected}, got {actual}")]
    InvalidLength { expected: String, actual: usize },

    #[error("EIP-55 checksum mismatch for '{0}'")]
    InvalidChecksum(String),

    #[error("Bech32 error: {0}")]
    Bech32(String),

    #[error("Bech32 prefix mismatch: expected '{expected}', got '{actual}'")]
    PrefixMismatch { expected: String, actual: String },

    #[error("Chain '{0}' has no bech32 prefix configured")]
    MissingPrefix(String),

    #[error("Invalid denom '{0}'")]
    InvalidDenom(String),

    #[error("Token kind {kind} is not supported on {family} chains")]
    UnsupportedToken { kind: String, family: String },
}

// ============================================================================
// BUILDER ERRORS
// ============================================================================

/// TokenOrder field a validation error is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderField {
    Source,
    Destination,
    SourceChannel,
    Sender,
    Receiver,
    BaseToken,
    BaseAmount,
    QuoteToken,
    QuoteAmount,
    Kind,
    Metadata,
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderField::Source => "source",
            OrderField::Destination => "destination",
            OrderField::SourceChannel => "source_channel",
            OrderField::Sender => "sender",
            OrderField::Receiver => "receiver",
            OrderField::BaseToken => "base_token",
            OrderField::BaseAmount => "base_amount",
            OrderField::QuoteToken => "quote_token",
            OrderField::QuoteAmount => "quote_amount",
            OrderField::Kind => "kind",
            OrderField::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// A builder input failed local validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: OrderField,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: OrderField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(field: OrderField) -> Self {
        Self::new(field, "not set")
    }
}

// ============================================================================
// CHAIN ERRORS
// ============================================================================

/// Failure before the chain accepted a call. No on-chain effect, safe to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected RPC response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Wallet rejected or failed the request: {0}")]
    Wallet(String),

    #[error("Connected to chain '{actual}', expected '{expected}'")]
    WrongNetwork { expected: String, actual: String },
}

impl TransportError {
    /// Connection-level failures worth repeating for idempotent reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Http(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

/// Failure after the chain accepted a call. Retrying needs a fresh salt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OnChainError {
    #[error("Transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: String, reason: String },

    #[error("No receipt for {tx_hash} after {waited_ms}ms")]
    ReceiptTimeout { tx_hash: String, waited_ms: u64 },
}

/// Indexer lookup outcome that is not a packet hash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexingError {
    #[error("Packet not yet indexed")]
    NotYetAvailable,

    #[error("Indexer request failed: {0}")]
    Transport(#[from] TransportError),
}

/// Chain registry lookup failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Chain not found: {0}")]
    NotFound(String),

    #[error("Invalid universal chain id '{0}'")]
    InvalidId(String),
}

/// Adapter failure before the chain accepted the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("Request targets chain '{requested}' but this client serves '{served}'")]
    ChainMismatch { requested: String, served: String },

    #[error("Approval {tx_hash} did not succeed: {reason}")]
    Approval { tx_hash: String, reason: String },

    #[error("Invalid request: {0}")]
    Invalid(String),
}

/// Adapter failure after the call was submitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error(transparent)]
    OnChain(#[from] OnChainError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error("Event stream ended without a matching event")]
    StreamEnded,
}

/// Outcome error stored in a completed transfer phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl TransferError {
    /// Whether the failure happened after the chain accepted the call.
    pub fn is_on_chain(&self) -> bool {
        matches!(
            self,
            TransferError::Response(ResponseError::OnChain(_))
        )
    }
}
