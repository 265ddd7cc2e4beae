//! ZKGM client library
//!
//! Builds, encodes and decodes UCS03 ZKGM instructions and acknowledgements, and submits
//! them through chain-specific adapters (EVM, Cosmos, Sui, Aptos) driven by a
//! retryable transfer state machine.

pub mod address;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod indexer;
pub mod registry;
pub mod token;
pub mod token_order;
pub mod transfer;
pub mod ucs03;
pub mod utils;

// Re-export public types for convenience
pub use address::{AddressCodec, CanonicalAddress, ChainFamily};
pub use chains::{
    Capabilities, ChainClient, ExecuteRequest, Funds, LifecycleEvent, PendingInstruction,
    ResponseHandle,
};
pub use config::ZkgmConfig;
pub use error::{
    AddressError, DecodeError, EncodeError, OnChainError, RequestError, ResponseError,
    TransferError, TransportError, ValidationError,
};
pub use indexer::{GraphqlIndexer, Indexer};
pub use registry::{ChainMetadata, ChainRegistry, StaticChainRegistry, UniversalChainId};
pub use token::{Token, TokenKind, TokenMetadata};
pub use token_order::{TokenOrderBuilder, TokenOrderOptions};
pub use transfer::{
    drive, next_state, ChainTransfer, DriveOutcome, TransferEffects, TransferReceipt,
    TransferSubmission,
};
pub use ucs03::{Ack, AckShape, Instruction, TokenOrderKind};
