//! UCS03 ZKGM wire format
//!
//! - [`instruction`]: instruction tree and packet codec
//! - [`ack`]: shape-dependent acknowledgement codec
//! - [`abi`]: the ABI head/tail packing both are built on

pub mod abi;
pub mod ack;
pub mod instruction;

pub use ack::{Ack, AckShape, CallAck, RootAck, TokenOrderAck};
pub use instruction::{
    Batch, Call, Forward, Instruction, TokenOrder, TokenOrderKind, TokenOrderV1, TokenOrderV2,
    ZkgmPacket, MAX_INSTRUCTION_DEPTH,
};
