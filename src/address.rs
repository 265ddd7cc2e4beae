//! Address Codec
//!
//! Converts addresses between three forms, always pivoting through canonical bytes:
//!
//! - **Canonical**: chain-agnostic raw bytes
//! - **Display**: the wallet form (EIP-55 hex, bech32, 0x-hex)
//! - **Zkgm**: the bytes embedded in UCS03 instructions
//!
//! | Family | Canonical | Display | Zkgm |
//! |--------|-----------|---------|------|
//! | Evm    | 20 bytes  | EIP-55 checksummed hex | 20 bytes |
//! | Cosmos | 20/32 bytes | bech32 under the chain prefix | UTF-8 of the bech32 string |
//! | Sui    | 32 bytes  | 0x + 64 hex | 32 bytes |
//! | Aptos  | 32 bytes  | 0x + 64 hex (short form for 0x0..0xf) | 32 bytes |

use std::fmt;

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::AddressError;
use crate::utils::{parse_padded_hex, strip_0x, to_hex};

/// Chain execution-environment family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Evm,
    Cosmos,
    Sui,
    Aptos,
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainFamily::Evm => "evm",
            ChainFamily::Cosmos => "cosmos",
            ChainFamily::Sui => "sui",
            ChainFamily::Aptos => "aptos",
        };
        f.write_str(name)
    }
}

/// Chain-agnostic address bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalAddress(Vec<u8>);

impl CanonicalAddress {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

/// Per-family address codec. Cosmos carries the bech32 prefix it displays under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressCodec {
    Evm,
    Cosmos { prefix: String },
    Sui,
    Aptos,
}

impl AddressCodec {
    pub fn family(&self) -> ChainFamily {
        match self {
            AddressCodec::Evm => ChainFamily::Evm,
            AddressCodec::Cosmos { .. } => ChainFamily::Cosmos,
            AddressCodec::Sui => ChainFamily::Sui,
            AddressCodec::Aptos => ChainFamily::Aptos,
        }
    }

    /// Parses a display address into canonical bytes.
    pub fn display_to_canonical(&self, display: &str) -> Result<CanonicalAddress, AddressError> {
        let display = display.trim();
        match self {
            AddressCodec::Evm => parse_evm_address(display).map(|b| CanonicalAddress(b.to_vec())),
            AddressCodec::Cosmos { prefix } => {
                let (hrp, data) = bech32::decode(display)
                    .map_err(|e| AddressError::Bech32(e.to_string()))?;
                let actual = hrp.as_str().to_ascii_lowercase();
                if actual != prefix.to_ascii_lowercase() {
                    return Err(AddressError::PrefixMismatch {
                        expected: prefix.clone(),
                        actual,
                    });
                }
                check_cosmos_length(&data)?;
                Ok(CanonicalAddress(data))
            }
            AddressCodec::Sui | AddressCodec::Aptos => parse_padded_hex(display, 32)
                .map(CanonicalAddress)
                .ok_or_else(|| AddressError::InvalidHex(display.to_string())),
        }
    }

    /// Renders canonical bytes in the family's display form.
    pub fn canonical_to_display(&self, canonical: &CanonicalAddress) -> Result<String, AddressError> {
        let bytes = canonical.as_bytes();
        match self {
            AddressCodec::Evm => {
                let array: [u8; 20] = bytes.try_into().map_err(|_| AddressError::InvalidLength {
                    expected: "20".to_string(),
                    actual: bytes.len(),
                })?;
                Ok(to_checksum_address(&array))
            }
            AddressCodec::Cosmos { prefix } => {
                check_cosmos_length(bytes)?;
                let hrp = Hrp::parse(prefix).map_err(|e| AddressError::Bech32(e.to_string()))?;
                bech32::encode::<Bech32>(hrp, bytes).map_err(|e| AddressError::Bech32(e.to_string()))
            }
            AddressCodec::Sui => {
                check_32(bytes)?;
                Ok(to_hex(bytes))
            }
            AddressCodec::Aptos => {
                check_32(bytes)?;
                // AIP-40: special addresses 0x0..0xf keep their short form
                if bytes[..31].iter().all(|b| *b == 0) && bytes[31] < 0x10 {
                    Ok(format!("0x{:x}", bytes[31]))
                } else {
                    Ok(to_hex(bytes))
                }
            }
        }
    }

    /// Bytes embedded in a UCS03 instruction for this address.
    pub fn canonical_to_zkgm(&self, canonical: &CanonicalAddress) -> Result<Vec<u8>, AddressError> {
        match self {
            AddressCodec::Cosmos { .. } => Ok(self.canonical_to_display(canonical)?.into_bytes()),
            AddressCodec::Evm | AddressCodec::Sui | AddressCodec::Aptos => {
                // validates the length
                self.canonical_to_display(canonical)?;
                Ok(canonical.as_bytes().to_vec())
            }
        }
    }

    /// Inverse of [`AddressCodec::canonical_to_zkgm`].
    pub fn zkgm_to_canonical(&self, zkgm: &[u8]) -> Result<CanonicalAddress, AddressError> {
        match self {
            AddressCodec::Cosmos { .. } => {
                let display = std::str::from_utf8(zkgm)
                    .map_err(|_| AddressError::Bech32("address is not UTF-8".to_string()))?;
                self.display_to_canonical(display)
            }
            AddressCodec::Evm => {
                if zkgm.len() != 20 {
                    return Err(AddressError::InvalidLength {
                        expected: "20".to_string(),
                        actual: zkgm.len(),
                    });
                }
                Ok(CanonicalAddress(zkgm.to_vec()))
            }
            AddressCodec::Sui | AddressCodec::Aptos => {
                check_32(zkgm)?;
                Ok(CanonicalAddress(zkgm.to_vec()))
            }
        }
    }

    pub fn display_to_zkgm(&self, display: &str) -> Result<Vec<u8>, AddressError> {
        let canonical = self.display_to_canonical(display)?;
        self.canonical_to_zkgm(&canonical)
    }
}

/// Parses a 20-byte EVM address, enforcing EIP-55 when the input is mixed case.
pub fn parse_evm_address(display: &str) -> Result<[u8; 20], AddressError> {
    let clean = strip_0x(display);
    if clean.len() != 40 {
        return Err(AddressError::InvalidLength {
            expected: "20".to_string(),
            actual: clean.len() / 2,
        });
    }
    let bytes = hex::decode(clean).map_err(|_| AddressError::InvalidHex(display.to_string()))?;
    let mut array = [0u8; 20];
    array.copy_from_slice(&bytes);

    let has_lower = clean.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = clean.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && strip_0x(&to_checksum_address(&array)) != clean {
        return Err(AddressError::InvalidChecksum(display.to_string()));
    }
    Ok(array)
}

/// EIP-55 mixed-case checksum encoding.
pub fn to_checksum_address(address: &[u8; 20]) -> String {
    let lower = hex::encode(address);
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn check_cosmos_length(bytes: &[u8]) -> Result<(), AddressError> {
    match bytes.len() {
        20 | 32 => Ok(()),
        other => Err(AddressError::InvalidLength {
            expected: "20 or 32".to_string(),
            actual: other,
        }),
    }
}

fn check_32(bytes: &[u8]) -> Result<(), AddressError> {
    if bytes.len() != 32 {
        return Err(AddressError::InvalidLength {
            expected: "32".to_string(),
            actual: bytes.len(),
        });
    }
    Ok(())
}
