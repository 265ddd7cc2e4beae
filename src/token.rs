//! Token identity
//!
//! A token is a chain-family-specific denom or address plus a kind tag. Its zkgm form
//! is what a TokenOrder carries in `baseToken` / `quoteToken`.

use serde::{Deserialize, Serialize};

use crate::address::{parse_evm_address, AddressCodec, ChainFamily};
use crate::error::AddressError;
use crate::utils::parse_padded_hex;

/// Sentinel address EVM contracts use for the chain's native gas token.
pub const EVM_NATIVE_TOKEN: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Chain gas token or bank denom
    Native,
    /// ERC-20, cw20, Move coin/fungible asset
    Contract,
    /// IBC voucher (`ibc/<hash>`), Cosmos only
    Ibc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub denom: String,
    pub kind: TokenKind,
}

/// Human-facing token metadata carried by TokenOrder v1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(denom: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            denom: denom.into(),
            kind,
        }
    }

    pub fn native(denom: impl Into<String>) -> Self {
        Self::new(denom, TokenKind::Native)
    }

    pub fn contract(address: impl Into<String>) -> Self {
        Self::new(address, TokenKind::Contract)
    }

    /// Bytes this token is identified by inside an instruction on a chain using `codec`.
    pub fn to_zkgm(&self, codec: &AddressCodec) -> Result<Vec<u8>, AddressError> {
        let denom = self.denom.trim();
        match (codec.family(), self.kind) {
            (ChainFamily::Evm, TokenKind::Native) => {
                Ok(parse_evm_address(EVM_NATIVE_TOKEN)?.to_vec())
            }
            (ChainFamily::Evm, TokenKind::Contract) => Ok(parse_evm_address(denom)?.to_vec()),

            (ChainFamily::Cosmos, TokenKind::Native) => {
                validate_bank_denom(denom)?;
                Ok(denom.as_bytes().to_vec())
            }
            (ChainFamily::Cosmos, TokenKind::Ibc) => {
                let hash = denom
                    .strip_prefix("ibc/")
                    .ok_or_else(|| AddressError::InvalidDenom(denom.to_string()))?;
                if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(AddressError::InvalidDenom(denom.to_string()));
                }
                Ok(format!("ibc/{}", hash.to_ascii_uppercase()).into_bytes())
            }
            // cw20: the normalized bech32 contract address
            (ChainFamily::Cosmos, TokenKind::Contract) => codec.display_to_zkgm(denom),

            (ChainFamily::Sui, TokenKind::Native | TokenKind::Contract) => {
                Ok(normalize_coin_type(denom)?.into_bytes())
            }

            (ChainFamily::Aptos, TokenKind::Native) => Ok(normalize_coin_type(denom)?.into_bytes()),
            // fungible-asset metadata object address
            (ChainFamily::Aptos, TokenKind::Contract) => {
                let canonical = codec.display_to_canonical(denom)?;
                codec.canonical_to_zkgm(&canonical)
            }

            (family, TokenKind::Ibc) => Err(AddressError::UnsupportedToken {
                kind: "ibc".to_string(),
                family: family.to_string(),
            }),
        }
    }
}

/// Bank denoms: 3-128 chars, leading letter, `[a-zA-Z0-9/:._-]` afterwards.
fn validate_bank_denom(denom: &str) -> Result<(), AddressError> {
    let valid_len = (3..=128).contains(&denom.len());
    let leading_alpha = denom.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = denom
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'));
    if valid_len && leading_alpha && valid_chars {
        Ok(())
    } else {
        Err(AddressError::InvalidDenom(denom.to_string()))
    }
}

/// `0x<addr>::<module>::<Name>` with the address expanded to 32 bytes.
fn normalize_coin_type(coin_type: &str) -> Result<String, AddressError> {
    let invalid = || AddressError::InvalidDenom(coin_type.to_string());
    let mut parts = coin_type.splitn(3, "::");
    let address = parts.next().ok_or_else(invalid)?;
    let module = parts.next().ok_or_else(invalid)?;
    let name = parts.next().ok_or_else(invalid)?;
    if module.is_empty() || name.is_empty() {
        return Err(invalid());
    }
    let address = parse_padded_hex(address, 32).ok_or_else(invalid)?;
    Ok(format!("0x{}::{}::{}", hex::encode(address), module, name))
}
