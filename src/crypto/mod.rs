//! Cryptographic Operations Module
//!
//! secp256k1 key handling for the EVM local-key wallet and packet salt generation.
//!
//! ## Security Requirements
//!
//! Private keys must never be exposed or logged. Salts come from the OS CSPRNG.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha3::{Digest, Keccak256};

use crate::error::TransportError;
use crate::utils::hex_to_bytes;

/// Fresh 32-byte packet salt. Two submissions of the same instruction never share one.
pub fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// secp256k1 signing key with its derived Ethereum address.
pub struct EvmSigningKey {
    signing_key: SigningKey,
    address: [u8; 20],
}

impl std::fmt::Debug for EvmSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSigningKey")
            .field("address", &hex::encode(self.address))
            .finish_non_exhaustive()
    }
}

impl EvmSigningKey {
    /// Parses a 32-byte hex private key (with or without 0x prefix).
    pub fn from_hex(private_key: &str) -> Result<Self, TransportError> {
        let bytes = hex_to_bytes(private_key)
            .map_err(|_| TransportError::Wallet("private key is not valid hex".to_string()))?;
        if bytes.len() != 32 {
            return Err(TransportError::Wallet(format!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| TransportError::Wallet(format!("Invalid secp256k1 key: {}", e)))?;
        let address = ethereum_address(&signing_key);
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Reads the key from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, TransportError> {
        let value = std::env::var(var)
            .map_err(|_| TransportError::Wallet(format!("Environment variable {} not set", var)))?;
        Self::from_hex(&value)
    }

    pub fn address(&self) -> [u8; 20] {
        self.address
    }

    /// Signs a keccak256 transaction hash (no message prefix).
    ///
    /// Returns `(r, s, recovery_id)`; r and s are 32-byte big-endian, recovery_id is 0 or 1.
    pub fn sign_prehash(&self, hash: &[u8; 32]) -> Result<([u8; 32], [u8; 32], u8), TransportError> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| TransportError::Wallet(format!("Failed to sign transaction hash: {}", e)))?;

        let sig_bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&sig_bytes[..32]);
        s.copy_from_slice(&sig_bytes[32..64]);
        Ok((r, s, recovery_id.to_byte()))
    }
}

/// keccak256(uncompressed_public_key without 0x04)[12..32]
fn ethereum_address(signing_key: &SigningKey) -> [u8; 20] {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}
