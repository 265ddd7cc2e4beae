//! ABI word codec
//!
//! Head/tail packing of Solidity ABI parameter lists, limited to the types UCS03 uses.
//! Static values sit in the head, dynamic values are referenced from the head by an
//! offset relative to the start of the enclosing tuple.
//!
//! Decoding is strict: every offset and length is bounds-checked against the buffer,
//! integer padding must be zero, and bools must be exactly 0 or 1.

use ethereum_types::U256;

use crate::error::DecodeError;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// `uint<bits>`
    Uint(usize),
    Bool,
    FixedBytes32,
    Bytes,
    String,
    Tuple(Vec<AbiType>),
    Array(Box<AbiType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Bool(bool),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
    String(String),
    Tuple(Vec<AbiValue>),
    Array(Vec<AbiValue>),
}

impl AbiType {
    fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::Tuple(items) => items.iter().any(AbiType::is_dynamic),
            AbiType::Uint(_) | AbiType::Bool | AbiType::FixedBytes32 => false,
        }
    }

    /// Bytes this type occupies in the enclosing head.
    fn head_size(&self) -> usize {
        match self {
            AbiType::Tuple(items) if !self.is_dynamic() => {
                items.iter().map(AbiType::head_size).sum()
            }
            _ => WORD,
        }
    }
}

impl AbiValue {
    pub fn uint(value: impl Into<U256>) -> Self {
        AbiValue::Uint(value.into())
    }

    fn is_dynamic(&self) -> bool {
        match self {
            AbiValue::Bytes(_) | AbiValue::String(_) | AbiValue::Array(_) => true,
            AbiValue::Tuple(items) => items.iter().any(AbiValue::is_dynamic),
            AbiValue::Uint(_) | AbiValue::Bool(_) | AbiValue::FixedBytes(_) => false,
        }
    }

    fn head_size(&self) -> usize {
        match self {
            AbiValue::Tuple(items) if !self.is_dynamic() => {
                items.iter().map(AbiValue::head_size).sum()
            }
            _ => WORD,
        }
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Encodes a parameter list (no leading offset word).
pub fn encode_params(values: &[AbiValue]) -> Vec<u8> {
    let head_len: usize = values.iter().map(AbiValue::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for value in values {
        if value.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend(encode_value(value));
        } else {
            head.extend(encode_value(value));
        }
    }

    head.extend(tail);
    head
}

fn encode_value(value: &AbiValue) -> Vec<u8> {
    match value {
        AbiValue::Uint(n) => {
            let mut word = [0u8; WORD];
            n.to_big_endian(&mut word);
            word.to_vec()
        }
        AbiValue::Bool(b) => usize_word(usize::from(*b)).to_vec(),
        AbiValue::FixedBytes(bytes) => bytes.to_vec(),
        AbiValue::Bytes(bytes) => encode_byte_string(bytes),
        AbiValue::String(s) => encode_byte_string(s.as_bytes()),
        AbiValue::Tuple(items) => encode_params(items),
        AbiValue::Array(items) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode_params(items));
            out
        }
    }
}

fn encode_byte_string(bytes: &[u8]) -> Vec<u8> {
    let padding = (WORD - bytes.len() % WORD) % WORD;
    let mut out = Vec::with_capacity(WORD + bytes.len() + padding);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(out.len() + padding, 0);
    out
}

fn usize_word(n: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes a parameter list of the given types.
pub fn decode_params(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, DecodeError> {
    decode_sequence(types.iter(), data, 0)
}

fn decode_sequence<'a>(
    types: impl Iterator<Item = &'a AbiType>,
    data: &[u8],
    base: usize,
) -> Result<Vec<AbiValue>, DecodeError> {
    let mut values = Vec::new();
    let mut cursor = base;

    for ty in types {
        if ty.is_dynamic() {
            let relative = read_usize(data, cursor)?;
            let start = base
                .checked_add(relative)
                .filter(|start| *start <= data.len())
                .ok_or(DecodeError::InvalidOffset { offset: cursor })?;
            values.push(decode_value(ty, data, start)?);
        } else {
            values.push(decode_value(ty, data, cursor)?);
        }
        cursor += ty.head_size();
    }

    Ok(values)
}

fn decode_value(ty: &AbiType, data: &[u8], at: usize) -> Result<AbiValue, DecodeError> {
    match ty {
        AbiType::Uint(bits) => {
            let value = U256::from_big_endian(read_word(data, at)?);
            if *bits < 256 && !(value >> *bits).is_zero() {
                return Err(DecodeError::NonCanonicalInteger {
                    offset: at,
                    bits: *bits,
                });
            }
            Ok(AbiValue::Uint(value))
        }
        AbiType::Bool => {
            let word = read_word(data, at)?;
            match (word[..WORD - 1].iter().all(|b| *b == 0), word[WORD - 1]) {
                (true, 0) => Ok(AbiValue::Bool(false)),
                (true, 1) => Ok(AbiValue::Bool(true)),
                _ => Err(DecodeError::InvalidBool { offset: at }),
            }
        }
        AbiType::FixedBytes32 => {
            let mut out = [0u8; WORD];
            out.copy_from_slice(read_word(data, at)?);
            Ok(AbiValue::FixedBytes(out))
        }
        AbiType::Bytes => Ok(AbiValue::Bytes(read_byte_string(data, at)?.to_vec())),
        AbiType::String => {
            let bytes = read_byte_string(data, at)?;
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
            Ok(AbiValue::String(s.to_string()))
        }
        AbiType::Tuple(items) => Ok(AbiValue::Tuple(decode_sequence(items.iter(), data, at)?)),
        AbiType::Array(inner) => {
            let len = read_usize(data, at)?;
            let body = at + WORD;
            // every element needs at least one head slot
            let available = data.len().saturating_sub(body) / inner.head_size();
            if len > available {
                return Err(DecodeError::InvalidOffset { offset: at });
            }
            let items = decode_sequence(std::iter::repeat(inner.as_ref()).take(len), data, body)?;
            Ok(AbiValue::Array(items))
        }
    }
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], DecodeError> {
    data.get(at..at.saturating_add(WORD))
        .ok_or(DecodeError::Truncated {
            offset: at,
            needed: WORD,
            len: data.len(),
        })
}

/// A length or offset word; anything beyond the buffer is invalid.
fn read_usize(data: &[u8], at: usize) -> Result<usize, DecodeError> {
    let value = U256::from_big_endian(read_word(data, at)?);
    if value > U256::from(data.len()) {
        return Err(DecodeError::InvalidOffset { offset: at });
    }
    Ok(value.low_u64() as usize)
}

fn read_byte_string(data: &[u8], at: usize) -> Result<&[u8], DecodeError> {
    let len = read_usize(data, at)?;
    let start = at + WORD;
    data.get(start..start.saturating_add(len))
        .ok_or(DecodeError::Truncated {
            offset: start,
            needed: len,
            len: data.len(),
        })
}

// ============================================================================
// TYPED READER
// ============================================================================

/// Sequential typed access to decoded values.
///
/// Type mismatches cannot happen for values produced by [`decode_params`] with the same
/// types, but are still reported rather than panicking.
pub struct AbiReader {
    values: std::vec::IntoIter<AbiValue>,
}

impl AbiReader {
    pub fn new(values: Vec<AbiValue>) -> Self {
        Self {
            values: values.into_iter(),
        }
    }

    pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self::new(decode_params(types, data)?))
    }

    fn next(&mut self, expected: &'static str) -> Result<AbiValue, DecodeError> {
        self.values
            .next()
            .ok_or(DecodeError::TypeMismatch { expected })
    }

    pub fn uint(&mut self) -> Result<U256, DecodeError> {
        match self.next("uint")? {
            AbiValue::Uint(n) => Ok(n),
            _ => Err(DecodeError::TypeMismatch { expected: "uint" }),
        }
    }

    /// A `uint8` field; the decoder already rejected wider values.
    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.uint()?.low_u32() as u8)
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(self.uint()?.low_u64())
    }

    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        match self.next("bool")? {
            AbiValue::Bool(b) => Ok(b),
            _ => Err(DecodeError::TypeMismatch { expected: "bool" }),
        }
    }

    pub fn fixed_bytes(&mut self) -> Result<[u8; 32], DecodeError> {
        match self.next("bytes32")? {
            AbiValue::FixedBytes(b) => Ok(b),
            _ => Err(DecodeError::TypeMismatch { expected: "bytes32" }),
        }
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        match self.next("bytes")? {
            AbiValue::Bytes(b) => Ok(b),
            _ => Err(DecodeError::TypeMismatch { expected: "bytes" }),
        }
    }

    pub fn string(&mut self) -> Result<String, DecodeError> {
        match self.next("string")? {
            AbiValue::String(s) => Ok(s),
            _ => Err(DecodeError::TypeMismatch { expected: "string" }),
        }
    }

    pub fn tuple(&mut self) -> Result<AbiReader, DecodeError> {
        match self.next("tuple")? {
            AbiValue::Tuple(items) => Ok(AbiReader::new(items)),
            _ => Err(DecodeError::TypeMismatch { expected: "tuple" }),
        }
    }

    pub fn array(&mut self) -> Result<Vec<AbiValue>, DecodeError> {
        match self.next("array")? {
            AbiValue::Array(items) => Ok(items),
            _ => Err(DecodeError::TypeMismatch { expected: "array" }),
        }
    }
}
