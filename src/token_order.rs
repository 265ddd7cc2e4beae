//! TokenOrder Builder
//!
//! Copy-on-write builder for TokenOrder instructions. Every setter validates its input
//! against the relevant chain family and returns a new builder, leaving the original
//! untouched:
//!
//! - sender and base token are checked against the source chain
//! - receiver and quote token are checked against the destination chain
//! - changing a chain re-checks the fields that depend on it

use ethereum_types::U256;

use crate::error::{OrderField, ValidationError};
use crate::registry::ChainMetadata;
use crate::token::{Token, TokenMetadata};
use crate::ucs03::instruction::{Instruction, TokenOrder, TokenOrderKind, TokenOrderV1, TokenOrderV2};

/// Partial update for [`TokenOrderBuilder::modify`]. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct TokenOrderOptions {
    pub source: Option<ChainMetadata>,
    pub destination: Option<ChainMetadata>,
    pub source_channel: Option<u32>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub base_token: Option<Token>,
    pub base_amount: Option<String>,
    pub quote_token: Option<Token>,
    pub quote_amount: Option<String>,
    pub kind: Option<TokenOrderKind>,
    pub metadata: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenOrderBuilder {
    source: Option<ChainMetadata>,
    destination: Option<ChainMetadata>,
    source_channel: Option<u32>,
    sender: Option<String>,
    receiver: Option<String>,
    base_token: Option<Token>,
    base_amount: Option<U256>,
    quote_token: Option<Token>,
    quote_amount: Option<U256>,
    kind: Option<TokenOrderKind>,
    metadata: Option<Vec<u8>>,
}

/// A v1 order whose base token metadata is filled in later from a live chain read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOrderV1Draft {
    pub sender: Vec<u8>,
    pub receiver: Vec<u8>,
    pub base_token: Vec<u8>,
    pub base_amount: U256,
    pub base_token_path: U256,
    pub quote_token: Vec<u8>,
    pub quote_amount: U256,
}

impl TokenOrderV1Draft {
    pub fn complete(self, metadata: &TokenMetadata) -> Instruction {
        Instruction::TokenOrder(TokenOrder::V1(TokenOrderV1 {
            sender: self.sender,
            receiver: self.receiver,
            base_token: self.base_token,
            base_amount: self.base_amount,
            base_token_symbol: metadata.symbol.clone(),
            base_token_name: metadata.name.clone(),
            base_token_decimals: metadata.decimals,
            base_token_path: self.base_token_path,
            quote_token: self.quote_token,
            quote_amount: self.quote_amount,
        }))
    }
}

/// `baseTokenPath` of a v1 order: the source channel for unescrow, zero otherwise.
pub fn v1_base_token_path(
    kind: TokenOrderKind,
    source_channel: Option<u32>,
) -> Result<U256, ValidationError> {
    match kind {
        TokenOrderKind::Unescrow => match source_channel {
            Some(channel) if channel != 0 => Ok(U256::from(channel)),
            _ => Err(ValidationError::new(
                OrderField::SourceChannel,
                "unescrow orders need the source channel id",
            )),
        },
        TokenOrderKind::Initialize | TokenOrderKind::Escrow | TokenOrderKind::Solve => {
            Ok(U256::zero())
        }
    }
}

/// Parses a non-negative decimal amount bounded by uint256.
pub fn parse_amount(field: OrderField, amount: &str) -> Result<U256, ValidationError> {
    let amount = amount.trim();
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new(
            field,
            format!("'{}' is not a non-negative decimal integer", amount),
        ));
    }
    U256::from_dec_str(amount).map_err(|_| ValidationError::new(field, "exceeds uint256"))
}

impl TokenOrderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // SETTERS
    // ========================================================================

    pub fn set_source(&self, source: ChainMetadata) -> Result<Self, ValidationError> {
        check_chain(OrderField::Source, &source)?;
        let next = Self {
            source: Some(source),
            ..self.clone()
        };
        next.check_sender()?;
        next.check_base_token()?;
        Ok(next)
    }

    pub fn set_destination(&self, destination: ChainMetadata) -> Result<Self, ValidationError> {
        check_chain(OrderField::Destination, &destination)?;
        let next = Self {
            destination: Some(destination),
            ..self.clone()
        };
        next.check_receiver()?;
        next.check_quote_token()?;
        Ok(next)
    }

    pub fn set_source_channel(&self, channel_id: u32) -> Result<Self, ValidationError> {
        if channel_id == 0 {
            return Err(ValidationError::new(OrderField::SourceChannel, "must be non-zero"));
        }
        Ok(Self {
            source_channel: Some(channel_id),
            ..self.clone()
        })
    }

    pub fn set_sender(&self, sender: &str) -> Result<Self, ValidationError> {
        let next = Self {
            sender: Some(sender.trim().to_string()),
            ..self.clone()
        };
        next.check_sender()?;
        Ok(next)
    }

    pub fn set_receiver(&self, receiver: &str) -> Result<Self, ValidationError> {
        let next = Self {
            receiver: Some(receiver.trim().to_string()),
            ..self.clone()
        };
        next.check_receiver()?;
        Ok(next)
    }

    pub fn set_base_token(&self, token: Token) -> Result<Self, ValidationError> {
        let next = Self {
            base_token: Some(token),
            ..self.clone()
        };
        next.check_base_token()?;
        Ok(next)
    }

    pub fn set_base_amount(&self, amount: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            base_amount: Some(parse_amount(OrderField::BaseAmount, amount)?),
            ..self.clone()
        })
    }

    pub fn set_quote_token(&self, token: Token) -> Result<Self, ValidationError> {
        let next = Self {
            quote_token: Some(token),
            ..self.clone()
        };
        next.check_quote_token()?;
        Ok(next)
    }

    pub fn set_quote_amount(&self, amount: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            quote_amount: Some(parse_amount(OrderField::QuoteAmount, amount)?),
            ..self.clone()
        })
    }

    pub fn set_kind(&self, kind: TokenOrderKind) -> Result<Self, ValidationError> {
        Ok(Self {
            kind: Some(kind),
            ..self.clone()
        })
    }

    pub fn set_metadata(&self, metadata: Vec<u8>) -> Result<Self, ValidationError> {
        Ok(Self {
            metadata: Some(metadata),
            ..self.clone()
        })
    }

    /// Applies every set option in field order; the first failure aborts the whole update.
    pub fn modify(&self, options: TokenOrderOptions) -> Result<Self, ValidationError> {
        let mut next = self.clone();
        if let Some(source) = options.source {
            next = next.set_source(source)?;
        }
        if let Some(destination) = options.destination {
            next = next.set_destination(destination)?;
        }
        if let Some(channel_id) = options.source_channel {
            next = next.set_source_channel(channel_id)?;
        }
        if let Some(sender) = options.sender {
            next = next.set_sender(&sender)?;
        }
        if let Some(receiver) = options.receiver {
            next = next.set_receiver(&receiver)?;
        }
        if let Some(token) = options.base_token {
            next = next.set_base_token(token)?;
        }
        if let Some(amount) = options.base_amount {
            next = next.set_base_amount(&amount)?;
        }
        if let Some(token) = options.quote_token {
            next = next.set_quote_token(token)?;
        }
        if let Some(amount) = options.quote_amount {
            next = next.set_quote_amount(&amount)?;
        }
        if let Some(kind) = options.kind {
            next = next.set_kind(kind)?;
        }
        if let Some(metadata) = options.metadata {
            next = next.set_metadata(metadata)?;
        }
        Ok(next)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn source(&self) -> Option<&ChainMetadata> {
        self.source.as_ref()
    }

    pub fn destination(&self) -> Option<&ChainMetadata> {
        self.destination.as_ref()
    }

    pub fn source_channel(&self) -> Option<u32> {
        self.source_channel
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    pub fn base_token(&self) -> Option<&Token> {
        self.base_token.as_ref()
    }

    pub fn base_amount(&self) -> Option<U256> {
        self.base_amount
    }

    pub fn quote_token(&self) -> Option<&Token> {
        self.quote_token.as_ref()
    }

    pub fn quote_amount(&self) -> Option<U256> {
        self.quote_amount
    }

    pub fn kind(&self) -> Option<TokenOrderKind> {
        self.kind
    }

    // ========================================================================
    // ENCODING
    // ========================================================================

    /// Version 2 order: explicit kind plus opaque metadata (empty when unset).
    pub fn encode_v2(&self) -> Result<Instruction, ValidationError> {
        let fields = self.resolved()?;
        Ok(Instruction::TokenOrder(TokenOrder::V2(TokenOrderV2 {
            sender: fields.sender,
            receiver: fields.receiver,
            base_token: fields.base_token,
            base_amount: fields.base_amount,
            quote_token: fields.quote_token,
            quote_amount: fields.quote_amount,
            kind: fields.kind,
            metadata: self.metadata.clone().unwrap_or_default(),
        })))
    }

    /// Version 1 order with caller-supplied base token metadata.
    pub fn encode_v1(&self, metadata: &TokenMetadata) -> Result<Instruction, ValidationError> {
        Ok(self.pending_v1()?.complete(metadata))
    }

    /// Version 1 order whose metadata is read from the source chain at submission.
    pub fn pending_v1(&self) -> Result<TokenOrderV1Draft, ValidationError> {
        let fields = self.resolved()?;
        Ok(TokenOrderV1Draft {
            base_token_path: v1_base_token_path(fields.kind, self.source_channel)?,
            sender: fields.sender,
            receiver: fields.receiver,
            base_token: fields.base_token,
            base_amount: fields.base_amount,
            quote_token: fields.quote_token,
            quote_amount: fields.quote_amount,
        })
    }

    fn resolved(&self) -> Result<ResolvedFields, ValidationError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ValidationError::missing(OrderField::Source))?;
        let destination = self
            .destination
            .as_ref()
            .ok_or_else(|| ValidationError::missing(OrderField::Destination))?;
        let sender = self
            .sender
            .as_deref()
            .ok_or_else(|| ValidationError::missing(OrderField::Sender))?;
        let receiver = self
            .receiver
            .as_deref()
            .ok_or_else(|| ValidationError::missing(OrderField::Receiver))?;
        let base_token = self
            .base_token
            .as_ref()
            .ok_or_else(|| ValidationError::missing(OrderField::BaseToken))?;
        let quote_token = self
            .quote_token
            .as_ref()
            .ok_or_else(|| ValidationError::missing(OrderField::QuoteToken))?;

        Ok(ResolvedFields {
            sender: address_bytes(OrderField::Sender, source, sender)?,
            receiver: address_bytes(OrderField::Receiver, destination, receiver)?,
            base_token: token_bytes(OrderField::BaseToken, source, base_token)?,
            base_amount: self
                .base_amount
                .ok_or_else(|| ValidationError::missing(OrderField::BaseAmount))?,
            quote_token: token_bytes(OrderField::QuoteToken, destination, quote_token)?,
            quote_amount: self
                .quote_amount
                .ok_or_else(|| ValidationError::missing(OrderField::QuoteAmount))?,
            kind: self.kind.ok_or_else(|| ValidationError::missing(OrderField::Kind))?,
        })
    }

    // ========================================================================
    // DEPENDENT-FIELD CHECKS (no-ops until both sides are set)
    // ========================================================================

    fn check_sender(&self) -> Result<(), ValidationError> {
        match (&self.source, &self.sender) {
            (Some(chain), Some(sender)) => address_bytes(OrderField::Sender, chain, sender).map(drop),
            _ => Ok(()),
        }
    }

    fn check_receiver(&self) -> Result<(), ValidationError> {
        match (&self.destination, &self.receiver) {
            (Some(chain), Some(receiver)) => {
                address_bytes(OrderField::Receiver, chain, receiver).map(drop)
            }
            _ => Ok(()),
        }
    }

    fn check_base_token(&self) -> Result<(), ValidationError> {
        match (&self.source, &self.base_token) {
            (Some(chain), Some(token)) => token_bytes(OrderField::BaseToken, chain, token).map(drop),
            _ => Ok(()),
        }
    }

    fn check_quote_token(&self) -> Result<(), ValidationError> {
        match (&self.destination, &self.quote_token) {
            (Some(chain), Some(token)) => token_bytes(OrderField::QuoteToken, chain, token).map(drop),
            _ => Ok(()),
        }
    }
}

struct ResolvedFields {
    sender: Vec<u8>,
    receiver: Vec<u8>,
    base_token: Vec<u8>,
    base_amount: U256,
    quote_token: Vec<u8>,
    quote_amount: U256,
    kind: TokenOrderKind,
}

fn check_chain(field: OrderField, chain: &ChainMetadata) -> Result<(), ValidationError> {
    chain
        .address_codec()
        .map(drop)
        .map_err(|e| ValidationError::new(field, e.to_string()))
}

fn address_bytes(field: OrderField, chain: &ChainMetadata, address: &str) -> Result<Vec<u8>, ValidationError> {
    chain
        .address_codec()
        .and_then(|codec| codec.display_to_zkgm(address))
        .map_err(|e| ValidationError::new(field, e.to_string()))
}

fn token_bytes(field: OrderField, chain: &ChainMetadata, token: &Token) -> Result<Vec<u8>, ValidationError> {
    chain
        .address_codec()
        .and_then(|codec| token.to_zkgm(&codec))
        .map_err(|e| ValidationError::new(field, e.to_string()))
}
