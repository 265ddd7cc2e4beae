//! ZKGM command-line client
//!
//! Decodes instructions and acknowledgements, converts addresses between chain forms,
//! and submits TokenOrder transfers through the configured chain adapters.
//!
//! ## Usage
//!
//! ```bash
//! zkgm decode-instruction 0x...
//! zkgm decode-ack --instruction 0x... 0x...
//! zkgm convert-address --chain union.union-testnet-10 union1...
//! ZKGM_CONFIG_PATH=config/zkgm.toml zkgm transfer --source ethereum.11155111 ...
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ethereum_types::U256;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zkgm_client::{
    address::ChainFamily,
    chains::{
        aptos::AptosClient, cosmos::CosmosClient, evm::EvmClient, sui::SuiClient, ChainClient,
        ExecuteRequest, Funds, LifecycleEvent, PendingInstruction,
    },
    config::{ChainConfig, ZkgmConfig},
    indexer::{GraphqlIndexer, Indexer},
    registry::{ChainRegistry, StaticChainRegistry, UniversalChainId},
    token::{Token, TokenKind},
    token_order::{TokenOrderBuilder, TokenOrderOptions},
    transfer::{next_state, ChainTransfer, TransferSubmission},
    ucs03::{ack, instruction, AckShape, TokenOrderKind, ZkgmPacket},
    utils::{hex_to_bytes, to_hex},
};

#[derive(Parser, Debug)]
#[command(name = "zkgm")]
#[command(about = "UCS03 ZKGM instruction codec and cross-chain transfer client")]
struct Args {
    /// Path to configuration file (default: config/zkgm.toml or ZKGM_CONFIG_PATH env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode an encoded instruction (or a full packet with --packet) to JSON
    DecodeInstruction {
        hex: String,
        /// Input is a `(salt, path, instruction)` packet
        #[arg(long)]
        packet: bool,
    },
    /// Decode an acknowledgement against the instruction that produced it
    DecodeAck {
        /// Encoded originating instruction
        #[arg(long)]
        instruction: String,
        ack: String,
    },
    /// Show an address in display, canonical and zkgm forms for a configured chain
    ConvertAddress {
        #[arg(long)]
        chain: String,
        address: String,
    },
    /// Build a TokenOrder and drive it through submission and receipt
    Transfer(TransferArgs),
}

#[derive(clap::Args, Debug)]
struct TransferArgs {
    /// Universal chain id of the source chain
    #[arg(long)]
    source: String,
    /// Universal chain id of the destination chain
    #[arg(long)]
    destination: String,
    #[arg(long)]
    channel: u32,
    #[arg(long)]
    sender: String,
    #[arg(long)]
    receiver: String,
    #[arg(long)]
    base_token: String,
    #[arg(long, value_enum, default_value_t = KindArg::Native)]
    base_token_kind: KindArg,
    #[arg(long)]
    base_amount: String,
    #[arg(long)]
    quote_token: String,
    #[arg(long, value_enum, default_value_t = KindArg::Native)]
    quote_token_kind: KindArg,
    #[arg(long)]
    quote_amount: String,
    /// initialize | escrow | unescrow | solve
    #[arg(long, default_value = "escrow")]
    kind: TokenOrderKind,
    /// TokenOrder version (1 reads base token metadata from the source chain)
    #[arg(long, default_value_t = 2)]
    order_version: u8,
    /// Attached funds as `<denom>=<amount>` (Sui: `<coin object id>=<amount>`)
    #[arg(long = "fund")]
    funds: Vec<String>,
    /// Times a failed phase is retried before giving up
    #[arg(long, default_value_t = 0)]
    retries: u32,
    /// Wait for the packet to be indexed after the receipt
    #[arg(long)]
    wait_indexed: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KindArg {
    Native,
    Contract,
    Ibc,
}

impl From<KindArg> for TokenKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Native => TokenKind::Native,
            KindArg::Contract => TokenKind::Contract,
            KindArg::Ibc => TokenKind::Ibc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::DecodeInstruction { hex, packet } => decode_instruction(&hex, packet),
        Command::DecodeAck { instruction, ack } => decode_ack(&instruction, &ack),
        Command::ConvertAddress { chain, address } => {
            let config = ZkgmConfig::load_from_path(args.config.as_deref())?;
            convert_address(&config, &chain, &address)
        }
        Command::Transfer(transfer) => {
            let config = ZkgmConfig::load_from_path(args.config.as_deref())?;
            run_transfer(&config, transfer).await
        }
    }
}

fn decode_hex(label: &str, input: &str) -> Result<Vec<u8>> {
    hex_to_bytes(input).with_context(|| format!("{} is not valid hex", label))
}

fn decode_instruction(input: &str, packet: bool) -> Result<()> {
    let bytes = decode_hex("instruction", input)?;
    let json = if packet {
        serde_json::to_string_pretty(&ZkgmPacket::decode(&bytes)?)?
    } else {
        serde_json::to_string_pretty(&instruction::decode(&bytes)?)?
    };
    println!("{}", json);
    Ok(())
}

fn decode_ack(instruction_hex: &str, ack_hex: &str) -> Result<()> {
    let instruction = instruction::decode(&decode_hex("instruction", instruction_hex)?)
        .context("Failed to decode originating instruction")?;
    let decoded = ack::decode(&decode_hex("ack", ack_hex)?, &AckShape::of(&instruction))
        .context("Failed to decode acknowledgement")?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

fn convert_address(config: &ZkgmConfig, chain: &str, address: &str) -> Result<()> {
    let registry = StaticChainRegistry::from_config(config);
    let metadata = registry.lookup(&UniversalChainId::parse(chain)?)?;
    let codec = metadata.address_codec()?;

    let canonical = codec.display_to_canonical(address)?;
    let output = serde_json::json!({
        "chain": metadata.universal_chain_id,
        "family": metadata.family,
        "display": codec.canonical_to_display(&canonical)?,
        "canonical": canonical.to_string(),
        "zkgm": to_hex(codec.canonical_to_zkgm(&canonical)?),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ============================================================================
// TRANSFER
// ============================================================================

async fn run_transfer(config: &ZkgmConfig, args: TransferArgs) -> Result<()> {
    let registry = StaticChainRegistry::from_config(config);
    let source_id = UniversalChainId::parse(&args.source)?;
    let destination_id = UniversalChainId::parse(&args.destination)?;
    let source = registry.lookup(&source_id)?;
    let destination = registry.lookup(&destination_id)?;

    let builder = TokenOrderBuilder::new().modify(TokenOrderOptions {
        source: Some(source.clone()),
        destination: Some(destination),
        source_channel: Some(args.channel),
        sender: Some(args.sender.clone()),
        receiver: Some(args.receiver.clone()),
        base_token: Some(Token::new(&args.base_token, args.base_token_kind.into())),
        base_amount: Some(args.base_amount.clone()),
        quote_token: Some(Token::new(&args.quote_token, args.quote_token_kind.into())),
        quote_amount: Some(args.quote_amount.clone()),
        kind: Some(args.kind),
        metadata: None,
    })?;

    let pending: PendingInstruction = match args.order_version {
        1 => builder.pending_v1()?.into(),
        2 => builder.encode_v2()?.into(),
        other => anyhow::bail!("Unsupported TokenOrder version {}", other),
    };

    let mut funds = args
        .funds
        .iter()
        .map(|f| parse_fund(f.as_str()))
        .collect::<Result<Vec<_>>>()?;
    // Sui takes coin objects and Aptos withdraws in `send`; only EVM and Cosmos attach value.
    let attaches_value = matches!(source.family, ChainFamily::Evm | ChainFamily::Cosmos);
    if funds.is_empty() && args.base_token_kind == KindArg::Native && attaches_value {
        funds.push(Funds {
            denom: source.native_token.denom.clone(),
            amount: builder.base_amount().unwrap_or_default(),
        });
    }

    let request = ExecuteRequest {
        source_chain: source_id.clone(),
        destination_chain: destination_id,
        channel_id: args.channel,
        contract_address: String::new(),
        instruction: pending,
        funds,
    };

    let chain_config = config
        .chain(&source_id)
        .with_context(|| format!("Chain {} is not configured", source_id))?;
    let indexer = config
        .indexer
        .as_ref()
        .map(|cfg| Arc::new(GraphqlIndexer::from_config(cfg)));

    macro_rules! with_indexer {
        ($client:expr) => {
            match &indexer {
                Some(indexer) => {
                    let polling = indexer.polling();
                    $client.with_indexer(indexer.clone() as Arc<dyn Indexer>, polling)
                }
                None => $client,
            }
        };
    }

    match chain_config {
        ChainConfig::Evm(cfg) => {
            let client = with_indexer!(EvmClient::from_config(cfg, &config.transfer)?);
            drive_transfer(ChainTransfer::new(client, request), &args).await
        }
        ChainConfig::Cosmos(cfg) => {
            let client = with_indexer!(CosmosClient::from_config(cfg, &config.transfer).await?);
            drive_transfer(ChainTransfer::new(client, request), &args).await
        }
        ChainConfig::Sui(cfg) => {
            let client = with_indexer!(SuiClient::from_config(cfg, &config.transfer).await?);
            drive_transfer(ChainTransfer::new(client, request), &args).await
        }
        ChainConfig::Aptos(cfg) => {
            let client = with_indexer!(AptosClient::from_config(cfg, &config.transfer)?);
            drive_transfer(ChainTransfer::new(client, request), &args).await
        }
    }
}

fn parse_fund(input: &str) -> Result<Funds> {
    let (denom, amount) = input
        .rsplit_once('=')
        .with_context(|| format!("Fund '{}' must look like <denom>=<amount>", input))?;
    Ok(Funds {
        denom: denom.to_string(),
        amount: U256::from_dec_str(amount)
            .map_err(|_| anyhow::anyhow!("Fund amount '{}' is not a decimal integer", amount))?,
    })
}

/// Steps the state machine one transition at a time, printing every state.
async fn drive_transfer<C: ChainClient>(transfer: ChainTransfer<C>, args: &TransferArgs) -> Result<()> {
    let mut state = TransferSubmission::Filling;
    let mut retries_left = args.retries;
    println!("{}", state);

    loop {
        if let Some(error) = state.error() {
            if retries_left == 0 {
                anyhow::bail!("Transfer failed at {}: {}", state, error);
            }
            retries_left -= 1;
            warn!("Retrying after failure ({} retries left): {}", retries_left, error);
            state = state.retry();
            println!("{}", state);
            continue;
        }
        if let Some(receipt) = state.receipt() {
            info!(
                "Transfer {} included at height {:?}",
                receipt.tx_hash, receipt.block_height
            );
            if args.wait_indexed {
                let mut handle = transfer.client().track(&receipt.tx_hash);
                let event = handle
                    .wait_for(|e| matches!(e, LifecycleEvent::Indexed { .. }))
                    .await?;
                if let LifecycleEvent::Indexed { packet_hash } = event {
                    println!("packet {}", packet_hash);
                }
            }
            return Ok(());
        }

        state = next_state(state, &transfer).await;
        println!("{}", state);
    }
}
