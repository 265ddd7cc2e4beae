//! Packet indexer
//!
//! Resolves a source-chain transaction hash to the cross-chain packet hash once the
//! indexer has picked the packet up.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::IndexerConfig;
use crate::error::{IndexingError, TransportError};

const PACKET_BY_TX_QUERY: &str = "query PacketHashByTx($tx: String!) { \
v2_packets(args: { p_transaction_hash: $tx }) { packet_hash } }";

#[async_trait]
pub trait Indexer: Send + Sync {
    /// `Ok(None)` while the packet is not indexed yet.
    async fn lookup(&self, tx_hash: &str) -> Result<Option<String>, IndexingError>;
}

/// Polling settings for [`Indexer`] lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerPolling {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<PacketsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct PacketsData {
    v2_packets: Vec<PacketRow>,
}

#[derive(Debug, Deserialize)]
struct PacketRow {
    packet_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// Indexer backed by a Hasura-style GraphQL endpoint.
pub struct GraphqlIndexer {
    client: Client,
    url: String,
    polling: IndexerPolling,
}

impl GraphqlIndexer {
    pub fn new(url: impl Into<String>, polling: IndexerPolling) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            polling,
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(
            config.graphql_url.clone(),
            IndexerPolling {
                interval: Duration::from_millis(config.poll_interval_ms),
                max_attempts: config.max_attempts,
            },
        )
    }

    pub fn polling(&self) -> IndexerPolling {
        self.polling
    }
}

#[async_trait]
impl Indexer for GraphqlIndexer {
    async fn lookup(&self, tx_hash: &str) -> Result<Option<String>, IndexingError> {
        let body = serde_json::json!({
            "query": PACKET_BY_TX_QUERY,
            "variables": { "tx": tx_hash },
        });

        let response: GraphqlResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from)?
            .error_for_status()
            .map_err(TransportError::from)?
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        if let Some(error) = response.errors.first() {
            return Err(TransportError::InvalidResponse(error.message.clone()).into());
        }

        let packet_hash = response
            .data
            .and_then(|d| d.v2_packets.into_iter().find_map(|row| row.packet_hash));
        debug!("Indexer lookup for {}: {:?}", tx_hash, packet_hash);
        Ok(packet_hash)
    }
}

/// Polls `indexer` until it returns a packet hash or `polling.max_attempts` run out.
///
/// Transport failures count as attempts; the last one is returned if nothing was found.
pub async fn wait_for_packet(
    indexer: &dyn Indexer,
    tx_hash: &str,
    polling: IndexerPolling,
) -> Result<String, IndexingError> {
    let mut last_error = IndexingError::NotYetAvailable;
    for attempt in 1..=polling.max_attempts {
        match indexer.lookup(tx_hash).await {
            Ok(Some(packet_hash)) => return Ok(packet_hash),
            Ok(None) => last_error = IndexingError::NotYetAvailable,
            Err(e) => {
                debug!("Indexer lookup attempt {} failed: {}", attempt, e);
                last_error = e;
            }
        }
        if attempt < polling.max_attempts {
            tokio::time::sleep(polling.interval).await;
        }
    }
    Err(last_error)
}
