//! Submission lifecycle
//!
//! After a call is submitted, its progress is exposed as a lazily polled event stream:
//! an optional wallet pre-confirmation, the receipt, and (with an indexer) the packet
//! hash. Nothing is polled until the caller consumes the stream, and dropping the
//! handle stops all local waiting.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{OnChainError, ResponseError, TransportError};
use crate::indexer::{wait_for_packet, Indexer, IndexerPolling};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The wallet accepted and broadcast the transaction.
    PreConfirmation { reference: String },
    /// Included on the source chain and executed successfully.
    ReceiptComplete {
        tx_hash: String,
        block_height: Option<u64>,
    },
    /// The packet is visible to the indexer.
    Indexed { packet_hash: String },
}

/// What a chain reports for an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub success: bool,
    pub block_height: Option<u64>,
    /// Failure detail when `success` is false
    pub reason: Option<String>,
}

/// Source of transaction receipts. `Ok(None)` means not included yet.
#[async_trait]
pub trait ReceiptPoller: Send + Sync {
    async fn poll_receipt(&self, tx_hash: &str) -> Result<Option<ChainReceipt>, TransportError>;
}

/// Local receipt-wait budget. Unrelated to the packet's on-chain timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Everything a handle needs to follow a transaction after submission.
#[derive(Clone)]
pub struct Tracking {
    pub poller: Arc<dyn ReceiptPoller>,
    pub receipt_wait: ReceiptWait,
    pub indexer: Option<(Arc<dyn Indexer>, IndexerPolling)>,
}

impl Tracking {
    pub fn new(poller: Arc<dyn ReceiptPoller>, receipt_wait: ReceiptWait) -> Self {
        Self {
            poller,
            receipt_wait,
            indexer: None,
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn Indexer>, polling: IndexerPolling) -> Self {
        self.indexer = Some((indexer, polling));
        self
    }
}

/// Handle to a submitted transaction.
pub struct ResponseHandle {
    tx_hash: String,
    events: BoxStream<'static, Result<LifecycleEvent, ResponseError>>,
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

impl ResponseHandle {
    pub fn new(tx_hash: impl Into<String>, pre_confirmation: Option<String>, tracking: Tracking) -> Self {
        let tx_hash = tx_hash.into();
        let events = lifecycle_stream(StreamState {
            tx_hash: tx_hash.clone(),
            tracking,
            stage: Stage::PreConfirmation(pre_confirmation),
        });
        Self { tx_hash, events }
    }

    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub async fn next_event(&mut self) -> Option<Result<LifecycleEvent, ResponseError>> {
        self.events.next().await
    }

    /// Consumes events up to the first one matching `predicate`.
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> Result<LifecycleEvent, ResponseError>
    where
        P: FnMut(&LifecycleEvent) -> bool,
    {
        while let Some(item) = self.events.next().await {
            let event = item?;
            if predicate(&event) {
                return Ok(event);
            }
        }
        Err(ResponseError::StreamEnded)
    }

    /// Like [`ResponseHandle::wait_for`], but gives up locally once `cancel` resolves.
    ///
    /// Returns `Ok(None)` on cancellation; the transaction itself stays broadcast.
    pub async fn wait_for_until<P, C>(
        &mut self,
        predicate: P,
        cancel: C,
    ) -> Result<Option<LifecycleEvent>, ResponseError>
    where
        P: FnMut(&LifecycleEvent) -> bool,
        C: Future<Output = ()>,
    {
        let tx_hash = self.tx_hash.clone();
        tokio::pin!(cancel);
        tokio::select! {
            result = self.wait_for(predicate) => result.map(Some),
            _ = &mut cancel => {
                debug!("Stopped waiting on {}", tx_hash);
                Ok(None)
            }
        }
    }

    /// Waits for the receipt event and returns its block height.
    pub async fn wait_for_receipt(&mut self) -> Result<Option<u64>, ResponseError> {
        match self
            .wait_for(|e| matches!(e, LifecycleEvent::ReceiptComplete { .. }))
            .await?
        {
            LifecycleEvent::ReceiptComplete { block_height, .. } => Ok(block_height),
            _ => Err(ResponseError::StreamEnded),
        }
    }
}

// ============================================================================
// EVENT STREAM
// ============================================================================

enum Stage {
    PreConfirmation(Option<String>),
    Receipt,
    Indexing,
    Done,
}

struct StreamState {
    tx_hash: String,
    tracking: Tracking,
    stage: Stage,
}

fn lifecycle_stream(state: StreamState) -> BoxStream<'static, Result<LifecycleEvent, ResponseError>> {
    stream::unfold(state, |mut st| async move {
        loop {
            match std::mem::replace(&mut st.stage, Stage::Done) {
                Stage::PreConfirmation(reference) => {
                    st.stage = Stage::Receipt;
                    if let Some(reference) = reference {
                        return Some((Ok(LifecycleEvent::PreConfirmation { reference }), st));
                    }
                }
                Stage::Receipt => {
                    let outcome = await_receipt(
                        st.tracking.poller.as_ref(),
                        &st.tx_hash,
                        st.tracking.receipt_wait,
                    )
                    .await;
                    let event = outcome.map(|receipt| {
                        if st.tracking.indexer.is_some() {
                            st.stage = Stage::Indexing;
                        }
                        LifecycleEvent::ReceiptComplete {
                            tx_hash: st.tx_hash.clone(),
                            block_height: receipt.block_height,
                        }
                    });
                    return Some((event, st));
                }
                Stage::Indexing => {
                    let (indexer, polling) = st.tracking.indexer.clone()?;
                    return match wait_for_packet(indexer.as_ref(), &st.tx_hash, polling).await {
                        Ok(packet_hash) => {
                            info!("Packet {} indexed for {}", packet_hash, st.tx_hash);
                            Some((Ok(LifecycleEvent::Indexed { packet_hash }), st))
                        }
                        Err(e) => {
                            warn!("Packet for {} not indexed: {}", st.tx_hash, e);
                            Some((Err(e.into()), st))
                        }
                    };
                }
                Stage::Done => return None,
            }
        }
    })
    .boxed()
}

async fn await_receipt(
    poller: &dyn ReceiptPoller,
    tx_hash: &str,
    wait: ReceiptWait,
) -> Result<ChainReceipt, ResponseError> {
    let started = Instant::now();
    loop {
        if let Some(receipt) = poller.poll_receipt(tx_hash).await? {
            if receipt.success {
                info!("Transaction {} confirmed at {:?}", tx_hash, receipt.block_height);
                return Ok(receipt);
            }
            return Err(OnChainError::Reverted {
                tx_hash: tx_hash.to_string(),
                reason: receipt.reason.unwrap_or_else(|| "execution failed".to_string()),
            }
            .into());
        }

        if started.elapsed() >= wait.timeout {
            return Err(OnChainError::ReceiptTimeout {
                tx_hash: tx_hash.to_string(),
                waited_ms: started.elapsed().as_millis() as u64,
            }
            .into());
        }
        tokio::time::sleep(wait.poll_interval).await;
    }
}
