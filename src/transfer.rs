//! Transfer Submission State Machine
//!
//! One transfer attempt moves through ordered phases:
//!
//! ```text
//! Filling -> SwitchChain -> ApprovalSubmit -> TransferSubmit -> TransferReceipt
//! ```
//!
//! Every phase is `InProgress` (its operation has not run yet) or `Complete(outcome)`.
//! [`next_state`] performs at most one side effect per call. A failed phase stays
//! `Complete(Err)` until the driver calls [`TransferSubmission::retry`]; nothing here
//! retries on its own, holds timers or runs in the background.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::chains::{Capabilities, ChainClient, ExecuteRequest, PendingInstruction, ResponseHandle};
use crate::error::TransferError;
use crate::ucs03::instruction::Instruction;

/// Outcome of the receipt phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: String,
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase<T> {
    InProgress,
    Complete(Result<T, TransferError>),
}

/// The receipt phase carries the hash it is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptPhase {
    InProgress { tx_hash: String },
    Complete(Result<TransferReceipt, TransferError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSubmission {
    Filling,
    SwitchChain(Phase<()>),
    /// Approval transaction hashes (empty when allowances already covered the spend)
    ApprovalSubmit(Phase<Vec<String>>),
    /// Submitted transaction hash
    TransferSubmit(Phase<String>),
    TransferReceipt(ReceiptPhase),
}

impl TransferSubmission {
    /// Whether the next transition runs a phase operation.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            TransferSubmission::SwitchChain(Phase::InProgress)
                | TransferSubmission::ApprovalSubmit(Phase::InProgress)
                | TransferSubmission::TransferSubmit(Phase::InProgress)
                | TransferSubmission::TransferReceipt(ReceiptPhase::InProgress { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferSubmission::TransferReceipt(ReceiptPhase::Complete(_)))
    }

    /// The stored failure, if the current phase completed with one.
    pub fn error(&self) -> Option<&TransferError> {
        match self {
            TransferSubmission::SwitchChain(Phase::Complete(Err(e)))
            | TransferSubmission::ApprovalSubmit(Phase::Complete(Err(e)))
            | TransferSubmission::TransferSubmit(Phase::Complete(Err(e)))
            | TransferSubmission::TransferReceipt(ReceiptPhase::Complete(Err(e))) => Some(e),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error().is_some()
    }

    /// The receipt of a successfully finished attempt.
    pub fn receipt(&self) -> Option<&TransferReceipt> {
        match self {
            TransferSubmission::TransferReceipt(ReceiptPhase::Complete(Ok(receipt))) => Some(receipt),
            _ => None,
        }
    }

    /// Re-enters a failed phase.
    ///
    /// A failed receipt phase restarts from `Filling`: the submitted transaction is
    /// final, so another attempt means a new submission with a fresh salt. States
    /// without a failure are returned unchanged.
    pub fn retry(self) -> TransferSubmission {
        match self {
            TransferSubmission::SwitchChain(Phase::Complete(Err(_))) => {
                TransferSubmission::SwitchChain(Phase::InProgress)
            }
            TransferSubmission::ApprovalSubmit(Phase::Complete(Err(_))) => {
                TransferSubmission::ApprovalSubmit(Phase::InProgress)
            }
            TransferSubmission::TransferSubmit(Phase::Complete(Err(_))) => {
                TransferSubmission::TransferSubmit(Phase::InProgress)
            }
            TransferSubmission::TransferReceipt(ReceiptPhase::Complete(Err(_))) => {
                TransferSubmission::Filling
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TransferSubmission::Filling => "Filling",
            TransferSubmission::SwitchChain(_) => "SwitchChain",
            TransferSubmission::ApprovalSubmit(_) => "ApprovalSubmit",
            TransferSubmission::TransferSubmit(_) => "TransferSubmit",
            TransferSubmission::TransferReceipt(_) => "TransferReceipt",
        }
    }
}

impl fmt::Display for TransferSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            TransferSubmission::Filling => f.write_str(name),
            TransferSubmission::TransferReceipt(ReceiptPhase::InProgress { tx_hash }) => {
                write!(f, "{}.InProgress({})", name, tx_hash)
            }
            TransferSubmission::TransferReceipt(ReceiptPhase::Complete(Ok(r))) => {
                write!(f, "{}.Complete(ok: {})", name, r.tx_hash)
            }
            TransferSubmission::TransferSubmit(Phase::Complete(Ok(hash))) => {
                write!(f, "{}.Complete(ok: {})", name, hash)
            }
            _ if self.is_in_progress() => write!(f, "{}.InProgress", name),
            _ => match self.error() {
                Some(e) => write!(f, "{}.Complete(error: {})", name, e),
                None => write!(f, "{}.Complete(ok)", name),
            },
        }
    }
}

// ============================================================================
// EFFECTS
// ============================================================================

/// Side effects the state machine asks its driver to perform.
#[async_trait]
pub trait TransferEffects: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    async fn switch_chain(&self) -> Result<(), TransferError>;

    async fn approve(&self) -> Result<Vec<String>, TransferError>;

    /// Submits the transfer, returning its transaction hash.
    async fn submit(&self) -> Result<String, TransferError>;

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransferReceipt, TransferError>;
}

/// First phase at or after `SwitchChain` that the backend supports.
fn first_phase(capabilities: Capabilities) -> TransferSubmission {
    if capabilities.network_switch {
        TransferSubmission::SwitchChain(Phase::InProgress)
    } else {
        after_switch(capabilities)
    }
}

fn after_switch(capabilities: Capabilities) -> TransferSubmission {
    if capabilities.approval {
        TransferSubmission::ApprovalSubmit(Phase::InProgress)
    } else {
        TransferSubmission::TransferSubmit(Phase::InProgress)
    }
}

/// Advances `current` by one step.
pub async fn next_state(current: TransferSubmission, effects: &dyn TransferEffects) -> TransferSubmission {
    let next = match current {
        TransferSubmission::Filling => first_phase(effects.capabilities()),

        TransferSubmission::SwitchChain(Phase::InProgress) => {
            TransferSubmission::SwitchChain(Phase::Complete(effects.switch_chain().await))
        }
        TransferSubmission::SwitchChain(Phase::Complete(Ok(()))) => after_switch(effects.capabilities()),

        TransferSubmission::ApprovalSubmit(Phase::InProgress) => {
            TransferSubmission::ApprovalSubmit(Phase::Complete(effects.approve().await))
        }
        TransferSubmission::ApprovalSubmit(Phase::Complete(Ok(_))) => {
            TransferSubmission::TransferSubmit(Phase::InProgress)
        }

        TransferSubmission::TransferSubmit(Phase::InProgress) => {
            TransferSubmission::TransferSubmit(Phase::Complete(effects.submit().await))
        }
        TransferSubmission::TransferSubmit(Phase::Complete(Ok(tx_hash))) => {
            TransferSubmission::TransferReceipt(ReceiptPhase::InProgress { tx_hash })
        }

        TransferSubmission::TransferReceipt(ReceiptPhase::InProgress { tx_hash }) => {
            TransferSubmission::TransferReceipt(ReceiptPhase::Complete(
                effects.wait_for_receipt(&tx_hash).await,
            ))
        }

        // failed phases wait for retry(), the terminal receipt stays put
        unchanged @ (TransferSubmission::SwitchChain(Phase::Complete(Err(_)))
        | TransferSubmission::ApprovalSubmit(Phase::Complete(Err(_)))
        | TransferSubmission::TransferSubmit(Phase::Complete(Err(_)))
        | TransferSubmission::TransferReceipt(ReceiptPhase::Complete(_))) => return unchanged,
    };

    match next.error() {
        Some(e) => warn!("Transfer phase {} failed: {}", next.name(), e),
        None => info!("Transfer state: {}", next),
    }
    next
}

// ============================================================================
// DRIVER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveOutcome {
    pub state: TransferSubmission,
    /// Calls to [`next_state`] that were made
    pub transitions: usize,
    /// Phase operations among them
    pub operations: usize,
}

/// Steps until the attempt is terminal, a phase fails, or `max_steps` transitions ran.
pub async fn drive(
    mut state: TransferSubmission,
    effects: &dyn TransferEffects,
    max_steps: usize,
) -> DriveOutcome {
    let mut transitions = 0;
    let mut operations = 0;

    while transitions < max_steps && !state.is_terminal() && !state.is_failed() {
        if state.is_in_progress() {
            operations += 1;
        }
        state = next_state(state, effects).await;
        transitions += 1;
    }
    debug!(
        "Drive stopped at {} after {} transitions ({} operations)",
        state, transitions, operations
    );

    DriveOutcome {
        state,
        transitions,
        operations,
    }
}

// ============================================================================
// CHAIN-BACKED EFFECTS
// ============================================================================

/// [`TransferEffects`] for one request on one adapter.
///
/// The instruction tree is resolved once, so v1 metadata reads are not repeated when a
/// phase is retried. The handle returned by `execute` is kept for the receipt phase.
pub struct ChainTransfer<C: ChainClient> {
    client: C,
    request: ExecuteRequest,
    resolved: OnceCell<Instruction>,
    handle: Mutex<Option<ResponseHandle>>,
}

impl<C: ChainClient> ChainTransfer<C> {
    pub fn new(client: C, request: ExecuteRequest) -> Self {
        Self {
            client,
            request,
            resolved: OnceCell::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn instruction(&self) -> Result<&Instruction, TransferError> {
        self.resolved
            .get_or_try_init(|| async {
                self.request
                    .instruction
                    .resolve(&self.client)
                    .await
                    .map_err(TransferError::from)
            })
            .await
    }
}

#[async_trait]
impl<C: ChainClient> TransferEffects for ChainTransfer<C> {
    fn capabilities(&self) -> Capabilities {
        self.client.capabilities()
    }

    async fn switch_chain(&self) -> Result<(), TransferError> {
        self.client.ensure_network().await?;
        Ok(())
    }

    async fn approve(&self) -> Result<Vec<String>, TransferError> {
        let instruction = self.instruction().await?;
        Ok(self.client.approve(instruction).await?)
    }

    async fn submit(&self) -> Result<String, TransferError> {
        let instruction = self.instruction().await?.clone();
        let request = ExecuteRequest {
            instruction: PendingInstruction::Ready(instruction),
            ..self.request.clone()
        };
        let handle = self.client.execute(request).await?;
        let tx_hash = handle.tx_hash().to_string();
        *self.handle.lock().await = Some(handle);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransferReceipt, TransferError> {
        let kept = self.handle.lock().await.take();
        let mut handle = match kept {
            Some(handle) if handle.tx_hash() == tx_hash => handle,
            _ => self.client.track(tx_hash),
        };
        let block_height = handle.wait_for_receipt().await?;
        Ok(TransferReceipt {
            tx_hash: tx_hash.to_string(),
            block_height,
        })
    }
}
