//! Per-transaction submission with bounded retry and failure classification.
//!
//! A nonce conflict is terminal for the attempt: the same nonce must never be
//! resubmitted, so it is reported as a soft failure and the scheduler
//! requeues the slot under a fresh allocation. Anything else is transient and
//! retried as-is, up to the policy budget with a fixed backoff.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::H256;
use ethers::utils::format_ether;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::rpc_manager::{ChainRpc, RpcManager};
use crate::types::TransferIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The chosen nonce was already consumed; requeue under a new one.
    NonceConflict,
    /// Anything else; safe to resubmit the identical intent.
    Transient,
}

/// Pure classification over the node's error text, mirroring the messages
/// EVM nodes return for nonce reuse.
pub fn classify_send_error(err: &anyhow::Error) -> FailureKind {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("nonce has already been used") || msg.contains("nonce too low") {
        FailureKind::NonceConflict
    } else {
        FailureKind::Transient
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Submission attempts per transaction, including the first.
    pub max_attempts: usize,
    /// Fixed wait between transient attempts.
    pub backoff: Duration,
}

/// Terminal outcome of one dispatch. Errors never escape the dispatcher;
/// they are folded into the outcome so the run always continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Submitted(H256),
    /// Soft failure: caller should requeue with a freshly allocated nonce.
    NonceConflict,
    /// Hard failure: retry budget spent on transient errors.
    Exhausted,
}

pub struct Dispatcher<C> {
    rpc: Arc<RpcManager<C>>,
    policy: RetryPolicy,
    /// Pause after each accepted submission; zero disables pacing.
    pacing: Duration,
}

impl<C: ChainRpc + 'static> Dispatcher<C> {
    pub fn new(rpc: Arc<RpcManager<C>>, policy: RetryPolicy, pacing: Duration) -> Self {
        Self { rpc, policy, pacing }
    }

    pub async fn dispatch(&self, intent: &TransferIntent, label: &str) -> SendOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match self.rpc.send_transfer(intent).await {
                Ok(hash) => {
                    info!(
                        "-> {hash:?} | nonce={} | value={} ETH",
                        intent.nonce,
                        format_ether(intent.value)
                    );
                    if !self.pacing.is_zero() {
                        sleep(self.pacing).await;
                    }
                    return SendOutcome::Submitted(hash);
                }
                Err(e) => match classify_send_error(&e) {
                    FailureKind::NonceConflict => {
                        warn!("(skip) {label}: {e:#}");
                        return SendOutcome::NonceConflict;
                    }
                    FailureKind::Transient => {
                        warn!("(retry {attempt}/{max_attempts}) {label}: {e:#}");
                        sleep(self.policy.backoff).await;
                    }
                },
            }
        }
        error!("giving up on {label} after {max_attempts} attempts");
        SendOutcome::Exhausted
    }
}
