//! Nonce allocation that never repeats a sequence number within a run.
//!
//! The pending-tag count reported by the network can lag behind nonces this
//! process already handed out but which the endpoint has not seen yet, so a
//! local ledger records every claimed nonce and `next()` scans forward past
//! them. Returned values are unique but not necessarily contiguous.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use ethers::types::Address;
use tracing::debug;

use crate::rpc_manager::{ChainRpc, RpcManager};

/// Set of nonces claimed in this run. Grows monotonically, never persisted.
#[derive(Debug, Default)]
pub struct NonceLedger {
    claimed: HashSet<u64>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the first free nonce at or above `start`.
    pub fn claim_from(&mut self, start: u64) -> u64 {
        let mut nonce = start;
        while self.claimed.contains(&nonce) {
            nonce += 1;
        }
        self.claimed.insert(nonce);
        nonce
    }

    pub fn contains(&self, nonce: u64) -> bool {
        self.claimed.contains(&nonce)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

pub struct NonceAllocator<C> {
    rpc: Arc<RpcManager<C>>,
    sender: Address,
    ledger: NonceLedger,
}

impl<C: ChainRpc + 'static> NonceAllocator<C> {
    pub fn new(rpc: Arc<RpcManager<C>>, sender: Address) -> Self {
        Self {
            rpc,
            sender,
            ledger: NonceLedger::new(),
        }
    }

    /// Allocate the next nonce: ask the network for the pending count, then
    /// skip anything already claimed locally. A query failure propagates; the
    /// caller may retry the whole allocation.
    pub async fn next(&mut self) -> Result<u64> {
        let pending = self.rpc.pending_nonce(self.sender).await?.as_u64();
        let nonce = self.ledger.claim_from(pending);
        debug!(pending, nonce, "allocated nonce");
        Ok(nonce)
    }
}
