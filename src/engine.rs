//! Batch scheduler: drives the whole run, one transaction at a time.
//!
//! Batches never overlap; the requeue pass for nonce conflicts strictly
//! follows the primary pass of its batch, and the inter-batch pause is
//! skipped after the final batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use ethers::types::{Address, U256};
use ethers::utils::format_ether;
use serde::Serialize;
use tokio::time::sleep;
use tracing::info;

use crate::dispatcher::{Dispatcher, SendOutcome};
use crate::fees::FeePlan;
use crate::nonce_manager::NonceAllocator;
use crate::rpc_manager::{ChainRpc, RpcManager};
use crate::types::TransferIntent;

/// Derived once from configuration, immutable for the run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub total: usize,
    pub batch_size: usize,
    pub inter_batch_pause: Duration,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    /// Transfers the network accepted, including requeued ones.
    pub submitted: usize,
    /// Slots that went through the requeue pass after a nonce conflict.
    pub requeued: usize,
    /// Transfers dropped after the retry budget, or conflicting twice.
    pub abandoned: usize,
}

pub struct SendEngine<C> {
    pub allocator: NonceAllocator<C>,
    pub dispatcher: Dispatcher<C>,
    pub fee_plan: FeePlan,
    pub dest: Address,
    pub gas_limit: U256,
    pub amount_min: U256,
    pub amount_max: U256,
    pub plan: RunPlan,
}

impl<C: ChainRpc + 'static> SendEngine<C> {
    /// Uniform random transfer value in [min, max] with 1e-6 granularity.
    fn random_value(&self) -> U256 {
        if self.amount_min == self.amount_max {
            return self.amount_min;
        }
        let diff = self.amount_max - self.amount_min;
        let r = U256::from(fastrand::u64(0..1_000_000));
        self.amount_min + diff * r / U256::from(1_000_000u64)
    }

    fn build_intent(&self, nonce: u64) -> TransferIntent {
        TransferIntent {
            to: self.dest,
            value: self.random_value(),
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.fee_plan.fee_cap,
            max_priority_fee_per_gas: self.fee_plan.priority_fee,
            nonce,
        }
    }

    pub async fn run(&mut self) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut sent = 0usize;

        while sent < self.plan.total {
            let batch_len = self.plan.batch_size.min(self.plan.total - sent);
            info!("batch {}-{}", sent + 1, sent + batch_len);

            // Primary pass: one nonce, one dispatch per slot, in order.
            let mut conflicted: Vec<u64> = Vec::new();
            for _ in 0..batch_len {
                let nonce = self.allocator.next().await?;
                let intent = self.build_intent(nonce);
                match self.dispatcher.dispatch(&intent, &format!("nonce {nonce}")).await {
                    SendOutcome::Submitted(_) => stats.submitted += 1,
                    SendOutcome::NonceConflict => conflicted.push(nonce),
                    SendOutcome::Exhausted => stats.abandoned += 1,
                }
            }

            // One requeue pass, each conflicted slot under a fresh nonce.
            for old_nonce in conflicted {
                stats.requeued += 1;
                let nonce = self.allocator.next().await?;
                let intent = self.build_intent(nonce);
                let label = format!("requeue nonce {nonce} (was {old_nonce})");
                match self.dispatcher.dispatch(&intent, &label).await {
                    SendOutcome::Submitted(_) => stats.submitted += 1,
                    SendOutcome::NonceConflict | SendOutcome::Exhausted => {
                        stats.abandoned += 1
                    }
                }
            }

            sent += batch_len;
            if sent < self.plan.total {
                info!("waiting {} ms before next batch", self.plan.inter_batch_pause.as_millis());
                sleep(self.plan.inter_batch_pause).await;
            }
        }

        Ok(stats)
    }
}

/// Worst-case spend for the run: fee cap times gas per transfer, plus the
/// average transfer value, times the transaction count.
pub fn required_balance(
    fee_plan: &FeePlan,
    gas_limit: U256,
    amount_min: U256,
    amount_max: U256,
    total: usize,
) -> U256 {
    let fee_per_tx = fee_plan.fee_cap * gas_limit;
    let avg_value = (amount_min + amount_max) / U256::from(2u64);
    (fee_per_tx + avg_value) * U256::from(total)
}

/// Abort before any submission when the balance cannot cover the run; in
/// dry-run mode the shortfall is only reported.
pub async fn check_balance<C: ChainRpc + 'static>(
    rpc: &RpcManager<C>,
    sender: Address,
    required: U256,
    dry_run: bool,
) -> Result<U256> {
    let balance = rpc.balance(sender).await?;
    info!(
        "balance: {} ETH | required (estimate): ~{} ETH",
        format_ether(balance),
        format_ether(required)
    );
    if balance < required && !dry_run {
        bail!("balance likely insufficient for this run; set DRY_RUN=true to simulate");
    }
    Ok(balance)
}
