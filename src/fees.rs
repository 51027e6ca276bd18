//! Once-per-run EIP-1559 fee plan.
//!
//! cap = floor(baseFee * multiplier) + tip, with the multiplier floored at
//! 1.00 and one-gwei fallbacks when the network omits a value, so the cap can
//! never fall below the priority fee. The plan is intentionally not refreshed
//! mid-run; every transfer in the run reuses it.

use anyhow::Result;
use ethers::types::U256;
use serde::Serialize;
use tracing::info;

use crate::rpc_manager::{ChainRpc, RpcManager};

/// 1 gwei, used when the network omits a base fee or a suggested tip.
const FALLBACK_WEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeePlan {
    pub base_fee: U256,
    pub priority_fee: U256,
    pub fee_cap: U256,
}

impl FeePlan {
    /// Pure fee arithmetic; `estimate` feeds it live network values.
    pub fn compute(
        base_fee: Option<U256>,
        suggested_tip: Option<U256>,
        min_priority_fee: U256,
        multiplier: f64,
    ) -> Self {
        let fallback = U256::from(FALLBACK_WEI);
        let base_fee = base_fee.unwrap_or(fallback);
        let suggested = suggested_tip.unwrap_or(fallback);
        let priority_fee = suggested.max(min_priority_fee);
        // Integer percent, floored at 100 so the cap covers at least the
        // observed base fee.
        let mult_pct = ((multiplier * 100.0).floor() as u64).max(100);
        let fee_cap = base_fee * U256::from(mult_pct) / U256::from(100u64) + priority_fee;
        Self {
            base_fee,
            priority_fee,
            fee_cap,
        }
    }

    /// Query current conditions and fix the plan for the whole run. A failure
    /// here means the full pool was exhausted and is fatal for setup.
    pub async fn estimate<C: ChainRpc + 'static>(
        rpc: &RpcManager<C>,
        min_priority_fee: U256,
        multiplier: f64,
    ) -> Result<Self> {
        let suggested = rpc.suggested_priority_fee().await?;
        let base_fee = rpc.latest_base_fee().await?;
        let plan = Self::compute(base_fee, suggested, min_priority_fee, multiplier);
        info!(
            "fees: base~{:.3} gwei | tip~{:.3} gwei | cap~{:.3} gwei",
            as_gwei(plan.base_fee),
            as_gwei(plan.priority_fee),
            as_gwei(plan.fee_cap)
        );
        Ok(plan)
    }
}

/// Lossy gwei view for logs only.
pub fn as_gwei(wei: U256) -> f64 {
    wei.low_u128() as f64 / 1e9
}
