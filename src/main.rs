//! Application entry: bulk EIP-1559 transfer sender with endpoint failover,
//! safe nonce allocation and batched, paced submission.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::U256;
use ethers::utils::format_ether;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bulk_sender_bot::config::Config;
use bulk_sender_bot::dispatcher::{Dispatcher, RetryPolicy};
use bulk_sender_bot::endpoint_pool::{mask_url, EndpointPool};
use bulk_sender_bot::engine::{check_balance, required_balance, RunPlan, SendEngine};
use bulk_sender_bot::fees::FeePlan;
use bulk_sender_bot::nonce_manager::NonceAllocator;
use bulk_sender_bot::rpc_manager::{HttpEndpoint, RpcManager};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cfg = Config::from_env().context("configuration")?;

    let wallet = cfg
        .private_key
        .parse::<LocalWallet>()
        .map_err(|e| anyhow!("invalid PRIVATE_KEY: {e}"))?
        .with_chain_id(cfg.chain_id);
    let sender = wallet.address();

    let endpoints = cfg
        .rpc_urls
        .iter()
        .map(|url| HttpEndpoint::connect(url, wallet.clone()).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    let pool =
        EndpointPool::from_vec(endpoints).ok_or_else(|| anyhow!("endpoint pool is empty"))?;
    let rpc = Arc::new(RpcManager::new(pool));

    info!("sender: {sender:?}");
    info!("dest  : {:?}", cfg.dest);
    info!(
        "rpcs  : {}",
        cfg.rpc_urls
            .iter()
            .map(|u| mask_url(u))
            .collect::<Vec<_>>()
            .join(" | ")
    );
    info!("plan  : {} tx in batches of {}", cfg.tx_total, cfg.batch_size);

    let fee_plan = FeePlan::estimate(&rpc, cfg.min_priority_fee, cfg.fee_multiplier).await?;
    let required = required_balance(
        &fee_plan,
        cfg.gas_limit,
        cfg.amount_min_wei,
        cfg.amount_max_wei,
        cfg.tx_total,
    );
    check_balance(&rpc, sender, required, cfg.dry_run).await?;

    if cfg.dry_run {
        info!("DRY_RUN=true -> simulated only, exiting");
        return Ok(());
    }

    let mut engine = SendEngine {
        allocator: NonceAllocator::new(Arc::clone(&rpc), sender),
        dispatcher: Dispatcher::new(
            Arc::clone(&rpc),
            RetryPolicy {
                max_attempts: cfg.retry_max,
                backoff: cfg.retry_backoff,
            },
            cfg.per_tx_delay,
        ),
        fee_plan,
        dest: cfg.dest,
        gas_limit: cfg.gas_limit,
        amount_min: cfg.amount_min_wei,
        amount_max: cfg.amount_max_wei,
        plan: RunPlan {
            total: cfg.tx_total,
            batch_size: cfg.batch_size,
            inter_batch_pause: cfg.inter_batch_pause,
        },
    };

    let stats = engine.run().await?;

    let fee_spend = fee_plan.fee_cap * cfg.gas_limit * U256::from(cfg.tx_total);
    info!("estimated fee spend: ~{} ETH", format_ether(fee_spend));
    info!(
        "run summary: {}",
        serde_json::json!({
            "submitted": stats.submitted,
            "requeued": stats.requeued,
            "abandoned": stats.abandoned,
            "fee_plan": fee_plan,
        })
    );

    Ok(())
}
