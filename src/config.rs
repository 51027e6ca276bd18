//! Flat env-var configuration for one sending run.
//!
//! Every knob has a default except the endpoint list, the signing key and the
//! destination address; those three are fatal when missing, before any
//! network activity happens.

use std::time::Duration;

use ethers::types::{Address, U256};
use ethers::utils::parse_units;
use thiserror::Error;

/// Sepolia; the chain this sender was written for.
const DEFAULT_CHAIN_ID: u64 = 11_155_111;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("set RPC_URLS (comma separated) or RPC_URL")]
    MissingEndpoints,
    #[error("PRIVATE_KEY is not set")]
    MissingPrivateKey,
    #[error("DEST is not set")]
    MissingDestination,
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_urls: Vec<String>,
    pub private_key: String,
    pub dest: Address,
    pub chain_id: u64,
    /// Total transfers for the run.
    pub tx_total: usize,
    pub amount_min_wei: U256,
    pub amount_max_wei: U256,
    pub gas_limit: U256,
    pub batch_size: usize,
    pub inter_batch_pause: Duration,
    pub per_tx_delay: Duration,
    /// Attempts per transaction for transient failures, including the first.
    pub retry_max: usize,
    pub retry_backoff: Duration,
    /// Floor for the priority fee, in wei.
    pub min_priority_fee: U256,
    /// Fee cap = baseFee * multiplier + tip; clamped to >= 1.00 downstream.
    pub fee_multiplier: f64,
    pub dry_run: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_urls = std::env::var("RPC_URLS")
            .or_else(|_| std::env::var("RPC_URL"))
            .unwrap_or_default();
        let rpc_urls: Vec<String> = raw_urls
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if rpc_urls.is_empty() {
            return Err(ConfigError::MissingEndpoints);
        }

        let private_key =
            std::env::var("PRIVATE_KEY").map_err(|_| ConfigError::MissingPrivateKey)?;
        let dest_raw = std::env::var("DEST").map_err(|_| ConfigError::MissingDestination)?;
        let dest = dest_raw.parse::<Address>().map_err(|e| ConfigError::Invalid {
            key: "DEST",
            reason: e.to_string(),
        })?;

        let cfg = Self {
            rpc_urls,
            private_key,
            dest,
            chain_id: parse_env("CHAIN_ID", DEFAULT_CHAIN_ID)?,
            tx_total: parse_env("TX_PER_DAY", 500usize)?,
            amount_min_wei: ether_env("AMOUNT_ETH_MIN", "0.00001")?,
            amount_max_wei: ether_env("AMOUNT_ETH_MAX", "0.00001")?,
            gas_limit: U256::from(parse_env("GAS_LIMIT", 21_000u64)?),
            batch_size: parse_env("BATCH_SIZE", 10usize)?,
            inter_batch_pause: Duration::from_millis(parse_env("SLEEP_BETWEEN_BATCH_MS", 60_000u64)?),
            per_tx_delay: Duration::from_millis(parse_env("PER_TX_DELAY_MS", 150u64)?),
            retry_max: parse_env("RETRY_MAX", 4usize)?,
            retry_backoff: Duration::from_millis(parse_env("RETRY_BACKOFF_MS", 2_000u64)?),
            min_priority_fee: gwei_env("PRIORITY_GWEI", "1.0")?,
            fee_multiplier: parse_env("FEE_MULTIPLIER", 1.20f64)?,
            dry_run: std::env::var("DRY_RUN")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.amount_min_wei > self.amount_max_wei {
            return Err(ConfigError::Invalid {
                key: "AMOUNT_ETH_MIN",
                reason: "must be <= AMOUNT_ETH_MAX".to_string(),
            });
        }
        if self.tx_total == 0 {
            return Err(ConfigError::Invalid {
                key: "TX_PER_DAY",
                reason: "must be > 0".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "BATCH_SIZE",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry_max == 0 {
            return Err(ConfigError::Invalid {
                key: "RETRY_MAX",
                reason: "must be > 0".to_string(),
            });
        }
        if !self.fee_multiplier.is_finite() || self.fee_multiplier <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "FEE_MULTIPLIER",
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn units_env(key: &'static str, default: &str, units: &str) -> Result<U256, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_units(raw.trim(), units)
        .map(U256::from)
        .map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn ether_env(key: &'static str, default: &str) -> Result<U256, ConfigError> {
    units_env(key, default, "ether")
}

fn gwei_env(key: &'static str, default: &str) -> Result<U256, ConfigError> {
    units_env(key, default, "gwei")
}
