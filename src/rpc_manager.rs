//! Network boundary: the five RPC operation shapes the sender needs, plus
//! the failover wrapper that is the only path to the network.
//!
//! `ChainRpc` is implemented by the production `HttpEndpoint` (an ethers
//! provider bound to the signing wallet) and by scripted mocks in tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, BlockNumber, Eip1559TransactionRequest, H256, U256};
use tokio::sync::Mutex;
use tracing::warn;

use crate::endpoint_pool::{mask_url, EndpointPool};
use crate::types::TransferIntent;

/// One RPC endpoint with a signing context bound to it. Allows injecting mock
/// implementations for tests.
pub trait ChainRpc: Send + Sync + std::fmt::Debug {
    /// Masked endpoint identity used in logs.
    fn label(&self) -> &str;

    /// Pending-tag transaction count for the sender account.
    fn pending_nonce<'a>(
        &'a self,
        sender: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>>;

    /// Network-suggested priority fee; None when the endpoint has no opinion.
    fn suggested_priority_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>>;

    /// Base fee of the latest block; None on pre-1559 or pruned responses.
    fn latest_base_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>>;

    fn balance<'a>(
        &'a self,
        account: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>>;

    /// Sign and submit a transfer; resolves to the transaction hash as soon
    /// as the endpoint accepts it.
    fn send_transfer<'a>(
        &'a self,
        intent: TransferIntent,
    ) -> Pin<Box<dyn Future<Output = Result<H256>> + Send + 'a>>;
}

/// Production endpoint: HTTP JSON-RPC provider wrapped in a signer middleware
/// so submission signs locally and sends raw bytes.
pub struct HttpEndpoint {
    label: String,
    client: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl std::fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpoint")
            .field("label", &self.label)
            .finish()
    }
}

impl HttpEndpoint {
    pub fn connect(url: &str, wallet: LocalWallet) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| anyhow!("invalid endpoint url {}: {}", mask_url(url), e))?;
        Ok(Self {
            label: mask_url(url),
            client: SignerMiddleware::new(provider, wallet),
        })
    }
}

impl ChainRpc for HttpEndpoint {
    fn label(&self) -> &str {
        &self.label
    }

    fn pending_nonce<'a>(
        &'a self,
        sender: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .get_transaction_count(sender, Some(BlockNumber::Pending.into()))
                .await
                .map_err(|e| anyhow!(e.to_string()))
        })
    }

    fn suggested_priority_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>> {
        Box::pin(async move {
            let (_max_fee, tip) = self
                .client
                .estimate_eip1559_fees(None)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            Ok(Some(tip))
        })
    }

    fn latest_base_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>> {
        Box::pin(async move {
            let block = self
                .client
                .get_block(BlockNumber::Latest)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            Ok(block.and_then(|b| b.base_fee_per_gas))
        })
    }

    fn balance<'a>(
        &'a self,
        account: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .get_balance(account, None)
                .await
                .map_err(|e| anyhow!(e.to_string()))
        })
    }

    fn send_transfer<'a>(
        &'a self,
        intent: TransferIntent,
    ) -> Pin<Box<dyn Future<Output = Result<H256>> + Send + 'a>> {
        Box::pin(async move {
            let tx = Eip1559TransactionRequest::new()
                .to(intent.to)
                .value(intent.value)
                .gas(intent.gas_limit)
                .max_fee_per_gas(intent.max_fee_per_gas)
                .max_priority_fee_per_gas(intent.max_priority_fee_per_gas)
                .nonce(intent.nonce)
                .chain_id(self.client.signer().chain_id());
            let pending = self
                .client
                .send_transaction(tx, None)
                .await
                .map_err(|e| anyhow!(e.to_string()))?;
            Ok(*pending)
        })
    }
}

/// Every network call the sender makes goes through here: try the active
/// endpoint, rotate on failure, give up only after one full pool cycle and
/// surface the last error.
pub struct RpcManager<C> {
    pool: Mutex<EndpointPool<C>>,
}

impl<C: ChainRpc + 'static> RpcManager<C> {
    pub fn new(pool: EndpointPool<C>) -> Self {
        Self { pool: Mutex::new(pool) }
    }

    /// Run `op` against successive endpoints, rotating on failure. The
    /// budget defaults to the pool size, so each attempt targets a distinct
    /// rotation position. `op` must be side-effect free on failure.
    pub async fn with_failover<T, F>(&self, what: &str, budget: Option<usize>, op: F) -> Result<T>
    where
        T: Send,
        F: Fn(Arc<C>) -> Pin<Box<dyn Future<Output = Result<T>> + Send>>,
    {
        let budget = match budget {
            Some(n) => n,
            None => self.pool.lock().await.len(),
        };
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 1..=budget {
            let endpoint = self.pool.lock().await.current();
            match op(Arc::clone(&endpoint)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        endpoint = endpoint.label(),
                        attempt,
                        budget,
                        "{what} failed: {e:#}; trying next endpoint"
                    );
                    self.pool.lock().await.advance();
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("{what}: endpoint pool exhausted")))
    }

    pub async fn pending_nonce(&self, sender: Address) -> Result<U256> {
        self.with_failover("eth_getTransactionCount", None, move |c| {
            Box::pin(async move { c.pending_nonce(sender).await })
        })
        .await
    }

    pub async fn suggested_priority_fee(&self) -> Result<Option<U256>> {
        self.with_failover("eth_maxPriorityFeePerGas", None, move |c| {
            Box::pin(async move { c.suggested_priority_fee().await })
        })
        .await
    }

    pub async fn latest_base_fee(&self) -> Result<Option<U256>> {
        self.with_failover("eth_getBlockByNumber", None, move |c| {
            Box::pin(async move { c.latest_base_fee().await })
        })
        .await
    }

    pub async fn balance(&self, account: Address) -> Result<U256> {
        self.with_failover("eth_getBalance", None, move |c| {
            Box::pin(async move { c.balance(account).await })
        })
        .await
    }

    pub async fn send_transfer(&self, intent: &TransferIntent) -> Result<H256> {
        let intent = intent.clone();
        self.with_failover("eth_sendRawTransaction", None, move |c| {
            let intent = intent.clone();
            Box::pin(async move { c.send_transfer(intent).await })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{intent_with_nonce, ScriptedEndpoint};

    #[tokio::test]
    async fn failover_tries_every_endpoint_exactly_once() {
        let a = Arc::new(ScriptedEndpoint::failing("a"));
        let b = Arc::new(ScriptedEndpoint::failing("b"));
        let c = Arc::new(ScriptedEndpoint::failing("c"));
        let pool = EndpointPool::from_vec(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let rpc = RpcManager::new(pool);

        let err = rpc.pending_nonce(Address::zero()).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(a.query_calls(), 1);
        assert_eq!(b.query_calls(), 1);
        assert_eq!(c.query_calls(), 1);
    }

    #[tokio::test]
    async fn failover_rotates_past_dead_endpoint_then_sticks() {
        let dead = Arc::new(ScriptedEndpoint::failing("dead"));
        let live = Arc::new(ScriptedEndpoint::healthy("live"));
        let pool = EndpointPool::from_vec(vec![dead.clone(), live.clone()]).unwrap();
        let rpc = RpcManager::new(pool);

        // First submission: fails on the dead endpoint, rotates once, succeeds.
        rpc.send_transfer(&intent_with_nonce(0)).await.unwrap();
        assert_eq!(dead.send_calls(), 1);
        assert_eq!(live.send_calls(), 1);

        // The pool pointer stays on the healthy endpoint for later calls.
        rpc.send_transfer(&intent_with_nonce(1)).await.unwrap();
        rpc.send_transfer(&intent_with_nonce(2)).await.unwrap();
        assert_eq!(dead.send_calls(), 1);
        assert_eq!(live.send_calls(), 3);
    }

    #[tokio::test]
    async fn explicit_budget_caps_attempts_below_pool_size() {
        let a = Arc::new(ScriptedEndpoint::failing("a"));
        let b = Arc::new(ScriptedEndpoint::failing("b"));
        let c = Arc::new(ScriptedEndpoint::failing("c"));
        let pool = EndpointPool::from_vec(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let rpc = RpcManager::new(pool);

        let err = rpc
            .with_failover("eth_getBalance", Some(2), move |e| {
                Box::pin(async move { e.balance(Address::zero()).await })
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(a.query_calls(), 1);
        assert_eq!(b.query_calls(), 1);
        assert_eq!(c.query_calls(), 0);
    }

    #[tokio::test]
    async fn first_success_short_circuits_rotation() {
        let a = Arc::new(ScriptedEndpoint::healthy("a"));
        let b = Arc::new(ScriptedEndpoint::healthy("b"));
        let pool = EndpointPool::from_vec(vec![a.clone(), b.clone()]).unwrap();
        let rpc = RpcManager::new(pool);

        rpc.balance(Address::zero()).await.unwrap();
        assert_eq!(a.query_calls(), 1);
        assert_eq!(b.query_calls(), 0);
    }
}
