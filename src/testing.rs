//! Scripted `ChainRpc` endpoint shared by the unit tests. Never compiled
//! into release builds.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use ethers::types::{Address, H256, U256};

use crate::rpc_manager::ChainRpc;
use crate::types::TransferIntent;

/// What one send attempt should do.
#[derive(Debug, Clone)]
pub enum SendScript {
    Accept,
    /// Fails with a message that classifies as transient.
    Transient,
    /// Fails with the node's nonce-reuse message.
    NonceConflict,
}

#[derive(Debug)]
pub struct ScriptedEndpoint {
    label: &'static str,
    /// When set, every operation fails as if the endpoint were unreachable.
    unreachable: bool,
    pending: Mutex<u64>,
    base_fee: Mutex<Option<U256>>,
    tip: Mutex<Option<U256>>,
    balance: Mutex<U256>,
    /// Consumed front-to-back by send attempts; empty means accept.
    script: Mutex<VecDeque<SendScript>>,
    sent_nonces: Mutex<Vec<u64>>,
    query_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl ScriptedEndpoint {
    pub fn healthy(label: &'static str) -> Self {
        Self {
            label,
            unreachable: false,
            pending: Mutex::new(0),
            base_fee: Mutex::new(Some(U256::from(10_000_000_000u64))),
            tip: Mutex::new(Some(U256::from(2_000_000_000u64))),
            balance: Mutex::new(U256::from(u128::MAX)),
            script: Mutex::new(VecDeque::new()),
            sent_nonces: Mutex::new(Vec::new()),
            query_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(label: &'static str) -> Self {
        Self {
            unreachable: true,
            ..Self::healthy(label)
        }
    }

    pub fn with_script(label: &'static str, script: Vec<SendScript>) -> Self {
        let endpoint = Self::healthy(label);
        *endpoint.script.lock().unwrap() = script.into();
        endpoint
    }

    pub fn set_pending(&self, n: u64) {
        *self.pending.lock().unwrap() = n;
    }

    pub fn set_balance(&self, wei: U256) {
        *self.balance.lock().unwrap() = wei;
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Nonces of every send attempt, in order, successful or not.
    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent_nonces.lock().unwrap().clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            Err(anyhow!("connection refused"))
        } else {
            Ok(())
        }
    }
}

impl ChainRpc for ScriptedEndpoint {
    fn label(&self) -> &str {
        self.label
    }

    fn pending_nonce<'a>(
        &'a self,
        _sender: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>> {
        Box::pin(async move {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reachable()?;
            Ok(U256::from(*self.pending.lock().unwrap()))
        })
    }

    fn suggested_priority_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>> {
        Box::pin(async move {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reachable()?;
            Ok(*self.tip.lock().unwrap())
        })
    }

    fn latest_base_fee<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<U256>>> + Send + 'a>> {
        Box::pin(async move {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reachable()?;
            Ok(*self.base_fee.lock().unwrap())
        })
    }

    fn balance<'a>(
        &'a self,
        _account: Address,
    ) -> Pin<Box<dyn Future<Output = Result<U256>> + Send + 'a>> {
        Box::pin(async move {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.check_reachable()?;
            Ok(*self.balance.lock().unwrap())
        })
    }

    fn send_transfer<'a>(
        &'a self,
        intent: TransferIntent,
    ) -> Pin<Box<dyn Future<Output = Result<H256>> + Send + 'a>> {
        Box::pin(async move {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.sent_nonces.lock().unwrap().push(intent.nonce);
            self.check_reachable()?;
            let step = self.script.lock().unwrap().pop_front();
            match step {
                None | Some(SendScript::Accept) => Ok(H256::from_low_u64_be(intent.nonce)),
                Some(SendScript::Transient) => Err(anyhow!("503 service unavailable")),
                Some(SendScript::NonceConflict) => Err(anyhow!("nonce too low")),
            }
        })
    }
}

pub fn intent_with_nonce(nonce: u64) -> TransferIntent {
    TransferIntent {
        to: Address::repeat_byte(0x42),
        value: U256::from(10_000_000_000_000u64),
        gas_limit: U256::from(21_000u64),
        max_fee_per_gas: U256::from(14_000_000_000u64),
        max_priority_fee_per_gas: U256::from(2_000_000_000u64),
        nonce,
    }
}
