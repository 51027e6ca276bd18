//! Round-robin pool of signer-bound RPC endpoints.
//!
//! The pool never drops a failing endpoint; it only rotates, so a dead
//! endpoint gets retried again after a full cycle. Non-emptiness is enforced
//! by construction via `NonEmpty`.

use std::sync::Arc;

use nonempty::NonEmpty;
use tracing::info;

use crate::rpc_manager::ChainRpc;

#[derive(Debug)]
pub struct EndpointPool<C> {
    endpoints: NonEmpty<Arc<C>>,
    index: usize,
}

impl<C: ChainRpc> EndpointPool<C> {
    pub fn new(endpoints: NonEmpty<Arc<C>>) -> Self {
        Self { endpoints, index: 0 }
    }

    /// None when the vector is empty; the caller treats that as a config error.
    pub fn from_vec(endpoints: Vec<Arc<C>>) -> Option<Self> {
        NonEmpty::from_vec(endpoints).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// The active endpoint all calls currently target.
    pub fn current(&self) -> Arc<C> {
        Arc::clone(&self.endpoints[self.index])
    }

    /// Rotate to the next endpoint, wrapping past the end.
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.endpoints.len();
        info!("switching endpoint: {}", self.current().label());
    }
}

/// Strip everything after the host so credentials embedded in RPC URLs never
/// reach the logs.
pub fn mask_url(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(path_start) => url[..scheme_end + 3 + path_start].to_string(),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}
