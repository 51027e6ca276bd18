pub mod config;
pub mod dispatcher;
pub mod endpoint_pool;
pub mod engine;
pub mod fees;
pub mod nonce_manager;
pub mod rpc_manager;
pub mod types;

#[cfg(test)]
pub mod testing;
