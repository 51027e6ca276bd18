use ethers::types::{Address, U256};

/// A fully specified EIP-1559 transfer, ready to sign and submit.
/// Immutable once handed to the dispatcher; a requeue builds a new one.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub nonce: u64,
}
