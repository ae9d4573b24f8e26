//! Ethereum side of the bridge.
//!
//! - Fee market and nonce reads for building bridge requests
//! - Raw transaction broadcast
//! - Receipt lookups for confirmation
//! - Offline inspection of signed EIP-1559 payloads

use async_trait::async_trait;
use nearbridge_types::{Hex, Result};
use serde::{Deserialize, Serialize};

pub mod client;
pub mod inspect;

pub use client::EthRpcClient;

/// Priority fee used when the node does not implement `eth_maxPriorityFeePerGas`.
pub const DEFAULT_PRIORITY_FEE: u128 = 1_000_000_000;

/// Current EIP-1559 fee suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeData {
    pub base_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

impl FeeData {
    /// `max_fee = 2 * base_fee + priority_fee`, leaving headroom for base fee growth.
    pub fn from_base_fee(base_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        Self {
            base_fee_per_gas,
            max_priority_fee_per_gas,
            max_fee_per_gas: base_fee_per_gas
                .saturating_mul(2)
                .saturating_add(max_priority_fee_per_gas),
        }
    }
}

/// The subset of a transaction receipt the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: Hex,
    pub block_number: u64,
    /// 1 on success, 0 on revert. Absent on pre-Byzantium chains.
    pub status: Option<u64>,
    pub gas_used: Option<u128>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status != Some(0)
    }
}

/// Ethereum JSON-RPC provider.
///
/// Components receive this as `Arc<dyn EthRpc>` so tests can substitute an
/// in-memory implementation.
#[async_trait]
pub trait EthRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Transaction count of `address` at the latest block.
    async fn get_transaction_count(&self, address: &str) -> Result<u64>;

    async fn get_fee_data(&self) -> Result<FeeData>;

    /// Broadcast a 0x-prefixed signed transaction and return its hash.
    ///
    /// Node rejections surface as `BridgeError::Relay` with the node's message untouched.
    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<Hex>;

    /// `None` while the transaction is not yet included in a block.
    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>>;

    /// ERC-20 `balanceOf(owner)` on `token`.
    async fn erc20_balance_of(&self, token: &str, owner: &str) -> Result<u128>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_data_from_base_fee() {
        let fees = FeeData::from_base_fee(500_000_000, 1_000_000_000);
        assert_eq!(fees.max_priority_fee_per_gas, 1_000_000_000);
        assert_eq!(fees.max_fee_per_gas, 2_000_000_000);
    }

    #[test]
    fn test_receipt_status() {
        let mut receipt = TransactionReceipt {
            transaction_hash: "0xabc".into(),
            block_number: 10,
            status: Some(1),
            gas_used: None,
        };
        assert!(receipt.succeeded());
        receipt.status = Some(0);
        assert!(!receipt.succeeded());
        receipt.status = None;
        assert!(receipt.succeeded());
    }
}
