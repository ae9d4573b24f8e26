use std::sync::Arc;
use tracing::{debug, info};

use nearbridge_eth::EthRpc;
use nearbridge_types::{strip_0x, BridgeError, BridgeRequest, NetworkDetails, Result};

use crate::config::EthConfig;

/// Builds the request the bridge contract signs an Ethereum transfer from.
pub struct BridgeRequestBuilder {
    eth: Arc<dyn EthRpc>,
    treasury_address: String,
    chain_id: u64,
    gas_limit: u128,
}

impl BridgeRequestBuilder {
    pub fn new(eth: Arc<dyn EthRpc>, config: &EthConfig) -> Self {
        Self {
            eth,
            treasury_address: config.treasury_address.clone(),
            chain_id: config.chain_id,
            gas_limit: config.gas_limit,
        }
    }

    /// Fetch current fees and the treasury nonce for a transfer to `eth_address`.
    ///
    /// Only the `0x` prefix is stripped here; callers validate the address.
    /// Fails with `Config` when the node serves a different chain than configured.
    pub async fn build(&self, eth_address: &str) -> Result<BridgeRequest> {
        let (node_chain_id, fees, eth_nonce) = tokio::try_join!(
            self.eth.chain_id(),
            self.eth.get_fee_data(),
            self.eth.get_transaction_count(&self.treasury_address),
        )?;
        if node_chain_id != self.chain_id {
            return Err(BridgeError::Config(format!(
                "ethereum rpc serves chain {}, configured chain_id is {}",
                node_chain_id, self.chain_id
            )));
        }
        debug!(?fees, eth_nonce, "fetched ethereum network details");

        let request = BridgeRequest {
            eth_address: strip_0x(eth_address).to_string(),
            network_details: NetworkDetails {
                max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
                max_fee_per_gas: fees.max_fee_per_gas,
                gas_limit: self.gas_limit,
                chain_id: self.chain_id,
                eth_nonce,
            },
        };
        info!(
            "Built bridge request for 0x{} (treasury nonce {})",
            request.eth_address, eth_nonce
        );
        Ok(request)
    }
}
