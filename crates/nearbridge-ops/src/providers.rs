use std::sync::Arc;
use tracing::debug;

use nearbridge_eth::{EthRpc, EthRpcClient};
use nearbridge_near::{NearRpc, NearRpcClient};
use nearbridge_types::Result;

use crate::config::BridgeConfig;

/// RPC providers for both chains, built once and shared by every component.
#[derive(Clone)]
pub struct Providers {
    pub eth: Arc<dyn EthRpc>,
    pub near: Arc<dyn NearRpc>,
}

impl Providers {
    pub fn new(eth: Arc<dyn EthRpc>, near: Arc<dyn NearRpc>) -> Self {
        Self { eth, near }
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let near_url = config.near.rpc_url();
        debug!(eth = %config.eth.rpc_url, near = %near_url, "building providers");

        let eth = EthRpcClient::new(&config.eth.rpc_url, Some(config.eth.request_timeout_ms))?;
        let near = NearRpcClient::new(&near_url, Some(config.near.request_timeout_ms))?;
        Ok(Self::new(Arc::new(eth), Arc::new(near)))
    }
}
