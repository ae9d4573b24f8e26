use serde_json::json;
use std::fmt;
use std::sync::Arc;

use nearbridge_eth::EthRpc;
use nearbridge_near::NearRpc;
use nearbridge_types::{format_usdc_amount, BridgeError, Result};

use crate::config::BridgeConfig;

/// USDC balances in smallest units. `None` when the side was not queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balances {
    pub near: Option<u128>,
    pub eth: Option<u128>,
}

impl fmt::Display for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |units: Option<u128>| units.map(format_usdc_amount).unwrap_or_else(|| "-".into());
        write!(f, "NEAR: {} USDC, Ethereum: {} USDC", show(self.near), show(self.eth))
    }
}

pub struct BalanceReader {
    near: Arc<dyn NearRpc>,
    eth: Arc<dyn EthRpc>,
    near_token: String,
    eth_token: String,
}

impl BalanceReader {
    pub fn new(near: Arc<dyn NearRpc>, eth: Arc<dyn EthRpc>, config: &BridgeConfig) -> Self {
        Self {
            near,
            eth,
            near_token: config.near.usdc_contract.clone(),
            eth_token: config.eth.usdc_contract.clone(),
        }
    }

    /// NEP-141 `ft_balance_of`, returned by the token as a JSON string.
    pub async fn near_balance(&self, account_id: &str) -> Result<u128> {
        let raw = self
            .near
            .view_function(&self.near_token, "ft_balance_of", &json!({ "account_id": account_id }))
            .await?;
        let balance: String = serde_json::from_slice(&raw)?;
        balance
            .parse()
            .map_err(|_| BridgeError::Serialization(format!("invalid ft_balance_of result {:?}", balance)))
    }

    pub async fn eth_balance(&self, address: &str) -> Result<u128> {
        self.eth.erc20_balance_of(&self.eth_token, address).await
    }

    pub async fn fetch(&self, near_account: Option<&str>, eth_address: Option<&str>) -> Result<Balances> {
        let near = match near_account {
            Some(account) => Some(self.near_balance(account).await?),
            None => None,
        };
        let eth = match eth_address {
            Some(address) => Some(self.eth_balance(address).await?),
            None => None,
        };
        Ok(Balances { near, eth })
    }
}
