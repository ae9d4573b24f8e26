//! Bridge configuration.
//!
//! Everything is defaulted for NEAR testnet and Sepolia, so an empty TOML
//! file is a valid configuration. Secrets are never read from here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use nearbridge_types::{normalize_eth_address, BridgeError, Result};

/// USDC token contract on NEAR testnet.
pub const DEFAULT_NEAR_USDC_CONTRACT: &str =
    "3e2210e1184b45b64c8a434c0a7e7b23cc04ea7eb7a6c3c32520d03d4afcb8af";
pub const DEFAULT_BRIDGE_CONTRACT: &str = "simple-bridge.testnet";
/// Ethereum address controlled by the bridge contract.
pub const DEFAULT_TREASURY_ADDRESS: &str = "0xd6cEefFa721575c53181346b6cC49647167085c7";
/// USDC token contract on Sepolia.
pub const DEFAULT_ETH_USDC_CONTRACT: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";
pub const DEFAULT_ETH_RPC_URL: &str = "https://rpc.sepolia.org/";
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const DEFAULT_GAS_LIMIT: u128 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NearNetwork {
    #[default]
    Testnet,
    Mainnet,
}

impl NearNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            NearNetwork::Testnet => "testnet",
            NearNetwork::Mainnet => "mainnet",
        }
    }

    /// `https://{kind}.{network}.near.org`, e.g. `rpc`, `wallet`, `explorer`.
    pub fn service_url(&self, kind: &str) -> String {
        format!("https://{}.{}.near.org", kind, self.as_str())
    }
}

impl fmt::Display for NearNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NearNetwork {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "testnet" => Ok(NearNetwork::Testnet),
            "mainnet" => Ok(NearNetwork::Mainnet),
            other => Err(BridgeError::Config(format!("unknown NEAR network '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NearConfig {
    pub network: NearNetwork,
    /// Account that signs `ft_transfer_call`.
    pub account_id: Option<String>,
    /// Overrides the templated RPC URL.
    pub rpc_url: Option<String>,
    pub usdc_contract: String,
    pub bridge_contract: String,
    pub request_timeout_ms: u64,
    /// Wait between a submission timeout and the status lookup.
    pub recovery_delay_ms: u64,
}

impl Default for NearConfig {
    fn default() -> Self {
        Self {
            network: NearNetwork::Testnet,
            account_id: None,
            rpc_url: None,
            usdc_contract: DEFAULT_NEAR_USDC_CONTRACT.to_string(),
            bridge_contract: DEFAULT_BRIDGE_CONTRACT.to_string(),
            request_timeout_ms: 60_000,
            recovery_delay_ms: 15_000,
        }
    }
}

impl NearConfig {
    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.network.service_url("rpc"))
    }

    pub fn explorer_url(&self) -> String {
        self.network.service_url("explorer")
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/transactions/{}", self.explorer_url(), tx_hash)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EthConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub gas_limit: u128,
    pub treasury_address: String,
    pub usdc_contract: String,
    pub explorer_url: String,
    pub request_timeout_ms: u64,
    pub confirmation_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for EthConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_ETH_RPC_URL.to_string(),
            chain_id: SEPOLIA_CHAIN_ID,
            gas_limit: DEFAULT_GAS_LIMIT,
            treasury_address: DEFAULT_TREASURY_ADDRESS.to_string(),
            usdc_contract: DEFAULT_ETH_USDC_CONTRACT.to_string(),
            explorer_url: "https://sepolia.etherscan.io".to_string(),
            request_timeout_ms: 30_000,
            confirmation_timeout_ms: 300_000,
            poll_interval_ms: 4_000,
        }
    }
}

impl EthConfig {
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_hash)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub near: NearConfig,
    pub eth: EthConfig,
}

impl BridgeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        normalize_eth_address(&self.eth.treasury_address)
            .map_err(|e| BridgeError::Config(format!("eth.treasury_address: {}", e)))?;
        normalize_eth_address(&self.eth.usdc_contract)
            .map_err(|e| BridgeError::Config(format!("eth.usdc_contract: {}", e)))?;
        if self.near.usdc_contract.is_empty() || self.near.bridge_contract.is_empty() {
            return Err(BridgeError::Config("NEAR contract ids must not be empty".into()));
        }
        if self.eth.poll_interval_ms == 0 {
            return Err(BridgeError::Config("eth.poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}
