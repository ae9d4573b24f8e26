//! Ethereum node client on an alloy HTTP provider.
//!
//! Methods used:
//! - eth_chainId, eth_getTransactionCount
//! - eth_getBlockByNumber, eth_maxPriorityFeePerGas
//! - eth_sendRawTransaction, eth_getTransactionReceipt
//! - eth_call (ERC-20 balanceOf)

use alloy::eips::{BlockId, BlockNumberOrTag};
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::rpc::types::{self as rpc, TransactionInput, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use nearbridge_types::{hex_to_bytes, normalize_eth_address, BridgeError, Hex, RelayError, Result};

use crate::inspect::IERC20;
use crate::{EthRpc, FeeData, TransactionReceipt, DEFAULT_PRIORITY_FEE};

/// Ethereum JSON-RPC client.
pub struct EthRpcClient {
    rpc_url: String,
    provider: RootProvider<Ethereum>,
}

impl EthRpcClient {
    pub fn new(rpc_url: &str, timeout_ms: Option<u64>) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| BridgeError::Config(format!("invalid ethereum rpc url {}: {}", rpc_url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms.unwrap_or(30_000)))
            .build()
            .map_err(|e| BridgeError::Connectivity(format!("cannot build ethereum provider: {}", e)))?;
        let provider = RootProvider::new(RpcClient::new(Http::with_client(client, url), false));
        Ok(Self {
            rpc_url: rpc_url.to_string(),
            provider,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

fn unreachable(method: &str, e: TransportError) -> BridgeError {
    BridgeError::Connectivity(format!("{} failed: {}", method, e))
}

fn parse_address(address: &str) -> Result<Address> {
    let address = normalize_eth_address(address)?;
    address
        .parse()
        .map_err(|e| BridgeError::InvalidAddress(format!("{}: {}", address, e)))
}

#[async_trait]
impl EthRpc for EthRpcClient {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| unreachable("eth_chainId", e))
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        let address = parse_address(address)?;
        debug!(%address, "eth_getTransactionCount");
        self.provider
            .get_transaction_count(address)
            .block_id(BlockId::latest())
            .await
            .map_err(|e| unreachable("eth_getTransactionCount", e))
    }

    async fn get_fee_data(&self) -> Result<FeeData> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| unreachable("eth_getBlockByNumber", e))?
            .ok_or_else(|| BridgeError::Other("node returned no latest block".into()))?;
        let base_fee = block
            .header
            .base_fee_per_gas
            .ok_or_else(|| BridgeError::Other("latest block has no baseFeePerGas".into()))?;

        let priority_fee = match self.provider.get_max_priority_fee_per_gas().await {
            Ok(fee) => fee,
            Err(RpcError::ErrorResp(e)) => {
                warn!(
                    "eth_maxPriorityFeePerGas unsupported ({}), using {} wei",
                    e.message, DEFAULT_PRIORITY_FEE
                );
                DEFAULT_PRIORITY_FEE
            }
            Err(e) => return Err(unreachable("eth_maxPriorityFeePerGas", e)),
        };

        Ok(FeeData::from_base_fee(u128::from(base_fee), priority_fee))
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<Hex> {
        let bytes = hex_to_bytes(raw_tx)?;
        match self.provider.send_raw_transaction(&bytes).await {
            Ok(pending) => Ok(format!("{:#x}", pending.tx_hash())),
            Err(RpcError::ErrorResp(payload)) => Err(relay_error(raw_tx, &payload)),
            Err(e) => Err(unreachable("eth_sendRawTransaction", e)),
        }
    }

    async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        let hash: TxHash = tx_hash
            .parse()
            .map_err(|e| BridgeError::InvalidHex(format!("{}: {}", tx_hash, e)))?;
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| unreachable("eth_getTransactionReceipt", e))?;
        Ok(receipt.as_ref().and_then(to_receipt))
    }

    async fn erc20_balance_of(&self, token: &str, owner: &str) -> Result<u128> {
        let token = parse_address(token)?;
        let account = parse_address(owner)?;
        let call = TransactionRequest::default()
            .to(token)
            .input(TransactionInput::new(IERC20::balanceOfCall { account }.abi_encode().into()));
        let output = self
            .provider
            .call(call)
            .await
            .map_err(|e| unreachable("eth_call", e))?;
        let balance = IERC20::balanceOfCall::abi_decode_returns(&output, true)
            .map_err(|e| BridgeError::Serialization(format!("invalid balanceOf result: {}", e)))?
            .balance;
        u128::try_from(balance)
            .map_err(|_| BridgeError::Serialization(format!("balance {} exceeds u128", balance)))
    }
}

/// Map a node rejection of `eth_sendRawTransaction` without rewording it.
fn relay_error(raw_tx: &str, error: &ErrorPayload) -> BridgeError {
    BridgeError::Relay(RelayError {
        reason: error.message.to_string(),
        code: Some(error.code),
        transaction: Some(raw_tx.to_string()),
    })
}

/// Receipts not yet tied to a block are treated as missing.
fn to_receipt(receipt: &rpc::TransactionReceipt) -> Option<TransactionReceipt> {
    Some(TransactionReceipt {
        transaction_hash: format!("{:#x}", receipt.transaction_hash),
        block_number: receipt.block_number?,
        status: Some(u64::from(receipt.status())),
        gas_used: Some(u128::from(receipt.gas_used)),
    })
}
