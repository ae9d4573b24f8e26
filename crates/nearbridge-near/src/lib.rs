//! NEAR side of the bridge.
//!
//! - Contract view calls (`get_latest_signed_tx`, `ft_balance_of`)
//! - Signed function calls (`ft_transfer_call`) with access-key nonces
//! - Transaction status lookups for timeout recovery

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use nearbridge_types::{BridgeError, BridgeRequest, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub mod client;
pub mod signer;
pub mod transaction;

pub use client::NearRpcClient;
pub use signer::InMemorySigner;

/// 1 TGas.
pub const TGAS: u64 = 1_000_000_000_000;
/// Gas allowance attached to `ft_transfer_call`.
pub const FT_TRANSFER_CALL_GAS: u64 = 300 * TGAS;
/// NEP-141 requires exactly one yoctoNEAR on `ft_transfer_call`.
pub const ONE_YOCTO: u128 = 1;

/// A state-changing contract call to be signed by the caller's access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub receiver_id: String,
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

impl FunctionCall {
    /// `ft_transfer_call` on `token_id`, forwarding `request` as the message.
    pub fn ft_transfer_call(
        token_id: &str,
        receiver_id: &str,
        amount: &str,
        request: &BridgeRequest,
    ) -> Result<Self> {
        let args = json!({
            "receiver_id": receiver_id,
            "amount": amount,
            "msg": request.to_msg()?,
        });
        Ok(Self {
            receiver_id: token_id.to_string(),
            method_name: "ft_transfer_call".to_string(),
            args: serde_json::to_vec(&args)?,
            gas: FT_TRANSFER_CALL_GAS,
            deposit: ONE_YOCTO,
        })
    }
}

/// Final status of a NEAR transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Decoded return value of the last receipt.
    SuccessValue(Vec<u8>),
    SuccessReceiptId(String),
    Failure(String),
    /// Not started or still executing.
    Pending,
}

/// The parts of a `FinalExecutionOutcome` the bridge flow needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub transaction_hash: String,
    pub status: ExecutionStatus,
    pub logs: Vec<String>,
}

impl ExecutionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, ExecutionStatus::Failure(_))
    }

    /// Amount consumed by the receiver of an `ft_transfer_call`.
    ///
    /// The token contract returns it as a JSON string; `0` means the transfer was refunded.
    pub fn ft_used_amount(&self) -> Option<u128> {
        match &self.status {
            ExecutionStatus::SuccessValue(bytes) => serde_json::from_slice::<String>(bytes)
                .ok()
                .and_then(|s| s.parse().ok()),
            _ => None,
        }
    }

    /// Parse a `FinalExecutionOutcome` JSON object as returned by
    /// `broadcast_tx_commit` and `tx`.
    pub fn from_rpc(value: &Value) -> Result<Self> {
        let transaction_hash = value["transaction"]["hash"]
            .as_str()
            .or_else(|| value["transaction_outcome"]["id"].as_str())
            .ok_or_else(|| BridgeError::Serialization("execution outcome without transaction hash".into()))?
            .to_string();

        let status = match &value["status"] {
            Value::Object(map) => {
                if let Some(encoded) = map.get("SuccessValue").and_then(Value::as_str) {
                    let bytes = STANDARD
                        .decode(encoded)
                        .map_err(|e| BridgeError::Serialization(format!("invalid SuccessValue: {}", e)))?;
                    ExecutionStatus::SuccessValue(bytes)
                } else if let Some(id) = map.get("SuccessReceiptId").and_then(Value::as_str) {
                    ExecutionStatus::SuccessReceiptId(id.to_string())
                } else if let Some(failure) = map.get("Failure") {
                    ExecutionStatus::Failure(failure.to_string())
                } else {
                    ExecutionStatus::Pending
                }
            }
            _ => ExecutionStatus::Pending,
        };

        let mut logs = Vec::new();
        let outcomes = std::iter::once(&value["transaction_outcome"]).chain(
            value["receipts_outcome"]
                .as_array()
                .map(|a| a.iter())
                .into_iter()
                .flatten(),
        );
        for outcome in outcomes {
            if let Some(entries) = outcome["outcome"]["logs"].as_array() {
                logs.extend(entries.iter().filter_map(Value::as_str).map(str::to_string));
            }
        }

        Ok(Self {
            transaction_hash,
            status,
            logs,
        })
    }
}

/// NEAR JSON-RPC provider.
#[async_trait]
pub trait NearRpc: Send + Sync {
    /// Call a view method and return the raw bytes it produced.
    async fn view_function(&self, contract_id: &str, method_name: &str, args: &Value) -> Result<Vec<u8>>;

    /// Sign `call` with `signer` and wait for the final execution outcome.
    ///
    /// An RPC timeout returns `BridgeError::SubmissionTimeout` with the hash of
    /// the transaction that was sent.
    async fn function_call(&self, signer: &InMemorySigner, call: &FunctionCall) -> Result<ExecutionOutcome>;

    /// Look up a previously sent transaction.
    async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<ExecutionOutcome>;
}
