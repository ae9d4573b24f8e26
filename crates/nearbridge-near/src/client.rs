//! HTTP JSON-RPC client for a NEAR node.
//!
//! Methods used:
//! - query (call_function, view_access_key)
//! - broadcast_tx_commit
//! - tx

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use nearbridge_types::{BridgeError, Result};

use crate::signer::InMemorySigner;
use crate::transaction::{parse_block_hash, Transaction};
use crate::{ExecutionOutcome, FunctionCall, NearRpc};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<NearRpcError>,
}

/// Structured error returned by nearcore.
#[derive(Debug, Clone, Deserialize)]
pub struct NearRpcError {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cause: Option<ErrorCause>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorCause {
    pub name: String,
    #[serde(default)]
    pub info: Option<Value>,
}

impl NearRpcError {
    pub fn is_timeout(&self) -> bool {
        self.cause.as_ref().is_some_and(|c| c.name == "TIMEOUT_ERROR")
            || self.data.as_ref().and_then(Value::as_str) == Some("Timeout")
    }

    fn describe(&self) -> String {
        match (&self.cause, &self.data) {
            (Some(cause), _) => match &cause.info {
                Some(info) => format!("{}: {}", cause.name, info),
                None => cause.name.clone(),
            },
            (None, Some(data)) => data.to_string(),
            (None, None) => self.message.clone().unwrap_or_else(|| "unknown error".into()),
        }
    }
}

/// Outcome of a single RPC exchange, keeping timeouts distinguishable.
enum RpcReply {
    Result(Value),
    Error(NearRpcError),
    TimedOut,
}

#[derive(Debug, Deserialize)]
struct AccessKeyView {
    nonce: u64,
    block_hash: String,
}

/// NEAR RPC client.
pub struct NearRpcClient {
    rpc_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl NearRpcClient {
    pub fn new(rpc_url: &str, timeout_ms: Option<u64>) -> Result<Self> {
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(60_000));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Connectivity(format!("cannot build NEAR provider: {}", e)))?;
        Ok(Self {
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    async fn request(&self, method: &str, params: Value) -> Result<RpcReply> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method,
            params,
        };
        debug!(method, url = %self.rpc_url, "near rpc request");

        let resp = match self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Ok(RpcReply::TimedOut),
            Err(e) => {
                return Err(BridgeError::Connectivity(format!("{} request failed: {}", method, e)))
            }
        };

        // nearcore answers TIMEOUT_ERROR with 408 and a JSON body.
        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) if e.is_timeout() => return Ok(RpcReply::TimedOut),
            Err(e) => {
                return Err(BridgeError::Connectivity(format!("{} response unreadable: {}", method, e)))
            }
        };
        let parsed: Option<JsonRpcResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(JsonRpcResponse { error: Some(error), .. }) => Ok(RpcReply::Error(error)),
            Some(JsonRpcResponse { result: Some(result), .. }) if status.is_success() => {
                Ok(RpcReply::Result(result))
            }
            _ if status == StatusCode::REQUEST_TIMEOUT => Ok(RpcReply::TimedOut),
            _ => Err(BridgeError::Connectivity(format!(
                "{} returned status {}: {}",
                method, status, text
            ))),
        }
    }

    /// Request that treats errors and timeouts as failures.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        match self.request(method, params).await? {
            RpcReply::Result(value) => Ok(value),
            RpcReply::Error(error) => Err(BridgeError::Near(format!("{} failed: {}", method, error.describe()))),
            RpcReply::TimedOut => Err(BridgeError::Connectivity(format!("{} timed out", method))),
        }
    }

    async fn view_access_key(&self, signer: &InMemorySigner) -> Result<AccessKeyView> {
        let value = self
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": signer.account_id,
                    "public_key": signer.public_key(),
                }),
            )
            .await?;
        check_query_error(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Older nodes report query failures inside `result.error`.
fn check_query_error(value: &Value) -> Result<()> {
    match value.get("error").and_then(Value::as_str) {
        Some(error) => Err(BridgeError::Near(error.to_string())),
        None => Ok(()),
    }
}

/// Extract the byte array of a `call_function` query result.
fn parse_call_result(value: &Value) -> Result<Vec<u8>> {
    check_query_error(value)?;
    let bytes: Vec<u8> = serde_json::from_value(value.get("result").cloned().unwrap_or(Value::Null))
        .map_err(|e| BridgeError::Serialization(format!("call_function result is not a byte array: {}", e)))?;
    Ok(bytes)
}

#[async_trait]
impl NearRpc for NearRpcClient {
    async fn view_function(&self, contract_id: &str, method_name: &str, args: &Value) -> Result<Vec<u8>> {
        let args_base64 = if args.is_null() {
            String::new()
        } else {
            STANDARD.encode(serde_json::to_vec(args)?)
        };
        let value = self
            .call(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": "optimistic",
                    "account_id": contract_id,
                    "method_name": method_name,
                    "args_base64": args_base64,
                }),
            )
            .await?;
        parse_call_result(&value)
    }

    async fn function_call(&self, signer: &InMemorySigner, call: &FunctionCall) -> Result<ExecutionOutcome> {
        let access_key = self.view_access_key(signer).await?;
        let block_hash = parse_block_hash(&access_key.block_hash)?;

        let signed = Transaction::function_call(signer, access_key.nonce + 1, block_hash, call).sign(signer)?;
        let tx_hash = signed.hash();
        let encoded = STANDARD.encode(signed.to_bytes()?);

        info!(
            "Sending {} to {} as {} (tx {})",
            call.method_name, call.receiver_id, signer.account_id, tx_hash
        );

        match self.request("broadcast_tx_commit", json!([encoded])).await? {
            RpcReply::Result(value) => ExecutionOutcome::from_rpc(&value),
            RpcReply::Error(error) if error.is_timeout() => {
                warn!("broadcast_tx_commit timed out for {}", tx_hash);
                Err(BridgeError::SubmissionTimeout { tx_hash })
            }
            RpcReply::Error(error) => Err(BridgeError::Near(format!(
                "transaction {} rejected: {}",
                tx_hash,
                error.describe()
            ))),
            RpcReply::TimedOut => {
                warn!("request timed out after sending {}", tx_hash);
                Err(BridgeError::SubmissionTimeout { tx_hash })
            }
        }
    }

    async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<ExecutionOutcome> {
        let value = self.call("tx", json!([tx_hash, sender_id])).await?;
        ExecutionOutcome::from_rpc(&value)
    }
}
