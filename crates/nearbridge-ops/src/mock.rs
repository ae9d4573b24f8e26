//! In-memory providers for component tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;
use nearbridge_eth::{EthRpc, FeeData, TransactionReceipt};
use nearbridge_near::{ExecutionOutcome, ExecutionStatus, FunctionCall, InMemorySigner, NearRpc};
use nearbridge_types::{BridgeError, Hex, RelayError, Result};

use crate::Providers;

pub const TREASURY: &str = "0xd6cEefFa721575c53181346b6cC49647167085c7";
pub const RECIPIENT: &str = "8530748420d2a67d59e1fb0d2f33b71b51ff3965";

/// Signed USDC transfer from the treasury, nonce 1, to [`RECIPIENT`].
pub const SEPOLIA_SIGNED_TX: &str = "02f8b283aa36a701830f4cd885031ef4348082ea6094661c18a2a5db14cad34c62c3721febd1dfe94a1280b844a9059cbb0000000000000000000000008530748420d2a67d59e1fb0d2f33b71b51ff39650000000000000000000000000000000000000000000000000de0b6b3a7640000c080a0ee71ef343d4beedea5ce4ed614faddcd87adf9a71a434e999f5cc988e42fad55a01d5823bb5031b94a4586a937dfd09112f6964b68f84c5ac69788a15825e43b39";

pub fn signer() -> InMemorySigner {
    InMemorySigner::from_signing_key("alice.testnet", SigningKey::from_bytes(&[4u8; 32]))
}

pub fn success_outcome(tx_hash: &str, used_amount: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        transaction_hash: tx_hash.to_string(),
        status: ExecutionStatus::SuccessValue(format!("\"{}\"", used_amount).into_bytes()),
        logs: vec![],
    }
}

#[derive(Default)]
pub struct MockEth {
    pub chain_id: u64,
    pub base_fee: u128,
    pub priority_fee: u128,
    pub nonce: u64,
    pub fail_reads: bool,
    pub reject_broadcast: Option<RelayError>,
    pub tx_hash: Hex,
    /// Receipts returned in order; `None` entries mean "pending".
    pub receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    pub balances: HashMap<String, u128>,
    pub nonce_queries: Mutex<Vec<String>>,
    pub broadcasts: Mutex<Vec<String>>,
}

impl MockEth {
    pub fn new() -> Self {
        Self {
            chain_id: 11155111,
            base_fee: 6_000_000_000,
            priority_fee: 1_500_000_000,
            nonce: 1,
            tx_hash: "0xfeed".to_string(),
            ..Default::default()
        }
    }

    pub fn with_receipts(self, receipts: Vec<Option<TransactionReceipt>>) -> Self {
        *self.receipts.lock().unwrap() = receipts.into();
        self
    }

    fn unreachable(&self) -> Result<()> {
        if self.fail_reads {
            Err(BridgeError::Connectivity("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

pub fn receipt(tx_hash: &str, status: u64) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash.to_string(),
        block_number: 100,
        status: Some(status),
        gas_used: Some(52_000),
    }
}

#[async_trait]
impl EthRpc for MockEth {
    async fn chain_id(&self) -> Result<u64> {
        self.unreachable()?;
        Ok(self.chain_id)
    }

    async fn get_transaction_count(&self, address: &str) -> Result<u64> {
        self.unreachable()?;
        self.nonce_queries.lock().unwrap().push(address.to_string());
        Ok(self.nonce)
    }

    async fn get_fee_data(&self) -> Result<FeeData> {
        self.unreachable()?;
        Ok(FeeData::from_base_fee(self.base_fee, self.priority_fee))
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<Hex> {
        self.unreachable()?;
        self.broadcasts.lock().unwrap().push(raw_tx.to_string());
        match &self.reject_broadcast {
            Some(error) => Err(BridgeError::Relay(error.clone())),
            None => Ok(self.tx_hash.clone()),
        }
    }

    async fn get_transaction_receipt(&self, _tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        self.unreachable()?;
        Ok(self.receipts.lock().unwrap().pop_front().flatten())
    }

    async fn erc20_balance_of(&self, _token: &str, owner: &str) -> Result<u128> {
        self.unreachable()?;
        Ok(self.balances.get(owner).copied().unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MockNear {
    /// Results handed out by successive `function_call`s.
    pub submissions: Mutex<VecDeque<Result<ExecutionOutcome>>>,
    pub statuses: Mutex<VecDeque<Result<ExecutionOutcome>>>,
    /// View results keyed by method name.
    pub views: HashMap<String, Vec<u8>>,
    pub calls: Mutex<Vec<FunctionCall>>,
    pub status_queries: Mutex<Vec<(String, String)>>,
    pub view_args: Mutex<Vec<(String, String, Value)>>,
}

impl MockNear {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signed_tx(mut self, hex_tx: &str) -> Self {
        let bytes = hex::decode(hex_tx).unwrap();
        self.views
            .insert("get_latest_signed_tx".into(), serde_json::to_vec(&bytes).unwrap());
        self
    }

    pub fn with_submission(self, result: Result<ExecutionOutcome>) -> Self {
        self.submissions.lock().unwrap().push_back(result);
        self
    }

    pub fn with_status(self, result: Result<ExecutionOutcome>) -> Self {
        self.statuses.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl NearRpc for MockNear {
    async fn view_function(&self, contract_id: &str, method_name: &str, args: &Value) -> Result<Vec<u8>> {
        self.view_args
            .lock()
            .unwrap()
            .push((contract_id.to_string(), method_name.to_string(), args.clone()));
        self.views
            .get(method_name)
            .cloned()
            .ok_or_else(|| BridgeError::Near(format!("MethodNotFound: {}", method_name)))
    }

    async fn function_call(&self, _signer: &InMemorySigner, call: &FunctionCall) -> Result<ExecutionOutcome> {
        self.calls.lock().unwrap().push(call.clone());
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::Near("no submission configured".into())))
    }

    async fn tx_status(&self, tx_hash: &str, sender_id: &str) -> Result<ExecutionOutcome> {
        self.status_queries
            .lock()
            .unwrap()
            .push((tx_hash.to_string(), sender_id.to_string()));
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BridgeError::Near("UNKNOWN_TRANSACTION".into())))
    }
}

pub fn providers(eth: MockEth, near: MockNear) -> (Arc<MockEth>, Arc<MockNear>, Providers) {
    let eth = Arc::new(eth);
    let near = Arc::new(near);
    let providers = Providers::new(eth.clone(), near.clone());
    (eth, near, providers)
}
