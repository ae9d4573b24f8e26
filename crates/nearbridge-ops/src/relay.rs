use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use nearbridge_eth::inspect::{decode_signed_transaction, erc20_transfer};
use nearbridge_eth::EthRpc;
use nearbridge_near::NearRpc;
use nearbridge_types::{BridgeError, BridgeRequest, Hex, Result, SignedTransaction};

/// How the relayed transaction lines up with the request that triggered it.
///
/// The bridge contract only exposes its *latest* signed transaction, which
/// may belong to another user. A mismatch is reported, not prevented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Matched,
    Mismatch {
        expected_nonce: u64,
        actual_nonce: u64,
        expected_recipient: String,
        actual_recipient: Option<String>,
    },
    Unknown(String),
}

/// Compare a signed transaction against the request it should fulfil.
pub fn correlate(signed: &SignedTransaction, request: &BridgeRequest) -> Correlation {
    let tx = match decode_signed_transaction(signed.as_bytes()) {
        Ok(tx) => tx,
        Err(e) => return Correlation::Unknown(e.to_string()),
    };
    let actual_recipient = erc20_transfer(&tx.input).map(|call| hex::encode(call.to.as_slice()));
    let expected_recipient = request.eth_address.to_ascii_lowercase();

    if tx.nonce == request.network_details.eth_nonce
        && actual_recipient.as_deref() == Some(expected_recipient.as_str())
    {
        Correlation::Matched
    } else {
        Correlation::Mismatch {
            expected_nonce: request.network_details.eth_nonce,
            actual_nonce: tx.nonce,
            expected_recipient,
            actual_recipient,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub eth_tx_hash: Hex,
    pub raw_tx: Hex,
    /// Present when the relay was given the originating request.
    pub correlation: Option<Correlation>,
}

/// Moves the bridge contract's latest signed transaction onto Ethereum.
pub struct Relayer {
    near: Arc<dyn NearRpc>,
    eth: Arc<dyn EthRpc>,
    bridge_contract: String,
}

impl Relayer {
    pub fn new(near: Arc<dyn NearRpc>, eth: Arc<dyn EthRpc>, bridge_contract: &str) -> Self {
        Self {
            near,
            eth,
            bridge_contract: bridge_contract.to_string(),
        }
    }

    /// Read `get_latest_signed_tx` from the bridge contract.
    pub async fn fetch_signed_tx(&self) -> Result<SignedTransaction> {
        let raw = self
            .near
            .view_function(&self.bridge_contract, "get_latest_signed_tx", &Value::Null)
            .await?;
        let signed: SignedTransaction = serde_json::from_slice(&raw).map_err(|e| {
            BridgeError::Serialization(format!("get_latest_signed_tx did not return bytes: {}", e))
        })?;
        if signed.is_empty() {
            return Err(BridgeError::Near(format!(
                "{} has no signed transaction",
                self.bridge_contract
            )));
        }
        debug!(len = signed.as_bytes().len(), "fetched signed transaction");
        Ok(signed)
    }

    /// Relay the latest signed transaction and return the Ethereum hash.
    ///
    /// With `request`, the transaction is checked against it first and a
    /// mismatch is logged; the transaction is relayed either way.
    pub async fn relay(&self, request: Option<&BridgeRequest>) -> Result<RelayOutcome> {
        let signed = self.fetch_signed_tx().await?;

        let correlation = request.map(|request| correlate(&signed, request));
        match &correlation {
            Some(Correlation::Mismatch {
                expected_nonce,
                actual_nonce,
                expected_recipient,
                actual_recipient,
            }) => warn!(
                "Latest signed transaction may belong to another transfer: nonce {} (expected {}), recipient {:?} (expected {})",
                actual_nonce, expected_nonce, actual_recipient, expected_recipient
            ),
            Some(Correlation::Unknown(reason)) => {
                warn!("Cannot inspect latest signed transaction: {}", reason)
            }
            _ => {}
        }

        let raw_tx = signed.to_hex();
        let eth_tx_hash = self.eth.send_raw_transaction(&raw_tx).await?;
        info!("Relayed signed transaction, ethereum hash {}", eth_tx_hash);

        Ok(RelayOutcome {
            eth_tx_hash,
            raw_tx,
            correlation,
        })
    }
}
