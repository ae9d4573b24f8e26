use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use nearbridge_near::{ExecutionOutcome, ExecutionStatus, FunctionCall, InMemorySigner, NearRpc};
use nearbridge_types::{BridgeError, BridgeRequest, Result};

use crate::config::NearConfig;

/// Result of a NEAR submission that reached a final status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub tx_hash: String,
    /// Set when the result came from a status lookup after a timeout.
    pub recovered: bool,
    pub outcome: ExecutionOutcome,
}

/// Sends `ft_transfer_call` on the USDC token, routing funds and the
/// bridge request to the bridge contract.
pub struct NearSubmitter {
    near: Arc<dyn NearRpc>,
    signer: InMemorySigner,
    token_id: String,
    bridge_id: String,
    recovery_delay: Duration,
}

impl NearSubmitter {
    pub fn new(near: Arc<dyn NearRpc>, signer: InMemorySigner, config: &NearConfig) -> Self {
        Self {
            near,
            signer,
            token_id: config.usdc_contract.clone(),
            bridge_id: config.bridge_contract.clone(),
            recovery_delay: config.recovery_delay(),
        }
    }

    /// Submit and, on a timeout, recover through [`Self::recover`].
    /// `on_timeout` sees the locally computed hash before the recovery wait.
    pub async fn submit<F>(&self, amount: &str, request: &BridgeRequest, on_timeout: F) -> Result<SubmissionOutcome>
    where
        F: FnOnce(&str),
    {
        match self.send(amount, request).await {
            Err(BridgeError::SubmissionTimeout { tx_hash }) => {
                on_timeout(&tx_hash);
                self.recover(&tx_hash).await
            }
            other => other,
        }
    }

    /// Single submission attempt. Timeouts come back as
    /// `BridgeError::SubmissionTimeout` untouched.
    pub async fn send(&self, amount: &str, request: &BridgeRequest) -> Result<SubmissionOutcome> {
        let call = FunctionCall::ft_transfer_call(&self.token_id, &self.bridge_id, amount, request)?;
        info!(
            "Transferring {} units of {} to {} from {}",
            amount, self.token_id, self.bridge_id, self.signer.account_id
        );

        let outcome = self.near.function_call(&self.signer, &call).await?;
        check_outcome(&outcome)?;
        Ok(SubmissionOutcome {
            tx_hash: outcome.transaction_hash.clone(),
            recovered: false,
            outcome,
        })
    }

    /// Wait out the recovery delay, then look the transaction up by hash.
    pub async fn recover(&self, tx_hash: &str) -> Result<SubmissionOutcome> {
        warn!(
            "Submission of {} timed out, checking status in {:?}",
            tx_hash, self.recovery_delay
        );
        tokio::time::sleep(self.recovery_delay).await;

        let outcome = self.near.tx_status(tx_hash, &self.signer.account_id).await?;
        check_outcome(&outcome)?;
        info!("Recovered NEAR transaction {}", tx_hash);
        Ok(SubmissionOutcome {
            tx_hash: tx_hash.to_string(),
            recovered: true,
            outcome,
        })
    }
}

/// A transfer only counts when the bridge kept the tokens.
fn check_outcome(outcome: &ExecutionOutcome) -> Result<()> {
    match &outcome.status {
        ExecutionStatus::Failure(reason) => Err(BridgeError::Near(format!(
            "transaction {} failed: {}",
            outcome.transaction_hash, reason
        ))),
        ExecutionStatus::Pending => Err(BridgeError::Near(format!(
            "transaction {} has not completed",
            outcome.transaction_hash
        ))),
        _ if outcome.ft_used_amount() == Some(0) => Err(BridgeError::Near(format!(
            "transaction {} was refunded by the bridge contract",
            outcome.transaction_hash
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{signer, success_outcome, MockNear, RECIPIENT};
    use nearbridge_types::NetworkDetails;

    fn request() -> BridgeRequest {
        BridgeRequest {
            eth_address: RECIPIENT.into(),
            network_details: NetworkDetails {
                max_priority_fee_per_gas: 1_500_000_000,
                max_fee_per_gas: 13_500_000_000,
                gas_limit: 60_000,
                chain_id: 11155111,
                eth_nonce: 1,
            },
        }
    }

    fn submitter(near: Arc<MockNear>) -> NearSubmitter {
        let config = NearConfig {
            recovery_delay_ms: 10,
            ..NearConfig::default()
        };
        NearSubmitter::new(near, signer(), &config)
    }

    #[tokio::test]
    async fn test_submit_sends_ft_transfer_call() {
        let near = Arc::new(MockNear::new().with_submission(Ok(success_outcome("H1", "100000"))));
        let outcome = submitter(near.clone()).submit("100000", &request(), |_| {}).await.unwrap();
        assert_eq!(outcome.tx_hash, "H1");
        assert!(!outcome.recovered);

        let calls = near.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].receiver_id, NearConfig::default().usdc_contract);
        let args: serde_json::Value = serde_json::from_slice(&calls[0].args).unwrap();
        assert_eq!(args["receiver_id"], "simple-bridge.testnet");
        assert_eq!(args["amount"], "100000");
        assert_eq!(calls[0].deposit, 1);
    }

    #[tokio::test]
    async fn test_timeout_recovers_by_hash() {
        let near = Arc::new(
            MockNear::new()
                .with_submission(Err(BridgeError::SubmissionTimeout { tx_hash: "ABC123".into() }))
                .with_status(Ok(success_outcome("ABC123", "100000"))),
        );
        let mut timed_out = None;
        let outcome = submitter(near.clone())
            .submit("100000", &request(), |tx_hash| timed_out = Some(tx_hash.to_string()))
            .await
            .unwrap();
        assert_eq!(timed_out.as_deref(), Some("ABC123"));
        assert_eq!(outcome.tx_hash, "ABC123");
        assert!(outcome.recovered);
        assert_eq!(
            near.status_queries.lock().unwrap().as_slice(),
            [("ABC123".to_string(), "alice.testnet".to_string())]
        );
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_recovery() {
        let near = Arc::new(MockNear::new().with_submission(Err(BridgeError::Near("InvalidNonce".into()))));
        let err = submitter(near.clone()).submit("100000", &request(), |_| {}).await.unwrap_err();
        assert!(matches!(err, BridgeError::Near(ref m) if m == "InvalidNonce"));
        assert!(near.status_queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_or_refunded_transfer() {
        let failed = ExecutionOutcome {
            transaction_hash: "H2".into(),
            status: ExecutionStatus::Failure("ActionError".into()),
            logs: vec![],
        };
        let near = Arc::new(
            MockNear::new()
                .with_submission(Ok(failed))
                .with_submission(Ok(success_outcome("H3", "0"))),
        );
        let submitter = submitter(near);
        assert!(matches!(
            submitter.submit("100000", &request(), |_| {}).await,
            Err(BridgeError::Near(_))
        ));
        assert!(matches!(
            submitter.submit("100000", &request(), |_| {}).await,
            Err(BridgeError::Near(_))
        ));
    }

    #[tokio::test]
    async fn test_recovery_lookup_failure() {
        let near = Arc::new(
            MockNear::new().with_submission(Err(BridgeError::SubmissionTimeout { tx_hash: "XYZ".into() })),
        );
        let err = submitter(near).submit("100000", &request(), |_| {}).await.unwrap_err();
        assert!(matches!(err, BridgeError::Near(_)));
    }
}
