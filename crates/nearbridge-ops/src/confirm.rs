//! Waiting for a relayed transaction to land in a block.
//!
//! The wait runs on its own task; the returned handle can cancel it
//! (e.g. on Ctrl-C) while the caller awaits the result elsewhere.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nearbridge_eth::{EthRpc, TransactionReceipt};
use nearbridge_types::{BridgeError, Hex, Result};

use crate::config::EthConfig;

pub struct ConfirmationWatcher {
    eth: Arc<dyn EthRpc>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ConfirmationWatcher {
    pub fn new(eth: Arc<dyn EthRpc>, config: &EthConfig) -> Self {
        Self {
            eth,
            poll_interval: config.poll_interval(),
            timeout: config.confirmation_timeout(),
        }
    }

    pub fn spawn(&self, tx_hash: Hex) -> ConfirmationHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(wait_for_receipt(
            self.eth.clone(),
            tx_hash.clone(),
            self.poll_interval,
            self.timeout,
            cancel.clone(),
        ));
        ConfirmationHandle { tx_hash, cancel, task }
    }
}

/// Handle to a running confirmation wait.
#[derive(Debug)]
pub struct ConfirmationHandle {
    tx_hash: Hex,
    cancel: CancellationToken,
    task: JoinHandle<Result<TransactionReceipt>>,
}

impl ConfirmationHandle {
    pub fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancels this wait from elsewhere once the handle has been moved.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<TransactionReceipt> {
        self.task
            .await
            .map_err(|e| BridgeError::Other(format!("confirmation task failed: {}", e)))?
    }
}

async fn wait_for_receipt(
    eth: Arc<dyn EthRpc>,
    tx_hash: Hex,
    poll_interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<TransactionReceipt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Stopped waiting for {}", tx_hash);
            Err(BridgeError::Cancelled)
        }
        result = tokio::time::timeout(timeout, poll_receipt(eth.as_ref(), &tx_hash, poll_interval)) => {
            let receipt = result.map_err(|_| {
                BridgeError::Confirmation(format!("{} not mined after {:?}", tx_hash, timeout))
            })?;
            if !receipt.succeeded() {
                return Err(BridgeError::Confirmation(format!(
                    "{} reverted in block {}",
                    tx_hash, receipt.block_number
                )));
            }
            info!("Transaction {} confirmed in block {}", tx_hash, receipt.block_number);
            Ok(receipt)
        }
    }
}

/// Poll until a receipt shows up. Lookup errors are retried.
async fn poll_receipt(eth: &dyn EthRpc, tx_hash: &str, poll_interval: Duration) -> TransactionReceipt {
    loop {
        match eth.get_transaction_receipt(tx_hash).await {
            Ok(Some(receipt)) => return receipt,
            Ok(None) => debug!(tx_hash, "receipt not available yet"),
            Err(e) => warn!("Receipt lookup for {} failed: {}", tx_hash, e),
        }
        tokio::time::sleep(poll_interval).await;
    }
}
