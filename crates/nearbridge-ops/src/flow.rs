//! End-to-end transfer: build request, submit on NEAR, relay, confirm.
//!
//! [`TransferFlow::run`] and [`TransferFlow::complete`] stop once the signed
//! transaction is on Ethereum and hand back the [`ConfirmationHandle`];
//! [`TransferFlow::confirm`] waits on it.

use tracing::info;

use nearbridge_eth::TransactionReceipt;
use nearbridge_near::InMemorySigner;
use nearbridge_types::{normalize_eth_address, parse_usdc_amount, BridgeError, BridgeRequest, Hex, Result};

use crate::config::BridgeConfig;
use crate::confirm::{ConfirmationHandle, ConfirmationWatcher};
use crate::relay::{Correlation, Relayer};
use crate::request::BridgeRequestBuilder;
use crate::submit::NearSubmitter;
use crate::Providers;

/// Progress of a single transfer. Lives only for the duration of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferState {
    /// Amount as entered, e.g. "10.5".
    pub amount: String,
    pub recipient: String,
    pub near_tx_hash: Option<String>,
    pub eth_tx_hash: Option<Hex>,
    pub confirmed: bool,
    pub error: Option<String>,
}

impl TransferState {
    pub fn new(amount: &str, recipient: &str) -> Self {
        Self {
            amount: amount.to_string(),
            recipient: recipient.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub enum TransferEvent {
    RequestBuilt { request: BridgeRequest },
    NearSubmitted { tx_hash: String },
    NearSubmissionTimedOut { tx_hash: String },
    NearRecovered { tx_hash: String },
    SignedTxFetched { raw_tx: Hex, correlation: Option<Correlation> },
    Broadcast { tx_hash: Hex },
    Confirmed { receipt: TransactionReceipt },
    ConfirmationFailed { tx_hash: Hex, message: String },
}

/// Callback type for transfer events.
pub type TransferEventHandler = Box<dyn Fn(TransferEvent) + Send + Sync>;

pub struct TransferFlow {
    builder: BridgeRequestBuilder,
    submitter: Option<NearSubmitter>,
    relayer: Relayer,
    watcher: ConfirmationWatcher,
    on_event: Option<TransferEventHandler>,
}

impl TransferFlow {
    /// Without a signer only [`Self::complete`] and [`Self::confirm`] are available.
    pub fn new(
        config: &BridgeConfig,
        providers: &Providers,
        signer: Option<InMemorySigner>,
        on_event: Option<TransferEventHandler>,
    ) -> Self {
        Self {
            builder: BridgeRequestBuilder::new(providers.eth.clone(), &config.eth),
            submitter: signer.map(|signer| NearSubmitter::new(providers.near.clone(), signer, &config.near)),
            relayer: Relayer::new(
                providers.near.clone(),
                providers.eth.clone(),
                &config.near.bridge_contract,
            ),
            watcher: ConfirmationWatcher::new(providers.eth.clone(), &config.eth),
            on_event,
        }
    }

    pub fn builder(&self) -> &BridgeRequestBuilder {
        &self.builder
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(ref handler) = self.on_event {
            handler(event);
        }
    }

    /// Submit the transfer described by `state` and relay the result,
    /// recording progress in it. Returns once the Ethereum broadcast is done.
    pub async fn run(&self, state: &mut TransferState) -> Result<ConfirmationHandle> {
        let result = self.transfer(state).await;
        record(state, result)
    }

    /// Relay without a preceding submission, e.g. when the NEAR transaction
    /// was approved elsewhere.
    pub async fn complete(
        &self,
        state: &mut TransferState,
        request: Option<&BridgeRequest>,
    ) -> Result<ConfirmationHandle> {
        let result = self.relay(state, request).await;
        record(state, result)
    }

    /// Wait for the relayed transaction to be mined.
    pub async fn confirm(&self, state: &mut TransferState, handle: ConfirmationHandle) -> Result<TransactionReceipt> {
        let tx_hash = handle.tx_hash().to_string();
        let result = handle.wait().await;
        match &result {
            Ok(receipt) => {
                state.confirmed = true;
                self.emit(TransferEvent::Confirmed {
                    receipt: receipt.clone(),
                });
            }
            Err(e) => self.emit(TransferEvent::ConfirmationFailed {
                tx_hash,
                message: e.to_string(),
            }),
        }
        record(state, result)
    }

    async fn transfer(&self, state: &mut TransferState) -> Result<ConfirmationHandle> {
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| BridgeError::Config("no NEAR signer configured".into()))?;
        let units = parse_usdc_amount(&state.amount)?;
        let recipient = normalize_eth_address(&state.recipient)?;

        let request = self.builder.build(&recipient).await?;
        self.emit(TransferEvent::RequestBuilt {
            request: request.clone(),
        });

        let submission = submitter
            .submit(&units, &request, |tx_hash| {
                state.near_tx_hash = Some(tx_hash.to_string());
                self.emit(TransferEvent::NearSubmissionTimedOut {
                    tx_hash: tx_hash.to_string(),
                });
            })
            .await?;
        if submission.recovered {
            self.emit(TransferEvent::NearRecovered {
                tx_hash: submission.tx_hash.clone(),
            });
        }
        info!("NEAR transaction {} succeeded", submission.tx_hash);
        state.near_tx_hash = Some(submission.tx_hash.clone());
        self.emit(TransferEvent::NearSubmitted {
            tx_hash: submission.tx_hash,
        });

        self.relay(state, Some(&request)).await
    }

    async fn relay(&self, state: &mut TransferState, request: Option<&BridgeRequest>) -> Result<ConfirmationHandle> {
        let relayed = self.relayer.relay(request).await?;
        self.emit(TransferEvent::SignedTxFetched {
            raw_tx: relayed.raw_tx,
            correlation: relayed.correlation,
        });
        state.eth_tx_hash = Some(relayed.eth_tx_hash.clone());
        self.emit(TransferEvent::Broadcast {
            tx_hash: relayed.eth_tx_hash.clone(),
        });
        Ok(self.watcher.spawn(relayed.eth_tx_hash))
    }
}

fn record<T>(state: &mut TransferState, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        state.error = Some(e.to_string());
    }
    result
}
