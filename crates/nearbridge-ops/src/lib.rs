//! Bridge operations: moving USDC from NEAR to Ethereum.
//!
//! Coordinates the NEAR and Ethereum clients through four components:
//! - [`BridgeRequestBuilder`]: fee and nonce parameters for the bridge contract
//! - [`NearSubmitter`]: `ft_transfer_call` with timeout recovery
//! - [`Relayer`]: broadcast of the contract's signed transaction
//! - [`ConfirmationWatcher`]: cancellable wait for inclusion

pub mod balance;
pub mod config;
pub mod confirm;
pub mod flow;
pub mod providers;
pub mod relay;
pub mod request;
pub mod submit;

#[cfg(test)]
mod mock;

pub use balance::{BalanceReader, Balances};
pub use config::{BridgeConfig, EthConfig, NearConfig, NearNetwork};
pub use confirm::{ConfirmationHandle, ConfirmationWatcher};
pub use flow::{TransferEvent, TransferEventHandler, TransferFlow, TransferState};
pub use providers::Providers;
pub use relay::{correlate, Correlation, RelayOutcome, Relayer};
pub use request::BridgeRequestBuilder;
pub use submit::{NearSubmitter, SubmissionOutcome};
