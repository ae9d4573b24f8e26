use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nearbridge_near::InMemorySigner;
use nearbridge_ops::{
    BalanceReader, BridgeConfig, BridgeRequestBuilder, ConfirmationHandle, Correlation, NearNetwork, Providers,
    TransferEvent, TransferEventHandler, TransferFlow, TransferState,
};
use nearbridge_types::normalize_eth_address;

/// Move USDC from a NEAR account to an Ethereum address.
#[derive(Parser, Debug)]
#[command(name = "nearbridge", version)]
struct Cli {
    /// TOML configuration file. Defaults target NEAR testnet and Sepolia.
    #[arg(long, short, global = true, env = "NEARBRIDGE_CONFIG")]
    config: Option<PathBuf>,
    /// Override the NEAR network from the configuration.
    #[arg(long, global = true)]
    network: Option<NearNetwork>,
    /// Used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer USDC and relay the resulting Ethereum transaction.
    Bridge {
        /// Amount in USDC, e.g. "10" or "0.5".
        #[arg(long)]
        amount: String,
        #[arg(long)]
        recipient: String,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Relay the bridge contract's latest signed transaction.
    Relay {
        /// Check the relayed transaction against a transfer to this address.
        #[arg(long)]
        recipient: Option<String>,
    },
    /// Print the bridge request that would be sent, without sending it.
    Request {
        #[arg(long)]
        recipient: String,
    },
    /// Show USDC balances on both chains.
    Balances {
        #[arg(long, env = "NEAR_ACCOUNT_ID")]
        account_id: Option<String>,
        #[arg(long)]
        eth_address: Option<String>,
    },
}

#[derive(Args, Debug)]
struct SignerArgs {
    #[arg(long, env = "NEAR_ACCOUNT_ID")]
    account_id: Option<String>,
    /// `ed25519:<base58>` secret key.
    #[arg(long, env = "NEAR_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

impl SignerArgs {
    fn into_signer(self, config: &BridgeConfig) -> Result<InMemorySigner> {
        let account_id = self
            .account_id
            .or_else(|| config.near.account_id.clone())
            .ok_or_else(|| anyhow!("no NEAR account: pass --account-id or set NEAR_ACCOUNT_ID"))?;
        let private_key = self
            .private_key
            .ok_or_else(|| anyhow!("no NEAR key: pass --private-key or set NEAR_PRIVATE_KEY"))?;
        InMemorySigner::from_secret_key(&account_id, &private_key)
            .with_context(|| format!("invalid key for {}", account_id))
    }
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    if let Some(network) = cli.network {
        config.near.network = network;
    }
    Ok(config)
}

fn event_printer(config: &BridgeConfig) -> TransferEventHandler {
    let near = config.near.clone();
    let eth = config.eth.clone();
    Box::new(move |event| match event {
        TransferEvent::RequestBuilt { request } => {
            info!("Bridge request: {:?}", request.network_details)
        }
        TransferEvent::NearSubmitted { tx_hash } => {
            println!("NEAR transaction: {}", near.explorer_tx_url(&tx_hash))
        }
        TransferEvent::NearSubmissionTimedOut { tx_hash } => {
            println!("NEAR RPC timed out, checking {} again shortly", tx_hash)
        }
        TransferEvent::NearRecovered { tx_hash } => println!("Found NEAR transaction {}", tx_hash),
        TransferEvent::SignedTxFetched {
            correlation: Some(Correlation::Mismatch { .. }),
            ..
        } => println!("Warning: the signed transaction may not belong to this transfer"),
        TransferEvent::SignedTxFetched { .. } => {}
        TransferEvent::Broadcast { tx_hash } => {
            println!("Ethereum transaction: {}", eth.explorer_tx_url(&tx_hash))
        }
        TransferEvent::Confirmed { receipt } => println!("Confirmed in block {}", receipt.block_number),
        TransferEvent::ConfirmationFailed { message, .. } => println!("Not confirmed: {}", message),
    })
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run a stage that ends with the Ethereum broadcast. An interrupt drops the
/// stage, so nothing further is submitted or relayed.
async fn until_broadcast<T>(
    stage: impl Future<Output = nearbridge_types::Result<T>>,
    interrupt: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = interrupt => Err(anyhow!("interrupted before the Ethereum broadcast")),
        result = stage => Ok(result?),
    }
}

/// Wait for the relayed transaction. An interrupt cancels the wait only; the
/// transaction itself stays in flight.
async fn until_confirmed(
    flow: &TransferFlow,
    state: &mut TransferState,
    handle: ConfirmationHandle,
    interrupt: impl Future<Output = ()>,
) -> Result<()> {
    let cancel = handle.cancellation_token();
    let confirmation = flow.confirm(state, handle);
    tokio::pin!(confirmation);
    tokio::select! {
        result = &mut confirmation => {
            result?;
        }
        _ = interrupt => {
            warn!("Interrupted, no longer waiting for confirmation");
            cancel.cancel();
            confirmation.await?;
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let providers = Providers::from_config(&config)?;

    match cli.command {
        Command::Bridge {
            amount,
            recipient,
            signer,
        } => {
            let signer = signer.into_signer(&config)?;
            let flow = TransferFlow::new(&config, &providers, Some(signer), Some(event_printer(&config)));

            let mut state = TransferState::new(&amount, &recipient);
            let handle = until_broadcast(flow.run(&mut state), ctrl_c())
                .await
                .context("bridge transfer failed")?;
            until_confirmed(&flow, &mut state, handle, ctrl_c())
                .await
                .context("bridge transfer failed")?;
            println!("Bridged {} USDC to 0x{}", state.amount, recipient.trim_start_matches("0x"));
        }
        Command::Relay { recipient } => {
            let flow = TransferFlow::new(&config, &providers, None, Some(event_printer(&config)));
            let mut state = TransferState {
                recipient: recipient.clone().unwrap_or_default(),
                ..Default::default()
            };

            let relay = async {
                let request = match &recipient {
                    Some(recipient) => Some(flow.builder().build(&normalize_eth_address(recipient)?).await?),
                    None => None,
                };
                flow.complete(&mut state, request.as_ref()).await
            };
            let handle = until_broadcast(relay, ctrl_c()).await.context("relay failed")?;
            until_confirmed(&flow, &mut state, handle, ctrl_c())
                .await
                .context("relay failed")?;
        }
        Command::Request { recipient } => {
            let recipient = normalize_eth_address(&recipient)?;
            let request = BridgeRequestBuilder::new(providers.eth.clone(), &config.eth)
                .build(&recipient)
                .await?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Command::Balances {
            account_id,
            eth_address,
        } => {
            let account_id = account_id.or_else(|| config.near.account_id.clone());
            let balances = BalanceReader::new(providers.near.clone(), providers.eth.clone(), &config)
                .fetch(account_id.as_deref(), eth_address.as_deref())
                .await?;
            println!("{}", balances);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
