//! candy-mint: terminal front-end for the candy machine mint controller
//!
//! Loads configuration and a keypair wallet, then either runs an
//! interactive session (`run`), prints the sale state once (`state`), or
//! performs a single mint attempt (`mint`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use candy_mint::alert::AlertChannel;
use candy_mint::config::Config;
use candy_mint::confirm::ConfirmationPoller;
use candy_mint::gate::GatewayTokenGate;
use candy_mint::ledger::{RpcLedger, SignatureNotifier};
use candy_mint::metrics::metrics;
use candy_mint::orchestrator::Rejection;
use candy_mint::sale_state::{CandyMachineReader, SaleStateSource};
use candy_mint::submit::RpcMintSubmitter;
use candy_mint::types::MintButtonState;
use candy_mint::wallet::{load_keypair, KeypairWallet, WalletProvider};
use candy_mint::{
    AlertState, MintOrchestrator, MintOutcome, OrchestratorConfig, OrchestratorEvent, SaleState, Severity,
    TriggerResult, View,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Interactive session reading actions from stdin (default)
    Run,
    /// Print the current sale state and exit
    State,
    /// Mint once and exit; the exit status reflects the outcome
    Mint,
}

struct App {
    orchestrator: Arc<MintOrchestrator>,
    wallet: KeypairWallet,
    reader: Arc<CandyMachineReader>,
    keypair_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("Starting candy-mint v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from: {}", args.config);
    let config = load_config(&args.config)?;
    config.validate().context("Invalid configuration")?;

    let app = build_app(&config)?;

    let result = match args.command.unwrap_or(Command::Run) {
        Command::Run => run_interactive(&app).await,
        Command::State => print_state(&app).await,
        Command::Mint => mint_once(&app).await,
    };

    if config.monitoring.enable_metrics {
        match metrics().render() {
            Ok(text) => println!("\n{}", text),
            Err(e) => warn!(error = %e, "Failed to render metrics"),
        }
    }

    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        "candy_mint=debug,info"
    } else {
        "candy_mint=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        let mut config = Config::default();
        dotenvy::dotenv().ok();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn build_app(config: &Config) -> Result<App> {
    let sale_id = config
        .candy_machine_id()?
        .context("sale.candy_machine_id is not configured (or set CANDY_MINT_CANDY_MACHINE_ID)")?;
    let commitment = config.commitment()?;
    let candy_machine_program = config.candy_machine_program()?;
    let gateway_program = config.gateway_program()?;

    info!(rpc = %config.rpc.url, commitment = ?commitment.commitment, "Connecting to ledger");
    let ledger = Arc::new(RpcLedger::new(
        config.rpc.url.clone(),
        config.rpc_timeout(),
        commitment,
        config.sale.skip_preflight,
    ));

    #[cfg(feature = "ws-stream")]
    let notifier: Option<Arc<dyn SignatureNotifier>> = Some(Arc::new(
        candy_mint::ledger::WsSignatureNotifier::new(config.ws_url()),
    ));
    #[cfg(not(feature = "ws-stream"))]
    let notifier: Option<Arc<dyn SignatureNotifier>> = None;

    let wallet = match KeypairWallet::from_file(&config.wallet.keypair_path) {
        Ok(wallet) => wallet,
        Err(e) => {
            warn!(error = %e, "Wallet not loaded, starting disconnected");
            KeypairWallet::disconnected()
        }
    };
    if let Some(pubkey) = wallet.public_key() {
        info!("Wallet address: {}", pubkey);
    }

    let reader = Arc::new(CandyMachineReader::new(ledger.clone(), candy_machine_program));
    let orchestrator = Arc::new(MintOrchestrator::new(
        Arc::new(wallet.clone()),
        reader.clone(),
        Arc::new(GatewayTokenGate::new(ledger.clone(), gateway_program)),
        Arc::new(RpcMintSubmitter::new(ledger.clone(), candy_machine_program, gateway_program)),
        ConfirmationPoller::new(ledger, notifier, config.poll_interval()),
        AlertChannel::new(config.alert_duration()),
        OrchestratorConfig {
            tx_timeout: config.tx_timeout(),
            commitment,
            display_duration: config.alert_duration(),
        },
    )
    .with_sale(sale_id));

    Ok(App {
        orchestrator,
        wallet,
        reader,
        keypair_path: config.wallet.keypair_path.clone(),
    })
}

async fn print_state(app: &App) -> Result<()> {
    let sale_id = app
        .orchestrator
        .sale_id()
        .context("no candy machine configured")?;
    let state = app
        .reader
        .fetch(&sale_id, &app.wallet)
        .await
        .context("Failed to fetch sale state")?;
    print_sale(&state);
    Ok(())
}

async fn mint_once(app: &App) -> Result<()> {
    let orchestrator = &app.orchestrator;
    orchestrator.handle_event(OrchestratorEvent::Mounted).await;
    render_view(&orchestrator.view());

    match orchestrator.mint().await {
        TriggerResult::Completed {
            outcome: MintOutcome::Success { signature },
            ..
        } => {
            println!("{} ({})", candy_mint::classify::SUCCESS_MESSAGE, signature);
            Ok(())
        }
        TriggerResult::Completed {
            outcome: MintOutcome::Failure { message, .. },
            ..
        } => anyhow::bail!(message),
        TriggerResult::GateWithheld => anyhow::bail!("identity verification required before minting"),
        TriggerResult::Rejected(reason) => anyhow::bail!("mint not started: {}", reason),
    }
}

async fn run_interactive(app: &App) -> Result<()> {
    let orchestrator = &app.orchestrator;
    orchestrator.handle_event(OrchestratorEvent::Mounted).await;
    render_view(&orchestrator.view());
    println!("commands: mint | refresh | dismiss | connect | disconnect | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut alerts = orchestrator.alerts().subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "" => continue,
                    "mint" => {
                        // detached; alerts and ctrl-c keep being served
                        let orchestrator = Arc::clone(orchestrator);
                        tokio::spawn(async move {
                            if let Some(TriggerResult::Rejected(reason)) =
                                orchestrator.handle_event(OrchestratorEvent::MintRequested).await
                            {
                                if reason != Rejection::AttemptInFlight {
                                    println!("mint unavailable: {}", reason);
                                }
                            }
                            render_view(&orchestrator.view());
                        });
                        tokio::task::yield_now().await;
                    }
                    "refresh" => {
                        orchestrator.handle_event(OrchestratorEvent::WalletChanged).await;
                    }
                    "dismiss" => {
                        orchestrator.handle_event(OrchestratorEvent::AlertDismissed).await;
                    }
                    "connect" => match load_keypair(&app.keypair_path) {
                        Ok(keypair) => {
                            app.wallet.connect(keypair);
                            orchestrator.handle_event(OrchestratorEvent::WalletChanged).await;
                        }
                        Err(e) => println!("connect failed: {:#}", e),
                    },
                    "disconnect" => {
                        app.wallet.disconnect();
                        orchestrator.handle_event(OrchestratorEvent::WalletChanged).await;
                    }
                    "quit" | "exit" => break,
                    other => {
                        println!("unknown command '{}'", other);
                        continue;
                    }
                }
                render_view(&orchestrator.view());
            }
            changed = alerts.changed() => {
                if changed.is_err() {
                    break;
                }
                let alert = alerts.borrow_and_update().clone();
                render_alert(&alert);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

fn render_view(view: &View) {
    match view {
        View::ConnectWallet => println!("[ Connect Wallet ]"),
        View::MintPanel { sale, button, gated } => {
            if let Some(sale) = sale {
                print_sale(sale);
            }
            let label = match button {
                MintButtonState::SoldOut => "SOLD OUT",
                MintButtonState::Minting => "MINTING...",
                MintButtonState::Mint => "MINT",
                MintButtonState::Unavailable => "MINT (unavailable)",
            };
            if *gated {
                println!("[ {} ] (identity verification required)", label);
            } else {
                println!("[ {} ]", label);
            }
        }
    }
}

fn render_alert(alert: &AlertState) {
    if !alert.visible {
        return;
    }
    let tag = match alert.severity {
        Severity::Success => "OK",
        Severity::Error => "ERROR",
        Severity::Warning => "WARN",
        Severity::Info | Severity::None => "INFO",
    };
    println!("({}) {}", tag, alert.message);
}

fn print_sale(sale: &SaleState) {
    println!("Candy machine: {}", sale.id);
    println!(
        "  Items: {} available / {} redeemed / {} remaining",
        sale.items_available, sale.items_redeemed, sale.items_remaining
    );
    match sale.token_mint {
        Some(mint) => println!("  Price: {} (token {})", sale.price, mint),
        None => println!(
            "  Price: {} SOL",
            sale.price as f64 / solana_sdk::native_token::LAMPORTS_PER_SOL as f64
        ),
    }
    if let Some(date) = sale.go_live_date {
        println!("  Go live: {}", date.to_rfc3339());
    }
    println!("  Active: {}  Sold out: {}", sale.is_active, sale.is_sold_out);
    if let Some(gatekeeper) = &sale.gatekeeper {
        println!("  Gatekeeper network: {}", gatekeeper.network);
    }
}
