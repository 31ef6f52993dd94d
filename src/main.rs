use anyhow::{format_err, Result};
use clap::{Parser, Subcommand};
use pointforge::orchestration::SchedulerConfig;
use pointforge::{config::Config, Decimal, Ledger, RpcLedger, Session, SystemClock};
use solana_sdk::signature::{Keypair, Signer};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "pointforge", about = "Track and manage a staking points position")]
pub struct Opts {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the position, printing every display update as JSON
    Watch,
    /// Refresh once and print the position
    Show,
    /// Create the staking account
    Create,
    Stake {
        /// Amount in SOL
        #[arg(long)]
        amount: Decimal,
    },
    Unstake {
        /// Amount in SOL
        #[arg(long)]
        amount: Decimal,
    },
    Claim,
}

fn read_keypair_file(path: &str) -> Result<Keypair> {
    solana_sdk::signature::read_keypair_file(path)
        .map_err(|_| format_err!("failed to read keypair from {}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let opts = Opts::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let signer = read_keypair_file(&config.keypair_path)?;
    let owner = signer.pubkey();
    let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(
        config.rpc_url.clone(),
        config.program_id,
        signer,
        config.commitment,
    ));

    let mut session = Session::new(
        ledger,
        owner,
        config.program_id,
        Arc::new(SystemClock),
        SchedulerConfig::from(&config),
    );

    let result = match opts.command {
        Command::Watch => {
            session.start();
            watch(&session).await
        }
        command => run_once(&session, command).await,
    };

    session.stop().await;
    result
}

async fn watch(session: &Session) -> Result<()> {
    let mut display = session.display();
    let mut notifications = session.notifications();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = display.borrow_and_update().clone();
                println!("{}", serde_json::to_string(&state)?);
            }
            Ok(notification) = notifications.recv() => {
                println!("{}", serde_json::to_string(&notification)?);
            }
        }
    }
    Ok(())
}

async fn run_once(session: &Session, command: Command) -> Result<()> {
    let outcome = session.refresh_now().await;
    tracing::debug!(?outcome, "initial refresh");

    let orchestrator = session.orchestrator();
    let receipt = match command {
        Command::Show | Command::Watch => None,
        Command::Create => Some(orchestrator.create_position().await?),
        Command::Stake { amount } => Some(orchestrator.increase_stake(amount).await?),
        Command::Unstake { amount } => Some(orchestrator.decrease_stake(amount).await?),
        Command::Claim => Some(orchestrator.claim().await?),
    };

    if let Some(receipt) = receipt {
        println!("{}", receipt.signature);
    }
    println!("{}", serde_json::to_string_pretty(&session.read())?);
    Ok(())
}
