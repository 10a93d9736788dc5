use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use sk_val::commands::{
    bounty::BountyCommands, holder::HolderCommands, metrics::MetricsCommands,
    srw::SrwCommands, validator::ValidatorCommands, wallet::WalletCommands,
};
use sk_val::config::{self, parse_url, WalletType};
use sk_val::errors::{exit_code_for, CliError, ExitCode};
use sk_val::{commands, logs};

#[derive(Parser)]
#[command(name = "sk-val")]
#[command(version)]
#[command(about = "SKALE validator CLI - manage validators, delegations and bounties", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the CLI with an endpoint and contracts file
    Init {
        /// Ethereum node endpoint
        #[arg(long, short = 'e', value_parser = parse_url)]
        endpoint: String,

        /// URL of the contracts file with the deployed addresses
        #[arg(long, short = 'c', value_parser = parse_url)]
        contracts_url: String,

        /// Wallet used to sign transactions
        #[arg(long, short = 'w', value_enum, default_value_t = WalletType::Software)]
        wallet: WalletType,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Validator commands
    Validator {
        #[command(subcommand)]
        action: ValidatorCommands,
    },

    /// Token holder commands
    Holder {
        #[command(subcommand)]
        action: HolderCommands,
    },

    /// Self-recharging wallet commands
    Srw {
        #[command(subcommand)]
        action: SrwCommands,
    },

    /// Wallet commands
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Node and validator metrics
    Metrics {
        #[command(subcommand)]
        action: MetricsCommands,
    },

    /// Monthly bounty reports
    Bounty {
        #[command(subcommand)]
        action: BountyCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init {
            endpoint,
            contracts_url,
            wallet,
        } => config::init(&endpoint, &contracts_url, wallet).await,
        Commands::Config { action } => match action {
            ConfigCommands::Show => config::show(),
        },
        Commands::Validator { action } => commands::validator::execute(action).await,
        Commands::Holder { action } => commands::holder::execute(action).await,
        Commands::Srw { action } => commands::srw::execute(action).await,
        Commands::Wallet { action } => commands::wallet::execute(action).await,
        Commands::Metrics { action } => commands::metrics::execute(action).await,
        Commands::Bounty { action } => commands::bounty::execute(action).await,
    }
}

/// Message printed to stderr when a command fails
fn failure_message(err: &anyhow::Error) -> String {
    if is_aborted(err) {
        return "Aborted!".to_string();
    }
    if exit_code_for(err) == ExitCode::RevertError {
        format!("Reverted: {}. Recheck your inputs", err)
    } else {
        format!("Command execution failed with {}. Recheck your inputs", err)
    }
}

fn is_aborted(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CliError>(), Some(CliError::Aborted))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_path = match logs::init() {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("{}", format!("Failed to set up logging: {:#}", e).yellow());
            None
        }
    };

    if let Err(err) = run(cli).await {
        let code = exit_code_for(&err);
        if is_aborted(&err) {
            tracing::info!("Command aborted by user");
            eprintln!("{}", failure_message(&err));
            std::process::exit(code.code());
        }

        tracing::error!("Command failed: {:?}", err);
        eprintln!("{}", failure_message(&err).red());
        if let Some(path) = log_path {
            eprintln!("Please check logs: {}", path.display());
        }
        std::process::exit(code.code());
    }
}
