use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use crate::commands::metrics::{ReportArgs, WAIT_MSG};
use crate::commands::NO_DATA_MSG;
use crate::contracts::Skale;
use crate::errors::CliError;
use crate::format;
use crate::metrics;

#[derive(Subcommand, Debug)]
pub enum BountyCommands {
    /// Monthly bounty per node for a validator. `--limit` caps the number of months.
    Validator {
        #[command(flatten)]
        report: ReportArgs,
    },
}

pub async fn execute(cmd: BountyCommands) -> Result<()> {
    match cmd {
        BountyCommands::Validator { report } => validator(&report).await,
    }
}

async fn validator(args: &ReportArgs) -> Result<()> {
    let validator_id = args.id("Validator", "Please enter validator ID")?;
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let node_ids = skale.validator_node_ids(validator_id).await?;
    if node_ids.is_empty() {
        return Err(CliError::NoNodes.into());
    }

    println!("{}", WAIT_MSG.yellow());
    tracing::info!("Collecting bounty for validator {}", validator_id);
    let report = metrics::bounty_report(&skale, &node_ids, &args.options()).await?;

    if report.is_empty() {
        println!("{}", NO_DATA_MSG);
        return Ok(());
    }
    println!("{}", format::bounty_table(&report, args.wei));
    Ok(())
}
