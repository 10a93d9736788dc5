//! Node and validator bounty metrics

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use crate::commands::{check_id, value_or_prompt, NO_DATA_MSG};
use crate::contracts::Skale;
use crate::errors::CliError;
use crate::format;
use crate::metrics::{self, parse_date, DateRange, ReportOptions};

pub const WAIT_MSG: &str = "Please wait - collecting metrics from blockchain...";

/// Arguments shared by the metrics and bounty reports
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Node or validator ID, asked for when omitted
    #[arg(long, short = 'i', visible_alias = "id", allow_negative_numbers = true)]
    pub index: Option<i64>,

    /// First day of the period, YYYY-MM-DD (inclusive)
    #[arg(long, short = 's', value_parser = parse_date)]
    pub since: Option<NaiveDate>,

    /// Last day of the period, YYYY-MM-DD (exclusive)
    #[arg(long, short = 't', value_parser = parse_date)]
    pub till: Option<NaiveDate>,

    /// Maximum number of rows to show
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Show amounts in wei
    #[arg(long, short = 'w')]
    pub wei: bool,
}

impl ReportArgs {
    pub fn options(&self) -> ReportOptions {
        ReportOptions {
            dates: DateRange::from_dates(self.since, self.till),
            limit: self.limit,
            ..Default::default()
        }
    }

    pub fn id(&self, kind: &'static str, prompt: &str) -> Result<u64> {
        let index = value_or_prompt(self.index, prompt)?;
        check_id(kind, index)
    }
}

#[derive(Subcommand, Debug)]
pub enum MetricsCommands {
    /// List of bounties and metrics for a node
    Node {
        #[command(flatten)]
        report: ReportArgs,
    },

    /// List of bounties and metrics for all nodes of a validator
    Validator {
        #[command(flatten)]
        report: ReportArgs,

        /// Export the rows to a CSV file
        #[arg(long, short = 'f')]
        to_file: Option<PathBuf>,
    },
}

pub async fn execute(cmd: MetricsCommands) -> Result<()> {
    match cmd {
        MetricsCommands::Node { report } => node(&report).await,
        MetricsCommands::Validator { report, to_file } => validator(&report, to_file).await,
    }
}

async fn node(args: &ReportArgs) -> Result<()> {
    let node_id = args.id("Node", "Please enter node ID")?;
    let skale = Skale::from_config().await?;
    skale.ensure_node(node_id).await?;

    println!("{}", WAIT_MSG.yellow());
    tracing::info!("Collecting metrics for node {}", node_id);
    let metrics = metrics::node_metrics(&skale, node_id, &args.options()).await?;

    if metrics.rows.is_empty() {
        println!("{}", NO_DATA_MSG);
        return Ok(());
    }
    println!("{}", format::node_metrics_table(&metrics, args.wei));
    println!("\n{}", format::total_bounty_line(metrics.total_bounty, args.wei));
    Ok(())
}

async fn validator(args: &ReportArgs, to_file: Option<PathBuf>) -> Result<()> {
    let validator_id = args.id("Validator", "Please enter validator ID")?;
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let node_ids = skale.validator_node_ids(validator_id).await?;
    if node_ids.is_empty() {
        return Err(CliError::NoNodes.into());
    }

    println!("{}", WAIT_MSG.yellow());
    tracing::info!(
        "Collecting metrics for validator {} nodes {:?}",
        validator_id,
        node_ids
    );
    let metrics = metrics::validator_metrics(&skale, &node_ids, &args.options()).await?;

    if metrics.rows.is_empty() {
        println!("{}", NO_DATA_MSG);
        return Ok(());
    }
    println!("{}", format::validator_metrics_table(&metrics, args.wei));
    println!("\n{}", format::total_bounty_line(metrics.total_bounty, args.wei));
    println!("\n{}", format::node_totals_table(&metrics, args.wei));

    if let Some(path) = to_file {
        format::write_validator_metrics_csv(&path, &metrics, args.wei)?;
        println!("{}", format!("✔ Metrics saved to {}", path.display()).green());
    }
    Ok(())
}
