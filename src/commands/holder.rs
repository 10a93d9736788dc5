//! Token holder commands

use alloy::primitives::{Address, U256};
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use crate::commands::{check_id, value_or_prompt};
use crate::contracts::Skale;
use crate::format;
use crate::transaction::{confirm, resolve_fee, send_call, TxOpts};
use crate::units::{amount_unit, format_amount, from_wei, to_wei};
use crate::wallet::{connect, parse_address};

pub const DELEGATION_PERIOD_OPTIONS: [&str; 4] = ["3", "6", "9", "12"];

#[derive(Subcommand, Debug)]
pub enum HolderCommands {
    /// Delegate tokens to validator
    Delegate {
        /// ID of the validator to delegate
        #[arg(long, allow_negative_numbers = true)]
        validator_id: Option<i64>,

        /// Amount of SKL tokens to delegate
        #[arg(long)]
        amount: Option<String>,

        /// Delegation period (in months)
        #[arg(long, value_parser = DELEGATION_PERIOD_OPTIONS)]
        delegation_period: Option<String>,

        /// Delegation request info
        #[arg(long)]
        info: Option<String>,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// List of delegations for address
    Delegations {
        #[arg(value_parser = parse_address)]
        address: Address,

        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// Cancel pending delegation request
    CancelDelegation {
        #[arg(allow_negative_numbers = true)]
        delegation_id: i64,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Request undelegation in the end of delegation period
    Undelegate {
        #[arg(allow_negative_numbers = true)]
        delegation_id: i64,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Show locked amount of tokens for address
    Locked {
        #[arg(value_parser = parse_address)]
        address: Address,

        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// Withdraw earned bounty to specified address
    WithdrawBounty {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[arg(value_parser = parse_address)]
        recipient_address: Address,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Earned bounties for the holder address and validator ID
    EarnedBounties {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[arg(value_parser = parse_address)]
        address: Address,

        #[arg(long, short = 'w')]
        wei: bool,
    },
}

pub async fn execute(cmd: HolderCommands) -> Result<()> {
    match cmd {
        HolderCommands::Delegate {
            validator_id,
            amount,
            delegation_period,
            info,
            tx,
            yes,
        } => {
            let validator_id = value_or_prompt(validator_id, "Please enter ID of the validator to delegate")?;
            let validator_id = check_id("Validator", validator_id)?;
            let amount = value_or_prompt(amount, "Please enter amount of SKL tokens to delegate")?;
            let period = match delegation_period {
                Some(period) => period,
                None => {
                    let entered: String = value_or_prompt(
                        None,
                        &format!(
                            "Please enter delegation period (in months) [{}]",
                            DELEGATION_PERIOD_OPTIONS.join("/")
                        ),
                    )?;
                    entered
                }
            };
            let period = parse_delegation_period(&period)?;
            let info = value_or_prompt(info, "Please enter delegation request info")?;
            delegate(validator_id, &amount, period, info, &tx, yes).await
        }
        HolderCommands::Delegations { address, wei } => delegations(address, wei).await,
        HolderCommands::CancelDelegation {
            delegation_id,
            tx,
            yes,
        } => cancel_delegation(check_id("Delegation", delegation_id)?, &tx, yes).await,
        HolderCommands::Undelegate {
            delegation_id,
            tx,
            yes,
        } => undelegate(check_id("Delegation", delegation_id)?, &tx, yes).await,
        HolderCommands::Locked { address, wei } => locked(address, wei).await,
        HolderCommands::WithdrawBounty {
            validator_id,
            recipient_address,
            tx,
            yes,
        } => withdraw_bounty(check_id("Validator", validator_id)?, recipient_address, &tx, yes).await,
        HolderCommands::EarnedBounties {
            validator_id,
            address,
            wei,
        } => earned_bounties(check_id("Validator", validator_id)?, address, wei).await,
    }
}

/// Delegation period in months; only the listed options are accepted
pub fn parse_delegation_period(value: &str) -> Result<u64> {
    if !DELEGATION_PERIOD_OPTIONS.contains(&value.trim()) {
        anyhow::bail!(
            "Invalid delegation period {}. Valid options: {}",
            value,
            DELEGATION_PERIOD_OPTIONS.join(", ")
        );
    }
    Ok(value.trim().parse()?)
}

async fn delegate(
    validator_id: u64,
    amount: &str,
    delegation_period: u64,
    info: String,
    tx: &TxOpts,
    yes: bool,
) -> Result<()> {
    let amount_wei = to_wei(amount)?;
    confirm(
        &format!(
            "Are you sure you want to delegate {} SKL to validator {} for {} months?",
            from_wei(amount_wei),
            validator_id,
            delegation_period
        ),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    skale.ensure_validator(validator_id).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let controller = skale.delegation_controller();
    send_call(
        controller.delegate(
            U256::from(validator_id),
            amount_wei,
            U256::from(delegation_period),
            info,
        ),
        &fee,
        "Sending delegation request",
    )
    .await?;

    println!("{}", "✔ Delegation request sent".green());
    Ok(())
}

async fn delegations(address: Address, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    let delegations = skale.delegations_by_holder(address).await?;
    println!("Delegations for address {}:\n", address);
    println!("{}", format::delegations_table(&delegations, wei));
    Ok(())
}

async fn cancel_delegation(delegation_id: u64, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to cancel delegation request with ID {}?", delegation_id),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let controller = skale.delegation_controller();
    send_call(
        controller.cancelPendingDelegation(U256::from(delegation_id)),
        &fee,
        "Canceling delegation request",
    )
    .await?;

    println!("{}", "✔ Delegation request canceled".green());
    Ok(())
}

async fn undelegate(delegation_id: u64, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to request undelegation for delegation ID {}?", delegation_id),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let controller = skale.delegation_controller();
    send_call(
        controller.requestUndelegation(U256::from(delegation_id)),
        &fee,
        "Requesting undelegation",
    )
    .await?;

    println!("{}", "✔ Undelegation request sent".green());
    Ok(())
}

async fn locked(address: Address, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    let amount = skale.locked_amount(address).await?;
    println!("Locked amount for address {}:", address);
    println!("{} {}", format_amount(amount, wei), amount_unit(wei));
    Ok(())
}

async fn withdraw_bounty(validator_id: u64, recipient: Address, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!(
            "Are you sure you want to withdraw bounty earned from validator {} to {}?",
            validator_id, recipient
        ),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    skale.ensure_validator(validator_id).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let distributor = skale.distributor();
    send_call(
        distributor.withdrawBounty(U256::from(validator_id), recipient),
        &fee,
        "Withdrawing bounty",
    )
    .await?;

    println!("{}", format!("✔ Bounty successfully transferred to {}", recipient).green());
    Ok(())
}

async fn earned_bounties(validator_id: u64, address: Address, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let earned = skale.earned_bounty(validator_id, address).await?;
    println!(
        "Earned bounties for {}, validator ID - {}: {} {}\nEnd month: {}",
        address,
        validator_id,
        format_amount(earned.amount, wei),
        amount_unit(wei),
        earned.end_month
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delegation_period() {
        assert_eq!(parse_delegation_period("3").unwrap(), 3);
        assert_eq!(parse_delegation_period("12").unwrap(), 12);
    }

    #[test]
    fn test_parse_delegation_period_invalid() {
        let err = parse_delegation_period("4").unwrap_err();
        assert!(err.to_string().contains("Valid options: 3, 6, 9, 12"));
        assert!(parse_delegation_period("twelve").is_err());
    }
}
