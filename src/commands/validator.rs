//! Validator commands: registration, delegation handling, node address
//! linking and fee withdrawal.

use alloy::primitives::{Address, Bytes, U256};
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use crate::commands::{check_id, value_or_prompt};
use crate::contracts::{DelegationState, Skale};
use crate::errors::CliError;
use crate::format;
use crate::transaction::{confirm, resolve_fee, send_call, TxOpts};
use crate::units::{amount_unit, format_amount, from_wei, percent_to_permille, to_wei};
use crate::wallet::{connect, parse_address};

#[derive(Subcommand, Debug)]
pub enum ValidatorCommands {
    /// Register new SKALE validator
    Register {
        /// Validator name
        #[arg(long, short = 'n')]
        name: Option<String>,

        /// Validator description
        #[arg(long, short = 'd')]
        description: Option<String>,

        /// Commission rate (percentage)
        #[arg(long, short = 'c', value_parser = parse_percentage)]
        commission_rate: Option<f64>,

        /// Validator minimum delegation amount (SKL)
        #[arg(long)]
        min_delegation: Option<String>,

        #[command(flatten)]
        tx: TxOpts,

        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },

    /// List of available validators
    Ls {
        /// Show all registered validators, not only trusted ones
        #[arg(long)]
        all: bool,

        /// Show amounts in wei
        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// List of delegations for validator ID
    Delegations {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// Accept pending delegation request
    AcceptDelegation {
        /// ID of the delegation to accept
        #[arg(long, allow_negative_numbers = true)]
        delegation_id: Option<i64>,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Accept all pending delegations for your validator
    AcceptAllDelegations {
        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Link node address to your validator account
    LinkAddress {
        #[arg(value_parser = parse_address)]
        node_address: Address,

        /// Signature of the validator ID made with the node key
        signature: Bytes,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Unlink node address from your validator account
    UnlinkAddress {
        #[arg(value_parser = parse_address)]
        node_address: Address,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// List of the linked addresses for validator address
    LinkedAddresses {
        #[arg(value_parser = parse_address)]
        address: Address,
    },

    /// Info about the validator
    Info {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,
    },

    /// Withdraw earned fee to specified address
    WithdrawFee {
        #[arg(value_parser = parse_address)]
        recipient_address: Address,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Bond amount for validator
    BondAmount {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// Set a new minimum delegation amount for the validator
    SetMda {
        /// New minimum delegation amount (SKL)
        new_mda: String,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Request address change for the validator
    ChangeAddress {
        #[arg(value_parser = parse_address)]
        address: Address,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Confirm address change for the validator (run with the new key)
    ConfirmAddress {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Earned fees for the validator address
    EarnedFees {
        #[arg(value_parser = parse_address)]
        address: Address,

        #[arg(long, short = 'w')]
        wei: bool,
    },

    /// Edit validator name or description
    Edit {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },
}

pub fn parse_percentage(value: &str) -> std::result::Result<f64, String> {
    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("Expected a number, got {}", value))?;
    if !(0.0..=100.0).contains(&parsed) {
        return Err(CliError::InvalidPercentage(parsed).to_string());
    }
    Ok(parsed)
}

pub async fn execute(cmd: ValidatorCommands) -> Result<()> {
    match cmd {
        ValidatorCommands::Register {
            name,
            description,
            commission_rate,
            min_delegation,
            tx,
            yes,
        } => register(name, description, commission_rate, min_delegation, &tx, yes).await,
        ValidatorCommands::Ls { all, wei } => ls(all, wei).await,
        ValidatorCommands::Delegations { validator_id, wei } => {
            delegations(check_id("Validator", validator_id)?, wei).await
        }
        ValidatorCommands::AcceptDelegation {
            delegation_id,
            tx,
            yes,
        } => {
            let id = value_or_prompt(delegation_id, "Please enter ID of the delegation to accept")?;
            accept_delegation(check_id("Delegation", id)?, &tx, yes).await
        }
        ValidatorCommands::AcceptAllDelegations { tx, yes } => accept_all_delegations(&tx, yes).await,
        ValidatorCommands::LinkAddress {
            node_address,
            signature,
            tx,
            yes,
        } => link_address(node_address, signature, &tx, yes).await,
        ValidatorCommands::UnlinkAddress {
            node_address,
            tx,
            yes,
        } => unlink_address(node_address, &tx, yes).await,
        ValidatorCommands::LinkedAddresses { address } => linked_addresses(address).await,
        ValidatorCommands::Info { validator_id } => info(check_id("Validator", validator_id)?).await,
        ValidatorCommands::WithdrawFee {
            recipient_address,
            tx,
            yes,
        } => withdraw_fee(recipient_address, &tx, yes).await,
        ValidatorCommands::BondAmount { validator_id, wei } => {
            bond_amount(check_id("Validator", validator_id)?, wei).await
        }
        ValidatorCommands::SetMda { new_mda, tx, yes } => set_mda(&new_mda, &tx, yes).await,
        ValidatorCommands::ChangeAddress { address, tx, yes } => change_address(address, &tx, yes).await,
        ValidatorCommands::ConfirmAddress {
            validator_id,
            tx,
            yes,
        } => confirm_address(check_id("Validator", validator_id)?, &tx, yes).await,
        ValidatorCommands::EarnedFees { address, wei } => earned_fees(address, wei).await,
        ValidatorCommands::Edit {
            name,
            description,
            tx,
            yes,
        } => edit(name, description, &tx, yes).await,
    }
}

async fn register(
    name: Option<String>,
    description: Option<String>,
    commission_rate: Option<f64>,
    min_delegation: Option<String>,
    tx: &TxOpts,
    yes: bool,
) -> Result<()> {
    let name = value_or_prompt(name, "Please enter validator name")?;
    let description = value_or_prompt(description, "Please enter validator description")?;
    let commission_rate = match commission_rate {
        Some(rate) => rate,
        None => {
            let entered: String =
                value_or_prompt(None, "Please enter validator commission rate (in percents)")?;
            parse_percentage(&entered).map_err(anyhow::Error::msg)?
        }
    };
    let min_delegation = value_or_prompt(min_delegation, "Please enter minimum delegation amount (SKL)")?;
    let min_delegation_wei = to_wei(&min_delegation)?;

    confirm(
        "Are you sure you want to register a new validator account?\n\
         Please, re-check all values above before confirming.",
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.registerValidator(
            name,
            description,
            percent_to_permille(commission_rate),
            min_delegation_wei,
        ),
        &fee,
        "Registering new validator",
    )
    .await?;

    println!("{}", "✔ New validator registered".green());
    Ok(())
}

async fn ls(all: bool, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    let validators = skale.validators(all).await?;
    println!("{}", format::validators_table(&validators, wei));
    Ok(())
}

async fn delegations(validator_id: u64, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let delegations = skale.delegations_by_validator(validator_id).await?;
    println!("Delegations for validator ID {}:\n", validator_id);
    println!("{}", format::delegations_table(&delegations, wei));
    Ok(())
}

async fn accept_delegation(delegation_id: u64, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to accept delegation request with ID {}?", delegation_id),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let controller = skale.delegation_controller();
    send_call(
        controller.acceptPendingDelegation(U256::from(delegation_id)),
        &fee,
        "Accepting delegation request",
    )
    .await?;

    println!("{}", "✔ Delegation request accepted".green());
    Ok(())
}

async fn accept_all_delegations(tx: &TxOpts, yes: bool) -> Result<()> {
    let skale = connect(tx.pk_file.as_deref()).await?;
    let validator_id = skale.validator_id_by_address(skale.sender()?).await?;
    let pending: Vec<u64> = skale
        .delegations_by_validator(validator_id)
        .await?
        .into_iter()
        .filter(|d| d.state == DelegationState::Proposed)
        .map(|d| d.id)
        .collect();

    if pending.is_empty() {
        println!("No pending delegations for validator ID {}", validator_id);
        return Ok(());
    }

    let ids: Vec<String> = pending.iter().map(u64::to_string).collect();
    println!("Pending delegations: {}", ids.join(", "));
    confirm(
        &format!("Are you sure you want to accept {} delegation requests?", pending.len()),
        yes,
    )?;

    let fee = resolve_fee(&skale, tx.fee()).await?;
    let controller = skale.delegation_controller();
    for id in pending {
        send_call(
            controller.acceptPendingDelegation(U256::from(id)),
            &fee,
            &format!("Accepting delegation request {}", id),
        )
        .await?;
        println!("{}", format!("✔ Delegation request {} accepted", id).green());
    }
    Ok(())
}

async fn link_address(node_address: Address, signature: Bytes, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to link address {} to your validator account?", node_address),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.linkNodeAddress(node_address, signature),
        &fee,
        "Linking node address",
    )
    .await?;

    println!(
        "{}",
        format!("✔ Node address {} linked to your validator address", node_address).green()
    );
    Ok(())
}

async fn unlink_address(node_address: Address, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to unlink address {} from your validator account?", node_address),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.unlinkNodeAddress(node_address),
        &fee,
        "Unlinking node address",
    )
    .await?;

    println!(
        "{}",
        format!("✔ Node address {} unlinked from your validator address", node_address).green()
    );
    Ok(())
}

async fn linked_addresses(address: Address) -> Result<()> {
    let skale = Skale::from_config().await?;
    let addresses = skale.linked_addresses(address).await?;
    println!("Linked addresses for {}:\n", address);
    println!("{}", format::linked_addresses_table(&addresses));
    Ok(())
}

async fn info(validator_id: u64) -> Result<()> {
    let skale = Skale::from_config().await?;
    let validator = skale.validator(validator_id).await?;
    let msr = skale.msr().await?;
    println!("{}", format::validator_info(&validator, msr));
    Ok(())
}

async fn withdraw_fee(recipient: Address, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to withdraw earned fees to {}?", recipient),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let distributor = skale.distributor();
    send_call(distributor.withdrawFee(recipient), &fee, "Withdrawing fee").await?;

    println!("{}", format!("✔ Earned fees successfully transferred to {}", recipient).green());
    Ok(())
}

async fn bond_amount(validator_id: u64, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let amount = skale.bond_amount(validator_id).await?;
    println!(
        "Bond amount for validator with id {} - {} {}",
        validator_id,
        format_amount(amount, wei),
        amount_unit(wei)
    );
    Ok(())
}

async fn set_mda(new_mda: &str, tx: &TxOpts, yes: bool) -> Result<()> {
    let amount = to_wei(new_mda)?;
    confirm(
        &format!("Are you sure you want to set new minimum delegation amount to {} SKL?", from_wei(amount)),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.setValidatorMDA(amount),
        &fee,
        "Updating minimum delegation amount",
    )
    .await?;

    println!(
        "{}",
        format!(
            "✔ Minimum delegation amount for your validator ID changed to {}",
            from_wei(amount)
        )
        .green()
    );
    Ok(())
}

async fn change_address(address: Address, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to request {} as the new validator address?", address),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.requestForNewAddress(address),
        &fee,
        "Requesting new validator address",
    )
    .await?;

    println!(
        "{}",
        format!(
            "✔ Requested new address for your validator ID: {}.\n\
             You can finish the procedure by running < sk-val validator confirm-address > using the new key.",
            address
        )
        .green()
    );
    Ok(())
}

async fn confirm_address(validator_id: u64, tx: &TxOpts, yes: bool) -> Result<()> {
    confirm(
        &format!("Are you sure you want to confirm address change for validator ID {}?", validator_id),
        yes,
    )?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    skale.ensure_validator(validator_id).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    send_call(
        service.confirmNewAddress(U256::from(validator_id)),
        &fee,
        "Confirming new validator address",
    )
    .await?;

    println!("{}", "✔ Validator address changed".green());
    Ok(())
}

async fn earned_fees(address: Address, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    let earned = skale.earned_fee(address).await?;
    println!(
        "Earned fee for {}: {} {}\nEnd month: {}",
        address,
        format_amount(earned.amount, wei),
        amount_unit(wei),
        earned.end_month
    );
    Ok(())
}

async fn edit(name: Option<String>, description: Option<String>, tx: &TxOpts, yes: bool) -> Result<()> {
    if name.is_none() && description.is_none() {
        println!("Nothing to change: pass --name and/or --description");
        return Ok(());
    }
    confirm("Are you sure you want to edit your validator info?", yes)?;

    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let service = skale.validator_service();
    if let Some(name) = name {
        send_call(service.setValidatorName(name), &fee, "Changing validator name").await?;
        println!("{}", "✔ Validator name changed".green());
    }
    if let Some(description) = description {
        send_call(
            service.setValidatorDescription(description),
            &fee,
            "Changing validator description",
        )
        .await?;
        println!("{}", "✔ Validator description changed".green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("15").unwrap(), 15.0);
        assert_eq!(parse_percentage("0").unwrap(), 0.0);
        assert_eq!(parse_percentage("100").unwrap(), 100.0);
        assert_eq!(parse_percentage("2.5").unwrap(), 2.5);
    }

    #[test]
    fn test_parse_percentage_out_of_range() {
        let err = parse_percentage("101").unwrap_err();
        assert_eq!(err, "Wrong percentage value provided: 101, should be in range(0, 100)");
        assert!(parse_percentage("-1").is_err());
        assert!(parse_percentage("ten").is_err());
    }
}
