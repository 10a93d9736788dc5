//! Self-recharging validator wallet

use alloy::primitives::U256;
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use crate::commands::check_id;
use crate::contracts::Skale;
use crate::transaction::{resolve_fee, send_call, TxOpts};
use crate::units::{from_wei, to_wei};
use crate::wallet::connect;

#[derive(Subcommand, Debug)]
pub enum SrwCommands {
    /// Recharge validator SRW wallet
    Recharge {
        /// Amount of ETH to send
        amount: String,

        /// Validator to recharge, defaults to the one owned by the sender
        #[arg(long, allow_negative_numbers = true)]
        validator_id: Option<i64>,

        #[command(flatten)]
        tx: TxOpts,
    },

    /// Withdraw ETH from validator SRW wallet
    Withdraw {
        amount: String,

        #[command(flatten)]
        tx: TxOpts,
    },

    /// Show validator SRW balance
    Balance {
        #[arg(allow_negative_numbers = true)]
        validator_id: i64,

        #[arg(long, short = 'w')]
        wei: bool,
    },
}

pub async fn execute(cmd: SrwCommands) -> Result<()> {
    match cmd {
        SrwCommands::Recharge {
            amount,
            validator_id,
            tx,
        } => {
            let validator_id = validator_id.map(|id| check_id("Validator", id)).transpose()?;
            recharge(&amount, validator_id, &tx).await
        }
        SrwCommands::Withdraw { amount, tx } => withdraw(&amount, &tx).await,
        SrwCommands::Balance { validator_id, wei } => {
            balance(check_id("Validator", validator_id)?, wei).await
        }
    }
}

async fn recharge(amount: &str, validator_id: Option<u64>, tx: &TxOpts) -> Result<()> {
    let amount_wei = to_wei(amount)?;
    let skale = connect(tx.pk_file.as_deref()).await?;
    let validator_id = match validator_id {
        Some(id) => {
            skale.ensure_validator(id).await?;
            id
        }
        None => skale.validator_id_by_address(skale.sender()?).await?,
    };
    tracing::info!("Recharging SRW of validator {} with {} wei", validator_id, amount_wei);

    let fee = resolve_fee(&skale, tx.fee()).await?;
    let wallets = skale.wallets();
    send_call(
        wallets
            .rechargeValidatorWallet(U256::from(validator_id))
            .value(amount_wei),
        &fee,
        "Recharging wallet",
    )
    .await?;

    println!("{}", "✔ Validator wallet recharged".green());
    Ok(())
}

async fn withdraw(amount: &str, tx: &TxOpts) -> Result<()> {
    let amount_wei = to_wei(amount)?;
    let skale = connect(tx.pk_file.as_deref()).await?;
    let fee = resolve_fee(&skale, tx.fee()).await?;
    let wallets = skale.wallets();
    send_call(
        wallets.withdrawFundsFromValidatorWallet(amount_wei),
        &fee,
        "Withdrawing funds",
    )
    .await?;

    println!("{}", "✔ Funds were successfully withdrawn from validator wallet".green());
    Ok(())
}

async fn balance(validator_id: u64, wei: bool) -> Result<()> {
    let skale = Skale::from_config().await?;
    skale.ensure_validator(validator_id).await?;
    let balance = skale.srw_balance(validator_id).await?;
    println!("{}", balance_line(validator_id, balance, wei));
    Ok(())
}

fn balance_line(validator_id: u64, balance: U256, wei: bool) -> String {
    let (amount, unit) = if wei {
        (balance.to_string(), "WEI")
    } else {
        (from_wei(balance), "ETH")
    };
    format!("SRW balance for validator with id {} - {} {}", validator_id, amount, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_line() {
        let balance = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(
            balance_line(3, balance, false),
            "SRW balance for validator with id 3 - 1.5 ETH"
        );
        assert_eq!(
            balance_line(3, balance, true),
            "SRW balance for validator with id 3 - 1500000000000000000 WEI"
        );
    }
}
