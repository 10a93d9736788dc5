use alloy::{
    contract::{CallBuilder, CallDecoder},
    network::{Ethereum, ReceiptResponse as _},
    primitives::TxHash,
    providers::{PendingTransactionBuilder, Provider},
};
use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use crate::contracts::Skale;
use crate::errors::CliError;
use crate::units::{gwei_to_wei, wei_to_gwei};

pub const LONG_LINE: &str = "--------------------------------------------------";

/// Fee fields for a transaction, in wei
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxFee {
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl TxFee {
    pub fn is_empty(&self) -> bool {
        self.gas_price.is_none()
            && self.max_fee_per_gas.is_none()
            && self.max_priority_fee_per_gas.is_none()
    }

    /// Apply the fee to a contract call
    pub fn apply<P, D>(&self, mut call: CallBuilder<P, D>) -> CallBuilder<P, D>
    where
        P: Provider,
        D: CallDecoder,
    {
        if self.max_priority_fee_per_gas.is_some() || self.max_fee_per_gas.is_some() {
            if let Some(max_fee) = self.max_fee_per_gas {
                call = call.max_fee_per_gas(max_fee);
            }
            if let Some(priority) = self.max_priority_fee_per_gas {
                call = call.max_priority_fee_per_gas(priority);
            }
        } else if let Some(gas_price) = self.gas_price {
            call = call.gas_price(gas_price);
        }
        call
    }
}

impl fmt::Display for TxFee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: Option<u128>| value.map_or("None".to_string(), |v| v.to_string());
        if self.max_priority_fee_per_gas.is_some() {
            write!(
                f,
                "[Fee] maxFeePerGas: {} maxPriorityFeePerGas: {}",
                show(self.max_fee_per_gas),
                show(self.max_priority_fee_per_gas)
            )
        } else {
            write!(f, "[Fee] gasPrice: {}", show(self.gas_price))
        }
    }
}

fn parse_gwei(value: &str) -> std::result::Result<u128, String> {
    gwei_to_wei(value).map_err(|e| e.to_string())
}

/// Options shared by every command that sends a transaction
#[derive(Args, Debug, Clone, Default)]
pub struct TxOpts {
    /// File with the private key used to sign (software wallet)
    #[arg(long)]
    pub pk_file: Option<PathBuf>,

    /// Gas price in Gwei
    #[arg(long, value_parser = parse_gwei)]
    pub gas_price: Option<u128>,

    /// EIP-1559 max fee per gas in Gwei
    #[arg(long, value_parser = parse_gwei)]
    pub max_fee: Option<u128>,

    /// EIP-1559 max priority fee per gas in Gwei
    #[arg(long, value_parser = parse_gwei)]
    pub max_priority_fee: Option<u128>,
}

impl TxOpts {
    pub fn fee(&self) -> TxFee {
        TxFee {
            gas_price: self.gas_price,
            max_fee_per_gas: self.max_fee,
            max_priority_fee_per_gas: self.max_priority_fee,
        }
    }
}

pub fn print_gas_price(gas_price: u128) {
    println!(
        "Transaction gas price: {} Gwei ({} wei)\n",
        wei_to_gwei(gas_price),
        gas_price
    );
}

/// Use the given fee, or the node's current gas price when none was given
pub async fn resolve_fee(skale: &Skale, fee: TxFee) -> Result<TxFee> {
    if !fee.is_empty() {
        return Ok(fee);
    }
    let gas_price = skale.gas_price().await?;
    print_gas_price(gas_price);
    Ok(TxFee {
        gas_price: Some(gas_price),
        ..fee
    })
}

/// Ask the user to confirm unless `--yes` was passed
pub fn confirm(prompt: &str, yes: bool) -> Result<()> {
    if yes {
        return Ok(());
    }
    let confirmed = Confirm::new()
        .with_prompt(format!("{}\n{}", LONG_LINE, prompt))
        .default(false)
        .interact()?;
    if !confirmed {
        return Err(CliError::Aborted.into());
    }
    Ok(())
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.yellow} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Turn a send error into `Reverted` when the node reports a revert
pub fn classify_send_error<E: fmt::Display>(err: E) -> anyhow::Error {
    let message = err.to_string();
    if message.to_lowercase().contains("revert") {
        CliError::Reverted(message).into()
    } else {
        anyhow::anyhow!("Failed to send transaction: {}", message)
    }
}

/// Wait for the receipt and fail when the transaction did not succeed
pub async fn wait_for_receipt(pending: PendingTransactionBuilder<Ethereum>) -> Result<TxHash> {
    let tx_hash = *pending.tx_hash();
    tracing::info!("Transaction sent: {}", tx_hash);

    let receipt = pending.get_receipt().await?;
    if !receipt.status() {
        tracing::error!("Transaction {} failed", tx_hash);
        return Err(CliError::TransactionFailed(tx_hash.to_string()).into());
    }
    tracing::info!("Transaction {} mined in block {:?}", tx_hash, receipt.block_number());
    Ok(tx_hash)
}

/// Send a contract call with the given fee and wait for it to be mined
pub async fn send_call<P, D>(call: CallBuilder<P, D>, fee: &TxFee, action: &str) -> Result<TxHash>
where
    P: Provider,
    D: CallDecoder,
{
    tracing::info!("{}: {}", action, fee);
    let spinner = spinner(action);
    let result = async {
        let pending = fee.apply(call).send().await.map_err(classify_send_error)?;
        wait_for_receipt(pending).await
    }
    .await;
    spinner.finish_and_clear();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_display_legacy() {
        let fee = TxFee {
            gas_price: Some(1_000_000_000),
            ..Default::default()
        };
        assert_eq!(fee.to_string(), "[Fee] gasPrice: 1000000000");
    }

    #[test]
    fn test_fee_display_eip1559() {
        let fee = TxFee {
            gas_price: None,
            max_fee_per_gas: Some(3_000_000_000),
            max_priority_fee_per_gas: Some(2_000_000_000),
        };
        assert_eq!(
            fee.to_string(),
            "[Fee] maxFeePerGas: 3000000000 maxPriorityFeePerGas: 2000000000"
        );
    }

    #[test]
    fn test_fee_is_empty() {
        assert!(TxFee::default().is_empty());
        assert!(!TxOpts {
            max_fee: Some(1),
            ..Default::default()
        }
        .fee()
        .is_empty());
    }

    #[test]
    fn test_opts_to_fee() {
        let opts = TxOpts {
            pk_file: None,
            gas_price: Some(5),
            max_fee: None,
            max_priority_fee: Some(7),
        };
        let fee = opts.fee();
        assert_eq!(fee.gas_price, Some(5));
        assert_eq!(fee.max_priority_fee_per_gas, Some(7));
    }

    #[test]
    fn test_parse_gwei_arg() {
        assert_eq!(parse_gwei("1.5").unwrap(), 1_500_000_000);
        assert!(parse_gwei("fast").is_err());
    }

    #[test]
    fn test_classify_revert() {
        let err = classify_send_error("server returned an error response: execution reverted: Delegation does not exist");
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::Reverted(_))));

        let err = classify_send_error("connection refused");
        assert!(err.downcast_ref::<CliError>().is_none());
    }

    #[test]
    fn test_confirm_with_yes() {
        assert!(confirm("Are you sure?", true).is_ok());
    }
}
