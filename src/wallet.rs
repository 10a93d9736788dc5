use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::str::FromStr;
use crate::config::{Config, ContractAddresses, LedgerInfo, LedgerKeysType, WalletType};
use crate::contracts::Skale;
use crate::errors::CliError;
use crate::transaction::{self, TxFee, TxOpts};
use crate::units::{from_wei, to_wei};

/// Signer ready to be plugged into a provider
pub struct LoadedWallet {
    pub wallet: EthereumWallet,
    pub address: Address,
}

/// Read a hex private key from a file, with or without the `0x` prefix
pub fn read_private_key(path: &Path) -> Result<PrivateKeySigner> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read private key file {}", path.display()))?;
    let key = contents.trim();
    let key = key.strip_prefix("0x").unwrap_or(key);
    PrivateKeySigner::from_str(key).context("Invalid private key")
}

#[cfg(feature = "ledger")]
async fn load_ledger(info: &LedgerInfo) -> Result<LoadedWallet> {
    use alloy::signers::ledger::{HDPath, LedgerSigner};

    let path = match info.keys_type {
        LedgerKeysType::Live => HDPath::LedgerLive(info.address_index),
        LedgerKeysType::Legacy => HDPath::Legacy(info.address_index),
    };
    let signer = LedgerSigner::new(path, None)
        .await
        .context("Failed to connect to the Ledger device")?;
    let address = signer.get_address().await?;
    Ok(LoadedWallet {
        wallet: EthereumWallet::from(signer),
        address,
    })
}

#[cfg(not(feature = "ledger"))]
async fn load_ledger(_info: &LedgerInfo) -> Result<LoadedWallet> {
    Err(CliError::LedgerUnsupported.into())
}

/// Load the signer selected by the config
pub async fn load_wallet(config: &Config, pk_file: Option<&Path>) -> Result<LoadedWallet> {
    match config.wallet {
        WalletType::Software => {
            let path = pk_file.ok_or(CliError::PkFileRequired)?;
            let signer = read_private_key(path)?;
            let address = signer.address();
            Ok(LoadedWallet {
                wallet: EthereumWallet::from(signer),
                address,
            })
        }
        WalletType::Ledger => {
            let info = LedgerInfo::load()?;
            load_ledger(&info).await
        }
    }
}

/// Connect to the contracts with the configured signer
pub async fn connect(pk_file: Option<&Path>) -> Result<Skale> {
    let config = Config::load()?;
    let addresses = ContractAddresses::load()?;
    let loaded = load_wallet(&config, pk_file).await?;
    tracing::info!("Using {} wallet {}", config.wallet, loaded.address);
    Skale::connect_with_wallet(&config.endpoint, addresses, loaded.wallet, loaded.address).await
}

pub fn parse_address(value: &str) -> std::result::Result<Address, String> {
    Address::from_str(value).map_err(|_| CliError::InvalidAddress(value.to_string()).to_string())
}

/// Token being transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Eth,
    Skl,
}

impl Token {
    fn symbol(&self) -> &'static str {
        match self {
            Token::Eth => "ETH",
            Token::Skl => "SKL",
        }
    }
}

fn transfer_request(receiver: Address, amount: U256, fee: &TxFee) -> TransactionRequest {
    let mut request = TransactionRequest::default()
        .with_to(receiver)
        .with_value(amount);
    if let Some(max_fee) = fee.max_fee_per_gas {
        request = request.with_max_fee_per_gas(max_fee);
    }
    if let Some(priority) = fee.max_priority_fee_per_gas {
        request = request.with_max_priority_fee_per_gas(priority);
    }
    if fee.max_fee_per_gas.is_none() && fee.max_priority_fee_per_gas.is_none() {
        if let Some(gas_price) = fee.gas_price {
            request = request.with_gas_price(gas_price);
        }
    }
    request
}

async fn send_funds(skale: &Skale, token: Token, receiver: Address, amount: U256, fee: &TxFee) -> Result<()> {
    match token {
        Token::Eth => {
            let request = transfer_request(receiver, amount, fee);
            let spinner = transaction::spinner("Transferring funds");
            let result = async {
                let pending = skale
                    .provider()
                    .send_transaction(request)
                    .await
                    .map_err(transaction::classify_send_error)?;
                transaction::wait_for_receipt(pending).await
            }
            .await;
            spinner.finish_and_clear();
            result?;
        }
        Token::Skl => {
            let token_contract = skale.token();
            transaction::send_call(
                token_contract.transfer(receiver, amount),
                fee,
                "Transferring funds",
            )
            .await?;
        }
    }
    Ok(())
}

/// Transfer ETH or SKL from the configured wallet
pub async fn transfer(token: Token, receiver: Address, amount: &str, opts: &TxOpts, yes: bool) -> Result<()> {
    let amount_wei = to_wei(amount)?;
    transaction::confirm(
        &format!(
            "Are you sure you want to send {} {} to {}?",
            from_wei(amount_wei),
            token.symbol(),
            receiver
        ),
        yes,
    )?;

    let skale = connect(opts.pk_file.as_deref()).await?;
    let fee = transaction::resolve_fee(&skale, opts.fee()).await?;

    match send_funds(&skale, token, receiver, amount_wei, &fee).await {
        Ok(()) => {
            let msg = "✔ Funds were successfully transferred";
            tracing::info!("{}", msg);
            println!("{}", msg.green());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Funds were not sent due to error: {:#}", e);
            println!("{}", "❌ Funds sending failed".bright_red());
            Err(e)
        }
    }
}

/// Save the Ledger derivation settings
pub fn setup_ledger(address_index: usize, keys_type: LedgerKeysType) -> Result<()> {
    let config = Config::load()?;
    if config.wallet != WalletType::Ledger {
        return Err(CliError::LedgerOnly.into());
    }
    LedgerInfo {
        address_index,
        keys_type,
    }
    .save()?;
    println!("{}", "✔ Ledger wallet setup completed".green());
    Ok(())
}
