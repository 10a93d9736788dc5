use alloy::primitives::Address;
use anyhow::Result;
use clap::Subcommand;
use crate::config::LedgerKeysType;
use crate::transaction::TxOpts;
use crate::wallet::{self, parse_address, Token};

#[derive(Subcommand, Debug)]
pub enum WalletCommands {
    /// Send ETH tokens to specific address
    SendEth {
        #[arg(value_parser = parse_address)]
        receiver_address: Address,

        /// Amount of ETH to send
        amount: String,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Send SKL tokens to specific address
    SendSkl {
        #[arg(value_parser = parse_address)]
        receiver_address: Address,

        /// Amount of SKL to send
        amount: String,

        #[command(flatten)]
        tx: TxOpts,

        #[arg(long)]
        yes: bool,
    },

    /// Set Ledger derivation path options
    SetupLedger {
        /// Index of the address on the device
        #[arg(long)]
        address_index: usize,

        #[arg(long, value_enum)]
        keys_type: LedgerKeysType,
    },
}

pub async fn execute(cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::SendEth {
            receiver_address,
            amount,
            tx,
            yes,
        } => wallet::transfer(Token::Eth, receiver_address, &amount, &tx, yes).await,
        WalletCommands::SendSkl {
            receiver_address,
            amount,
            tx,
            yes,
        } => wallet::transfer(Token::Skl, receiver_address, &amount, &tx, yes).await,
        WalletCommands::SetupLedger {
            address_index,
            keys_type,
        } => wallet::setup_ledger(address_index, keys_type),
    }
}
