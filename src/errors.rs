use thiserror::Error;

/// Process exit codes reported by `sk-val`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Failure = 1,
    TransactionError = 5,
    RevertError = 6,
    BadUserError = 7,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("You should run < init > first")]
    NotInitialized,

    #[error("Please specify path to the private key file with --pk-file to use the software wallet")]
    PkFileRequired,

    #[error("Invalid wallet type: {0}. Valid options: software, ledger")]
    InvalidWalletType(String),

    #[error("Ledger wallet is not set up. Run 'sk-val wallet setup-ledger' first")]
    LedgerNotSetUp,

    #[error("This command is only available for the Ledger wallet")]
    LedgerOnly,

    #[error("Ledger support is not enabled in this build")]
    LedgerUnsupported,

    #[error("{kind} ID should be a non-negative number, got {id}")]
    NegativeId { kind: &'static str, id: i64 },

    #[error("{kind} with ID {id} does not exist")]
    UnknownId { kind: &'static str, id: u64 },

    #[error("Validator has no linked nodes")]
    NoNodes,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Wrong Ethereum address provided: {0}")]
    InvalidAddress(String),

    #[error("Wrong percentage value provided: {0}, should be in range(0, 100)")]
    InvalidPercentage(f64),

    #[error("Transaction failed, check receipt: {0}")]
    TransactionFailed(String),

    #[error("{0}")]
    Reverted(String),

    #[error("Retrieving events from filter timed out after {0} attempts")]
    FilterTimedOut(usize),

    #[error("Operation aborted by user")]
    Aborted,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::TransactionFailed(_) => ExitCode::TransactionError,
            CliError::Reverted(_) => ExitCode::RevertError,
            CliError::NotInitialized
            | CliError::PkFileRequired
            | CliError::InvalidWalletType(_)
            | CliError::LedgerNotSetUp
            | CliError::LedgerOnly
            | CliError::NegativeId { .. }
            | CliError::UnknownId { .. }
            | CliError::NoNodes
            | CliError::InvalidAmount(_)
            | CliError::InvalidAddress(_)
            | CliError::InvalidPercentage(_) => ExitCode::BadUserError,
            _ => ExitCode::Failure,
        }
    }
}

/// Map any command error to the exit code it should terminate the process with
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CliError>())
        .map(CliError::exit_code)
        .unwrap_or(ExitCode::Failure)
}
