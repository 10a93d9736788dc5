use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use crate::errors::CliError;

pub const CONFIG_FOLDER_NAME: &str = ".skale-val-cli";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const CONTRACTS_FILE_NAME: &str = "abi.json";
pub const LEDGER_INFO_FILE_NAME: &str = "ledger.json";
pub const LOGS_FOLDER_NAME: &str = ".skale-val-cli-logs";

/// Wallet used to sign transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Software,
    Ledger,
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletType::Software => write!(f, "software"),
            WalletType::Ledger => write!(f, "ledger"),
        }
    }
}

/// Configuration written by `sk-val init`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: String,
    pub wallet: WalletType,
}

/// Contract addresses from the downloaded contracts file.
/// The file also carries ABIs, which are ignored: bindings are compiled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub validator_service_address: Address,
    pub delegation_controller_address: Address,
    pub distributor_address: Address,
    pub token_state_address: Address,
    pub nodes_address: Address,
    pub skale_manager_address: Address,
    pub skale_token_address: Address,
    pub wallets_address: Address,
    pub constants_holder_address: Address,
    #[serde(default)]
    pub monitors_address: Option<Address>,
}

/// Ledger derivation settings saved by `sk-val wallet setup-ledger`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub address_index: usize,
    pub keys_type: LedgerKeysType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKeysType {
    Live,
    Legacy,
}

/// Root folder for all CLI state
pub fn config_folder() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home_dir.join(CONFIG_FOLDER_NAME))
}

pub fn logs_folder() -> Result<PathBuf> {
    Ok(config_folder()?.join(LOGS_FOLDER_NAME))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(value)?;
    std::fs::write(path, contents)?;
    Ok(())
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(config_folder()?.join(CONFIG_FILE_NAME))
    }

    /// Load config, failing with `NotInitialized` if `init` was never run
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Err(CliError::NotInitialized.into());
        }
        read_json(&path)
    }

    pub fn save(&self) -> Result<()> {
        write_json(&Self::config_path()?, self)
    }
}

impl ContractAddresses {
    pub fn contracts_path() -> Result<PathBuf> {
        Ok(config_folder()?.join(CONTRACTS_FILE_NAME))
    }

    pub fn load() -> Result<Self> {
        let path = Self::contracts_path()?;
        if !path.exists() {
            return Err(CliError::NotInitialized.into());
        }
        read_json(&path)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Contracts file is missing required addresses")
    }
}

impl LedgerInfo {
    pub fn info_path() -> Result<PathBuf> {
        Ok(config_folder()?.join(LEDGER_INFO_FILE_NAME))
    }

    pub fn load() -> Result<Self> {
        let path = Self::info_path()?;
        if !path.exists() {
            return Err(CliError::LedgerNotSetUp.into());
        }
        read_json(&path)
    }

    pub fn save(&self) -> Result<()> {
        write_json(&Self::info_path()?, self)
    }
}

/// Validate a URL argument: it needs both a scheme and a host
pub fn parse_url(value: &str) -> std::result::Result<String, String> {
    match reqwest::Url::parse(value) {
        Ok(url) if url.host_str().is_some() => Ok(value.to_string()),
        _ => Err(format!("Expected valid url. Got {}", value)),
    }
}

/// Download the contracts file and write the config
pub async fn init(endpoint: &str, contracts_url: &str, wallet: WalletType) -> Result<()> {
    tracing::info!("Initializing with endpoint {} and contracts {}", endpoint, contracts_url);

    let response = reqwest::get(contracts_url)
        .await
        .with_context(|| format!("Couldn't download file: {}", contracts_url))?
        .error_for_status()
        .with_context(|| format!("Couldn't download file: {}", contracts_url))?;
    let contents = response.text().await?;

    // Reject the file before touching disk if it lacks any address we need
    ContractAddresses::from_json(&contents)?;

    let folder = config_folder()?;
    std::fs::create_dir_all(&folder)?;
    std::fs::write(ContractAddresses::contracts_path()?, contents)?;

    let config = Config {
        endpoint: endpoint.to_string(),
        wallet,
    };
    config.save()?;

    println!("Validator CLI initialized successfully");
    Ok(())
}

/// Show current configuration
pub fn show() -> Result<()> {
    let config = Config::load()?;

    println!("{}", "SKALE Validator CLI Configuration".bright_cyan().bold());
    println!("  Endpoint:     {}", config.endpoint.bright_yellow());
    println!("  Wallet:       {}", config.wallet);
    println!("  Config Path:  {}", Config::config_path()?.display());

    if config.wallet == WalletType::Ledger {
        match LedgerInfo::load() {
            Ok(info) => println!(
                "  Ledger:       index {} ({:?} keys)",
                info.address_index, info.keys_type
            ),
            Err(_) => println!("  Ledger:       {}", "Not set up".dimmed()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACTS_JSON: &str = r#"{
        "validator_service_address": "0x1000000000000000000000000000000000000001",
        "validator_service_abi": [],
        "delegation_controller_address": "0x1000000000000000000000000000000000000002",
        "distributor_address": "0x1000000000000000000000000000000000000003",
        "token_state_address": "0x1000000000000000000000000000000000000004",
        "nodes_address": "0x1000000000000000000000000000000000000005",
        "skale_manager_address": "0x1000000000000000000000000000000000000006",
        "skale_token_address": "0x1000000000000000000000000000000000000007",
        "wallets_address": "0x1000000000000000000000000000000000000008",
        "constants_holder_address": "0x1000000000000000000000000000000000000009"
    }"#;

    #[test]
    fn test_config_serialization() {
        let config = Config {
            endpoint: "http://localhost:8545".to_string(),
            wallet: WalletType::Software,
        };
        let json = serde_json::to_string(&config).unwrap();

        assert!(json.contains("\"endpoint\":\"http://localhost:8545\""));
        assert!(json.contains("\"wallet\":\"software\""));
    }

    #[test]
    fn test_config_deserialization() {
        let json = r#"{"endpoint": "http://example.com/", "wallet": "ledger"}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.endpoint, "http://example.com/");
        assert_eq!(config.wallet, WalletType::Ledger);
    }

    #[test]
    fn test_config_rejects_unknown_wallet() {
        let json = r#"{"endpoint": "http://example.com/", "wallet": "sgx"}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_contract_addresses_ignore_abis() {
        let addresses = ContractAddresses::from_json(CONTRACTS_JSON).unwrap();
        assert_eq!(
            addresses.nodes_address.to_string().to_lowercase(),
            "0x1000000000000000000000000000000000000005"
        );
        assert!(addresses.monitors_address.is_none());
    }

    #[test]
    fn test_contract_addresses_missing_field() {
        let result = ContractAddresses::from_json(r#"{"nodes_address": "0x1000000000000000000000000000000000000005"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ledger_info_roundtrip() {
        let info = LedgerInfo {
            address_index: 3,
            keys_type: LedgerKeysType::Legacy,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"keys_type\":\"legacy\""));

        let restored: LedgerInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, info);
    }

    #[test]
    fn test_parse_url_valid() {
        assert_eq!(parse_url("http://example.com/").unwrap(), "http://example.com/");
        assert!(parse_url("https://mainnet.infura.io/v3/key").is_ok());
    }

    #[test]
    fn test_parse_url_invalid() {
        let err = parse_url("abc").unwrap_err();
        assert_eq!(err, "Expected valid url. Got abc");
        assert!(parse_url("http://").is_err());
    }

    #[test]
    fn test_write_and_read_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            endpoint: "http://localhost:8545".to_string(),
            wallet: WalletType::Software,
        };

        write_json(&path, &config).unwrap();
        let restored: Config = read_json(&path).unwrap();
        assert_eq!(restored.endpoint, config.endpoint);
        assert_eq!(restored.wallet, config.wallet);
    }
}
