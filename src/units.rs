use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::U256;
use anyhow::Result;
use crate::errors::CliError;

/// Commission rates are stored on chain in permille
pub const PERMILLE_MULTIPLIER: f64 = 10.0;

const WEI_PER_MILLI_SKL: u64 = 1_000_000_000_000_000;

fn parse_positive(value: &str, unit: &str) -> Result<U256> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(CliError::InvalidAmount(value.to_string()).into());
    }
    let parsed = parse_units(trimmed, unit)
        .map_err(|_| CliError::InvalidAmount(value.to_string()))?;
    Ok(parsed.get_absolute())
}

/// Parse a token amount (SKL or ETH, both 18 decimals) into wei
pub fn to_wei(value: &str) -> Result<U256> {
    parse_positive(value, "ether")
}

/// Parse a Gwei amount into wei
pub fn gwei_to_wei(value: &str) -> Result<u128> {
    let wei = parse_positive(value, "gwei")?;
    u128::try_from(wei).map_err(|_| CliError::InvalidAmount(value.to_string()).into())
}

/// Drop trailing zeros of a decimal string, and the dot if nothing remains after it
fn trim_decimal(value: String) -> String {
    if !value.contains('.') {
        return value;
    }
    value.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Full-precision token amount (18 decimals) without trailing zeros
pub fn from_wei(wei: U256) -> String {
    match format_units(wei, "ether") {
        Ok(formatted) => trim_decimal(formatted),
        Err(_) => wei.to_string(),
    }
}

pub fn wei_to_gwei(wei: u128) -> String {
    match format_units(U256::from(wei), "gwei") {
        Ok(formatted) => trim_decimal(formatted),
        Err(_) => wei.to_string(),
    }
}

/// SKL amount rounded half-up to 3 decimals
pub fn to_skl(wei: U256) -> String {
    let step = U256::from(WEI_PER_MILLI_SKL);
    let milli = (wei + step / U256::from(2u8)) / step;
    let whole = milli / U256::from(1000u16);
    let frac = (milli % U256::from(1000u16)).to::<u64>();
    format!("{}.{:03}", whole, frac)
}

/// Render an amount as wei or as rounded SKL
pub fn format_amount(wei: U256, as_wei: bool) -> String {
    if as_wei {
        wei.to_string()
    } else {
        to_skl(wei)
    }
}

pub fn amount_unit(as_wei: bool) -> &'static str {
    if as_wei {
        "WEI"
    } else {
        "SKL"
    }
}

pub fn percent_to_permille(percent: f64) -> U256 {
    U256::from((percent * PERMILLE_MULTIPLIER).round() as u64)
}

pub fn permille_to_percent(permille: U256) -> f64 {
    permille.saturating_to::<u64>() as f64 / PERMILLE_MULTIPLIER
}

/// Average latency arrives in milliseconds; reports show seconds with one decimal
pub fn latency_seconds(latency_ms: U256) -> f64 {
    let ms = latency_ms.saturating_to::<u64>() as f64;
    (ms / 100.0).round() / 10.0
}
