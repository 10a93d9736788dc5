pub mod bounty;
pub mod holder;
pub mod metrics;
pub mod srw;
pub mod validator;
pub mod wallet;

use anyhow::Result;
use dialoguer::Input;
use std::str::FromStr;
use crate::errors::CliError;

pub const NO_DATA_MSG: &str = "No data found for the given period";

/// Validate an id argument that the user may have given as a negative number
pub fn check_id(kind: &'static str, id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| CliError::NegativeId { kind, id }.into())
}

/// Return the given value or ask the user for it
pub fn value_or_prompt<T>(value: Option<T>, prompt: &str) -> Result<T>
where
    T: Clone + FromStr + ToString,
    <T as FromStr>::Err: std::fmt::Debug + ToString,
{
    match value {
        Some(value) => Ok(value),
        None => Ok(Input::<T>::new().with_prompt(prompt).interact_text()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_id() {
        assert_eq!(check_id("Node", 0).unwrap(), 0);
        assert_eq!(check_id("Node", 42).unwrap(), 42);
    }

    #[test]
    fn test_check_id_negative() {
        let err = check_id("Validator", -1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NegativeId { kind: "Validator", id: -1 })
        ));
    }

    #[test]
    fn test_value_or_prompt_uses_given_value() {
        assert_eq!(value_or_prompt(Some(5i64), "unused").unwrap(), 5);
    }
}
