//! Environment-based configuration helpers shared by all services.

use crate::error::AppError;
use std::env;
use std::str::FromStr;

/// Read an environment variable, falling back to `default` when one is
/// provided. In production (`required = true`) a missing variable with no
/// default is a startup error rather than a silent fallback.
pub fn get_env(name: &str, default: Option<&str>, required: bool) -> Result<String, AppError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => match default {
            Some(value) if !required => Ok(value.to_string()),
            _ => Err(AppError::Config(anyhow::anyhow!(
                "missing required environment variable: {}",
                name
            ))),
        },
    }
}

/// Read and parse an environment variable.
pub fn get_env_parse<T>(name: &str, default: Option<&str>, required: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name, default, required)?;
    raw.parse::<T>().map_err(|e| {
        AppError::Config(anyhow::anyhow!(
            "invalid value for environment variable {}: {}",
            name,
            e
        ))
    })
}
