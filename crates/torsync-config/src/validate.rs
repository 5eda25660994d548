//! Validation and parsing helpers for raw variable values.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::SyncSettings;

/// Parse a positive millisecond count into a [`Duration`].
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a positive integer.
pub fn parse_millis(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    let millis: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, raw, "not_integer"))?;
    if millis == 0 {
        return Err(ConfigError::invalid(field, raw, "must_be_positive"));
    }
    Ok(Duration::from_millis(millis))
}

/// Parse a positive connection count.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is zero or not an integer.
pub fn parse_count(field: &'static str, raw: &str) -> ConfigResult<u32> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(ConfigError::invalid(field, raw, "must_be_positive")),
        Ok(value) => Ok(value),
        Err(_) => Err(ConfigError::invalid(field, raw, "not_integer")),
    }
}

/// Interpret the usual truthy spellings; anything else is false.
#[must_use]
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Split a comma separated extension list, dropping blanks and leading dots.
#[must_use]
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Check the interval bounds of a settings block.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when an interval is zero or the
/// ceiling is below the base.
pub fn validate_sync(settings: &SyncSettings) -> ConfigResult<()> {
    if settings.base_interval.is_zero() {
        return Err(ConfigError::invalid(
            "commit_interval_ms",
            "0",
            "must_be_positive",
        ));
    }
    if settings.max_interval < settings.base_interval {
        return Err(ConfigError::invalid(
            "commit_interval_max_ms",
            settings.max_interval.as_millis().to_string(),
            "below_base_interval",
        ));
    }
    Ok(())
}
