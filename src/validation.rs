//! Configuration value validation.

use crate::types::{Error, Result};
use reqwest::Url;
use std::time::Duration;

/// Validate a LightRAG base URL and strip trailing slashes.
pub fn validate_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::configuration("base URL cannot be empty"));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| Error::configuration(format!("invalid base URL '{}': {}", trimmed, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::configuration(format!(
            "base URL '{}' must use http or https, got '{}'",
            trimmed,
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::configuration(format!(
            "base URL '{}' has no host",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse a timeout such as `150s`, `2m 30s` or a bare number of seconds.
pub fn parse_timeout(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let timeout = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime_serde::re::humantime::parse_duration(raw)
            .map_err(|e| Error::configuration(format!("invalid timeout '{}': {}", raw, e)))?,
    };
    if timeout.is_zero() {
        return Err(Error::configuration("timeout must be positive"));
    }
    Ok(timeout)
}

/// Split a comma-separated tool list, dropping blanks.
pub fn parse_tool_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
