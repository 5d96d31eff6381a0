//! Configuration structures.
//!
//! `EffectiveConfig` is produced once by [`crate::resolver`] and shared
//! read-only for the rest of the process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Base URL used when no source supplies one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9621";

/// Outbound call deadline used when no source supplies one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(150);

/// How outbound calls authenticate against LightRAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    None,
    /// Static key sent as `X-API-Key`.
    #[serde(alias = "api_key")]
    ApiKeyHeader,
    /// Password-grant token from `POST /login`, sent as `Authorization: Bearer`.
    #[serde(alias = "oauth2")]
    Oauth2Bearer,
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthMode::None),
            "api_key" | "api_key_header" => Ok(AuthMode::ApiKeyHeader),
            "oauth2" | "oauth2_bearer" => Ok(AuthMode::Oauth2Bearer),
            other => Err(format!(
                "unknown auth mode '{}', expected one of: none, api_key_header, oauth2_bearer",
                other
            )),
        }
    }
}

/// OAuth2 password-grant credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The single configuration value obtained after applying source precedence.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// LightRAG base URL without a trailing slash.
    pub base_url: String,

    /// Static API key (only sent in `ApiKeyHeader` mode).
    pub api_key: Option<String>,

    pub auth_mode: AuthMode,

    /// Username/password for `Oauth2Bearer` mode.
    pub credentials: Option<Credentials>,

    /// Tool names advertised and accepted. Always a subset of the catalog.
    pub enabled_tools: BTreeSet<String>,

    /// Deadline for every outbound call.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl EffectiveConfig {
    /// Config pointing at `base_url` with no auth and the given tools.
    pub fn new<I, S>(base_url: impl Into<String>, enabled_tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base_url: base_url.into(),
            api_key: None,
            auth_mode: AuthMode::None,
            credentials: None,
            enabled_tools: enabled_tools.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for EffectiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectiveConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("auth_mode", &self.auth_mode)
            .field("credentials", &self.credentials)
            .field("enabled_tools", &self.enabled_tools)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stdio server limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Maximum accepted JSON-RPC line length in bytes.
    pub max_frame_bytes: usize,

    /// Maximum tool calls in flight. Further calls wait for a slot.
    pub max_concurrent_calls: usize,

    /// Bounded channel capacity for forwarding streamed chunks as progress.
    pub progress_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 5 * 1024 * 1024,
            max_concurrent_calls: 32,
            progress_channel_capacity: 64,
        }
    }
}
