//! Authentication state for outbound calls.
//!
//! Holds the static API key and the cached bearer token. The token cache is
//! the only piece of transport state written after startup.

use crate::types::{AuthMode, Credentials, EffectiveConfig, Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::fmt;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Query parameter some LightRAG deployments read the API key from.
pub const API_KEY_QUERY_PARAM: &str = "api_key_header_value";

/// Response keys that may hold a bearer token after `POST /login`.
const TOKEN_KEYS: &[&str] = &["access_token", "token", "accessToken"];

pub struct AuthState {
    mode: AuthMode,
    api_key: Option<HeaderValue>,
    api_key_param: Option<String>,
    credentials: Option<Credentials>,
    token: RwLock<Option<String>>,
    // Serializes token acquisition so concurrent calls log in once.
    login: Mutex<()>,
}

impl AuthState {
    pub fn from_config(config: &EffectiveConfig) -> Result<Self> {
        let api_key = match (&config.auth_mode, &config.api_key) {
            (AuthMode::ApiKeyHeader, Some(key)) => {
                let mut value = HeaderValue::from_str(key).map_err(|_| {
                    Error::configuration("API key contains characters not allowed in a header")
                })?;
                value.set_sensitive(true);
                Some(value)
            }
            (AuthMode::ApiKeyHeader, None) => {
                return Err(Error::configuration("auth mode api_key_header requires an API key"))
            }
            _ => None,
        };

        if config.auth_mode == AuthMode::Oauth2Bearer && config.credentials.is_none() {
            return Err(Error::configuration(
                "auth mode oauth2_bearer requires a username and password",
            ));
        }

        Ok(Self {
            mode: config.auth_mode,
            api_key_param: api_key.as_ref().and(config.api_key.clone()),
            api_key,
            credentials: config.credentials.clone(),
            token: RwLock::new(None),
            login: Mutex::new(()),
        })
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub async fn cached_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn store_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    /// Hold this while acquiring a token; re-check the cache after locking.
    pub async fn login_guard(&self) -> MutexGuard<'_, ()> {
        self.login.lock().await
    }

    /// Headers for one request given the bearer token in effect, if any.
    pub fn headers(&self, token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            headers.insert(API_KEY_HEADER, key.clone());
        }
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::malformed("bearer token is not a valid header value"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

impl AuthState {
    /// `query` plus the API key parameter, unless the request already sets it.
    pub fn query_pairs(&self, query: &[(String, String)]) -> Vec<(String, String)> {
        let mut pairs = query.to_vec();
        if let Some(key) = &self.api_key_param {
            if !pairs.iter().any(|(name, _)| name == API_KEY_QUERY_PARAM) {
                pairs.push((API_KEY_QUERY_PARAM.to_string(), key.clone()));
            }
        }
        pairs
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Pull a bearer token out of a login response.
pub fn extract_token(payload: &Value) -> Option<String> {
    TOKEN_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
