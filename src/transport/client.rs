//! reqwest-backed LightRAG client.

use crate::tools::{HttpMethod, RemoteRequest, RequestBody};
use crate::transport::auth::{extract_token, AuthState};
use crate::transport::{lines, ChunkStream, Transport};
use crate::types::{AuthMode, EffectiveConfig, Error, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, Response, StatusCode, Url};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest remote error body echoed back to the caller.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct LightRagClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<AuthState>,
}

impl LightRagClient {
    pub fn new(config: &EffectiveConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::configuration(format!("invalid base URL '{}': {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(concat!("lightrag-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            auth: Arc::new(AuthState::from_config(config)?),
        })
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    fn url(&self, segments: &[String], query: &[(String, String)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::configuration("base URL cannot carry a path"))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Send with the GET-only timeout retry applied.
    async fn send(&self, request: &RemoteRequest) -> Result<Response> {
        let attempts = if request.method.is_idempotent() { 2 } else { 1 };
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_authenticated(request).await {
                Err(Error::Timeout(msg)) if attempt < attempts => {
                    warn!(path = %request.display_path(), attempt, "Request timed out, retrying: {}", msg);
                }
                other => return other,
            }
        }
    }

    /// Send once, re-logging in and resending once on a 401 in bearer mode.
    async fn send_authenticated(&self, request: &RemoteRequest) -> Result<Response> {
        let bearer = self.auth.mode() == AuthMode::Oauth2Bearer && !request.captures_token;
        let response = self.send_once(request, bearer).await?;

        if bearer && response.status() == StatusCode::UNAUTHORIZED {
            debug!(path = %request.display_path(), "Bearer token rejected, logging in again");
            self.auth.clear_token().await;
            let retry = self.send_once(request, true).await?;
            return check_status(retry).await;
        }
        check_status(response).await
    }

    async fn send_once(&self, request: &RemoteRequest, acquire_token: bool) -> Result<Response> {
        let token = if acquire_token {
            Some(self.bearer_token().await?)
        } else {
            self.auth.cached_token().await
        };

        let url = self.url(&request.segments, &self.auth.query_pairs(&request.query))?;
        let builder = self
            .http
            .request(method(request.method), url)
            .header(ACCEPT, "application/json")
            .headers(self.auth.headers(token.as_deref())?);
        let builder = attach_body(builder, &request.body).await?;

        Ok(builder.send().await?)
    }

    /// Cached token, or a fresh one from `POST /login`.
    async fn bearer_token(&self) -> Result<String> {
        if let Some(token) = self.auth.cached_token().await {
            return Ok(token);
        }
        let _guard = self.auth.login_guard().await;
        if let Some(token) = self.auth.cached_token().await {
            return Ok(token);
        }

        let credentials = self
            .auth
            .credentials()
            .ok_or_else(|| Error::configuration("bearer auth requires a username and password"))?;
        let url = self.url(&["login".to_string()], &[])?;
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ];
        let response = self
            .http
            .post(url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;
        let payload = parse_json(check_status(response).await?).await?;

        let token = extract_token(&payload)
            .ok_or_else(|| Error::malformed("login response carried no access token"))?;
        self.auth.store_token(token.clone()).await;
        debug!("Acquired bearer token");
        Ok(token)
    }
}

#[async_trait]
impl Transport for LightRagClient {
    #[instrument(skip_all, fields(method = %request.method, path = %request.display_path()))]
    async fn call(&self, request: RemoteRequest) -> Result<Value> {
        let response = self.send(&request).await?;
        let payload = parse_json(response).await?;

        if request.captures_token {
            if let Some(token) = extract_token(&payload) {
                self.auth.store_token(token).await;
                debug!("Stored bearer token from login response");
            }
        }
        Ok(payload)
    }

    #[instrument(skip_all, fields(method = %request.method, path = %request.display_path()))]
    async fn call_streaming(&self, request: RemoteRequest) -> Result<ChunkStream> {
        let response = self.send(&request).await?;
        Ok(lines(response.bytes_stream()))
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

async fn attach_body(
    builder: reqwest::RequestBuilder,
    body: &RequestBody,
) -> Result<reqwest::RequestBuilder> {
    Ok(match body {
        RequestBody::Empty => builder,
        RequestBody::Json(value) => builder.json(value),
        RequestBody::Form(pairs) => builder.form(pairs),
        RequestBody::File { part, arg, path } => {
            let is_file = tokio::fs::metadata(path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false);
            if !is_file {
                return Err(Error::invalid_argument(format!(
                    "Parameter '{}': file not found: {}",
                    arg,
                    path.display()
                )));
            }

            let contents = tokio::fs::read(path)
                .await
                .map_err(|e| unreadable_upload(arg, path, &e))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let file_part = reqwest::multipart::Part::bytes(contents)
                .file_name(file_name)
                .mime_str(mime_for(path))?;
            builder.multipart(reqwest::multipart::Form::new().part(part.clone(), file_part))
        }
    })
}

/// A local upload file that exists but cannot be read is the caller's problem.
fn unreadable_upload(arg: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::invalid_argument(format!(
        "Parameter '{}': cannot read {}: {}",
        arg,
        path.display(),
        err
    ))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Map non-2xx statuses to the error taxonomy; 2xx passes through.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = remote_message(status, &body);
    if status.is_client_error() {
        Err(Error::client_error(status.as_u16(), message))
    } else {
        Err(Error::service_unavailable(format!(
            "LightRAG returned {}: {}",
            status.as_u16(),
            message
        )))
    }
}

async fn parse_json(response: Response) -> Result<Value> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::malformed(format!("response body is not valid JSON: {}", e)))
}

/// Best human-readable message from an error body.
fn remote_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match map.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return truncate(trimmed, MAX_ERROR_BODY);
    }
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
