//! HTTP-call templates attached to catalog entries.
//!
//! A template renders validated arguments into a [`RemoteRequest`]: path
//! parameters come out of `{name}` segments, the remaining arguments go where
//! the [`BodyMapping`] says.

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// HTTP method of the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    /// Safe to resend without duplicating side effects on the remote.
    pub fn is_idempotent(self) -> bool {
        matches!(self, HttpMethod::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the non-path arguments of a call go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BodyMapping {
    /// No body.
    None,
    /// Literal `{}` JSON body.
    EmptyJson,
    /// All arguments as one JSON object.
    Json,
    /// Arguments as URL query parameters.
    Query,
    /// Arguments as an urlencoded form.
    Form,
    /// The value of a single argument is the whole JSON body.
    Field { name: String },
    /// A local file read from `path_arg`, uploaded as multipart part `part`.
    Multipart { part: String, path_arg: String },
}

/// Method, path pattern and body mapping for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTemplate {
    pub method: HttpMethod,
    /// Path relative to the base URL, e.g. `/documents/track_status/{track_id}`.
    pub path: String,
    pub body: BodyMapping,
    /// Remote streams line-delimited partial results.
    #[serde(default)]
    pub streaming: bool,
    /// Successful responses carry a bearer token to cache for later calls.
    #[serde(default)]
    pub captures_token: bool,
}

impl EndpointTemplate {
    pub fn new(method: HttpMethod, path: &str, body: BodyMapping) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            streaming: false,
            captures_token: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(HttpMethod::Get, path, BodyMapping::None)
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn capturing_token(mut self) -> Self {
        self.captures_token = true;
        self
    }

    /// Names of `{param}` placeholders in the path.
    pub fn path_params(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter_map(placeholder)
    }

    /// Render validated, normalized arguments into a concrete request.
    pub fn render(&self, args: &Map<String, Value>) -> Result<RemoteRequest> {
        let mut remaining = args.clone();
        let mut segments = Vec::new();

        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            match placeholder(segment) {
                Some(name) => {
                    let value = remaining.remove(name).ok_or_else(|| {
                        Error::invalid_argument(format!("Missing required parameter: {}", name))
                    })?;
                    segments.push(scalar_to_string(name, &value)?);
                }
                None => segments.push(segment.to_string()),
            }
        }

        let mut query = Vec::new();
        let body = match &self.body {
            BodyMapping::None => RequestBody::Empty,
            BodyMapping::EmptyJson => RequestBody::Json(Value::Object(Map::new())),
            BodyMapping::Json => RequestBody::Json(Value::Object(remaining)),
            BodyMapping::Query => {
                query = to_pairs(&remaining)?;
                RequestBody::Empty
            }
            BodyMapping::Form => RequestBody::Form(to_pairs(&remaining)?),
            BodyMapping::Field { name } => {
                let value = remaining.remove(name).ok_or_else(|| {
                    Error::invalid_argument(format!("Missing required parameter: {}", name))
                })?;
                RequestBody::Json(value)
            }
            BodyMapping::Multipart { part, path_arg } => {
                let path = remaining
                    .get(path_arg)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        Error::invalid_argument(format!("Missing required parameter: {}", path_arg))
                    })?;
                RequestBody::File {
                    part: part.clone(),
                    arg: path_arg.clone(),
                    path: PathBuf::from(path),
                }
            }
        };

        Ok(RemoteRequest {
            method: self.method,
            segments,
            query,
            body,
            streaming: self.streaming,
            captures_token: self.captures_token,
        })
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

fn scalar_to_string(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::invalid_argument(format!(
            "Parameter '{}': expected a scalar value",
            name
        ))),
    }
}

fn to_pairs(args: &Map<String, Value>) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|(k, v)| Ok((k.clone(), scalar_to_string(k, v)?)))
        .collect()
}

/// Body of a rendered request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    /// Local file to upload; `arg` names the argument it came from.
    File {
        part: String,
        arg: String,
        path: PathBuf,
    },
}

/// A concrete outbound call, independent of base URL and auth.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: HttpMethod,
    /// Unencoded path segments; the transport percent-encodes them.
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub streaming: bool,
    pub captures_token: bool,
}

impl RemoteRequest {
    pub fn new(method: HttpMethod, path: &str, body: RequestBody) -> Self {
        Self {
            method,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
            body,
            streaming: false,
            captures_token: false,
        }
    }

    /// Path for logs, e.g. `/documents/track_status/abc`.
    pub fn display_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}
