//! Outbound HTTP transport to the LightRAG API.
//!
//! [`Transport`] is the seam the dispatcher calls through; [`LightRagClient`]
//! is the reqwest-backed implementation. Every failure comes back as an
//! [`Error`](crate::types::Error) already classified by kind.

mod auth;
mod client;
mod stream;

pub use auth::{extract_token, AuthState};
pub use client::LightRagClient;
pub use stream::lines;

use crate::tools::RemoteRequest;
use crate::types::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Lazy, finite, non-restartable sequence of streamed text chunks.
pub type ChunkStream = BoxStream<'static, Result<String>>;

/// One remote call per invocation; implementations own auth, timeouts and
/// response normalization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call and return the parsed JSON body.
    async fn call(&self, request: RemoteRequest) -> Result<Value>;

    /// Perform the call and return the body as a stream of lines.
    async fn call_streaming(&self, request: RemoteRequest) -> Result<ChunkStream>;
}
