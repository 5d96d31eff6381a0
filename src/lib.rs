//! # lightrag-mcp - MCP adapter for the LightRAG HTTP API
//!
//! Exposes LightRAG's document, query, graph and Ollama-compatible endpoints
//! as Model Context Protocol tools over stdio:
//! - Fixed tool catalog with typed parameter schemas and endpoint templates
//! - Enabled-set filtering driven by CLI, environment, YAML and `.env`
//! - Argument validation before any remote call is made
//! - reqwest transport with API-key or OAuth2 bearer auth and bounded timeouts
//! - Concurrent, cancellable tool calls with streamed progress
//!
//! ## Architecture
//!
//! ```text
//!   stdin ──► McpServer ──► Dispatcher ──► Transport ──► LightRAG
//!               │  (task per call)  │ filtered      (reqwest)
//!   stdout ◄── writer ◄─────────────┘ ToolCatalog
//! ```
//!
//! Configuration is resolved once by [`resolver::resolve`] into an immutable
//! [`EffectiveConfig`](types::EffectiveConfig) and shared through `Arc`.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod dispatch;
pub mod mcp;
pub mod resolver;
pub mod tools;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;
pub mod validation;

pub use dispatch::{Dispatcher, ToolCallRequest, ToolCallResult};
pub use types::{EffectiveConfig, Error, ErrorKind, Result};
