//! Core types for the LightRAG MCP adapter.
//!
//! - **Errors**: the error taxonomy and `ErrorKind` classification
//! - **Config**: the effective configuration and server limits

mod config;
mod errors;

pub use config::{
    AuthMode, Credentials, EffectiveConfig, ServerConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
};
pub use errors::{Error, ErrorKind, Result};
