//! MCP over stdio: newline-delimited JSON-RPC 2.0.
//!
//! Handles `initialize`, `ping`, `tools/list`, `tools/call` and
//! `notifications/cancelled`. Each `tools/call` runs in its own task and all
//! output goes through one writer so frames never interleave.

pub mod codec;
pub mod protocol;
pub mod server;

pub use server::McpServer;
