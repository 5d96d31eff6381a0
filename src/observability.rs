//! Observability utilities.
//!
//! Stdout carries the MCP protocol, so every log line goes to stderr.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Env var selecting the log format (`json` or anything else for compact text).
pub const LOG_FORMAT_ENV: &str = "LIGHTRAG_MCP_LOG_FORMAT";

/// Initialize tracing subscriber once for the process.
///
/// Log format defaults to compact text and can be switched to JSON via
/// `LIGHTRAG_MCP_LOG_FORMAT=json`. Filter defaults to `info` if `RUST_LOG`
/// is unset.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let result = if json_requested(std::env::var(LOG_FORMAT_ENV).ok().as_deref()) {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

fn json_requested(value: Option<&str>) -> bool {
    value.map(|v| v.trim().eq_ignore_ascii_case("json")).unwrap_or(false)
}
