//! LightRAG MCP server - stdio entry point.
//!
//! Resolves configuration, builds the filtered tool catalog and serves MCP
//! on stdin/stdout until EOF or Ctrl-C. Configuration errors exit non-zero
//! before any protocol traffic.

use clap::Parser;
use lightrag_mcp::mcp::McpServer;
use lightrag_mcp::resolver::{self, CliOverrides, ConfigSources};
use lightrag_mcp::tools::{filter, lightrag_catalog};
use lightrag_mcp::transport::LightRagClient;
use lightrag_mcp::types::ServerConfig;
use lightrag_mcp::Dispatcher;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// MCP stdio server for the LightRAG HTTP API.
#[derive(Debug, Parser)]
#[command(name = "lightrag-mcp", version, about)]
struct Cli {
    /// LightRAG base URL [env: LIGHTRAG_BASE_URL] [default: http://localhost:9621]
    #[arg(long)]
    service_url: Option<String>,

    /// API key sent as X-API-Key [env: LIGHTRAG_API_KEY]
    #[arg(long)]
    key: Option<String>,

    /// Comma-separated tools to enable, or "all" [env: LIGHTRAG_TOOLS]
    #[arg(long)]
    tools: Option<String>,

    /// none | api_key_header | oauth2_bearer [env: LIGHTRAG_AUTH_MODE]
    #[arg(long)]
    auth_mode: Option<String>,

    /// Username for OAuth2 login [env: LIGHTRAG_USERNAME]
    #[arg(long)]
    username: Option<String>,

    /// Password for OAuth2 login [env: LIGHTRAG_PASSWORD]
    #[arg(long)]
    password: Option<String>,

    /// Outbound call timeout, e.g. 150s or 2m [env: LIGHTRAG_TIMEOUT]
    #[arg(long)]
    timeout: Option<String>,

    /// YAML config file [env: LIGHTRAG_MCP_CONFIG] [default: ./lightrag-mcp.yaml]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// .env file [default: ./.env]
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Print the enabled tools as JSON and exit
    #[arg(long)]
    list_tools: bool,
}

impl From<Cli> for CliOverrides {
    fn from(cli: Cli) -> Self {
        Self {
            service_url: cli.service_url,
            key: cli.key,
            tools: cli.tools,
            auth_mode: cli.auth_mode,
            username: cli.username,
            password: cli.password,
            timeout: cli.timeout,
            config_file: cli.config,
            env_file: cli.env_file,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let list_tools = cli.list_tools;

    // Initialize observability
    lightrag_mcp::observability::init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("lightrag-mcp: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli.into(), list_tools));
    // A blocking stdin read may still be parked; don't wait on it.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("lightrag-mcp: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: CliOverrides, list_tools: bool) -> lightrag_mcp::Result<()> {
    let catalog = lightrag_catalog()?;
    let sources = ConfigSources::gather(cli)?;
    let config = resolver::resolve(&sources, &catalog)?;
    let enabled = filter(&catalog, &config.enabled_tools);

    if list_tools {
        let listing = serde_json::json!({ "tools": enabled.descriptors() });
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    tracing::info!(
        base_url = %config.base_url,
        auth_mode = ?config.auth_mode,
        timeout = ?config.timeout,
        tools = ?enabled.names(),
        "Configuration resolved"
    );

    let transport = LightRagClient::new(&config)?;
    let dispatcher = Dispatcher::new(Arc::new(enabled), Arc::new(transport));
    let server = Arc::new(McpServer::new(dispatcher, ServerConfig::default()));

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            signal_server.shutdown();
        }
    });

    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
