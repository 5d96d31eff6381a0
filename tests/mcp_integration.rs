//! MCP integration tests: stdio frames through the dispatcher and reqwest to a fake LightRAG.

use lightrag_mcp::mcp::McpServer;
use lightrag_mcp::resolver::{resolve, CliOverrides, ConfigSources};
use lightrag_mcp::tools::{filter, lightrag_catalog};
use lightrag_mcp::transport::LightRagClient;
use lightrag_mcp::types::{EffectiveConfig, ServerConfig};
use lightrag_mcp::Dispatcher;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper: one MCP session against a running server task.
struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    next_id: i64,
}

impl Session {
    fn start(config: &EffectiveConfig) -> Self {
        let catalog = lightrag_catalog().unwrap();
        let enabled = filter(&catalog, &config.enabled_tools);
        let transport = LightRagClient::new(config).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(enabled), Arc::new(transport));
        let server = McpServer::new(dispatcher, ServerConfig::default());

        let (input, server_in) = tokio::io::duplex(256 * 1024);
        let (server_out, output) = tokio::io::duplex(256 * 1024);
        tokio::spawn(async move {
            let _ = server.serve(server_in, server_out).await;
        });

        Self {
            input,
            output: BufReader::new(output).lines(),
            next_id: 1,
        }
    }

    async fn write(&mut self, message: Value) {
        let mut line = serde_json::to_vec(&message).unwrap();
        line.push(b'\n');
        self.input.write_all(&line).await.unwrap();
    }

    async fn read(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(10), self.output.next_line())
            .await
            .expect("response within timeout")
            .unwrap()
            .expect("server closed output");
        serde_json::from_str(&line).unwrap()
    }

    /// Send a request and return its `result`.
    async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.write(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        let reply = self.read().await;
        assert_eq!(reply["id"], id);
        reply["result"].clone()
    }

    async fn call(&mut self, name: &str, arguments: Value) -> Value {
        self.request("tools/call", json!({"name": name, "arguments": arguments}))
            .await
    }
}

fn config(server: &MockServer, tools: &[&str]) -> EffectiveConfig {
    EffectiveConfig::new(server.uri(), tools.iter().copied())
}

fn tool_names(list: &Value) -> Vec<String> {
    list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_initialize_and_list_enabled_tools() {
    let server = MockServer::start().await;
    let mut session = Session::start(&config(&server, &["query", "health", "graph_labels"]));

    let init = session
        .request(
            "initialize",
            json!({"protocolVersion": "2025-03-26", "capabilities": {}, "clientInfo": {"name": "t", "version": "0"}}),
        )
        .await;
    assert_eq!(init["protocolVersion"], "2025-03-26");
    assert_eq!(init["serverInfo"]["name"], "lightrag-mcp");
    assert_eq!(init["capabilities"]["tools"]["listChanged"], false);

    session
        .write(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await;

    let list = session.request("tools/list", json!({})).await;
    assert_eq!(tool_names(&list), vec!["graph_labels", "health", "query"]);

    let query = &list["tools"][2];
    assert_eq!(query["inputSchema"]["type"], "object");
    assert_eq!(query["inputSchema"]["required"], json!(["query"]));
}

#[tokio::test]
async fn test_disabled_tool_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/scan"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["query"]));

    let result = session.call("documents_scan", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "tool_not_found");
}

#[tokio::test]
async fn test_query_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({"query": "What did we ingest?", "mode": "hybrid", "top_k": 5})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "Two PDFs about Rust."})),
        )
        .expect(1)
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["query"]));

    let result = session
        .call(
            "query",
            json!({"query": "What did we ingest?", "mode": "hybrid", "top_k": 5}),
        )
        .await;

    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"], json!({"response": "Two PDFs about Rust."}));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({"response": "Two PDFs about Rust."}));
}

#[tokio::test]
async fn test_query_missing_required_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["query"]));

    let result = session.call("query", json!({"mode": "hybrid"})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "invalid_arguments");
    assert!(result["structuredContent"]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("query"));
}

#[tokio::test]
async fn test_service_unavailable_not_retried_for_mutation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents/text"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "pipeline busy"})))
        .expect(1)
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["documents_insert_text"]));

    let result = session
        .call("documents_insert_text", json!({"text": "hello"}))
        .await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["error"]["kind"], "service_unavailable");

    // Session survives a per-call error.
    let list = session.request("tools/list", json!({})).await;
    assert_eq!(tool_names(&list), vec!["documents_insert_text"]);
}

#[tokio::test]
async fn test_client_error_reports_remote_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/track_status/missing-id"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "track id not found"})))
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["documents_track_status"]));

    let result = session
        .call("documents_track_status", json!({"track_id": "missing-id"}))
        .await;
    assert_eq!(result["structuredContent"]["error"]["kind"], "client_error");
    assert_eq!(
        result["content"][0]["text"],
        "client_error: HTTP 404: track id not found"
    );
}

#[tokio::test]
async fn test_query_params_carry_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphs"))
        .and(query_param("label", "Rust"))
        .and(query_param("max_depth", "3"))
        .and(query_param("max_nodes", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": [], "edges": []})))
        .expect(1)
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["graphs_get"]));

    let result = session.call("graphs_get", json!({"label": "Rust"})).await;
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"]["nodes"], json!([]));
}

#[tokio::test]
async fn test_yaml_commented_tool_not_advertised() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("lightrag-mcp.yaml"),
        format!(
            "base_url: {}\nenabled_tools:\n  - query\n  # - documents_scan\n",
            server.uri()
        ),
    )
    .unwrap();

    let catalog = lightrag_catalog().unwrap();
    let sources = ConfigSources::load(CliOverrides::default(), Vec::new(), dir.path()).unwrap();
    let effective = resolve(&sources, &catalog).unwrap();
    let mut session = Session::start(&effective);

    let list = session.request("tools/list", json!({})).await;
    assert_eq!(tool_names(&list), vec!["query"]);

    let result = session.call("documents_scan", json!({})).await;
    assert_eq!(result["structuredContent"]["error"]["kind"], "tool_not_found");
}

#[tokio::test]
async fn test_streaming_query_collects_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n"),
        )
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["query_stream"]));

    let result = session.call("query_stream", json!({"query": "hi"})).await;
    assert_eq!(
        result["structuredContent"],
        json!({"stream": "{\"response\":\"Hel\"}\n{\"response\":\"lo\"}"})
    );
}

#[tokio::test]
async fn test_concurrent_calls_answered_independently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graph/label/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["Rust"]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;
    let mut session = Session::start(&config(&server, &["graph_labels", "health"]));

    session
        .write(json!({"jsonrpc": "2.0", "id": "slow", "method": "tools/call",
                      "params": {"name": "graph_labels"}}))
        .await;
    session
        .write(json!({"jsonrpc": "2.0", "id": "fast", "method": "tools/call",
                      "params": {"name": "health"}}))
        .await;

    let first = session.read().await;
    let second = session.read().await;
    assert_eq!(first["id"], "fast");
    assert_eq!(second["id"], "slow");
    assert_eq!(second["result"]["structuredContent"], json!({"result": ["Rust"]}));
}
