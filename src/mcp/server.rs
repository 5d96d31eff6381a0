//! MCP stdio server: read loop, per-call tasks and the single writer.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, ToolCallRequest};
use crate::mcp::codec::{read_frame, write_frame, Frame};
use crate::mcp::protocol::{
    self, CallToolParams, CancelledParams, IncomingMessage, InitializeParams, RequestId,
    INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::types::ServerConfig;

/// Outbound frames queued for the writer task.
const OUTBOUND_QUEUE: usize = 256;

type InFlight = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

/// MCP server over a pair of byte streams (normally stdin/stdout).
#[derive(Debug)]
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(dispatcher: Dispatcher, config: ServerConfig) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Serve one session until EOF on `reader` or [`shutdown`](Self::shutdown).
    ///
    /// In-flight calls are cancelled when the session ends; they produce no
    /// response.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut reader = BufReader::new(reader);
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let writer_task = tokio::spawn(write_loop(writer, out_rx));

        let session = Session {
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrent_calls.max(1))),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            out: out_tx,
            tracker: TaskTracker::new(),
            cancel: self.cancel.child_token(),
        };

        info!(
            tools = self.dispatcher.catalog().len(),
            max_concurrent_calls = self.config.max_concurrent_calls,
            "MCP server ready on stdio"
        );

        let read_result = loop {
            tokio::select! {
                _ = session.cancel.cancelled() => {
                    info!("MCP server shutting down");
                    break Ok(());
                }
                frame = read_frame(&mut reader, self.config.max_frame_bytes) => {
                    match frame {
                        Ok(None) => {
                            debug!("Input closed");
                            break Ok(());
                        }
                        Ok(Some(Frame::Oversized(len))) => {
                            warn!(len, limit = self.config.max_frame_bytes, "Dropping oversized message");
                            session
                                .send(protocol::error_response(
                                    None,
                                    PARSE_ERROR,
                                    format!(
                                        "Message of {} bytes exceeds limit of {} bytes",
                                        len, self.config.max_frame_bytes
                                    ),
                                ))
                                .await;
                        }
                        Ok(Some(Frame::Message(line))) => session.handle_line(&line).await,
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        // Abandon in-flight calls, then let the writer drain.
        session.cancel.cancel();
        session.tracker.close();
        session.tracker.wait().await;
        drop(session);

        let write_result = writer_task.await.map_err(std::io::Error::other)?;
        read_result.and(write_result)
    }

    /// Request shutdown of the running session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<Value>,
) -> std::io::Result<()> {
    while let Some(message) = rx.recv().await {
        write_frame(&mut writer, &message).await?;
    }
    Ok(())
}

struct Session {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    semaphore: Arc<Semaphore>,
    in_flight: InFlight,
    out: mpsc::Sender<Value>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Session {
    async fn send(&self, message: Value) {
        if self.out.send(message).await.is_err() {
            debug!("Writer closed, dropping outbound message");
        }
    }

    async fn handle_line(&self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(e) => {
                debug!("Unparseable message: {}", e);
                self.send(protocol::error_response(None, PARSE_ERROR, format!("Parse error: {}", e)))
                    .await;
                return;
            }
        };

        let message: IncomingMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                self.send(protocol::error_response(
                    None,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ))
                .await;
                return;
            }
        };

        if message.jsonrpc.as_deref().is_some_and(|v| v != JSONRPC_VERSION) {
            if let Some(id) = &message.id {
                self.send(protocol::error_response(
                    Some(id),
                    INVALID_REQUEST,
                    "Unsupported jsonrpc version",
                ))
                .await;
            }
            return;
        }

        let Some(method) = message.method else {
            debug!(id = ?message.id, "Ignoring client response");
            return;
        };

        match message.id {
            Some(id) => self.handle_request(id, &method, message.params).await,
            None => self.handle_notification(&method, message.params).await,
        }
    }

    async fn handle_request(&self, id: RequestId, method: &str, params: Value) {
        debug!(%id, method, "Request");
        match method {
            "initialize" => {
                let params: InitializeParams = if params.is_null() {
                    InitializeParams::default()
                } else {
                    match parse_params(&id, params) {
                        Ok(p) => p,
                        Err(reply) => return self.send(reply).await,
                    }
                };
                self.send(protocol::response(&id, protocol::initialize_result(&params)))
                    .await;
            }
            "ping" => self.send(protocol::response(&id, json!({}))).await,
            "tools/list" => {
                let tools = self.dispatcher.catalog().descriptors();
                self.send(protocol::response(&id, json!({ "tools": tools })))
                    .await;
            }
            "tools/call" => match parse_params::<CallToolParams>(&id, params) {
                Ok(params) => self.spawn_call(id, params).await,
                Err(reply) => self.send(reply).await,
            },
            other => {
                self.send(protocol::error_response(
                    Some(&id),
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                ))
                .await;
            }
        }
    }

    async fn handle_notification(&self, method: &str, params: Value) {
        match method {
            "notifications/cancelled" => match serde_json::from_value::<CancelledParams>(params) {
                Ok(params) => {
                    if let Some(token) = self.in_flight.lock().await.get(&params.request_id) {
                        debug!(id = %params.request_id, reason = ?params.reason, "Cancelling call");
                        token.cancel();
                    }
                }
                Err(e) => debug!("Ignoring malformed cancellation: {}", e),
            },
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    async fn spawn_call(&self, id: RequestId, params: CallToolParams) {
        let token = self.cancel.child_token();
        {
            let mut in_flight = self.in_flight.lock().await;
            if in_flight.contains_key(&id) {
                drop(in_flight);
                self.send(protocol::error_response(
                    Some(&id),
                    INVALID_REQUEST,
                    format!("Request id {} is already in flight", id),
                ))
                .await;
                return;
            }
            in_flight.insert(id.clone(), token.clone());
        }

        let dispatcher = self.dispatcher.clone();
        let semaphore = self.semaphore.clone();
        let in_flight = self.in_flight.clone();
        let out = self.out.clone();
        let progress_capacity = self.config.progress_channel_capacity.max(1);

        self.tracker.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = run_call(dispatcher, semaphore, out.clone(), params, progress_capacity) => Some(result),
            };
            in_flight.lock().await.remove(&id);

            match outcome {
                Some(result) => {
                    if out.send(protocol::response(&id, result)).await.is_err() {
                        debug!(%id, "Writer closed before response");
                    }
                }
                None => debug!(%id, "Call cancelled, no response sent"),
            }
        });
    }
}

/// Wait for a slot, dispatch, and build the `tools/call` result.
async fn run_call(
    dispatcher: Arc<Dispatcher>,
    semaphore: Arc<Semaphore>,
    out: mpsc::Sender<Value>,
    params: CallToolParams,
    progress_capacity: usize,
) -> Value {
    // The semaphore is never closed.
    let _permit = semaphore.acquire_owned().await.ok();

    let progress_token = params.progress_token().cloned();
    let request = ToolCallRequest::new(params.name, params.arguments);

    let result = match progress_token {
        None => dispatcher.dispatch(request, None).await,
        Some(progress_token) => {
            let (tx, mut rx) = mpsc::channel::<String>(progress_capacity);
            let forward = async move {
                let mut progress = 0u64;
                while let Some(chunk) = rx.recv().await {
                    progress += 1;
                    let note = protocol::progress_notification(&progress_token, progress, &chunk);
                    if out.send(note).await.is_err() {
                        break;
                    }
                }
            };
            let (result, ()) = tokio::join!(dispatcher.dispatch(request, Some(tx)), forward);
            result
        }
    };

    match result {
        Ok(payload) => protocol::tool_success(payload),
        Err(e) => protocol::tool_error(&e),
    }
}

fn parse_params<T: DeserializeOwned>(id: &RequestId, params: Value) -> Result<T, Value> {
    serde_json::from_value(params).map_err(|e| {
        protocol::error_response(Some(id), INVALID_PARAMS, format!("Invalid params: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{filter, lightrag_catalog, RemoteRequest};
    use crate::transport::{ChunkStream, MockTransport, Transport};
    use crate::types::Result;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream};

    fn dispatcher(enabled: &[&str], transport: Arc<dyn Transport>) -> Dispatcher {
        let enabled: BTreeSet<String> = enabled.iter().map(|s| s.to_string()).collect();
        let catalog = filter(&lightrag_catalog().unwrap(), &enabled);
        Dispatcher::new(Arc::new(catalog), transport)
    }

    struct Client {
        input: DuplexStream,
        output: tokio::io::Lines<BufReader<DuplexStream>>,
        server: tokio::task::JoinHandle<std::io::Result<()>>,
    }

    impl Client {
        fn start(server: McpServer) -> Self {
            let (input, server_in) = tokio::io::duplex(64 * 1024);
            let (server_out, output) = tokio::io::duplex(64 * 1024);
            let server = tokio::spawn(async move { server.serve(server_in, server_out).await });
            Self {
                input,
                output: BufReader::new(output).lines(),
                server,
            }
        }

        async fn send(&mut self, message: Value) {
            let mut line = serde_json::to_vec(&message).unwrap();
            line.push(b'\n');
            self.input.write_all(&line).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = tokio::time::timeout(Duration::from_secs(5), self.output.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    /// Transport that never answers and records when its future is dropped.
    struct HangingTransport {
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn call(&self, _request: RemoteRequest) -> Result<Value> {
            let _flag = DropFlag(self.dropped.clone());
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }

        async fn call_streaming(&self, _request: RemoteRequest) -> Result<ChunkStream> {
            Ok(futures::stream::empty().boxed())
        }
    }

    #[tokio::test]
    async fn test_ping_and_unknown_method() {
        let server = McpServer::new(
            dispatcher(&["health"], Arc::new(MockTransport::new())),
            ServerConfig::default(),
        );
        let mut client = Client::start(server);

        client.send(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
        assert_eq!(client.recv().await, json!({"jsonrpc": "2.0", "id": 1, "result": {}}));

        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
        let reply = client.recv().await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parse_error_keeps_session_alive() {
        let server = McpServer::new(
            dispatcher(&["health"], Arc::new(MockTransport::new())),
            ServerConfig::default(),
        );
        let mut client = Client::start(server);

        client.input.write_all(b"{not json\n").await.unwrap();
        let reply = client.recv().await;
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert!(reply["id"].is_null());

        client.send(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).await;
        assert_eq!(client.recv().await["id"], 3);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let config = ServerConfig {
            max_frame_bytes: 64,
            ..ServerConfig::default()
        };
        let server = McpServer::new(dispatcher(&["health"], Arc::new(MockTransport::new())), config);
        let mut client = Client::start(server);

        let padding = "x".repeat(200);
        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "ping", "params": {"pad": padding}}))
            .await;
        assert_eq!(client.recv().await["error"]["code"], PARSE_ERROR);

        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"})).await;
        assert_eq!(client.recv().await["id"], 2);
    }

    #[tokio::test]
    async fn test_invalid_call_params() {
        let server = McpServer::new(
            dispatcher(&["health"], Arc::new(MockTransport::new())),
            ServerConfig::default(),
        );
        let mut client = Client::start(server);

        client
            .send(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}}))
            .await;
        assert_eq!(client.recv().await["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_cancelled_call_gets_no_response_and_aborts_transport() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(HangingTransport {
            dropped: dropped.clone(),
        });
        let server = McpServer::new(dispatcher(&["health"], transport), ServerConfig::default());
        let mut client = Client::start(server);

        client
            .send(json!({"jsonrpc": "2.0", "id": 10, "method": "tools/call",
                         "params": {"name": "health", "arguments": {}}}))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        client
            .send(json!({"jsonrpc": "2.0", "method": "notifications/cancelled",
                         "params": {"requestId": 10, "reason": "user abort"}}))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": 11, "method": "ping"})).await;

        // The first frame after cancellation is the ping reply, not call 10.
        assert_eq!(client.recv().await["id"], 11);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_eof_cancels_in_flight_and_ends_session() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(HangingTransport {
            dropped: dropped.clone(),
        });
        let server = McpServer::new(dispatcher(&["health"], transport), ServerConfig::default());
        let mut client = Client::start(server);

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                         "params": {"name": "health"}}))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.input.shutdown().await.unwrap();
        drop(client.input);

        let result = tokio::time::timeout(Duration::from_secs(5), client.server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(client.output.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_progress_notifications_precede_result() {
        let mut transport = MockTransport::new();
        transport.expect_call_streaming().returning(|_| {
            Ok(futures::stream::iter(vec![Ok("one".to_string()), Ok("two".to_string())]).boxed())
        });
        let server = McpServer::new(dispatcher(&["query_stream"], Arc::new(transport)), ServerConfig::default());
        let mut client = Client::start(server);

        client
            .send(json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {
                "name": "query_stream",
                "arguments": {"query": "q"},
                "_meta": {"progressToken": "tok"}
            }}))
            .await;

        let first = client.recv().await;
        assert_eq!(first["method"], "notifications/progress");
        assert_eq!(first["params"]["progressToken"], "tok");
        assert_eq!(first["params"]["progress"], 1);
        assert_eq!(first["params"]["message"], "one");

        let second = client.recv().await;
        assert_eq!(second["params"]["message"], "two");

        let result = client.recv().await;
        assert_eq!(result["id"], 5);
        assert_eq!(result["result"]["structuredContent"], json!({"stream": "one\ntwo"}));
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_others() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = Arc::new(HangingTransport { dropped });
        let server = McpServer::new(dispatcher(&["health"], transport), ServerConfig::default());
        let mut client = Client::start(server);

        client
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "health"}}))
            .await;
        client.send(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;

        let reply = client.recv().await;
        assert_eq!(reply["id"], 2);
        assert_eq!(reply["result"]["tools"][0]["name"], "health");
    }
}
