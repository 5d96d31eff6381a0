//! Tool-call dispatch.
//!
//! Turns a `(tool name, arguments)` pair into exactly one remote call:
//! lookup in the filtered catalog, argument validation, default filling,
//! template rendering, then the transport. Every failure is an [`Error`]
//! whose kind the caller reports back to the MCP client.

use crate::tools::{RemoteRequest, ToolCatalog};
use crate::transport::Transport;
use crate::types::{Error, Result};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// A tool call as received from the MCP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub tool_name: String,
    /// Must be a JSON object; `null` is treated as `{}`.
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Success payload or a classified error.
pub type ToolCallResult = Result<Value>;

/// Lifecycle of one call. `Error` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Validated,
    Completed,
    Error,
}

/// Routes validated calls through the transport.
///
/// Holds only the filtered catalog, so a tool outside the enabled set is
/// `ToolNotFound` here even if LightRAG exposes it.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<ToolCatalog>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(catalog: Arc<ToolCatalog>, transport: Arc<dyn Transport>) -> Self {
        Self { catalog, transport }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Run one call to completion.
    ///
    /// For streaming tools each chunk is also sent on `progress` as it
    /// arrives; a closed receiver stops forwarding but not the call.
    pub async fn dispatch(
        &self,
        request: ToolCallRequest,
        progress: Option<mpsc::Sender<String>>,
    ) -> ToolCallResult {
        let call_id = Uuid::new_v4();
        let span = info_span!("dispatch", tool = %request.tool_name, call_id = %call_id);
        self.run(request, progress).instrument(span).await
    }

    async fn run(
        &self,
        request: ToolCallRequest,
        progress: Option<mpsc::Sender<String>>,
    ) -> ToolCallResult {
        debug!(state = ?DispatchState::Received, "Tool call received");
        let remote = self
            .prepare(request)
            .map_err(|e| failed(DispatchState::Received, e))?;
        debug!(state = ?DispatchState::Validated, path = %remote.display_path(), "Arguments validated");

        let outcome = if remote.streaming {
            self.collect_stream(remote, progress).await
        } else {
            self.transport.call(remote).await
        };

        match outcome {
            Ok(payload) => {
                debug!(state = ?DispatchState::Completed, "Tool call completed");
                Ok(payload)
            }
            Err(e) => Err(failed(DispatchState::Validated, e)),
        }
    }

    /// Lookup, validate, normalize and render. No I/O.
    pub fn prepare(&self, request: ToolCallRequest) -> Result<RemoteRequest> {
        let errors = self
            .catalog
            .validate_params(&request.tool_name, &request.arguments)?;
        if !errors.is_empty() {
            return Err(Error::InvalidArguments(errors));
        }

        let definition = self
            .catalog
            .get(&request.tool_name)
            .ok_or_else(|| Error::tool_not_found(&request.tool_name))?;

        let mut args = match request.arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        definition.normalize_args(&mut args);
        definition.endpoint.render(&args)
    }

    async fn collect_stream(
        &self,
        remote: RemoteRequest,
        mut progress: Option<mpsc::Sender<String>>,
    ) -> ToolCallResult {
        let mut stream = self.transport.call_streaming(remote).await?;
        let mut chunks = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(tx) = &progress {
                if tx.send(chunk.clone()).await.is_err() {
                    debug!("Progress receiver closed, buffering remaining chunks");
                    progress = None;
                }
            }
            chunks.push(chunk);
        }

        Ok(json!({ "stream": chunks.join("\n") }))
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.catalog.names())
            .finish_non_exhaustive()
    }
}

fn failed(state: DispatchState, err: Error) -> Error {
    debug!(from = ?state, to = ?DispatchState::Error, kind = %err.kind(), "Tool call failed: {}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{filter, lightrag_catalog, HttpMethod, RequestBody};
    use crate::transport::MockTransport;
    use crate::types::ErrorKind;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn dispatcher(enabled: &[&str], transport: MockTransport) -> Dispatcher {
        let enabled: BTreeSet<String> = enabled.iter().map(|s| s.to_string()).collect();
        let catalog = filter(&lightrag_catalog().unwrap(), &enabled);
        Dispatcher::new(Arc::new(catalog), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_tool_outside_enabled_set_not_found() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(0);

        let d = dispatcher(&["query"], transport);
        let err = d
            .dispatch(ToolCallRequest::new("documents_scan", json!({})), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolNotFound);
    }

    #[tokio::test]
    async fn test_query_success_passes_payload_through() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .withf(|req: &RemoteRequest| {
                req.method == HttpMethod::Post
                    && req.segments == vec!["query".to_string()]
                    && matches!(&req.body, RequestBody::Json(body)
                        if body["mode"] == "hybrid" && body["top_k"] == 5 && body["query"] == "What did we ingest?")
            })
            .times(1)
            .returning(|_| Ok(json!({"response": "Three documents about Rust."})));

        let d = dispatcher(&["query"], transport);
        let result = d
            .dispatch(
                ToolCallRequest::new(
                    "query",
                    json!({"query": "What did we ingest?", "mode": "hybrid", "top_k": 5}),
                ),
                None,
            )
            .await
            .unwrap();
        assert_eq!(result, json!({"response": "Three documents about Rust."}));
    }

    #[tokio::test]
    async fn test_missing_required_names_field_and_skips_transport() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(0);

        let d = dispatcher(&["query"], transport);
        let err = d
            .dispatch(ToolCallRequest::new("query", json!({"mode": "hybrid"})), None)
            .await
            .unwrap_err();

        match err {
            Error::InvalidArguments(errors) => {
                assert_eq!(errors, vec!["Missing required parameter: query".to_string()]);
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_offending_field_reported() {
        let d = dispatcher(&["query"], MockTransport::new());
        let err = d
            .dispatch(
                ToolCallRequest::new("query", json!({"mode": "sideways", "top_k": 0, "bogus": 1})),
                None,
            )
            .await
            .unwrap_err();

        let Error::InvalidArguments(errors) = err else {
            panic!("expected InvalidArguments");
        };
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("query")));
        assert!(errors.iter().any(|e| e.contains("mode")));
        assert!(errors.iter().any(|e| e.contains("top_k")));
        assert!(errors.iter().any(|e| e.contains("bogus")));
    }

    #[tokio::test]
    async fn test_non_object_arguments_rejected() {
        let d = dispatcher(&["health"], MockTransport::new());
        let err = d
            .dispatch(ToolCallRequest::new("health", json!([1, 2])), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }

    #[tokio::test]
    async fn test_null_arguments_are_empty_object() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .times(1)
            .returning(|_| Ok(json!({"status": "healthy"})));

        let d = dispatcher(&["health"], transport);
        let result = d
            .dispatch(ToolCallRequest::new("health", Value::Null), None)
            .await
            .unwrap();
        assert_eq!(result["status"], "healthy");
    }

    #[tokio::test]
    async fn test_defaults_filled_before_render() {
        let d = dispatcher(&["query"], MockTransport::new());
        let remote = d
            .prepare(ToolCallRequest::new("query", json!({"query": "q", "top_k": null})))
            .unwrap();

        let RequestBody::Json(body) = remote.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body, json!({"query": "q", "mode": "mix"}));
    }

    #[tokio::test]
    async fn test_transport_error_kind_preserved() {
        let mut transport = MockTransport::new();
        transport
            .expect_call()
            .times(1)
            .returning(|_| Err(Error::service_unavailable("LightRAG returned 503")));

        let d = dispatcher(&["documents_insert_text"], transport);
        let err = d
            .dispatch(
                ToolCallRequest::new("documents_insert_text", json!({"text": "hello"})),
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_streaming_buffers_and_forwards_progress() {
        let mut transport = MockTransport::new();
        transport.expect_call().times(0);
        transport
            .expect_call_streaming()
            .times(1)
            .returning(|_| {
                Ok(stream::iter(vec![Ok("{\"response\":\"a\"}".to_string()), Ok("{\"response\":\"b\"}".to_string())])
                    .boxed())
            });

        let d = dispatcher(&["query_stream"], transport);
        let (tx, mut rx) = mpsc::channel(8);
        let result = d
            .dispatch(ToolCallRequest::new("query_stream", json!({"query": "q"})), Some(tx))
            .await
            .unwrap();

        assert_eq!(result, json!({"stream": "{\"response\":\"a\"}\n{\"response\":\"b\"}"}));
        assert_eq!(rx.recv().await.as_deref(), Some("{\"response\":\"a\"}"));
        assert_eq!(rx.recv().await.as_deref(), Some("{\"response\":\"b\"}"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_stream_error_fails_call() {
        let mut transport = MockTransport::new();
        transport.expect_call_streaming().returning(|_| {
            Ok(stream::iter(vec![
                Ok("partial".to_string()),
                Err(Error::malformed("stream chunk is not valid UTF-8")),
            ])
            .boxed())
        });

        let d = dispatcher(&["query_stream"], transport);
        let err = d
            .dispatch(ToolCallRequest::new("query_stream", json!({"query": "q"})), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_closed_progress_receiver_does_not_fail_call() {
        let mut transport = MockTransport::new();
        transport.expect_call_streaming().returning(|_| {
            Ok(stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]).boxed())
        });

        let d = dispatcher(&["query_stream"], transport);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = d
            .dispatch(ToolCallRequest::new("query_stream", json!({"query": "q"})), Some(tx))
            .await
            .unwrap();
        assert_eq!(result, json!({"stream": "a\nb"}));
    }

    #[test]
    fn test_debug_lists_tools() {
        let d = dispatcher(&["health", "query"], MockTransport::new());
        assert!(format!("{:?}", d).contains("health"));
    }
}
