//! The LightRAG tool table.
//!
//! One entry per documented LightRAG HTTP endpoint. Adding a tool means
//! adding an entry here; dispatch is driven entirely by the entry's template.

use crate::tools::catalog::{ParamDef, ParamType, ToolCatalog, ToolDefinition};
use crate::tools::endpoint::{BodyMapping, EndpointTemplate, HttpMethod};
use crate::types::Result;
use serde_json::json;

/// Tools enabled when no source supplies an enable-list.
///
/// Non-destructive and free of local file access.
pub const DEFAULT_ENABLED_TOOLS: &[&str] = &[
    "health",
    "auth_status",
    "documents_insert_text",
    "documents_insert_texts",
    "documents_list_statuses",
    "documents_pipeline_status",
    "documents_track_status",
    "documents_paginated",
    "documents_status_counts",
    "query",
    "query_stream",
    "graph_labels",
    "graphs_get",
    "graph_entity_exists",
];

const QUERY_MODES: &[&str] = &["local", "global", "hybrid", "naive", "mix", "bypass"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn post_json(path: &str) -> EndpointTemplate {
    EndpointTemplate::new(HttpMethod::Post, path, BodyMapping::Json)
}

fn post_empty(path: &str) -> EndpointTemplate {
    EndpointTemplate::new(HttpMethod::Post, path, BodyMapping::EmptyJson)
}

fn delete_json(path: &str) -> EndpointTemplate {
    EndpointTemplate::new(HttpMethod::Delete, path, BodyMapping::Json)
}

fn get_query(path: &str) -> EndpointTemplate {
    EndpointTemplate::new(HttpMethod::Get, path, BodyMapping::Query)
}

fn post_field(path: &str, name: &str) -> EndpointTemplate {
    EndpointTemplate::new(
        HttpMethod::Post,
        path,
        BodyMapping::Field {
            name: name.to_string(),
        },
    )
}

fn positive() -> ParamType {
    ParamType::BoundedInt { min: 1, max: None }
}

/// Attach the shared `QueryRequest` fields used by `/query` and `/query/stream`.
fn query_request(tool: ToolDefinition) -> ToolDefinition {
    tool.param(ParamDef::required("query", ParamType::String, "The question to answer"))
        .param(
            ParamDef::required("mode", ParamType::Enum(strings(QUERY_MODES)), "Retrieval mode")
                .with_default(json!("mix")),
        )
        .param(ParamDef::optional(
            "only_need_context",
            ParamType::Bool,
            "Return retrieved context only",
        ))
        .param(ParamDef::optional(
            "only_need_prompt",
            ParamType::Bool,
            "Return the generated prompt only",
        ))
        .param(ParamDef::optional(
            "response_type",
            ParamType::String,
            "e.g. 'Multiple Paragraphs', 'Bullet Points'",
        ))
        .param(ParamDef::optional("top_k", positive(), "Entities/relations to retrieve"))
        .param(ParamDef::optional("chunk_top_k", positive(), "Text chunks to retrieve"))
        .param(ParamDef::optional("max_entity_tokens", positive(), ""))
        .param(ParamDef::optional("max_relation_tokens", positive(), ""))
        .param(ParamDef::optional("max_total_tokens", positive(), ""))
        .param(ParamDef::optional(
            "conversation_history",
            ParamType::ObjectList,
            "Prior turns as {role, content} objects",
        ))
        .param(ParamDef::optional(
            "history_turns",
            ParamType::BoundedInt { min: 0, max: None },
            "",
        ))
        .param(ParamDef::optional("ids", ParamType::StringList, "Restrict to document ids"))
        .param(ParamDef::optional("user_prompt", ParamType::String, ""))
        .param(ParamDef::optional("enable_rerank", ParamType::Bool, ""))
}

fn system_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "health",
            "Get current system status (GET /health).\nExample input: {}",
            EndpointTemplate::get("/health"),
        ),
        ToolDefinition::new(
            "auth_status",
            "Get authentication status and guest token if auth is not configured (GET /auth-status).\nExample input: {}",
            EndpointTemplate::get("/auth-status"),
        ),
        ToolDefinition::new(
            "auth_login",
            "Login via OAuth2 password flow (POST /login). Stores the Bearer token for this session.\nExample input: {\"username\":\"admin\", \"password\":\"secret\"}",
            EndpointTemplate::new(HttpMethod::Post, "/login", BodyMapping::Form).capturing_token(),
        )
        .param(ParamDef::required("username", ParamType::String, ""))
        .param(ParamDef::required("password", ParamType::String, ""))
        .param(ParamDef::required("scope", ParamType::String, "").with_default(json!(""))),
    ]
}

fn document_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "documents_scan",
            "Trigger scanning the input directory (POST /documents/scan).\nExample input: {}",
            post_empty("/documents/scan"),
        ),
        ToolDefinition::new(
            "documents_upload_file",
            "Upload one local file to the input dir and index it (POST /documents/upload).\nExample input: {\"file_path\": \"/path/to/file.pdf\"}",
            EndpointTemplate::new(
                HttpMethod::Post,
                "/documents/upload",
                BodyMapping::Multipart {
                    part: "file".to_string(),
                    path_arg: "file_path".to_string(),
                },
            ),
        )
        .param(ParamDef::required("file_path", ParamType::String, "Local path to upload")),
        ToolDefinition::new(
            "documents_insert_text",
            "Insert a single text (POST /documents/text).\nExample input: {\"text\":\"hello\", \"file_source\":\"notes.txt\"}",
            post_json("/documents/text"),
        )
        .param(ParamDef::required("text", ParamType::String, ""))
        .param(ParamDef::optional("file_source", ParamType::String, "")),
        ToolDefinition::new(
            "documents_insert_texts",
            "Insert multiple texts (POST /documents/texts).\nExample input: {\"texts\":[\"a\",\"b\"], \"file_sources\":[\"a.txt\",\"b.txt\"]}",
            post_json("/documents/texts"),
        )
        .param(ParamDef::required("texts", ParamType::StringList, ""))
        .param(ParamDef::optional("file_sources", ParamType::StringList, "")),
        ToolDefinition::new(
            "documents_clear_all",
            "Clear ALL documents and files (DELETE /documents). Irreversible.\nExample input: {}",
            EndpointTemplate::new(HttpMethod::Delete, "/documents", BodyMapping::None),
        ),
        ToolDefinition::new(
            "documents_list_statuses",
            "List documents grouped by processing status (GET /documents).\nExample input: {}",
            EndpointTemplate::get("/documents"),
        ),
        ToolDefinition::new(
            "documents_pipeline_status",
            "Get pipeline status/progress (GET /documents/pipeline_status).\nExample input: {}",
            EndpointTemplate::get("/documents/pipeline_status"),
        ),
        ToolDefinition::new(
            "documents_delete_by_ids",
            "Delete specific documents (DELETE /documents/delete_document).\nExample input: {\"doc_ids\":[\"doc_123\"], \"delete_file\": false}",
            delete_json("/documents/delete_document"),
        )
        .param(ParamDef::required("doc_ids", ParamType::StringList, ""))
        .param(ParamDef::required("delete_file", ParamType::Bool, "").with_default(json!(false))),
        ToolDefinition::new(
            "documents_clear_cache",
            "Clear LLM cache (POST /documents/clear_cache).\nExample input: {}",
            post_empty("/documents/clear_cache"),
        ),
        ToolDefinition::new(
            "documents_delete_entity",
            "Delete an entity from the knowledge graph (DELETE /documents/delete_entity).\nExample input: {\"entity_name\":\"Apple Inc.\"}",
            delete_json("/documents/delete_entity"),
        )
        .param(ParamDef::required("entity_name", ParamType::String, "")),
        ToolDefinition::new(
            "documents_delete_relation",
            "Delete a relation from the knowledge graph (DELETE /documents/delete_relation).\nExample input: {\"source_entity\":\"A\", \"target_entity\":\"B\"}",
            delete_json("/documents/delete_relation"),
        )
        .param(ParamDef::required("source_entity", ParamType::String, ""))
        .param(ParamDef::required("target_entity", ParamType::String, "")),
        ToolDefinition::new(
            "documents_track_status",
            "Track processing status by track_id (GET /documents/track_status/{track_id}).\nExample input: {\"track_id\":\"upload_20250729_170612_abc123\"}",
            EndpointTemplate::get("/documents/track_status/{track_id}"),
        )
        .param(ParamDef::required("track_id", ParamType::String, "")),
        ToolDefinition::new(
            "documents_paginated",
            "Paginated documents query (POST /documents/paginated).\nExample input: {\"page\":1,\"page_size\":50,\"sort_field\":\"updated_at\",\"sort_direction\":\"desc\"}",
            post_json("/documents/paginated"),
        )
        .param(ParamDef::optional(
            "status_filter",
            ParamType::Enum(strings(&["pending", "processing", "processed", "failed"])),
            "",
        ))
        .param(ParamDef::required("page", positive(), "").with_default(json!(1)))
        .param(
            ParamDef::required("page_size", ParamType::BoundedInt { min: 10, max: Some(200) }, "")
                .with_default(json!(50)),
        )
        .param(
            ParamDef::required(
                "sort_field",
                ParamType::Enum(strings(&["created_at", "updated_at", "id", "file_path"])),
                "",
            )
            .with_default(json!("updated_at")),
        )
        .param(
            ParamDef::required("sort_direction", ParamType::Enum(strings(&["asc", "desc"])), "")
                .with_default(json!("desc")),
        ),
        ToolDefinition::new(
            "documents_status_counts",
            "Counts of documents by status (GET /documents/status_counts).\nExample input: {}",
            EndpointTemplate::get("/documents/status_counts"),
        ),
    ]
}

fn query_tools() -> Vec<ToolDefinition> {
    vec![
        query_request(ToolDefinition::new(
            "query",
            "RAG query (POST /query). Returns the remote JSON, typically {response}.\nExample input: {\"query\":\"Summarize recent docs\", \"mode\":\"hybrid\", \"top_k\":5, \"only_need_context\": false}",
            post_json("/query"),
        )),
        query_request(ToolDefinition::new(
            "query_stream",
            "Streamed RAG query (POST /query/stream). Returns {stream} with the streamed lines joined.\nExample input: {\"query\":\"Show citations\", \"mode\":\"hybrid\"}",
            post_json("/query/stream").streaming(),
        )),
    ]
}

fn graph_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "graph_labels",
            "List graph labels (GET /graph/label/list).\nExample input: {}",
            EndpointTemplate::get("/graph/label/list"),
        ),
        ToolDefinition::new(
            "graphs_get",
            "Retrieve subgraph by label (GET /graphs).\nExample input: {\"label\":\"OpenAI\", \"max_depth\":3, \"max_nodes\":100}",
            get_query("/graphs"),
        )
        .param(ParamDef::required("label", ParamType::String, ""))
        .param(ParamDef::required("max_depth", positive(), "").with_default(json!(3)))
        .param(ParamDef::required("max_nodes", positive(), "").with_default(json!(1000))),
        ToolDefinition::new(
            "graph_entity_exists",
            "Check if an entity exists (GET /graph/entity/exists).\nExample input: {\"name\":\"Apple Inc.\"}",
            get_query("/graph/entity/exists"),
        )
        .param(ParamDef::required("name", ParamType::String, "")),
        ToolDefinition::new(
            "graph_update_entity",
            "Update entity properties (POST /graph/entity/edit).\nExample input: {\"entity_name\":\"Apple\", \"updated_data\":{\"aliases\":[\"Apple Inc\"]}, \"allow_rename\": false}",
            post_json("/graph/entity/edit"),
        )
        .param(ParamDef::required("entity_name", ParamType::String, ""))
        .param(ParamDef::required("updated_data", ParamType::Object, ""))
        .param(ParamDef::required("allow_rename", ParamType::Bool, "").with_default(json!(false))),
        ToolDefinition::new(
            "graph_update_relation",
            "Update relation properties (POST /graph/relation/edit).\nExample input: {\"source_id\":\"e1\", \"target_id\":\"e2\", \"updated_data\":{\"weight\":0.9}}",
            post_json("/graph/relation/edit"),
        )
        .param(ParamDef::required("source_id", ParamType::String, ""))
        .param(ParamDef::required("target_id", ParamType::String, ""))
        .param(ParamDef::required("updated_data", ParamType::Object, "")),
    ]
}

fn ollama_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "ollama_version",
            "Get Ollama version info (GET /api/version).\nExample input: {}",
            EndpointTemplate::get("/api/version"),
        ),
        ToolDefinition::new(
            "ollama_tags",
            "List available models (GET /api/tags).\nExample input: {}",
            EndpointTemplate::get("/api/tags"),
        ),
        ToolDefinition::new(
            "ollama_ps",
            "List running models (GET /api/ps).\nExample input: {}",
            EndpointTemplate::get("/api/ps"),
        ),
        ToolDefinition::new(
            "ollama_generate",
            "Direct completion to the underlying LLM (POST /api/generate).\nExample input: {\"payload\": {\"model\":\"qwen\", \"prompt\":\"Hello\"}}",
            post_field("/api/generate", "payload"),
        )
        .param(ParamDef::required("payload", ParamType::Object, "Ollama request body")),
        ToolDefinition::new(
            "ollama_chat",
            "Chat completion (POST /api/chat).\nExample input: {\"payload\": {\"model\":\"qwen\", \"messages\":[{\"role\":\"user\", \"content\":\"hi\"}]}}",
            post_field("/api/chat", "payload"),
        )
        .param(ParamDef::required("payload", ParamType::Object, "Ollama request body")),
    ]
}

/// Build the full LightRAG catalog.
pub fn lightrag_catalog() -> Result<ToolCatalog> {
    ToolCatalog::from_definitions(
        system_tools()
            .into_iter()
            .chain(document_tools())
            .chain(query_tools())
            .chain(graph_tools())
            .chain(ollama_tools()),
    )
}
