//! Tool infrastructure: catalog, endpoint templates and the enabled-set filter.
//!
//! The catalog owns tool metadata and the HTTP template behind each tool;
//! the filter narrows it to what the configuration enables.

pub mod catalog;
pub mod endpoint;
pub mod filter;
pub mod lightrag;

pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolDefinition};
pub use endpoint::{BodyMapping, EndpointTemplate, HttpMethod, RemoteRequest, RequestBody};
pub use filter::{filter, unknown_tools};
pub use lightrag::{lightrag_catalog, DEFAULT_ENABLED_TOOLS};
