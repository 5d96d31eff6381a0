//! Tool catalog: typed metadata, parameter validation and schema rendering.
//!
//! Every entry pairs the caller-facing contract (name, description,
//! parameters) with the [`EndpointTemplate`] that turns validated arguments
//! into one LightRAG HTTP call.

use crate::tools::endpoint::EndpointTemplate;
use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    /// Integer with an inclusive lower bound and optional upper bound.
    BoundedInt { min: i64, max: Option<i64> },
    Float,
    Bool,
    StringList,
    /// Free-form JSON object.
    Object,
    ObjectList,
    Enum(Vec<String>),
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            ParamType::String => expect(value.is_string(), "string", value),
            ParamType::Int => expect(value.is_i64() || value.is_u64(), "integer", value),
            ParamType::BoundedInt { min, max } => {
                if !(value.is_i64() || value.is_u64()) {
                    return Err(format!("expected integer, got {}", value_type_name(value)));
                }
                // u64 beyond i64::MAX is above any bound we declare
                let n = value.as_i64().unwrap_or(i64::MAX);
                if n < *min {
                    return Err(format!("must be >= {}, got {}", min, n));
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(format!("must be <= {}, got {}", max, n));
                    }
                }
                Ok(())
            }
            ParamType::Float => expect(value.is_number(), "number", value),
            ParamType::Bool => expect(value.is_boolean(), "boolean", value),
            ParamType::StringList => validate_items(value, "string", Value::is_string),
            ParamType::Object => expect(value.is_object(), "object", value),
            ParamType::ObjectList => validate_items(value, "object", Value::is_object),
            ParamType::Enum(variants) => {
                if let Some(s) = value.as_str() {
                    if variants.iter().any(|v| v == s) {
                        Ok(())
                    } else {
                        Err(format!(
                            "invalid enum value '{}', expected one of: {}",
                            s,
                            variants.join(", ")
                        ))
                    }
                } else {
                    Err(format!("expected string for enum, got {}", value_type_name(value)))
                }
            }
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.validate(value)
                }
            }
        }
    }

    /// JSON Schema fragment advertised in `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Int => json!({"type": "integer"}),
            ParamType::BoundedInt { min, max } => {
                let mut schema = json!({"type": "integer", "minimum": min});
                if let Some(max) = max {
                    schema["maximum"] = json!(max);
                }
                schema
            }
            ParamType::Float => json!({"type": "number"}),
            ParamType::Bool => json!({"type": "boolean"}),
            ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Object => json!({"type": "object", "additionalProperties": true}),
            ParamType::ObjectList => json!({"type": "array", "items": {"type": "object"}}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
            ParamType::Optional(inner) => inner.to_json_schema(),
        }
    }
}

fn expect(ok: bool, expected: &str, value: &Value) -> std::result::Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(format!("expected {}, got {}", expected, value_type_name(value)))
    }
}

fn validate_items(
    value: &Value,
    item_name: &str,
    check: fn(&Value) -> bool,
) -> std::result::Result<(), String> {
    let arr = value
        .as_array()
        .ok_or_else(|| format!("expected array, got {}", value_type_name(value)))?;
    for (i, item) in arr.iter().enumerate() {
        if !check(item) {
            return Err(format!(
                "expected {} at index {}, got {}",
                item_name,
                i,
                value_type_name(item)
            ));
        }
    }
    Ok(())
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self::required(name, ParamType::Optional(Box::new(param_type)), description)
    }

    /// Attach a default, which also makes the parameter optional.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }

    fn property_schema(&self) -> Value {
        let mut schema = self.param_type.to_json_schema();
        if let Value::Object(map) = &mut schema {
            if !self.description.is_empty() {
                map.insert("description".to_string(), json!(self.description));
            }
            if let Some(default) = &self.default {
                map.insert("default".to_string(), default.clone());
            }
        }
        schema
    }
}

// =============================================================================
// Tool definition
// =============================================================================

/// Complete tool metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
    pub endpoint: EndpointTemplate,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, endpoint: EndpointTemplate) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            endpoint,
        }
    }

    pub fn param(mut self, param: ParamDef) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON Schema for the tool's arguments object.
    ///
    /// Unknown fields are rejected, so the schema closes `additionalProperties`.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.property_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    /// `tools/list` entry: name, description, input schema.
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Validate arguments, returning one message per offending field.
    pub fn validate_args(&self, args: &Map<String, Value>) -> Vec<String> {
        let mut errors = Vec::new();

        for param_def in &self.parameters {
            let present = args.get(&param_def.name).is_some_and(|v| !v.is_null());
            if param_def.is_required() && !present {
                errors.push(format!("Missing required parameter: {}", param_def.name));
            }
        }

        let known_names: HashMap<&str, &ParamDef> = self
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        for (key, value) in args {
            match known_names.get(key.as_str()) {
                // Nulls on required params are reported as missing above
                Some(param_def) if value.is_null() && param_def.is_required() => {}
                Some(param_def) if value.is_null() && param_def.default.is_some() => {}
                Some(param_def) => {
                    if let Err(e) = param_def.param_type.validate(value) {
                        errors.push(format!("Parameter '{}': {}", key, e));
                    }
                }
                None => errors.push(format!("Unknown parameter: {}", key)),
            }
        }

        errors
    }

    /// Fill defaults for absent parameters and drop explicit nulls.
    pub fn normalize_args(&self, args: &mut Map<String, Value>) {
        args.retain(|_, v| !v.is_null());
        for param_def in &self.parameters {
            if !args.contains_key(&param_def.name) {
                if let Some(default) = &param_def.default {
                    args.insert(param_def.name.clone(), default.clone());
                }
            }
        }
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: HashMap<String, ToolDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Build a catalog from definitions, rejecting empty or duplicate names.
    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Result<Self> {
        let mut catalog = Self::new();
        for definition in definitions {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }

    /// Register a tool definition.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<()> {
        if definition.name.is_empty() {
            return Err(Error::configuration("Tool name cannot be empty"));
        }
        if self.entries.contains_key(&definition.name) {
            return Err(Error::configuration(format!(
                "Duplicate tool name: {}",
                definition.name
            )));
        }
        self.entries.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Get a tool definition by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.entries.get(name)
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// List all tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all tool definitions, sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut entries: Vec<&ToolDefinition> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Validate arguments against a tool's parameter definitions.
    ///
    /// Returns a list of validation errors (empty = valid).
    pub fn validate_params(&self, name: &str, params: &Value) -> Result<Vec<String>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::tool_not_found(name))?;

        match params {
            Value::Null => Ok(entry.validate_args(&Map::new())),
            Value::Object(map) => Ok(entry.validate_args(map)),
            other => Ok(vec![format!(
                "Arguments must be a JSON object, got {}",
                value_type_name(other)
            )]),
        }
    }

    /// `tools/list` payload entries, sorted by name.
    pub fn descriptors(&self) -> Vec<Value> {
        self.list().into_iter().map(ToolDefinition::descriptor).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
