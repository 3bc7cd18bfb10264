//! Structured Tool Use Framework
//!
//! JSON schema-based tool definitions consumed by the dispatch loop:
//! - Tool registration with JSON schemas
//! - Parameter validation
//! - Sequential execution in request order
//! - Role subsets sharing one set of handlers

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::ToolCallRequest;

/// Prefix of the result returned for a tool name the registry does not know
pub const UNKNOWN_TOOL: &str = "Unknown tool";

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (snake_case)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
    /// Required parameter names
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Create a new tool schema
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
            required: vec![],
        }
    }

    fn with_param(mut self, name: &str, spec: Value, required: bool) -> Self {
        if let Some(props) = self.parameters.get_mut("properties") {
            props[name] = spec;
        }
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a string parameter
    pub fn with_string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            name,
            serde_json::json!({ "type": "string", "description": description }),
            required,
        )
    }

    /// Add an integer parameter
    pub fn with_int_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            name,
            serde_json::json!({ "type": "integer", "description": description }),
            required,
        )
    }

    /// Add a number parameter
    pub fn with_number_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(
            name,
            serde_json::json!({ "type": "number", "description": description }),
            required,
        )
    }

    /// Add an enum parameter
    pub fn with_enum_param(self, name: &str, description: &str, values: &[&str], required: bool) -> Self {
        self.with_param(
            name,
            serde_json::json!({ "type": "string", "description": description, "enum": values }),
            required,
        )
    }

    /// Validate parameters against schema
    pub fn validate(&self, params: &Value) -> Result<()> {
        if !params.is_object() && !(params.is_null() && self.required.is_empty()) {
            return Err(anyhow!(
                "Arguments for '{}' must be a JSON object, got: {}",
                self.name,
                params
            ));
        }

        for req in &self.required {
            if params.get(req).is_none() {
                return Err(anyhow!("Missing required parameter: {}", req));
            }
        }

        if let Some(obj) = self.parameters.get("properties").and_then(|p| p.as_object()) {
            for (name, schema) in obj {
                if let Some(value) = params.get(name) {
                    let expected_type = schema.get("type").and_then(|t| t.as_str());
                    let valid = match expected_type {
                        Some("string") => value.is_string(),
                        Some("integer") => value.is_i64() || value.is_u64(),
                        Some("number") => value.is_number(),
                        Some("boolean") => value.is_boolean(),
                        Some("array") => value.is_array(),
                        Some("object") => value.is_object(),
                        _ => true,
                    };
                    if !valid {
                        return Err(anyhow!(
                            "Parameter '{}' has wrong type, expected {}",
                            name,
                            expected_type.unwrap_or("unknown")
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    /// Format as an OpenAI-style function definition
    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": self.parameters.get("properties").cloned().unwrap_or(Value::Object(Default::default())),
                    "required": self.required
                }
            }
        })
    }
}

/// Result from tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool name that was called
    pub tool_name: String,
    /// Whether execution succeeded
    pub success: bool,
    /// Result content (success or error message), always text
    pub content: String,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: &str, content: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: true,
            content,
            duration_ms: 0,
        }
    }

    /// Create an error result
    pub fn error(tool_name: &str, error: String) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            success: false,
            content: error,
            duration_ms: 0,
        }
    }
}

/// Type alias for tool handler function
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// A registered tool with schema and handler
pub struct Tool {
    pub schema: ToolSchema,
    handler: ToolHandler,
}

impl Tool {
    /// Create a new tool
    pub fn new<F, Fut>(schema: ToolSchema, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |params| Box::pin(handler(params))),
        }
    }

    /// Execute the tool
    pub async fn execute(&self, params: Value) -> Result<ToolResult> {
        let start = std::time::Instant::now();

        self.schema.validate(&params)?;

        let content = (self.handler)(params).await?;
        let mut result = ToolResult::success(&self.schema.name, content);
        result.duration_ms = start.elapsed().as_millis() as u64;

        Ok(result)
    }
}

/// Tool registry for managing available tools
///
/// Keeps registration order so the schema list sent to the endpoint is stable.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Tool) {
        self.insert(Arc::new(tool));
    }

    fn insert(&mut self, tool: Arc<Tool>) {
        debug!("Registered tool: {}", tool.schema.name);
        match self.index.get(&tool.schema.name) {
            Some(&idx) => self.tools[idx] = tool,
            None => {
                self.index.insert(tool.schema.name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Registry holding only `names`, in the given order
    ///
    /// Names that are not registered are skipped with a warning.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let mut subset = ToolRegistry::new();
        for name in names {
            match self.index.get(*name) {
                Some(&idx) => subset.insert(self.tools[idx].clone()),
                None => warn!("Tool '{}' requested for subset but not registered", name),
            }
        }
        subset
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&idx| self.tools[idx].as_ref())
    }

    /// List all tool names
    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.schema.name.as_str()).collect()
    }

    /// Get all tool schemas
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a single tool call
    ///
    /// Never fails: unknown tools, invalid arguments and handler errors all
    /// come back as error results carrying a diagnostic string.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        match self.get(&call.name) {
            Some(tool) => match tool.execute(call.arguments.clone()).await {
                Ok(result) => result,
                Err(e) => ToolResult::error(&call.name, format!("Error: {}", e)),
            },
            None => ToolResult::error(&call.name, format!("{}: {}", UNKNOWN_TOOL, call.name)),
        }
    }
}
