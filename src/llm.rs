//! Inference endpoint client
//!
//! OpenAI-compatible chat completions with function calling. The agent only
//! sees the [`ChatEndpoint`] trait, so tests can swap in scripted responses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::agent::tools::ToolSchema;
use crate::config::Config;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(name: &str, arguments: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            arguments,
        }
    }
}

/// One message of a chat request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::text(Role::User, content)
    }

    pub fn text(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tools
    pub fn tool_calls(content: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// Result of one tool call, answering `call_id`
    pub fn tool_result(call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.to_string()),
        }
    }

    /// Wire representation
    fn to_wire(&self) -> Value {
        let mut msg = json!({
            "role": self.role.as_str(),
            "content": self.content,
        });

        if !self.tool_calls.is_empty() {
            let calls = self
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments.to_string(),
                        }
                    })
                })
                .collect();
            msg["tool_calls"] = Value::Array(calls);
        }
        if let Some(id) = &self.tool_call_id {
            msg["tool_call_id"] = json!(id);
        }

        msg
    }
}

/// One model turn: either final text or a batch of tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatResponse {
    /// Final answer with no tool calls
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        }
    }

    /// Tool-call batch
    pub fn with_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Chat completion endpoint with automatic tool selection
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSchema]) -> Result<ChatResponse>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

/// OpenAI-compatible chat completions client (DeepSeek by default)
#[derive(Clone)]
pub struct OpenAiCompatClient {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(api_key: Option<&str>, api_base: &str, model: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.map(|s| s.to_string()),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_key.as_deref(),
            &config.api_base,
            &config.model,
            config.request_timeout,
        )
    }

    /// Check if API key is configured
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl ChatEndpoint for OpenAiCompatClient {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSchema]) -> Result<ChatResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("AUTOREVIEW_API_KEY not set - inference endpoint unavailable"))?;

        let request = CompletionRequest {
            model: &self.model,
            messages: messages.iter().map(ChatMessage::to_wire).collect(),
            tools: tools.iter().map(ToolSchema::to_openai_format).collect(),
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
        };

        debug!(
            "Calling endpoint: model={}, messages={}, tools={}",
            self.model,
            messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            anyhow::bail!("Endpoint error {}: {}", status, text);
        }

        let result: CompletionResponse = response.json().await?;

        if let Some(usage) = &result.usage {
            info!(
                "Endpoint response: model={}, in={}, out={}",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let message = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow::anyhow!("Endpoint returned no choices"))?;

        Ok(ChatResponse {
            content: message.content,
            tool_calls: message.tool_calls.into_iter().map(parse_tool_call).collect(),
        })
    }
}

/// Arguments that are not valid JSON are kept as a string so the tool can
/// report them back to the model.
fn parse_tool_call(call: WireToolCall) -> ToolCallRequest {
    let raw = call.function.arguments;
    let arguments = if raw.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
    };

    ToolCallRequest {
        id: call.id,
        name: call.function.name,
        arguments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_message_wire_format() {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "save_score".to_string(),
            arguments: json!({"score": 88}),
        };
        let wire = ChatMessage::tool_calls(None, vec![call]).to_wire();

        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["tool_calls"][0]["type"], "function");
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "save_score");
        assert_eq!(wire["tool_calls"][0]["function"]["arguments"], r#"{"score":88}"#);
    }

    #[test]
    fn test_tool_result_wire_format() {
        let wire = ChatMessage::tool_result("call_1", "Score saved").to_wire();
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_1");
        assert_eq!(wire["content"], "Score saved");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "list_papers", "arguments": ""}},
                        {"id": "b", "type": "function", "function": {"name": "read_paper", "arguments": "{\"paper_id\": \"2401.00001\"}"}},
                        {"id": "c", "type": "function", "function": {"name": "save_draft", "arguments": "{broken"}}
                    ]
                }
            }]
        });
        let parsed: CompletionResponse = serde_json::from_value(body).unwrap();
        let message = parsed.choices.into_iter().next().unwrap().message;
        let calls: Vec<_> = message.tool_calls.into_iter().map(parse_tool_call).collect();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].arguments, json!({}));
        assert_eq!(calls[1].arguments["paper_id"], "2401.00001");
        assert_eq!(calls[2].arguments, Value::String("{broken".to_string()));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_an_error() {
        let client = OpenAiCompatClient::new(
            None,
            "http://127.0.0.1:9",
            "deepseek-chat",
            std::time::Duration::from_secs(1),
        )
        .unwrap();

        assert!(!client.is_available());
        let err = client.complete(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(err.to_string().contains("AUTOREVIEW_API_KEY"));
    }
}
