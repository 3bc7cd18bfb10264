//! Conversational agent with a tool-calling dispatch loop
//!
//! `run` turns one instruction into a final answer:
//! 1. Build messages: system prompt, retained history, new user message
//! 2. Call the endpoint with the role's tool schemas
//! 3. If the model requested tools, execute them in order and feed results back
//! 4. Repeat until the model answers without tool calls, or give up after
//!    `max_tool_rounds` rounds
//!
//! Only the final input/answer pair is written to history; intermediate tool
//! exchanges live for the duration of a single `run`.

use std::sync::Arc;

use tracing::{debug, info};

use super::history::History;
use super::role::AgentRole;
use super::tools::{ToolRegistry, ToolSchema};
use crate::error::AgentError;
use crate::extract::truncate_chars;
use crate::llm::{ChatEndpoint, ChatMessage};

/// Default tool-calling rounds per run
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

/// Default history window in turns
pub const DEFAULT_HISTORY_WINDOW: usize = 15;

/// A role bound to an endpoint, a tool subset and bounded memory
pub struct ConversationalAgent {
    role: AgentRole,
    endpoint: Arc<dyn ChatEndpoint>,
    tools: ToolRegistry,
    schemas: Vec<ToolSchema>,
    history: History,
    max_tool_rounds: usize,
}

impl ConversationalAgent {
    /// Create an agent; `tools` is reduced to the role's tool names
    pub fn new(role: AgentRole, endpoint: Arc<dyn ChatEndpoint>, tools: &ToolRegistry) -> Self {
        let tools = tools.subset(&role.tool_names());
        let schemas = tools.schemas();

        Self {
            role,
            endpoint,
            tools,
            schemas,
            history: History::new(DEFAULT_HISTORY_WINDOW),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Set the history window (turns)
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history = History::new(window);
        self
    }

    /// Set the maximum tool-calling rounds per run
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn name(&self) -> &str {
        &self.role.name
    }

    pub fn role(&self) -> &AgentRole {
        &self.role
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn tool_schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Messages for a fresh turn
    fn build_messages(&self, input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(&self.role.system_prompt()));
        messages.extend(self.history.to_messages());
        messages.push(ChatMessage::user(input));
        messages
    }

    /// Run one instruction to a final answer
    pub async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        let mut messages = self.build_messages(input);
        let mut rounds = 0usize;

        info!(
            "[{}] run: input_len={}, history={}",
            self.role.name,
            input.len(),
            self.history.len()
        );

        loop {
            let response = self.endpoint.complete(&messages, &self.schemas).await?;

            if !response.has_tool_calls() {
                let answer = response.content.unwrap_or_default();
                self.history.record_turn(input, &answer);
                info!(
                    "[{}] final answer after {} tool round(s): {}",
                    self.role.name,
                    rounds,
                    truncate_chars(&answer, 120)
                );
                return Ok(answer);
            }

            if rounds >= self.max_tool_rounds {
                return Err(AgentError::ToolRoundsExhausted {
                    agent: self.role.name.clone(),
                    limit: self.max_tool_rounds,
                });
            }
            rounds += 1;

            let calls = response.tool_calls;
            messages.push(ChatMessage::tool_calls(response.content, calls.clone()));

            for call in &calls {
                debug!(
                    "[{}] round {}: calling {} with {}",
                    self.role.name, rounds, call.name, call.arguments
                );

                let result = self.tools.execute(call).await;

                debug!(
                    "[{}] {} -> success={}, {}ms, {} chars",
                    self.role.name,
                    call.name,
                    result.success,
                    result.duration_ms,
                    result.content.len()
                );

                messages.push(ChatMessage::tool_result(&call.id, &result.content));
            }
        }
    }

    /// Forget all retained turns
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::Tool;
    use crate::llm::{ChatResponse, Role, ToolCallRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays canned responses and records every request
    #[derive(Default)]
    struct Replay {
        responses: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Replay {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatEndpoint for Replay {
        async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSchema]) -> anyhow::Result<ChatResponse> {
            self.requests.lock().push(messages.to_vec());
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted response left"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        let schema = ToolSchema::new("shout", "Upper-case text").with_string_param("text", "Text", true);
        registry.register(Tool::new(schema, |params| async move {
            Ok(params["text"].as_str().unwrap_or_default().to_uppercase())
        }));
        registry
    }

    fn role() -> AgentRole {
        AgentRole::new("tester", "You test.").with_tools(&["shout"])
    }

    #[tokio::test]
    async fn test_plain_answer_records_history() {
        let endpoint = Replay::new(vec![ChatResponse::text("hello back")]);
        let mut agent = ConversationalAgent::new(role(), endpoint.clone(), &registry());

        let answer = agent.run("hello").await.unwrap();
        assert_eq!(answer, "hello back");
        assert_eq!(agent.history().len(), 2);

        let sent = &endpoint.requests.lock()[0];
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1].content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_tool_round_trip_in_order() {
        let endpoint = Replay::new(vec![
            ChatResponse::with_tool_calls(vec![
                ToolCallRequest::new("shout", json!({"text": "one"})),
                ToolCallRequest::new("shout", json!({"text": "two"})),
            ]),
            ChatResponse::text("done"),
        ]);
        let mut agent = ConversationalAgent::new(role(), endpoint.clone(), &registry());

        assert_eq!(agent.run("go").await.unwrap(), "done");

        let requests = endpoint.requests.lock();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        // system, user, assistant(tool_calls), tool, tool
        assert_eq!(second.len(), 5);
        assert_eq!(second[2].tool_calls.len(), 2);
        assert_eq!(second[3].content.as_deref(), Some("ONE"));
        assert_eq!(second[4].content.as_deref(), Some("TWO"));
        assert_eq!(second[3].tool_call_id, Some(second[2].tool_calls[0].id.clone()));

        // Tool exchanges are not kept
        assert_eq!(agent.history().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_does_not_abort() {
        let endpoint = Replay::new(vec![
            ChatResponse::with_tool_calls(vec![ToolCallRequest::new("teleport", json!({}))]),
            ChatResponse::text("ok"),
        ]);
        let mut agent = ConversationalAgent::new(role(), endpoint.clone(), &registry());

        assert_eq!(agent.run("go").await.unwrap(), "ok");
        let requests = endpoint.requests.lock();
        assert_eq!(requests[1][3].content.as_deref(), Some("Unknown tool: teleport"));
    }

    #[tokio::test]
    async fn test_gives_up_after_round_limit() {
        let looping = (0..5)
            .map(|_| ChatResponse::with_tool_calls(vec![ToolCallRequest::new("shout", json!({"text": "again"}))]))
            .collect();
        let endpoint = Replay::new(looping);
        let mut agent = ConversationalAgent::new(role(), endpoint.clone(), &registry()).with_max_tool_rounds(2);

        let err = agent.run("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::ToolRoundsExhausted { limit: 2, .. }));
        assert_eq!(endpoint.requests.lock().len(), 3);
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_error_propagates() {
        let endpoint = Replay::new(vec![]);
        let mut agent = ConversationalAgent::new(role(), endpoint, &registry());

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Endpoint(_)));
        assert!(agent.history().is_empty());
    }

    #[tokio::test]
    async fn test_history_included_in_next_prompt() {
        let endpoint = Replay::new(vec![ChatResponse::text("first"), ChatResponse::text("second")]);
        let mut agent = ConversationalAgent::new(role(), endpoint.clone(), &registry()).with_history_window(1);

        agent.run("q1").await.unwrap();
        agent.run("q2").await.unwrap();

        let requests = endpoint.requests.lock();
        let second = &requests[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content.as_deref(), Some("q1"));
        assert_eq!(second[2].content.as_deref(), Some("first"));
        assert_eq!(agent.history().len(), 2);
    }

    #[test]
    fn test_schemas_follow_role_subset() {
        let endpoint = Replay::new(vec![]);
        let agent = ConversationalAgent::new(AgentRole::new("none", "No tools."), endpoint, &registry());
        assert!(agent.tool_schemas().is_empty());
    }
}
