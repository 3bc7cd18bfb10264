//! Shared fixtures for integration tests
//!
//! `ScriptedEndpoint` replays responses per agent. The agent is recognised
//! from the opening line of its system prompt; an agent whose script has run
//! out answers "done".

#![allow(dead_code)]

use async_trait::async_trait;
use autoreview::{
    build_registry, ChatEndpoint, ChatMessage, ChatResponse, Config, DocumentStore, LiteratureClient, StateStore,
    ToolCallRequest, ToolContext, ToolSchema, WorkflowOrchestrator,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const WRITER: &str = "writer";
pub const RETRIEVER: &str = "retriever";
pub const REVIEWER: &str = "reviewer";

/// One scripted endpoint reply
pub enum Step {
    Reply(ChatResponse),
    Fail(String),
    /// Run a side effect, then reply
    Effect(Box<dyn FnOnce() + Send>, ChatResponse),
}

#[derive(Default)]
pub struct ScriptedEndpoint {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedEndpoint {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a tool call for `agent`
    pub fn call(&self, agent: &str, tool: &str, args: Value) -> &Self {
        self.push(
            agent,
            Step::Reply(ChatResponse::with_tool_calls(vec![ToolCallRequest::new(tool, args)])),
        )
    }

    /// Queue a final answer for `agent`
    pub fn answer(&self, agent: &str, text: &str) -> &Self {
        self.push(agent, Step::Reply(ChatResponse::text(text)))
    }

    /// Queue a final answer for `agent` that first runs `effect`
    pub fn answer_after(&self, agent: &str, text: &str, effect: impl FnOnce() + Send + 'static) -> &Self {
        self.push(agent, Step::Effect(Box::new(effect), ChatResponse::text(text)))
    }

    /// Queue an endpoint failure for `agent`
    pub fn fail(&self, agent: &str, message: &str) -> &Self {
        self.push(agent, Step::Fail(message.to_string()))
    }

    pub fn push(&self, agent: &str, step: Step) -> &Self {
        self.scripts.lock().entry(agent.to_string()).or_default().push_back(step);
        self
    }

    /// Requests sent on behalf of `agent`, in order
    pub fn requests_for(&self, agent: &str) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .iter()
            .filter(|(name, _)| name == agent)
            .map(|(_, messages)| messages.clone())
            .collect()
    }

    /// User inputs of the outer `run` calls made by `agent`
    ///
    /// The first request of each run is the one whose last message is the user turn.
    pub fn inputs_for(&self, agent: &str) -> Vec<String> {
        self.requests_for(agent)
            .iter()
            .filter_map(|messages| {
                let last = messages.last()?;
                (last.role == autoreview::Role::User).then(|| last.content.clone().unwrap_or_default())
            })
            .collect()
    }
}

fn agent_of(messages: &[ChatMessage]) -> &'static str {
    let system = messages
        .first()
        .and_then(|m| m.content.as_deref())
        .unwrap_or_default();

    if system.contains("You are the Graduate Student Agent") {
        WRITER
    } else if system.contains("You are the Literature Retrieval Agent") {
        RETRIEVER
    } else if system.contains("You are the Professor Agent") {
        REVIEWER
    } else {
        "unknown"
    }
}

#[async_trait]
impl ChatEndpoint for ScriptedEndpoint {
    async fn complete(&self, messages: &[ChatMessage], _tools: &[ToolSchema]) -> anyhow::Result<ChatResponse> {
        let agent = agent_of(messages);
        self.requests.lock().push((agent.to_string(), messages.to_vec()));

        let step = self.scripts.lock().get_mut(agent).and_then(|q| q.pop_front());
        match step {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(anyhow::anyhow!(message)),
            Some(Step::Effect(effect, response)) => {
                effect();
                Ok(response)
            }
            None => Ok(ChatResponse::text("done")),
        }
    }
}

/// Config rooted in `temp` with no delay between iterations
pub fn test_config(temp: &TempDir, max_iterations: u32) -> Config {
    let mut config = Config::default()
        .with_topic("LLM-base Agent")
        .with_max_iterations(max_iterations);
    config.workdir = temp.path().to_path_buf();
    config.iteration_delay = Duration::ZERO;
    config
}

pub struct Harness {
    pub orchestrator: WorkflowOrchestrator,
    pub documents: Arc<DocumentStore>,
    pub state: Arc<StateStore>,
}

/// Orchestrator over the full tool catalogue; the literature client points nowhere
pub fn harness(config: &Config, endpoint: Arc<ScriptedEndpoint>) -> Harness {
    let documents = Arc::new(DocumentStore::open(&config.workdir).expect("Failed to open documents"));
    let state = Arc::new(StateStore::open(&config.workdir).expect("Failed to open state"));
    let literature = Arc::new(
        LiteratureClient::new(Duration::from_secs(1))
            .expect("Failed to build client")
            .with_endpoints("http://127.0.0.1:9/api/query", "http://127.0.0.1:9"),
    );

    let registry = build_registry(&ToolContext {
        documents: documents.clone(),
        state: state.clone(),
        literature,
    });

    let orchestrator =
        WorkflowOrchestrator::with_registry(config, endpoint, &registry, state.clone(), documents.clone());

    Harness {
        orchestrator,
        documents,
        state,
    }
}
