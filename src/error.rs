//! Error types for agents, documents and the workflow

use thiserror::Error;

/// Failure of a single `ConversationalAgent::run`
#[derive(Error, Debug)]
pub enum AgentError {
    /// The inference endpoint call failed; not retried at this layer
    #[error(transparent)]
    Endpoint(#[from] anyhow::Error),

    /// The model kept requesting tools past the configured round limit
    #[error("Agent '{agent}' gave up after {limit} tool-calling rounds without a final answer")]
    ToolRoundsExhausted { agent: String, limit: usize },
}

/// Versioned document store errors
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("{kind} version {version} already exists: {path}")]
    VersionExists {
        kind: &'static str,
        version: u32,
        path: String,
    },
    #[error("No {kind} found for version {version}")]
    NotFound { kind: &'static str, version: u32 },
    #[error("No {kind} saved yet")]
    Empty { kind: &'static str },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared workflow state errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that terminate a workflow run
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{role} agent failed: {source}")]
    Agent {
        role: String,
        #[source]
        source: AgentError,
    },
    #[error("Workflow state error: {0}")]
    State(#[from] StateError),
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Non-success HTTP status from a remote service
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("HTTP {status}")]
pub struct HttpStatusError {
    pub status: u16,
}
