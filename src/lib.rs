//! AutoReview
//!
//! Multi-agent literature review workflow built on tool-calling agents.
//!
//! # Features
//!
//! - **Dispatch loop**: one generic agent resolves tool calls until a final answer
//! - **Data-driven roles**: writer, retriever and reviewer are prompt + tool-subset records
//! - **Bounded memory**: sliding history window per agent
//! - **Versioned documents**: drafts and comments are never overwritten
//! - **Shared state**: retrieval requests and scores with atomic read-and-clear
//! - **Literature search**: arXiv search and full-text download with retries
//!
//! # Architecture
//!
//! ```text
//! WorkflowOrchestrator ──► Writer ──► [Retriever] ──► Reviewer ──► score check
//!          │                  │            │              │
//!          │                  └────────────┴──────────────┴── ChatEndpoint (OpenAI-compatible)
//!          │
//!          ├── StateStore     (config.json + score.txt)
//!          ├── DocumentStore  (reviews/, comments/, papers/)
//!          └── Tools          (10 tools, subset per role)
//! ```

pub mod agent;
pub mod config;
pub mod documents;
pub mod error;
pub mod extract;
pub mod literature;
pub mod llm;
pub mod recovery;
pub mod state;
pub mod tools;
pub mod workflow;

pub use agent::{AgentRole, ConversationalAgent, History, Tool, ToolRegistry, ToolResult, ToolSchema};
pub use config::Config;
pub use documents::{DocumentKind, DocumentStore};
pub use error::{AgentError, DocumentError, StateError, WorkflowError};
pub use literature::{LiteratureClient, PaperSummary};
pub use llm::{ChatEndpoint, ChatMessage, ChatResponse, OpenAiCompatClient, Role, ToolCallRequest};
pub use state::{RetrievalRequest, StateStore};
pub use tools::{build_registry, ToolContext};
pub use workflow::{IterationReport, Phase, TerminalState, WorkflowOrchestrator, WorkflowOutcome, WorkflowSettings};
