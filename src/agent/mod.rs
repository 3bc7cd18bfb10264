//! Tool-calling agents
//!
//! - Roles as data (prompt fragments + tool subset)
//! - JSON schema tools with validation
//! - Bounded conversation history
//! - The dispatch loop that resolves tool calls until a final answer

pub mod conversational;
pub mod history;
pub mod role;
pub mod tools;

pub use conversational::{ConversationalAgent, DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_TOOL_ROUNDS};
pub use history::{History, HistoryEntry};
pub use role::AgentRole;
pub use tools::{Tool, ToolRegistry, ToolResult, ToolSchema, UNKNOWN_TOOL};
