//! Bounded conversation history
//!
//! Rolling window of finished turns. Each turn is one user message and one
//! assistant answer; the oldest entries are dropped first.

use std::collections::VecDeque;

use crate::llm::{ChatMessage, Role};

/// One retained history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Sliding window over the last `window` turns
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    window: usize,
}

impl History {
    /// `window` counts turns, so up to `2 * window` entries are kept
    pub fn new(window: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(window.saturating_mul(2)),
            window,
        }
    }

    /// Record a completed turn and trim to the window
    pub fn record_turn(&mut self, input: &str, answer: &str) {
        self.entries.push_back(HistoryEntry {
            role: Role::User,
            content: input.to_string(),
        });
        self.entries.push_back(HistoryEntry {
            role: Role::Assistant,
            content: answer.to_string(),
        });
        self.trim();
    }

    fn trim(&mut self) {
        let max_entries = self.window.saturating_mul(2);
        while self.entries.len() > max_entries {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// History as chat messages, oldest first
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .map(|e| ChatMessage::text(e.role, &e.content))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
