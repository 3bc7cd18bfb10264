//! Workflow Orchestrator
//!
//! Drives the review loop until the reviewer's score clears the threshold or
//! the iteration budget runs out:
//!
//! ```text
//! Iterating(i): writer -> [retriever] -> reviewer -> read score
//!     score > threshold  => Converged
//!     i == max_iter      => Exhausted
//!     otherwise          => sleep, Iterating(i + 1)
//! ```
//!
//! Steps are awaited strictly in sequence; no two agents run at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::{AgentRole, ConversationalAgent, ToolRegistry};
use crate::config::Config;
use crate::documents::DocumentStore;
use crate::error::{AgentError, WorkflowError};
use crate::extract::truncate_chars;
use crate::literature::LiteratureClient;
use crate::llm::ChatEndpoint;
use crate::state::StateStore;
use crate::tools::{build_registry, ToolContext};

/// Characters of each agent's answer kept in the iteration report
const SUMMARY_CHARS: usize = 500;

/// Where the orchestrator is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    Iterating(u32),
    Converged,
    Exhausted,
}

/// How a run ended; both variants are normal completions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TerminalState {
    /// The score exceeded the threshold at `iteration`
    Converged { iteration: u32, score: f64 },
    /// The budget ran out without a passing score
    Exhausted { iterations: u32, last_score: f64 },
}

impl TerminalState {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Converged { .. } => Phase::Converged,
            Self::Exhausted { .. } => Phase::Exhausted,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged { iteration, score } => write!(
                f,
                "Review accepted at iteration {} with score {}",
                iteration, score
            ),
            Self::Exhausted { iterations, last_score } => write!(
                f,
                "Iteration budget exhausted after {} iteration(s); last score {}",
                iterations, last_score
            ),
        }
    }
}

/// What happened in one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationReport {
    pub iteration: u32,
    /// Query handed to the retriever, if one was requested
    pub retrieval: Option<String>,
    pub score: f64,
    pub writer_summary: String,
    pub reviewer_summary: String,
    pub started_at: DateTime<Utc>,
}

/// Result of a full run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub terminal: TerminalState,
    pub iterations: Vec<IterationReport>,
}

/// Loop settings
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub topic: String,
    pub max_iterations: u32,
    pub score_threshold: f64,
    pub iteration_delay: Duration,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.topic.clone(),
            max_iterations: config.max_iterations,
            score_threshold: config.score_threshold,
            iteration_delay: config.iteration_delay,
        }
    }
}

/// The three agents plus the shared state they coordinate through
pub struct WorkflowOrchestrator {
    writer: ConversationalAgent,
    retriever: ConversationalAgent,
    reviewer: ConversationalAgent,
    state: Arc<StateStore>,
    documents: Arc<DocumentStore>,
    settings: WorkflowSettings,
    phase: Phase,
}

impl WorkflowOrchestrator {
    /// Assemble an orchestrator from prebuilt agents
    pub fn new(
        writer: ConversationalAgent,
        retriever: ConversationalAgent,
        reviewer: ConversationalAgent,
        state: Arc<StateStore>,
        documents: Arc<DocumentStore>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            writer,
            retriever,
            reviewer,
            state,
            documents,
            settings,
            phase: Phase::Iterating(1),
        }
    }

    /// Build the standard writer/retriever/reviewer setup under `config.workdir`
    pub fn from_config(config: &Config, endpoint: Arc<dyn ChatEndpoint>) -> anyhow::Result<Self> {
        let documents = Arc::new(DocumentStore::open(&config.workdir)?);
        let state = Arc::new(StateStore::open(&config.workdir)?);
        let literature = Arc::new(LiteratureClient::new(config.request_timeout)?);

        let registry = build_registry(&ToolContext {
            documents: documents.clone(),
            state: state.clone(),
            literature,
        });

        let agent = |role: AgentRole| {
            ConversationalAgent::new(role, endpoint.clone(), &registry)
                .with_history_window(config.history_window)
                .with_max_tool_rounds(config.max_tool_rounds)
        };

        Ok(Self::new(
            agent(AgentRole::writer(&config.topic)),
            agent(AgentRole::retriever(&config.topic)),
            agent(AgentRole::reviewer(&config.topic)),
            state,
            documents,
            WorkflowSettings::from_config(config),
        ))
    }

    /// Same wiring as `from_config` with a caller-supplied registry
    pub fn with_registry(
        config: &Config,
        endpoint: Arc<dyn ChatEndpoint>,
        registry: &ToolRegistry,
        state: Arc<StateStore>,
        documents: Arc<DocumentStore>,
    ) -> Self {
        let agent = |role: AgentRole| {
            ConversationalAgent::new(role, endpoint.clone(), registry)
                .with_history_window(config.history_window)
                .with_max_tool_rounds(config.max_tool_rounds)
        };

        Self::new(
            agent(AgentRole::writer(&config.topic)),
            agent(AgentRole::retriever(&config.topic)),
            agent(AgentRole::reviewer(&config.topic)),
            state,
            documents,
            WorkflowSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    fn perception(&self, iteration: u32) -> Result<String, WorkflowError> {
        Ok(format!(
            "Topic: {}\nIteration {} of {}\n\nCurrent workspace:\n{}",
            self.settings.topic,
            iteration,
            self.max_iterations(),
            self.documents.perceive_text()?
        ))
    }

    fn max_iterations(&self) -> u32 {
        self.settings.max_iterations.max(1)
    }

    /// Current position in the state machine
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run iterations until `Converged` or `Exhausted`
    pub async fn run(&mut self) -> Result<WorkflowOutcome, WorkflowError> {
        let max_iterations = self.max_iterations();
        if self.settings.max_iterations == 0 {
            warn!("max_iterations is 0, running a single iteration");
        }

        info!(
            "Starting review of '{}' (max {} iteration(s), threshold {})",
            self.settings.topic, max_iterations, self.settings.score_threshold
        );

        let mut reports = Vec::new();
        let mut iteration = 1;
        self.phase = Phase::Iterating(iteration);

        let terminal = loop {
            let report = self.run_iteration(iteration).await?;
            let score = report.score;
            reports.push(report);

            if score > self.settings.score_threshold {
                break TerminalState::Converged { iteration, score };
            }
            if iteration >= max_iterations {
                break TerminalState::Exhausted {
                    iterations: iteration,
                    last_score: score,
                };
            }

            info!(
                "Score {} does not exceed {}, next iteration in {:?}",
                score, self.settings.score_threshold, self.settings.iteration_delay
            );
            if !self.settings.iteration_delay.is_zero() {
                tokio::time::sleep(self.settings.iteration_delay).await;
            }
            iteration += 1;
            self.phase = Phase::Iterating(iteration);
        };

        self.phase = terminal.phase();
        info!("{}", terminal);
        Ok(WorkflowOutcome {
            terminal,
            iterations: reports,
        })
    }

    async fn run_iteration(&mut self, iteration: u32) -> Result<IterationReport, WorkflowError> {
        let started_at = Utc::now();
        info!("===== Iteration {} =====", iteration);

        // 1. Writer
        let perception = self.perception(iteration)?;
        let writer_answer = self
            .writer
            .run(&perception)
            .await
            .map_err(|e| agent_failed(&self.writer, e))?;

        // 2. Retriever, at most once; the request is cleared whether or not one was pending
        let retrieval = self.state.take_retrieval_request()?;
        if let Some(query) = &retrieval {
            info!("Retrieval requested: {}", query);
            self.retriever
                .run(query)
                .await
                .map_err(|e| agent_failed(&self.retriever, e))?;
        }

        // 3. Reviewer; only a score written during this run counts
        self.state.clear_score()?;
        let perception = self.perception(iteration)?;
        let reviewer_answer = self
            .reviewer
            .run(&perception)
            .await
            .map_err(|e| agent_failed(&self.reviewer, e))?;

        // 4. Score
        let score = self.state.read_score();
        info!("Iteration {} score: {}", iteration, score);

        Ok(IterationReport {
            iteration,
            retrieval,
            score,
            writer_summary: truncate_chars(&writer_answer, SUMMARY_CHARS),
            reviewer_summary: truncate_chars(&reviewer_answer, SUMMARY_CHARS),
            started_at,
        })
    }
}

fn agent_failed(agent: &ConversationalAgent, source: AgentError) -> WorkflowError {
    WorkflowError::Agent {
        role: agent.name().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_display() {
        let converged = TerminalState::Converged {
            iteration: 2,
            score: 95.0,
        };
        assert!(converged.is_converged());
        assert_eq!(converged.phase(), Phase::Converged);
        assert_eq!(converged.to_string(), "Review accepted at iteration 2 with score 95");

        let exhausted = TerminalState::Exhausted {
            iterations: 3,
            last_score: 10.0,
        };
        assert!(!exhausted.is_converged());
        assert!(exhausted.to_string().contains("after 3 iteration(s)"));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::default().with_topic("Diffusion models").with_max_iterations(7);
        let settings = WorkflowSettings::from_config(&config);
        assert_eq!(settings.topic, "Diffusion models");
        assert_eq!(settings.max_iterations, 7);
        assert_eq!(settings.score_threshold, 90.0);
    }
}
