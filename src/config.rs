//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default review topic when none is supplied
pub const DEFAULT_TOPIC: &str = "LLM-base Agent";

/// Workflow configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Inference endpoint API key (optional until the endpoint is called)
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    pub api_base: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Working directory root for drafts, comments, papers and state
    pub workdir: PathBuf,

    /// Literature review topic
    pub topic: String,

    /// Iteration budget for the orchestrator
    pub max_iterations: u32,

    /// Conversation window per agent, in turns
    pub history_window: usize,

    /// Tool-calling rounds allowed per `run` before giving up
    pub max_tool_rounds: usize,

    /// Pause between iterations
    pub iteration_delay: Duration,

    /// Score an iteration must exceed to converge
    pub score_threshold: f64,

    /// HTTP timeout for endpoint and search calls
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            workdir: PathBuf::from("./workspace"),
            topic: DEFAULT_TOPIC.to_string(),
            max_iterations: 5,
            history_window: 15,
            max_tool_rounds: 25,
            iteration_delay: Duration::from_secs(5),
            score_threshold: 90.0,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        // `api_key` is the variable name older .env files used
        let api_key = std::env::var("AUTOREVIEW_API_KEY")
            .or_else(|_| std::env::var("api_key"))
            .ok()
            .filter(|k| !k.trim().is_empty());

        let api_base = std::env::var("AUTOREVIEW_API_BASE").unwrap_or(defaults.api_base);
        let model = std::env::var("AUTOREVIEW_MODEL").unwrap_or(defaults.model);

        let workdir = std::env::var("AUTOREVIEW_WORKDIR")
            .map(|p| expand_path(&p))
            .unwrap_or(defaults.workdir);

        let topic = std::env::var("AUTOREVIEW_TOPIC").unwrap_or(defaults.topic);

        let max_iterations = parse_env("AUTOREVIEW_MAX_ITERATIONS")?.unwrap_or(defaults.max_iterations);
        let history_window = parse_env("AUTOREVIEW_HISTORY_WINDOW")?.unwrap_or(defaults.history_window);
        let max_tool_rounds = parse_env("AUTOREVIEW_MAX_TOOL_ROUNDS")?.unwrap_or(defaults.max_tool_rounds);

        let iteration_delay = parse_env::<u64>("AUTOREVIEW_ITERATION_DELAY_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.iteration_delay);

        let score_threshold = parse_env("AUTOREVIEW_SCORE_THRESHOLD")?.unwrap_or(defaults.score_threshold);

        let request_timeout = parse_env::<u64>("AUTOREVIEW_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            api_key,
            api_base,
            model,
            workdir,
            topic,
            max_iterations,
            history_window,
            max_tool_rounds,
            iteration_delay,
            score_threshold,
            request_timeout,
        })
    }

    /// Override the topic
    pub fn with_topic(mut self, topic: &str) -> Self {
        self.topic = topic.to_string();
        self
    }

    /// Override the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Override the working directory (`~` is expanded)
    pub fn with_workdir(mut self, workdir: &str) -> Self {
        self.workdir = expand_path(workdir);
        self
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        _ => Ok(None),
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.history_window, 15);
        assert_eq!(config.score_threshold, 90.0);
        assert_eq!(config.topic, DEFAULT_TOPIC);
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_topic("Graph Neural Networks")
            .with_max_iterations(2)
            .with_workdir("/tmp/review");

        assert_eq!(config.topic, "Graph Neural Networks");
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.workdir, PathBuf::from("/tmp/review"));
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("AUTOREVIEW_TEST_PARSE", "abc");
        assert!(parse_env::<u32>("AUTOREVIEW_TEST_PARSE").is_err());
        std::env::set_var("AUTOREVIEW_TEST_PARSE", " 7 ");
        assert_eq!(parse_env::<u32>("AUTOREVIEW_TEST_PARSE").unwrap(), Some(7));
        std::env::remove_var("AUTOREVIEW_TEST_PARSE");
        assert_eq!(parse_env::<u32>("AUTOREVIEW_TEST_PARSE").unwrap(), None);
    }
}
