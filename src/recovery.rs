//! Retry with exponential backoff
//!
//! Used by the literature client only. The agent dispatch loop deliberately
//! propagates endpoint failures instead of retrying.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::HttpStatusError;

/// Status codes only count when labelled, so digits inside URLs or ids are ignored
static RE_STATUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:http|status)\s*:?\s*(\d{3})\b").unwrap());

/// Classification of errors for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Temporary failure, retry likely to succeed
    Transient,
    /// Rate limiting, need backoff
    RateLimited,
    /// Remote side unavailable, may recover
    ResourceUnavailable,
    /// Invalid request, retry won't help
    ValidationError,
    /// Unknown error type
    Unknown,
}

impl ErrorClass {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            408 => Self::Transient,
            500..=599 => Self::ResourceUnavailable,
            400..=499 => Self::ValidationError,
            _ => Self::Unknown,
        }
    }

    /// Classify an error from its message
    pub fn from_error(error: &str) -> Self {
        if let Some(status) = RE_STATUS
            .captures(error)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            return Self::from_status(status);
        }

        let lower = error.to_lowercase();
        if lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited
        } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("connection") {
            Self::Transient
        } else if lower.contains("unavailable") || lower.contains("bad gateway") {
            Self::ResourceUnavailable
        } else if lower.contains("invalid") || lower.contains("not found") {
            Self::ValidationError
        } else {
            Self::Unknown
        }
    }

    /// Classify a typed error, falling back to its message
    pub fn classify(error: &anyhow::Error) -> Self {
        if let Some(e) = error.downcast_ref::<HttpStatusError>() {
            return Self::from_status(e.status);
        }
        if let Some(e) = error.downcast_ref::<reqwest::Error>() {
            if e.is_timeout() || e.is_connect() {
                return Self::Transient;
            }
            if let Some(status) = e.status() {
                return Self::from_status(status.as_u16());
            }
        }
        Self::from_error(&error.to_string())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ValidationError)
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits (tests)
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Calculate delay for a given attempt
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Named retry wrapper around a fallible async operation
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    name: String,
    policy: RetryPolicy,
}

impl RecoveryStrategy {
    pub fn new(name: &str, policy: RetryPolicy) -> Self {
        Self {
            name: name.to_string(),
            policy,
        }
    }

    /// Run `operation`, retrying retryable failures per the policy
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let class = ErrorClass::classify(&e);
                    if !class.is_retryable() || attempt >= self.policy.max_retries {
                        warn!("'{}' failed after {} attempt(s): {}", self.name, attempt + 1, e);
                        return Err(e);
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        "Retry {} for '{}' after {:?} ({:?}: {})",
                        attempt + 1,
                        self.name,
                        delay,
                        class,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
