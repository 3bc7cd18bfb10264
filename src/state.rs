//! Workflow state coordinator
//!
//! The writer, reviewer and orchestrator coordinate through two records:
//! - `config.json` with a nested `retrieval` record `{enabled, input}`
//! - `score.txt` holding a single number
//!
//! Every read and write goes through one mutex, so consuming the retrieval
//! request is an atomic read-and-clear within the process. The files remain
//! the durable form and can be inspected or edited between runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::StateError;

pub const CONFIG_FILE: &str = "config.json";
pub const SCORE_FILE: &str = "score.txt";

/// Pending request for the retriever
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub input: String,
}

/// Shape of `config.json`; unknown keys survive rewrites
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigRecord {
    #[serde(default)]
    retrieval: RetrievalRequest,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// File-backed shared state with serialized access
#[derive(Debug)]
pub struct StateStore {
    config_path: PathBuf,
    score_path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    /// Open the state files under `root`, creating `config.json` if missing
    pub fn open(root: &Path) -> Result<Self, StateError> {
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;

        let store = Self {
            config_path: root.join(CONFIG_FILE),
            score_path: root.join(SCORE_FILE),
            lock: Mutex::new(()),
        };

        if !store.config_path.exists() {
            store.write_config(&ConfigRecord::default())?;
        }

        info!("State store opened: {}", root.display());
        Ok(store)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn score_path(&self) -> &Path {
        &self.score_path
    }

    /// A malformed or missing config reads as the default record
    fn read_config(&self) -> ConfigRecord {
        let raw = match std::fs::read_to_string(&self.config_path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No readable {}: {}", self.config_path.display(), e);
                return ConfigRecord::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Malformed {}, using defaults: {}", self.config_path.display(), e);
            ConfigRecord::default()
        })
    }

    fn write_config(&self, record: &ConfigRecord) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.config_path, json).map_err(|e| io_err(&self.config_path, e))
    }

    /// Set a pending retrieval request; a newer request replaces an older one
    pub fn request_retrieval(&self, input: &str) -> Result<(), StateError> {
        let _guard = self.lock.lock();
        let mut record = self.read_config();

        if record.retrieval.enabled {
            warn!(
                "Replacing pending retrieval request '{}' with '{}'",
                record.retrieval.input, input
            );
        }
        record.retrieval = RetrievalRequest {
            enabled: true,
            input: input.to_string(),
        };

        self.write_config(&record)?;
        info!("Retrieval requested: {}", input);
        Ok(())
    }

    /// Current retrieval request without consuming it
    pub fn pending_retrieval(&self) -> Option<String> {
        let _guard = self.lock.lock();
        let record = self.read_config();
        record.retrieval.enabled.then_some(record.retrieval.input)
    }

    /// Consume the pending request: return its input and persist `enabled: false`
    ///
    /// The flag is cleared even when no request was pending, so the record
    /// always ends disabled.
    pub fn take_retrieval_request(&self) -> Result<Option<String>, StateError> {
        let _guard = self.lock.lock();
        let mut record = self.read_config();

        let pending = record.retrieval.enabled.then(|| record.retrieval.input.clone());
        record.retrieval.enabled = false;
        self.write_config(&record)?;

        if let Some(input) = &pending {
            debug!("Consumed retrieval request: {}", input);
        }
        Ok(pending)
    }

    /// Overwrite the score record
    pub fn write_score(&self, score: f64) -> Result<(), StateError> {
        let _guard = self.lock.lock();
        std::fs::write(&self.score_path, format!("{}\n", score)).map_err(|e| io_err(&self.score_path, e))?;
        info!("Score recorded: {}", score);
        Ok(())
    }

    /// Remove the score record so the next read sees only a fresh write
    pub fn clear_score(&self) -> Result<(), StateError> {
        let _guard = self.lock.lock();
        match std::fs::remove_file(&self.score_path) {
            Ok(()) => {
                debug!("Cleared {}", self.score_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.score_path, e)),
        }
    }

    /// Latest score; missing or non-numeric content reads as 0
    pub fn read_score(&self) -> f64 {
        let _guard = self.lock.lock();
        match std::fs::read_to_string(&self.score_path) {
            Ok(raw) => parse_score(&raw).unwrap_or_else(|| {
                warn!("Score file holds '{}', treating as 0", raw.trim());
                0.0
            }),
            Err(_) => {
                debug!("No score file yet, treating as 0");
                0.0
            }
        }
    }
}

/// Parse a score literal; rejects NaN and infinities
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|s| s.is_finite())
}

fn io_err(path: &Path, source: std::io::Error) -> StateError {
    StateError::Io {
        path: path.display().to_string(),
        source,
    }
}
