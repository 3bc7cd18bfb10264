//! Literature search client
//!
//! Thin arXiv client: query the Atom API and fetch full text for a paper.
//! Result order is whatever the remote service returns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::HttpStatusError;
use crate::extract::{decode_entities, html_to_text};
use crate::recovery::{RecoveryStrategy, RetryPolicy};

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const ARXIV_BASE_URL: &str = "https://arxiv.org";
const USER_AGENT: &str = concat!("autoreview/", env!("CARGO_PKG_VERSION"));

/// Upper bound on results per search
pub const MAX_SEARCH_RESULTS: usize = 20;

static RE_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap());
static RE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"<id>\s*https?://arxiv\.org/abs/([^<\s]+)\s*</id>").unwrap());
static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<title[^>]*>(.*?)</title>").unwrap());
static RE_SUMMARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<summary[^>]*>(.*?)</summary>").unwrap());
static RE_PUBLISHED: Lazy<Regex> = Lazy::new(|| Regex::new(r"<published>([^<]+)</published>").unwrap());
static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").unwrap());
static RE_VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+$").unwrap());

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperSummary {
    /// arXiv identifier without version suffix, e.g. `2308.11432`
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub summary: String,
}

impl PaperSummary {
    /// One-paragraph rendering for tool output
    pub fn format(&self) -> String {
        let authors = match self.authors.len() {
            0 => "unknown authors".to_string(),
            1..=3 => self.authors.join(", "),
            n => format!("{} et al. ({} authors)", self.authors[..3].join(", "), n),
        };
        let year = self
            .published
            .map(|d| d.format("%Y").to_string())
            .unwrap_or_else(|| "n.d.".to_string());

        format!(
            "[{}] {} ({}; {})\n{}",
            self.id, self.title, authors, year, self.summary
        )
    }
}

/// Normalize whitespace inside an Atom text node
fn clean_text(s: &str) -> String {
    decode_entities(s).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into summaries
pub fn parse_atom_feed(xml: &str) -> Vec<PaperSummary> {
    RE_ENTRY
        .captures_iter(xml)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let raw_id = RE_ID.captures(body)?.get(1)?.as_str();
            let id = RE_VERSION_SUFFIX.replace(raw_id, "").to_string();

            let title = RE_TITLE
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default();
            let summary = RE_SUMMARY
                .captures(body)
                .and_then(|c| c.get(1))
                .map(|m| clean_text(m.as_str()))
                .unwrap_or_default();
            let published = RE_PUBLISHED
                .captures(body)
                .and_then(|c| c.get(1))
                .and_then(|m| DateTime::parse_from_rfc3339(m.as_str().trim()).ok())
                .map(|d| d.with_timezone(&Utc));
            let authors = RE_AUTHOR
                .captures_iter(body)
                .filter_map(|c| c.get(1).map(|m| clean_text(m.as_str())))
                .collect();

            Some(PaperSummary {
                id,
                title,
                authors,
                published,
                summary,
            })
        })
        .collect()
}

/// Map an external identifier to a safe file stem (`hep-th/9901001` -> `hep-th_9901001`)
pub fn paper_file_stem(paper_id: &str) -> String {
    paper_id
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

/// Path of a stored paper under `papers_dir`
pub fn paper_path(papers_dir: &Path, paper_id: &str) -> PathBuf {
    papers_dir.join(format!("{}.txt", paper_file_stem(paper_id)))
}

/// arXiv client with internal retries
#[derive(Clone)]
pub struct LiteratureClient {
    client: Client,
    retry: RecoveryStrategy,
    api_url: String,
    base_url: String,
}

impl LiteratureClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            retry: RecoveryStrategy::new("arxiv", RetryPolicy::default()),
            api_url: ARXIV_API_URL.to_string(),
            base_url: ARXIV_BASE_URL.to_string(),
        })
    }

    /// Point the client at another host (mirrors, tests)
    pub fn with_endpoints(mut self, api_url: &str, base_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RecoveryStrategy::new("arxiv", policy);
        self
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let client = &self.client;
        self.retry
            .execute(move || async move {
                let response = client.get(url).query(query).send().await?;
                let status = response.status();
                if !status.is_success() {
                    debug!("HTTP {} for {}", status.as_u16(), url);
                    return Err(anyhow::Error::new(HttpStatusError {
                        status: status.as_u16(),
                    }));
                }
                Ok::<_, anyhow::Error>(response.text().await?)
            })
            .await
    }

    /// Search by free-text query
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PaperSummary>> {
        let max_results = max_results.clamp(1, MAX_SEARCH_RESULTS);
        let params = [
            ("search_query", format!("all:{}", query)),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
        ];

        let xml = self.get_text(&self.api_url, &params).await?;
        let papers = parse_atom_feed(&xml);
        info!("arXiv search '{}': {} result(s)", query, papers.len());
        Ok(papers)
    }

    /// Fetch a paper's full text and store it under `papers_dir`
    ///
    /// Tries the HTML rendering first and falls back to the abstract page.
    pub async fn fetch_full_text(&self, paper_id: &str, papers_dir: &Path) -> Result<PathBuf> {
        let id = paper_id.trim();
        if id.is_empty() {
            anyhow::bail!("invalid paper id: empty");
        }

        let html = match self.get_text(&format!("{}/html/{}", self.base_url, id), &[]).await {
            Ok(html) => html,
            Err(e) => {
                debug!("No HTML rendering for {} ({}), using abstract page", id, e);
                self.get_text(&format!("{}/abs/{}", self.base_url, id), &[]).await?
            }
        };

        let text = html_to_text(&html);
        if text.is_empty() {
            anyhow::bail!("No text extracted for {}", id);
        }

        std::fs::create_dir_all(papers_dir)?;
        let path = paper_path(papers_dir, id);
        std::fs::write(&path, &text).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Stored {} ({} chars) at {}", id, text.len(), path.display());
        Ok(path)
    }
}
