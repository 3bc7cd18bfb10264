//! Workflow Tool Catalogue
//!
//! Every tool the agents can call. Tools return text; failures come back as
//! diagnostic strings through the registry. Each tool truncates its own output.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::agent::tools::{Tool, ToolRegistry, ToolSchema};
use crate::documents::{DocumentKind, DocumentStore};
use crate::extract::truncate_chars;
use crate::literature::{paper_path, LiteratureClient, MAX_SEARCH_RESULTS};
use crate::state::StateStore;

/// Output cap for `read_document`
pub const DOCUMENT_OUTPUT_CHARS: usize = 20_000;
/// Output cap for `read_paper`
pub const PAPER_OUTPUT_CHARS: usize = 12_000;
/// Summary cap per search hit
const SEARCH_SUMMARY_CHARS: usize = 600;

/// Shared collaborators the tools operate on
#[derive(Clone)]
pub struct ToolContext {
    pub documents: Arc<DocumentStore>,
    pub state: Arc<StateStore>,
    pub literature: Arc<LiteratureClient>,
}

/// Register every workflow tool
pub fn build_registry(ctx: &ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // ========== Documents ==========
    registry.register(list_documents(ctx));
    registry.register(read_document(ctx));
    registry.register(save_document(ctx, DocumentKind::Draft));
    registry.register(save_document(ctx, DocumentKind::Comment));

    // ========== Shared state ==========
    registry.register(request_retrieval(ctx));
    registry.register(save_score(ctx));

    // ========== Literature ==========
    registry.register(search_literature(ctx));
    registry.register(download_paper(ctx));
    registry.register(list_papers(ctx));
    registry.register(read_paper(ctx));

    registry
}

fn str_arg<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing '{}' argument", name))
}

fn version_arg(params: &Value) -> Result<Option<u32>> {
    match params.get("version") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| anyhow!("'version' must be a non-negative integer")),
    }
}

fn list_documents(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "list_documents",
        "List existing review drafts, professor comments and downloaded papers.",
    );
    let documents = ctx.documents.clone();

    Tool::new(schema, move |_params| {
        let documents = documents.clone();
        async move { Ok(documents.perceive_text()?) }
    })
}

fn read_document(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "read_document",
        "Read a review draft or a professor comment. Omit version to read the latest one.",
    )
    .with_enum_param("kind", "Document kind", &["review", "comment"], true)
    .with_int_param("version", "Version number; latest if omitted", false);
    let documents = ctx.documents.clone();

    Tool::new(schema, move |params| {
        let documents = documents.clone();
        async move {
            let kind_arg = str_arg(&params, "kind")?;
            let kind = DocumentKind::parse(kind_arg).ok_or_else(|| anyhow!("Unknown document kind: {}", kind_arg))?;

            let (version, content) = match version_arg(&params)? {
                Some(v) => (v, documents.load(kind, v)?),
                None => documents.load_latest(kind)?,
            };

            Ok(format!(
                "{} version {}:\n\n{}",
                kind.as_str(),
                version,
                truncate_chars(&content, DOCUMENT_OUTPUT_CHARS)
            ))
        }
    })
}

fn save_document(ctx: &ToolContext, kind: DocumentKind) -> Tool {
    let (name, description) = match kind {
        DocumentKind::Draft => (
            "save_draft",
            "Save the literature review as a new version (markdown). Existing versions cannot be overwritten.",
        ),
        DocumentKind::Comment => (
            "save_comment",
            "Save review comments on the latest draft as a new version (markdown).",
        ),
    };
    let schema = ToolSchema::new(name, description)
        .with_int_param("version", "Version number for this save", true)
        .with_string_param("content", "Full markdown content", true);
    let documents = ctx.documents.clone();

    Tool::new(schema, move |params| {
        let documents = documents.clone();
        async move {
            let version = version_arg(&params)?.ok_or_else(|| anyhow!("Missing 'version' argument"))?;
            let content = str_arg(&params, "content")?;

            let path = documents.save(kind, version, content)?;
            Ok(format!(
                "Saved {} version {} to {} ({} chars)",
                kind.as_str(),
                version,
                path.display(),
                content.chars().count()
            ))
        }
    })
}

fn request_retrieval(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "request_retrieval",
        "Ask the Literature Retrieval Agent to find and download papers before the next review. \
         Only the most recent request per round is honored.",
    )
    .with_string_param("query", "What to search for", true);
    let state = ctx.state.clone();

    Tool::new(schema, move |params| {
        let state = state.clone();
        async move {
            let query = str_arg(&params, "query")?.trim();
            if query.is_empty() {
                return Err(anyhow!("'query' must not be empty"));
            }
            state.request_retrieval(query)?;
            Ok(format!("Retrieval scheduled for: {}", query))
        }
    })
}

fn save_score(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "save_score",
        "Record the quality score of the latest review draft (0-100). Above 90 ends the workflow.",
    )
    .with_number_param("score", "Score between 0 and 100", true);
    let state = ctx.state.clone();

    Tool::new(schema, move |params| {
        let state = state.clone();
        async move {
            let score = params
                .get("score")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| anyhow!("Missing 'score' argument"))?;
            if !(0.0..=100.0).contains(&score) {
                return Err(anyhow!("Score must be between 0 and 100, got {}", score));
            }
            state.write_score(score)?;
            Ok(format!("Score {} saved", score))
        }
    })
}

fn search_literature(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "search_literature",
        "Search arXiv for papers. Returns identifiers, titles, authors, year and abstracts.",
    )
    .with_string_param("query", "Search query", true)
    .with_int_param("max_results", "Maximum number of results (default 8, max 20)", false);
    let literature = ctx.literature.clone();

    Tool::new(schema, move |params| {
        let literature = literature.clone();
        async move {
            let query = str_arg(&params, "query")?;
            let max_results = params
                .get("max_results")
                .and_then(|v| v.as_u64())
                .map(|n| n as usize)
                .unwrap_or(8)
                .min(MAX_SEARCH_RESULTS);

            let papers = literature.search(query, max_results).await?;
            if papers.is_empty() {
                return Ok(format!("No papers found for: {}", query));
            }

            Ok(papers
                .iter()
                .map(|p| truncate_chars(&p.format(), SEARCH_SUMMARY_CHARS))
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
    })
}

fn download_paper(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new(
        "download_paper",
        "Download the full text of an arXiv paper so other agents can read it.",
    )
    .with_string_param("paper_id", "arXiv identifier, e.g. 2308.11432", true);
    let literature = ctx.literature.clone();
    let documents = ctx.documents.clone();

    Tool::new(schema, move |params| {
        let literature = literature.clone();
        let documents = documents.clone();
        async move {
            let paper_id = str_arg(&params, "paper_id")?;
            let papers_dir = documents.papers_dir();

            if paper_path(&papers_dir, paper_id).exists() {
                return Ok(format!("Paper {} is already downloaded", paper_id));
            }

            let path = literature.fetch_full_text(paper_id, &papers_dir).await?;
            Ok(format!("Downloaded {} to {}", paper_id, path.display()))
        }
    })
}

fn list_papers(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new("list_papers", "List identifiers of downloaded papers.");
    let documents = ctx.documents.clone();

    Tool::new(schema, move |_params| {
        let documents = documents.clone();
        async move {
            let papers = documents.list_papers()?;
            if papers.is_empty() {
                Ok("No papers downloaded yet".to_string())
            } else {
                Ok(papers.join("\n"))
            }
        }
    })
}

fn read_paper(ctx: &ToolContext) -> Tool {
    let schema = ToolSchema::new("read_paper", "Read the stored full text of a downloaded paper.")
        .with_string_param("paper_id", "Identifier as reported by list_papers", true);
    let documents = ctx.documents.clone();

    Tool::new(schema, move |params| {
        let documents = documents.clone();
        async move {
            let paper_id = str_arg(&params, "paper_id")?;
            let path = paper_path(&documents.papers_dir(), paper_id);
            let text = std::fs::read_to_string(&path)
                .map_err(|_| anyhow!("Paper {} has not been downloaded", paper_id))?;
            Ok(truncate_chars(&text, PAPER_OUTPUT_CHARS))
        }
    })
}
