//! Agent roles
//!
//! A role is plain data: prompt fragments plus the names of the tools the
//! role may call. One generic agent type runs every role.

use serde::{Deserialize, Serialize};

/// Prompt fragments and tool subset for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRole {
    /// Short identifier used in logs and errors
    pub name: String,
    pub role_description: String,
    pub context: String,
    pub example_command: String,
    pub tool_names: Vec<String>,
}

impl AgentRole {
    pub fn new(name: &str, role_description: &str) -> Self {
        Self {
            name: name.to_string(),
            role_description: role_description.trim().to_string(),
            context: String::new(),
            example_command: String::new(),
            tool_names: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.trim().to_string();
        self
    }

    pub fn with_example(mut self, example: &str) -> Self {
        self.example_command = example.trim().to_string();
        self
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tool_names = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_names.iter().map(|s| s.as_str()).collect()
    }

    /// System message built from the fragments under fixed headers
    ///
    /// Empty fragments keep their header so the layout never shifts.
    pub fn system_prompt(&self) -> String {
        format!(
            "## Role\n\n{}\n\n## Context\n\n{}\n\n## Example Usage\n\n{}",
            or_none(&self.role_description),
            or_none(&self.context),
            or_none(&self.example_command)
        )
    }

    /// Graduate student: drafts and revises the review
    pub fn writer(topic: &str) -> Self {
        Self::new(
            "writer",
            "You are the Graduate Student Agent responsible for writing a scientific literature review \
             under the supervision of a Professor Agent. Each round, read the latest professor comments, \
             revise the review, and save it as a new version.",
        )
        .with_context(&format!(
            "Review topic: {topic}\n\
             Drafts live under reviews/ and professor comments under comments/. \
             Downloaded papers are listed by list_papers and readable with read_paper. \
             When you need more sources, call request_retrieval with a focused search query; \
             a Literature Retrieval Agent will fetch papers before the professor reviews your draft."
        ))
        .with_example(
            "list_documents -> read_document(kind=\"comment\") -> read_paper(paper_id=\"2308.11432\") \
             -> save_draft(version=3, content=\"# Survey of ...\")",
        )
        .with_tools(&[
            "list_documents",
            "read_document",
            "save_draft",
            "request_retrieval",
            "list_papers",
            "read_paper",
        ])
    }

    /// Literature retriever: searches and downloads sources
    pub fn retriever(topic: &str) -> Self {
        Self::new(
            "retriever",
            "You are the Literature Retrieval Agent. Given a search request from the Graduate Student \
             Agent, find the most relevant papers and download their full text. Reply with a short list \
             of what you downloaded and why it is relevant.",
        )
        .with_context(&format!(
            "Review topic: {topic}\n\
             Avoid downloading papers that list_papers already reports."
        ))
        .with_example(
            "search_literature(query=\"tool-using LLM agents\", max_results=8) -> download_paper(paper_id=\"2302.04761\")",
        )
        .with_tools(&["search_literature", "download_paper", "list_papers"])
    }

    /// Professor: comments on and scores the latest draft
    pub fn reviewer(topic: &str) -> Self {
        Self::new(
            "reviewer",
            "You are the Professor Agent responsible for reviewing and guiding the Graduate Student Agent's \
             literature review writing process. Give a brief response.",
        )
        .with_context(&format!(
            "Review topic: {topic}\n\
             Read the latest review version, save your comments as a new comment version, \
             then record a score from 0 to 100 with save_score. A score above 90 means the review \
             is ready for submission."
        ))
        .with_example(
            "read_document(kind=\"review\") -> save_comment(version=3, content=\"...\") -> save_score(score=72)",
        )
        .with_tools(&[
            "list_documents",
            "read_document",
            "list_papers",
            "read_paper",
            "save_comment",
            "save_score",
        ])
    }
}

fn or_none(s: &str) -> &str {
    if s.trim().is_empty() {
        "(none)"
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_sections() {
        let role = AgentRole::new("tester", "Test things.")
            .with_context("Topic: testing")
            .with_example("run()");
        let prompt = role.system_prompt();

        let role_pos = prompt.find("## Role").unwrap();
        let ctx_pos = prompt.find("## Context").unwrap();
        let ex_pos = prompt.find("## Example Usage").unwrap();
        assert!(role_pos < ctx_pos && ctx_pos < ex_pos);
        assert!(prompt.contains("Topic: testing"));
    }

    #[test]
    fn test_empty_fragments_keep_headers() {
        let prompt = AgentRole::new("bare", "Only a role.").system_prompt();
        assert!(prompt.contains("## Context\n\n(none)"));
        assert!(prompt.contains("## Example Usage\n\n(none)"));
    }

    #[test]
    fn test_builtin_roles_reference_topic() {
        for role in [
            AgentRole::writer("Diffusion Models"),
            AgentRole::retriever("Diffusion Models"),
            AgentRole::reviewer("Diffusion Models"),
        ] {
            assert!(role.context.contains("Diffusion Models"));
            assert!(!role.tool_names.is_empty());
        }
        assert!(AgentRole::writer("x").tool_names().contains(&"request_retrieval"));
        assert!(AgentRole::reviewer("x").tool_names().contains(&"save_score"));
    }
}
