//! Input types for a structuring run.
//!
//! Both sources arrive fully fetched and filtered by upstream collaborators:
//! document extraction produces a `SourceDocument`, the GitHub fetcher
//! produces an `EnrichmentSnapshot` with repositories already ranked by
//! relevance. This crate treats both as read-only facts and never refetches
//! or re-filters them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extracted plain text of an uploaded resume, with whatever metadata the
/// extractor attached. Only `text` matters to the pipeline; the metadata is
/// carried through to logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    pub text: String,
    #[serde(default)]
    pub character_count: Option<usize>,
    /// Extractor warnings (truncated pages, encoding fallbacks, ...).
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            character_count: Some(text.chars().count()),
            warnings: Vec::new(),
            text,
        }
    }
}

/// Point-in-time GitHub enrichment data for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichmentSnapshot {
    pub profile: GithubProfile,
    /// Ordered most-relevant-first by the fetcher.
    #[serde(default)]
    pub repositories: Vec<RepositoryRecord>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GithubProfile {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub public_repos: u32,
    #[serde(default)]
    pub followers: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub forks: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    /// README text already truncated by the fetcher; the prompt assembler
    /// truncates again to its own budget.
    #[serde(default)]
    pub readme_excerpt: Option<String>,
}
