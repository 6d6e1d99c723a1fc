use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::NormalizedCandidate;

/// A persisted news article. Rows are append-only: the archive feeds the
/// digest and every future dedup check, so nothing here is ever deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub site: String,
    pub title: String,
    /// Canonical URL, unique across the table
    pub url: String,
    /// Identity hash, unique across the table
    pub hash: String,
    pub content: String,
    pub body: Option<String>,
    pub summary: Option<String>,
    pub category: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scraped_at: DateTime<Utc>,
    pub retry_count: i64,
}

/// Data required to insert a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub site: String,
    pub title: String,
    pub url: String,
    pub hash: String,
    pub content: String,
    pub body: Option<String>,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

impl NewArticle {
    pub fn from_candidate(normalized: &NormalizedCandidate) -> Self {
        let candidate = &normalized.candidate;
        Self {
            site: candidate.source.as_str().to_string(),
            title: candidate.title.clone(),
            url: normalized.canonical_url.clone(),
            hash: normalized.hash.clone(),
            content: format!("カテゴリ: {}", candidate.category),
            body: candidate.body.clone(),
            category: candidate.category.clone(),
            published_at: candidate.published_at,
        }
    }
}

/// Persisted wire item: same identity discipline as [`Article`], narrower
/// field set (no body, no summary, no refresh bookkeeping).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireArticle {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub hash: String,
    pub category: String,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Data required to insert a new wire article
#[derive(Debug, Clone)]
pub struct NewWireArticle {
    pub title: String,
    pub url: String,
    pub hash: String,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

impl NewWireArticle {
    pub fn from_candidate(normalized: &NormalizedCandidate) -> Self {
        let candidate = &normalized.candidate;
        Self {
            title: candidate.title.clone(),
            url: normalized.canonical_url.clone(),
            hash: normalized.hash.clone(),
            category: candidate.category.clone(),
            published_at: candidate.published_at,
        }
    }
}
