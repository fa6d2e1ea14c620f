use crate::classifier::TopicBucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A raw feed item as produced by the feed source adapter, before any
/// deduplication or normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    pub title: String,
    pub body: String,
    pub url: String,
    pub source_endpoint: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A raw entry after markup stripping and timestamp defaulting.
#[derive(Debug, Clone)]
pub struct NormalizedEntry {
    pub title: String,
    pub cleaned_body: String,
    pub url: String,
    pub source_endpoint: String,
    pub published_at: DateTime<Utc>,
}

/// A normalized entry plus the outputs of the external inference calls.
#[derive(Debug, Clone)]
pub struct EnrichedEntry {
    pub entry: NormalizedEntry,
    pub summary: String,
    /// Extraction order is preserved; case variants are not collapsed here.
    pub concepts: Vec<String>,
}

/// The durable unit. `url` uniquely identifies an article; a second
/// ingestion of the same url is a no-op against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Assigned by the store on first persist.
    pub id: Option<i64>,
    pub title: String,
    pub cleaned_body: String,
    pub url: String,
    pub source_endpoint: String,
    pub topic: TopicBucket,
    pub summary: String,
    pub concepts: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// A tracked concept, keyed by trimmed, case-folded name. `frequency`
/// counts enrichment events mentioning it and never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub frequency: i64,
    pub last_seen_at: DateTime<Utc>,
}

/// A concept paired with its related articles, as surfaced to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub concept: String,
    pub frequency: i64,
    pub top_related_articles: Vec<Article>,
}

/// Per-run grouping of articles by topic bucket. Recomputed each run,
/// never stored.
#[derive(Debug, Clone)]
pub struct TopicGroup {
    pub bucket: TopicBucket,
    pub articles: Vec<Article>,
    pub sources: Vec<String>,
}

/// One article that failed enrichment or persistence, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub title: String,
    pub reason: String,
}

/// The externally observable result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched_count: usize,
    pub processed_count: usize,
    pub failed_count: usize,
    pub sample_failures: Vec<FailureRecord>,
    /// Set when every configured endpoint failed; a zero-article run is
    /// otherwise a normal outcome and must stay distinguishable from this.
    pub all_sources_failed: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_empty_run(&self) -> bool {
        self.fetched_count == 0 && !self.all_sources_failed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NavigatorError {
    #[error("source unavailable: {endpoint}: {reason}")]
    SourceUnavailable { endpoint: String, reason: String },

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NavigatorError>;
