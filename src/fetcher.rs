use crate::config::{FeedCategory, FetchConfig};
use crate::types::{NavigatorError, RawEntry, Result};
use chrono::Utc;
use feed_rs::parser;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Per-run fetch statistics, used to distinguish "no new content" from
/// "every endpoint failed".
#[derive(Debug, Clone, Default)]
pub struct FetchStats {
    pub endpoints_total: usize,
    pub endpoints_failed: usize,
}

impl FetchStats {
    pub fn all_failed(&self) -> bool {
        self.endpoints_total > 0 && self.endpoints_failed == self.endpoints_total
    }
}

/// Fetches raw entries from configured feed endpoints. Failures are
/// per-endpoint and never abort the batch; there is no retry at this
/// layer since skipped endpoints are cheap to revisit next run.
pub struct FeedFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Fetch every endpoint in every category. Endpoints run concurrently
    /// up to the configured limit, but results keep configured order;
    /// within an endpoint, feed-provided order is kept.
    pub async fn fetch_all(&self, categories: &[FeedCategory]) -> (Vec<RawEntry>, FetchStats) {
        let endpoints: Vec<&str> = categories
            .iter()
            .flat_map(|c| c.endpoints.iter().map(String::as_str))
            .collect();

        let mut stats = FetchStats {
            endpoints_total: endpoints.len(),
            endpoints_failed: 0,
        };

        let results: Vec<Result<Vec<RawEntry>>> = stream::iter(endpoints)
            .map(|endpoint| self.fetch_endpoint(endpoint))
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut entries = Vec::new();
        for result in results {
            match result {
                Ok(batch) => entries.extend(batch),
                Err(e) => {
                    warn!("Skipping endpoint: {}", e);
                    stats.endpoints_failed += 1;
                }
            }
        }

        info!(
            "Fetched {} entries from {} endpoints ({} failed)",
            entries.len(),
            stats.endpoints_total,
            stats.endpoints_failed
        );

        (entries, stats)
    }

    async fn fetch_endpoint(&self, endpoint: &str) -> Result<Vec<RawEntry>> {
        validate_endpoint(endpoint)?;
        debug!("Fetching feed: {}", endpoint);

        let source_err = |reason: String| NavigatorError::SourceUnavailable {
            endpoint: endpoint.to_string(),
            reason,
        };

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| source_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(source_err(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| source_err(e.to_string()))?;

        let feed = parser::parse(body.as_ref())
            .map_err(|e| source_err(format!("parse error: {}", e)))?;

        let entries: Vec<RawEntry> = feed
            .entries
            .into_iter()
            .filter_map(|entry| to_raw_entry(entry, endpoint))
            .take(self.config.articles_per_feed)
            .collect();

        debug!("Parsed {} entries from {}", entries.len(), endpoint);
        Ok(entries)
    }
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let parsed = Url::parse(endpoint)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(NavigatorError::SourceUnavailable {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme: {}", parsed.scheme()),
        });
    }
    Ok(())
}

/// Map a parsed feed entry to a raw entry. Entries without a link are
/// dropped: the url is the natural key for everything downstream.
fn to_raw_entry(entry: feed_rs::model::Entry, endpoint: &str) -> Option<RawEntry> {
    let url = entry.links.first()?.href.clone();

    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());

    let summary = entry.summary.map(|s| s.content);

    // Prefer full content over the summary when the feed carries both.
    let body = entry
        .content
        .and_then(|c| c.body)
        .or(summary)
        .unwrap_or_default();

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc));

    Some(RawEntry {
        title,
        body,
        url,
        source_endpoint: endpoint.to_string(),
        published_at,
    })
}
