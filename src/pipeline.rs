use crate::classifier::{self, TopicBucket};
use crate::config::AppConfig;
use crate::enrichment::{EnrichmentClient, InferenceBackend};
use crate::fetcher::{FeedFetcher, FetchStats};
use crate::insights::ConceptIndex;
use crate::normalizer;
use crate::store::{KnowledgeStore, SaveOutcome};
use crate::types::{Article, FailureRecord, RawEntry, Result, RunReport};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SAMPLE_FAILURES: usize = 3;

/// Pipeline states. Any state may transition directly to `Done` when its
/// input set is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetching,
    Deduplicating,
    Normalizing,
    Enriching,
    Classifying,
    Persisting,
    Indexing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Fetching => "fetching",
            RunStage::Deduplicating => "deduplicating",
            RunStage::Normalizing => "normalizing",
            RunStage::Enriching => "enriching",
            RunStage::Classifying => "classifying",
            RunStage::Persisting => "persisting",
            RunStage::Indexing => "indexing",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

impl RunStage {
    fn advance(self, next: RunStage) -> RunStage {
        debug!("Pipeline stage: {} -> {}", self, next);
        next
    }
}

/// Sequences one run: fetch, dedup, normalize, enrich, classify, persist,
/// index. Runs are strictly sequential; concurrent runs against the same
/// store must be serialized by the caller.
pub struct PipelineCoordinator {
    config: AppConfig,
    fetcher: FeedFetcher,
    enrichment: EnrichmentClient,
    store: Arc<KnowledgeStore>,
    index: ConceptIndex,
}

impl PipelineCoordinator {
    pub fn new(
        config: AppConfig,
        backend: Arc<dyn InferenceBackend>,
        store: Arc<KnowledgeStore>,
    ) -> Self {
        let fetcher = FeedFetcher::new(config.fetch.clone());
        let enrichment = EnrichmentClient::new(backend, config.inference.clone());
        let index = ConceptIndex::new(store.clone());

        Self {
            config,
            fetcher,
            enrichment,
            store,
            index,
        }
    }

    /// Run the full pipeline once and report fetched/processed/failed.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Starting pipeline run over {} feed categories",
            self.config.feeds.len()
        );
        let (entries, stats) = self.fetcher.fetch_all(&self.config.feeds).await;
        self.process_entries(entries, stats).await
    }

    /// Everything after the fetch stage. Split out so the pipeline can be
    /// driven with already-fetched entries.
    pub async fn process_entries(
        &self,
        entries: Vec<RawEntry>,
        stats: FetchStats,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let fetched_count = entries.len();
        let mut failures: Vec<FailureRecord> = Vec::new();
        let mut stage = RunStage::Fetching;

        if stats.all_failed() {
            warn!("Every configured endpoint failed this run");
        }

        // Dedup before any enrichment work: inference budget is the
        // expensive resource here.
        stage = stage.advance(RunStage::Deduplicating);
        let mut seen_this_run = HashSet::new();
        let mut fresh = Vec::new();
        for entry in entries {
            if !seen_this_run.insert(entry.url.clone()) {
                debug!("Duplicate url within batch: {}", entry.url);
                continue;
            }
            if self.store.article_exists(&entry.url).await? {
                debug!("Already ingested: {}", entry.url);
                continue;
            }
            fresh.push(entry);
        }

        if fresh.is_empty() {
            info!("No new articles after deduplication");
            return Ok(self.finish(run_id, started_at, fetched_count, 0, failures, &stats, stage));
        }

        stage = stage.advance(RunStage::Normalizing);
        let normalized: Vec<_> = fresh.into_iter().map(normalizer::normalize).collect();

        stage = stage.advance(RunStage::Enriching);
        let outcome = self.enrichment.process_batch(normalized).await;
        for (entry, reason) in outcome.failed {
            failures.push(FailureRecord {
                url: entry.url,
                title: entry.title,
                reason,
            });
        }

        if outcome.succeeded.is_empty() {
            return Ok(self.finish(run_id, started_at, fetched_count, 0, failures, &stats, stage));
        }

        stage = stage.advance(RunStage::Classifying);
        let processed_at = Utc::now();
        let articles: Vec<Article> = outcome
            .succeeded
            .into_iter()
            .map(|enriched| {
                let topic = classifier::classify(
                    &enriched.entry.title,
                    &enriched.entry.cleaned_body,
                    &enriched.summary,
                );
                Article {
                    id: None,
                    title: enriched.entry.title,
                    cleaned_body: enriched.entry.cleaned_body,
                    url: enriched.entry.url,
                    source_endpoint: enriched.entry.source_endpoint,
                    topic,
                    summary: enriched.summary,
                    concepts: enriched.concepts,
                    published_at: enriched.entry.published_at,
                    processed_at,
                }
            })
            .collect();

        stage = stage.advance(RunStage::Persisting);
        let mut persisted = Vec::new();
        for mut article in articles {
            match self.store.save_article(&article).await? {
                SaveOutcome::Inserted(id) => {
                    article.id = Some(id);
                    persisted.push(article);
                }
                SaveOutcome::AlreadyIngested => {
                    // Lost the dedup race only if another writer slipped in;
                    // treated as already-ingested content either way.
                    debug!("Skipping duplicate at save time: {}", article.url);
                }
            }
        }

        stage = stage.advance(RunStage::Indexing);
        for article in &persisted {
            self.index
                .record_mentions(&article.concepts, article.processed_at)
                .await?;
        }

        let processed_count = persisted.len();
        Ok(self.finish(
            run_id,
            started_at,
            fetched_count,
            processed_count,
            failures,
            &stats,
            stage,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        fetched_count: usize,
        processed_count: usize,
        failures: Vec<FailureRecord>,
        stats: &FetchStats,
        stage: RunStage,
    ) -> RunReport {
        stage.advance(RunStage::Done);

        let report = RunReport {
            run_id,
            fetched_count,
            processed_count,
            failed_count: failures.len(),
            sample_failures: failures.into_iter().take(SAMPLE_FAILURES).collect(),
            all_sources_failed: stats.all_failed(),
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Run {} finished: fetched {}, persisted {}, failed {}",
            report.run_id, report.fetched_count, report.processed_count, report.failed_count
        );
        report
    }

    pub fn concept_index(&self) -> &ConceptIndex {
        &self.index
    }

    pub fn enrichment(&self) -> &EnrichmentClient {
        &self.enrichment
    }
}

/// Group a run's articles by topic bucket, in bucket order. Computed
/// fresh from the given set, never cumulative across history.
pub fn group_by_topic(articles: &[Article]) -> Vec<crate::types::TopicGroup> {
    TopicBucket::ALL
        .iter()
        .filter_map(|bucket| {
            let grouped: Vec<Article> = articles
                .iter()
                .filter(|a| a.topic == *bucket)
                .cloned()
                .collect();
            if grouped.is_empty() {
                return None;
            }

            let mut sources: Vec<String> = grouped
                .iter()
                .map(|a| a.source_endpoint.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            sources.sort();

            Some(crate::types::TopicGroup {
                bucket: *bucket,
                articles: grouped,
                sources,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, topic: TopicBucket, source: &str) -> Article {
        Article {
            id: None,
            title: url.to_string(),
            cleaned_body: String::new(),
            url: url.to_string(),
            source_endpoint: source.to_string(),
            topic,
            summary: String::new(),
            concepts: Vec::new(),
            published_at: Utc::now(),
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn groups_follow_bucket_order_and_skip_empty_buckets() {
        let articles = vec![
            article("https://x/1", TopicBucket::Tech, "feed-a"),
            article("https://x/2", TopicBucket::AiMl, "feed-b"),
            article("https://x/3", TopicBucket::AiMl, "feed-a"),
        ];

        let groups = group_by_topic(&articles);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].bucket, TopicBucket::AiMl);
        assert_eq!(groups[0].articles.len(), 2);
        assert_eq!(groups[0].sources, vec!["feed-a", "feed-b"]);
        assert_eq!(groups[1].bucket, TopicBucket::Tech);
    }
}
