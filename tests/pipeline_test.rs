use knowledge_navigator::config::{AppConfig, FetchConfig, InferenceConfig};
use knowledge_navigator::fetcher::FetchStats;
use knowledge_navigator::types::{RawEntry, Result};
use knowledge_navigator::{KnowledgeStore, MockInferenceBackend, PipelineCoordinator, TopicBucket};
use std::sync::Arc;

fn test_config() -> AppConfig {
    let mut inference = InferenceConfig::with_token("test-token".to_string());
    inference.inter_call_delay_ms = 0;
    inference.retry_delay_seconds = 0;

    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        feeds: Vec::new(),
        inference,
        fetch: FetchConfig::default(),
    }
}

fn raw_entry(n: u32, body: &str) -> RawEntry {
    RawEntry {
        title: format!("Article {}", n),
        body: body.to_string(),
        url: format!("https://example.com/{}", n),
        source_endpoint: "https://example.com/feed".to_string(),
        published_at: None,
    }
}

async fn coordinator_with(
    backend: Arc<MockInferenceBackend>,
) -> Result<(PipelineCoordinator, Arc<KnowledgeStore>)> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let config = test_config();
    let store = Arc::new(KnowledgeStore::connect(&config.database_url).await?);
    let coordinator = PipelineCoordinator::new(config, backend, store.clone());
    Ok((coordinator, store))
}

#[tokio::test]
async fn pipeline_persists_enriched_and_classified_articles() -> Result<()> {
    let backend = Arc::new(
        MockInferenceBackend::new("test").with_concepts(vec!["neural networks".to_string()]),
    );
    let (coordinator, store) = coordinator_with(backend).await?;

    let entries = vec![
        raw_entry(1, "<p>New neural network model announced.</p>"),
        raw_entry(2, "<p>A major data breach was disclosed today.</p>"),
    ];

    let report = coordinator
        .process_entries(entries, FetchStats::default())
        .await?;

    assert_eq!(report.fetched_count, 2);
    assert_eq!(report.processed_count, 2);
    assert_eq!(report.failed_count, 0);
    assert!(!report.all_sources_failed);
    assert_eq!(store.article_count().await?, 2);

    let articles = store.latest_articles(10).await?;
    let by_url = |url: &str| {
        articles
            .iter()
            .find(|a| a.url == url)
            .expect("article should be persisted")
    };

    let first = by_url("https://example.com/1");
    assert_eq!(first.topic, TopicBucket::AiMl);
    assert!(!first.cleaned_body.contains('<'));
    assert_eq!(first.concepts, vec!["neural networks"]);
    assert!(!first.summary.is_empty());

    let second = by_url("https://example.com/2");
    assert_eq!(second.topic, TopicBucket::Cybersecurity);
    Ok(())
}

#[tokio::test]
async fn reingesting_same_urls_is_a_no_op_and_skips_enrichment() -> Result<()> {
    let backend = Arc::new(MockInferenceBackend::new("test"));
    let (coordinator, store) = coordinator_with(backend.clone()).await?;

    let entries = vec![
        raw_entry(1, "First body text."),
        raw_entry(2, "Second body text."),
    ];

    let first_run = coordinator
        .process_entries(entries.clone(), FetchStats::default())
        .await?;
    assert_eq!(first_run.processed_count, 2);
    let calls_after_first = backend.summarize_calls();
    assert_eq!(calls_after_first, 2);

    let second_run = coordinator
        .process_entries(entries, FetchStats::default())
        .await?;
    assert_eq!(second_run.fetched_count, 2);
    assert_eq!(second_run.processed_count, 0);
    assert_eq!(second_run.failed_count, 0);

    // Dedup fired before enrichment: no further inference calls.
    assert_eq!(backend.summarize_calls(), calls_after_first);
    assert_eq!(store.article_count().await?, 2);
    Ok(())
}

#[tokio::test]
async fn duplicate_urls_within_one_batch_are_ingested_once() -> Result<()> {
    let backend = Arc::new(MockInferenceBackend::new("test"));
    let (coordinator, store) = coordinator_with(backend.clone()).await?;

    let entries = vec![raw_entry(1, "Body text."), raw_entry(1, "Body text.")];

    let report = coordinator
        .process_entries(entries, FetchStats::default())
        .await?;
    assert_eq!(report.processed_count, 1);
    assert_eq!(backend.summarize_calls(), 1);
    assert_eq!(store.article_count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn one_failing_article_does_not_poison_the_batch() -> Result<()> {
    let backend = Arc::new(MockInferenceBackend::new("test").with_fail_marker("POISON"));
    let (coordinator, store) = coordinator_with(backend).await?;

    let entries = vec![
        raw_entry(1, "Fine body one."),
        raw_entry(2, "Fine body two."),
        raw_entry(3, "This body is POISON for the backend."),
        raw_entry(4, "Fine body four."),
        raw_entry(5, "Fine body five."),
    ];

    let report = coordinator
        .process_entries(entries, FetchStats::default())
        .await?;

    assert_eq!(report.fetched_count, 5);
    assert_eq!(report.processed_count, 4);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.sample_failures.len(), 1);
    assert_eq!(report.sample_failures[0].url, "https://example.com/3");
    assert!(!report.sample_failures[0].reason.is_empty());

    assert!(!store.article_exists("https://example.com/3").await?);
    for n in [1, 2, 4, 5] {
        assert!(store.article_exists(&format!("https://example.com/{}", n)).await?);
    }
    Ok(())
}

#[tokio::test]
async fn zero_new_articles_is_a_normal_successful_run() -> Result<()> {
    let backend = Arc::new(MockInferenceBackend::new("test"));
    let (coordinator, _store) = coordinator_with(backend).await?;

    let report = coordinator
        .process_entries(
            Vec::new(),
            FetchStats {
                endpoints_total: 2,
                endpoints_failed: 0,
            },
        )
        .await?;

    assert_eq!(report.fetched_count, 0);
    assert_eq!(report.processed_count, 0);
    assert_eq!(report.failed_count, 0);
    assert!(report.is_empty_run());
    Ok(())
}

#[tokio::test]
async fn run_with_every_endpoint_down_is_flagged() -> Result<()> {
    let backend = Arc::new(MockInferenceBackend::new("test"));
    let (coordinator, _store) = coordinator_with(backend).await?;

    let report = coordinator
        .process_entries(
            Vec::new(),
            FetchStats {
                endpoints_total: 3,
                endpoints_failed: 3,
            },
        )
        .await?;

    assert!(report.all_sources_failed);
    assert!(!report.is_empty_run());
    Ok(())
}

#[tokio::test]
async fn concept_mentions_count_once_per_extraction_event() -> Result<()> {
    // The backend returns a case-variant duplicate; both elements count.
    let backend = Arc::new(
        MockInferenceBackend::new("test")
            .with_concepts(vec!["Rust".to_string(), "rust".to_string()]),
    );
    let (coordinator, store) = coordinator_with(backend).await?;

    coordinator
        .process_entries(vec![raw_entry(1, "Body text.")], FetchStats::default())
        .await?;

    let concept = store.get_concept("rust").await?.expect("concept tracked");
    assert_eq!(concept.frequency, 2);
    Ok(())
}
