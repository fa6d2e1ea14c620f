use chrono::{Duration, TimeZone, Utc};
use knowledge_navigator::types::{Article, Result};
use knowledge_navigator::{ConceptIndex, KnowledgeStore, TopicBucket};
use std::sync::Arc;

async fn index_with_store() -> Result<(ConceptIndex, Arc<KnowledgeStore>)> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    let store = Arc::new(KnowledgeStore::connect("sqlite::memory:").await?);
    let index = ConceptIndex::new(store.clone());
    Ok((index, store))
}

fn article(url: &str, concepts: &[&str], published_at: chrono::DateTime<Utc>) -> Article {
    Article {
        id: None,
        title: format!("Article at {}", url),
        cleaned_body: "body".to_string(),
        url: url.to_string(),
        source_endpoint: "https://example.com/feed".to_string(),
        topic: TopicBucket::Tech,
        summary: "summary".to_string(),
        concepts: concepts.iter().map(|c| c.to_string()).collect(),
        published_at,
        processed_at: Utc::now(),
    }
}

#[tokio::test]
async fn trending_orders_by_frequency_then_recency_then_name() -> Result<()> {
    let (index, _store) = index_with_store().await?;

    let t = Utc::now();
    let names = |n: &str| vec![n.to_string()];

    for _ in 0..5 {
        index.record_mentions(&names("a"), t).await?;
    }
    for _ in 0..5 {
        index.record_mentions(&names("b"), t - Duration::hours(1)).await?;
    }
    for _ in 0..3 {
        index.record_mentions(&names("c"), t).await?;
    }

    let trending = index.trending(7).await?;
    let order: Vec<&str> = trending.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(trending[0].frequency, 5);
    assert_eq!(trending[2].frequency, 3);
    Ok(())
}

#[tokio::test]
async fn trending_is_capped_and_windowed() -> Result<()> {
    let (index, _store) = index_with_store().await?;

    let now = Utc::now();
    for i in 0..12 {
        index
            .record_mentions(&[format!("concept-{:02}", i)], now)
            .await?;
    }
    // Outside any reasonable window.
    index
        .record_mentions(&["ancient".to_string()], now - Duration::days(30))
        .await?;

    let trending = index.trending(7).await?;
    assert_eq!(trending.len(), 10);
    assert!(trending.iter().all(|c| c.name != "ancient"));
    Ok(())
}

#[tokio::test]
async fn frequency_counts_mentions_and_never_decreases() -> Result<()> {
    let (index, store) = index_with_store().await?;

    let t1 = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2026, 8, 2, 10, 0, 0).unwrap();

    index.record_mentions(&["AI".to_string()], t1).await?;
    index
        .record_mentions(&["ai".to_string(), " Ai ".to_string()], t2)
        .await?;

    let concept = store.get_concept("ai").await?.expect("tracked");
    assert_eq!(concept.frequency, 3);
    assert_eq!(concept.last_seen_at, t2);

    // An out-of-order older mention still increments, and recency holds.
    index.record_mentions(&["ai".to_string()], t1).await?;
    let concept = store.get_concept("ai").await?.expect("tracked");
    assert_eq!(concept.frequency, 4);
    assert_eq!(concept.last_seen_at, t2);
    Ok(())
}

#[tokio::test]
async fn empty_names_are_ignored() -> Result<()> {
    let (index, store) = index_with_store().await?;

    let recorded = index
        .record_mentions(
            &["".to_string(), "   ".to_string(), "real".to_string()],
            Utc::now(),
        )
        .await?;

    assert_eq!(recorded, 1);
    assert!(store.get_concept("real").await?.is_some());
    assert!(store.get_concept("").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn related_articles_match_case_insensitively_newest_first() -> Result<()> {
    let (index, store) = index_with_store().await?;

    let older = Utc.with_ymd_and_hms(2026, 8, 1, 8, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2026, 8, 5, 8, 0, 0).unwrap();

    store
        .save_article(&article("https://x/1", &["Rust", "tokio"], older))
        .await?;
    store
        .save_article(&article("https://x/2", &["rust"], newer))
        .await?;
    store
        .save_article(&article("https://x/3", &["python"], newer))
        .await?;

    let related = index.related_articles("RUST", 5).await?;
    assert_eq!(related.len(), 2);
    assert_eq!(related[0].url, "https://x/2");
    assert_eq!(related[1].url, "https://x/1");
    Ok(())
}

#[tokio::test]
async fn recommendations_omit_concepts_without_articles() -> Result<()> {
    let (index, store) = index_with_store().await?;

    let now = Utc::now();
    store
        .save_article(&article("https://x/1", &["rust"], now))
        .await?;

    index.record_mentions(&["rust".to_string()], now).await?;
    index.record_mentions(&["orphan".to_string()], now).await?;
    index.record_mentions(&["orphan".to_string()], now).await?;

    let recommendations = index.recommendations().await?;
    assert_eq!(recommendations.len(), 1);
    assert_eq!(recommendations[0].concept, "rust");
    assert_eq!(recommendations[0].frequency, 1);
    assert_eq!(recommendations[0].top_related_articles.len(), 1);
    Ok(())
}

#[tokio::test]
async fn concept_summary_returns_state_or_nothing() -> Result<()> {
    let (index, store) = index_with_store().await?;

    let now = Utc::now();
    store
        .save_article(&article("https://x/1", &["serde"], now))
        .await?;
    index.record_mentions(&["Serde".to_string()], now).await?;

    let (concept, related) = index
        .concept_summary("serde")
        .await?
        .expect("known concept");
    assert_eq!(concept.frequency, 1);
    assert_eq!(related.len(), 1);

    assert!(index.concept_summary("unknown").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn saving_the_same_url_twice_keeps_one_row() -> Result<()> {
    let (_index, store) = index_with_store().await?;

    let now = Utc::now();
    let first = store.save_article(&article("https://x/1", &["a"], now)).await?;
    let second = store.save_article(&article("https://x/1", &["b"], now)).await?;

    assert!(matches!(first, knowledge_navigator::store::SaveOutcome::Inserted(_)));
    assert_eq!(second, knowledge_navigator::store::SaveOutcome::AlreadyIngested);
    assert_eq!(store.article_count().await?, 1);

    // The original row is untouched.
    let related = store.query_related("a", 5).await?;
    assert_eq!(related.len(), 1);
    Ok(())
}
