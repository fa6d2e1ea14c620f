use crate::store::KnowledgeStore;
use crate::types::{Article, Concept, Recommendation, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// How many concepts a trend query returns at most.
const TRENDING_TOP_N: u32 = 10;
/// Recency window, in days, feeding recommendations.
const RECOMMENDATION_WINDOW_DAYS: i64 = 7;
/// Related articles attached to each recommendation.
const RECOMMENDATION_ARTICLES: u32 = 3;

const DEFAULT_RELATED_LIMIT: u32 = 5;

/// Frequency-and-recency index over extracted concepts. Index keys are
/// trimmed and case-folded; the articles' own concept lists keep their
/// original casing.
pub struct ConceptIndex {
    store: Arc<KnowledgeStore>,
}

impl ConceptIndex {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Record one mention per listed name. Names are trimmed and
    /// case-folded; empty names are ignored. Duplicates within the list
    /// each count: one increment per extraction event per concept.
    pub async fn record_mentions(
        &self,
        concept_names: &[String],
        observed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut recorded = 0;
        for name in concept_names {
            let normalized = name.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            self.store.upsert_concept(&normalized, observed_at).await?;
            recorded += 1;
        }

        debug!("Recorded {} concept mentions", recorded);
        Ok(recorded)
    }

    /// Concepts seen within the window, most frequent first; ties broken
    /// by recency, then name, so results are deterministic.
    pub async fn trending(&self, window_days: i64) -> Result<Vec<Concept>> {
        let cutoff = Utc::now() - Duration::days(window_days);
        self.store.query_trending(cutoff, TRENDING_TOP_N).await
    }

    /// Articles whose concept list matches the name, newest first.
    pub async fn related_articles(&self, concept_name: &str, limit: u32) -> Result<Vec<Article>> {
        self.store.query_related(concept_name, limit).await
    }

    /// Trending concepts paired with their top related articles. A
    /// trending concept with no retrievable articles is not actionable
    /// and is omitted.
    pub async fn recommendations(&self) -> Result<Vec<Recommendation>> {
        let trending = self.trending(RECOMMENDATION_WINDOW_DAYS).await?;
        let mut recommendations = Vec::new();

        for concept in trending {
            let related = self
                .related_articles(&concept.name, RECOMMENDATION_ARTICLES)
                .await?;
            if related.is_empty() {
                continue;
            }
            recommendations.push(Recommendation {
                concept: concept.name,
                frequency: concept.frequency,
                top_related_articles: related,
            });
        }

        info!("Generated {} recommendations", recommendations.len());
        Ok(recommendations)
    }

    /// A concept's tracked state plus its related articles, or `None`
    /// for an unknown concept.
    pub async fn concept_summary(
        &self,
        concept_name: &str,
    ) -> Result<Option<(Concept, Vec<Article>)>> {
        let normalized = concept_name.trim().to_lowercase();
        let Some(concept) = self.store.get_concept(&normalized).await? else {
            return Ok(None);
        };

        let related = self
            .related_articles(&normalized, DEFAULT_RELATED_LIMIT)
            .await?;
        Ok(Some((concept, related)))
    }
}
