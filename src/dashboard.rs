use crate::store::KnowledgeStore;
use crate::types::{Article, Result};
use chrono::NaiveDate;
use std::sync::Arc;

/// Read-only queries over persisted articles for the dashboard layer.
/// Simple filtered reads, not part of the pipeline core.
pub struct Dashboard {
    store: Arc<KnowledgeStore>,
}

impl Dashboard {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn latest(&self, limit: u32) -> Result<Vec<Article>> {
        self.store.latest_articles(limit).await
    }

    /// Case-insensitive match over title, summary, and concepts.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<Article>> {
        self.store.search_articles(query, limit).await
    }

    pub async fn articles_for_concept(&self, concept: &str, limit: u32) -> Result<Vec<Article>> {
        self.store.query_related(concept, limit).await
    }

    pub async fn on_date(&self, date: NaiveDate) -> Result<Vec<Article>> {
        self.store.articles_by_date(date).await
    }
}
