use crate::classifier::TopicBucket;
use crate::types::{Article, Concept, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// Outcome of an article save. A url conflict is already-ingested
/// content, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(i64),
    AlreadyIngested,
}

/// SQLite-backed persistent store for articles and concepts.
pub struct KnowledgeStore {
    db: SqlitePool,
}

impl KnowledgeStore {
    /// Open (creating if missing) the database and initialize the schema.
    /// One connection: in-memory SQLite databases are per-connection, and
    /// runs are single-writer.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { db };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                topic TEXT NOT NULL,
                summary TEXT NOT NULL,
                concepts TEXT NOT NULL,
                published_at TEXT NOT NULL,
                processed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS concepts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                frequency INTEGER NOT NULL,
                last_seen TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        debug!("Database schema initialized");
        Ok(())
    }

    pub async fn article_exists(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM articles WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    /// Persist an article, idempotent by url: a second save of the same
    /// url never creates a duplicate row and never updates the first.
    pub async fn save_article(&self, article: &Article) -> Result<SaveOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, body, url, source, topic, summary, concepts, published_at, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.cleaned_body)
        .bind(&article.url)
        .bind(&article.source_endpoint)
        .bind(article.topic.as_str())
        .bind(&article.summary)
        .bind(article.concepts.join(","))
        .bind(article.published_at)
        .bind(article.processed_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            debug!("Article already ingested: {}", article.url);
            Ok(SaveOutcome::AlreadyIngested)
        } else {
            Ok(SaveOutcome::Inserted(result.last_insert_rowid()))
        }
    }

    /// Upsert one concept mention. A single statement, so atomic per name.
    pub async fn upsert_concept(&self, name: &str, observed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO concepts (name, frequency, last_seen)
            VALUES (?1, 1, ?2)
            ON CONFLICT(name) DO UPDATE SET
                frequency = frequency + 1,
                last_seen = MAX(last_seen, excluded.last_seen)
            "#,
        )
        .bind(name)
        .bind(observed_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn query_trending(&self, cutoff: DateTime<Utc>, top_n: u32) -> Result<Vec<Concept>> {
        let rows = sqlx::query(
            r#"
            SELECT name, frequency, last_seen FROM concepts
            WHERE last_seen >= ?1
            ORDER BY frequency DESC, last_seen DESC, name ASC
            LIMIT ?2
            "#,
        )
        .bind(cutoff)
        .bind(top_n)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| concept_from_row(&row)).collect()
    }

    pub async fn get_concept(&self, name: &str) -> Result<Option<Concept>> {
        let row = sqlx::query("SELECT name, frequency, last_seen FROM concepts WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;

        row.map(|row| concept_from_row(&row)).transpose()
    }

    /// Articles whose concept list contains a case-insensitive substring
    /// match of the given name, newest first. The backlink is recomputed
    /// per query rather than stored as an edge.
    pub async fn query_related(&self, concept_substring: &str, limit: u32) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", concept_substring.to_lowercase());
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE lower(concepts) LIKE ?1
            ORDER BY published_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| article_from_row(&row)).collect()
    }

    pub async fn articles_by_date(&self, date: NaiveDate) -> Result<Vec<Article>> {
        let day_start = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        let day_end = day_start + Duration::days(1);

        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE processed_at >= ?1 AND processed_at < ?2
            ORDER BY processed_at DESC
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| article_from_row(&row)).collect()
    }

    pub async fn latest_articles(&self, limit: u32) -> Result<Vec<Article>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY processed_at DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(|row| article_from_row(&row)).collect()
    }

    /// Case-insensitive search over title, summary, and concept list.
    pub async fn search_articles(&self, query: &str, limit: u32) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", query.to_lowercase());
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE lower(title) LIKE ?1 OR lower(summary) LIKE ?1 OR lower(concepts) LIKE ?1
            ORDER BY processed_at DESC
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|row| article_from_row(&row)).collect()
    }

    pub async fn article_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn stats(&self) -> Result<(i64, i64)> {
        let articles = self.article_count().await?;
        let concepts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM concepts")
            .fetch_one(&self.db)
            .await?;
        info!("Store contains {} articles, {} concepts", articles, concepts);
        Ok((articles, concepts))
    }
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let concepts_joined: String = row.try_get("concepts")?;
    let concepts = if concepts_joined.is_empty() {
        Vec::new()
    } else {
        concepts_joined.split(',').map(str::to_string).collect()
    };

    let topic: String = row.try_get("topic")?;

    Ok(Article {
        id: Some(row.try_get("id")?),
        title: row.try_get("title")?,
        cleaned_body: row.try_get("body")?,
        url: row.try_get("url")?,
        source_endpoint: row.try_get("source")?,
        topic: TopicBucket::from_str_or_default(&topic),
        summary: row.try_get("summary")?,
        concepts,
        published_at: row.try_get("published_at")?,
        processed_at: row.try_get("processed_at")?,
    })
}

fn concept_from_row(row: &SqliteRow) -> Result<Concept> {
    Ok(Concept {
        name: row.try_get("name")?,
        frequency: row.try_get("frequency")?,
        last_seen_at: row.try_get("last_seen")?,
    })
}
