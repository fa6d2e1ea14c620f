use anyhow::Context;
use clap::{Parser, Subcommand};
use knowledge_navigator::{
    pipeline, AppConfig, ConceptIndex, Dashboard, HttpInferenceBackend, KnowledgeStore,
    PipelineCoordinator,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "knowledge-navigator", about = "Feed ingestion and enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, enrich, and persist new articles once
    Run,
    /// Show trending concepts
    Trending {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Show learning recommendations
    Recommend,
    /// Show the latest persisted articles
    Latest {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Search articles by title, summary, or concept
    Search { query: String },
    /// Generate per-topic insights for today's articles
    Insights,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let store = Arc::new(
        KnowledgeStore::connect(&config.database_url)
            .await
            .context("failed to open database")?,
    );

    match cli.command {
        Command::Run => {
            let backend = Arc::new(HttpInferenceBackend::new(config.inference.clone()));
            let coordinator = PipelineCoordinator::new(config, backend, store);
            let report = coordinator.run().await?;

            println!(
                "Run {}: fetched {}, persisted {}, failed {}",
                report.run_id, report.fetched_count, report.processed_count, report.failed_count
            );
            if report.all_sources_failed {
                warn!("All feed endpoints were unavailable this run");
            }
            for failure in &report.sample_failures {
                warn!("Failed: {} ({})", failure.title, failure.reason);
            }
        }
        Command::Trending { days } => {
            let index = ConceptIndex::new(store);
            for concept in index.trending(days).await? {
                println!(
                    "{:<40} freq={:<5} last seen {}",
                    concept.name, concept.frequency, concept.last_seen_at
                );
            }
        }
        Command::Recommend => {
            let index = ConceptIndex::new(store);
            for rec in index.recommendations().await? {
                println!("{} (freq={})", rec.concept, rec.frequency);
                for article in &rec.top_related_articles {
                    println!("    {} - {}", article.title, article.url);
                }
            }
        }
        Command::Latest { limit } => {
            let dashboard = Dashboard::new(store);
            for article in dashboard.latest(limit).await? {
                println!("[{}] {} - {}", article.topic, article.title, article.url);
            }
        }
        Command::Search { query } => {
            let dashboard = Dashboard::new(store);
            for article in dashboard.search(&query, 20).await? {
                println!("[{}] {} - {}", article.topic, article.title, article.url);
            }
        }
        Command::Insights => {
            let backend = Arc::new(HttpInferenceBackend::new(config.inference.clone()));
            let dashboard = Dashboard::new(store.clone());
            let coordinator = PipelineCoordinator::new(config, backend, store);

            let today = chrono::Utc::now().date_naive();
            let articles = dashboard.on_date(today).await?;
            if articles.is_empty() {
                info!("No articles processed today");
                return Ok(());
            }

            for group in pipeline::group_by_topic(&articles) {
                println!("== {} ({} articles) ==", group.bucket, group.articles.len());
                let insights = coordinator
                    .enrichment()
                    .topic_insights(group.bucket, &group.articles)
                    .await;
                for (i, insight) in insights.iter().enumerate() {
                    println!("  {}. {}", i + 1, insight);
                }
            }
        }
    }

    Ok(())
}
