pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod enrichment;
pub mod fetcher;
pub mod insights;
pub mod normalizer;
pub mod pipeline;
pub mod store;
pub mod types;

pub use classifier::TopicBucket;
pub use config::AppConfig;
pub use dashboard::Dashboard;
pub use enrichment::{EnrichmentClient, HttpInferenceBackend, InferenceBackend, MockInferenceBackend};
pub use fetcher::FeedFetcher;
pub use insights::ConceptIndex;
pub use pipeline::PipelineCoordinator;
pub use store::KnowledgeStore;
pub use types::*;
