use crate::types::{NavigatorError, Result};
use std::env;

/// A named group of feed endpoints, fetched in configured order.
#[derive(Debug, Clone)]
pub struct FeedCategory {
    pub label: String,
    pub endpoints: Vec<String>,
}

/// Settings for the external text-inference capability.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub api_base: String,
    pub api_token: String,
    pub summarization_model: String,
    pub generation_model: String,
    /// Input is truncated to this many chars before the summarization call.
    pub max_input_chars: usize,
    pub summary_max_length: u32,
    pub insights_max_length: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    /// Pause between consecutive articles' enrichment calls. Throughput
    /// throttle against the shared capability, not error recovery.
    pub inter_call_delay_ms: u64,
}

/// Settings for feed fetching.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub articles_per_feed: usize,
    pub fetch_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "knowledge-navigator/0.1".to_string(),
            timeout_seconds: 30,
            articles_per_feed: 3,
            fetch_concurrency: 4,
        }
    }
}

/// Explicitly constructed configuration, passed into the pipeline
/// coordinator at construction time. No process-wide singletons.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub feeds: Vec<FeedCategory>,
    pub inference: InferenceConfig,
    pub fetch: FetchConfig,
}

impl AppConfig {
    /// Build configuration from the environment. A missing inference
    /// credential is fatal here, before any run state is entered.
    pub fn from_env() -> Result<Self> {
        let api_token = env::var("HUGGINGFACE_API_KEY").map_err(|_| {
            NavigatorError::Configuration(
                "HUGGINGFACE_API_KEY not found in environment".to_string(),
            )
        })?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:knowledge.db".to_string());

        Ok(Self {
            database_url,
            feeds: default_feeds(),
            inference: InferenceConfig::with_token(api_token),
            fetch: FetchConfig::default(),
        })
    }
}

impl InferenceConfig {
    pub fn with_token(api_token: String) -> Self {
        Self {
            api_base: "https://api-inference.huggingface.co/models".to_string(),
            api_token,
            summarization_model: "facebook/bart-large-cnn".to_string(),
            generation_model: "google/gemma-2-2b-it".to_string(),
            max_input_chars: 1024,
            summary_max_length: 500,
            insights_max_length: 300,
            temperature: 0.5,
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            inter_call_delay_ms: 2000,
        }
    }
}

fn default_feeds() -> Vec<FeedCategory> {
    vec![
        FeedCategory {
            label: "AI & ML".to_string(),
            endpoints: vec![
                "https://techcrunch.com/feed/".to_string(),
                "https://www.artificialintelligence-news.com/feed/".to_string(),
            ],
        },
        FeedCategory {
            label: "Technology".to_string(),
            endpoints: vec![
                "https://feeds.arstechnica.com/arstechnica/index/".to_string(),
                "https://www.technologyreview.com/feed/".to_string(),
            ],
        },
    ]
}
