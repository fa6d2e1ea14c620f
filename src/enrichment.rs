use crate::classifier::TopicBucket;
use crate::config::InferenceConfig;
use crate::types::{Article, EnrichedEntry, NavigatorError, NormalizedEntry, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters for a text-generation call.
#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub max_length: u32,
    pub temperature: f32,
}

/// The external text-inference capability. May fail, may be slow, may
/// return malformed text; callers own retry and failure policy.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn backend_name(&self) -> String;

    async fn summarize(&self, text: &str) -> Result<String>;

    async fn generate(&self, prompt: &str, params: &GenerateParams) -> Result<String>;
}

/// Hugging Face Inference API backend. Response bodies vary in shape
/// (a mapping or a list of mappings, occasionally a bare string), so
/// decoding is an explicit step that fails on anything unrecognized.
pub struct HttpInferenceBackend {
    client: reqwest::Client,
    config: InferenceConfig,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SummaryResponse {
    Many(Vec<SummaryPayload>),
    One(SummaryPayload),
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    summary_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Many(Vec<GeneratePayload>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GeneratePayload {
    generated_text: String,
}

impl HttpInferenceBackend {
    pub fn new(config: InferenceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// POST an inference request with retry on transport errors and
    /// retryable statuses (429, 5xx). Client errors are terminal.
    async fn post_inference(&self, model: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.config.api_base, model);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error: Option<NavigatorError> = None;

        for attempt in 0..=self.config.max_retries {
            match self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<serde_json::Value>().await.map_err(|e| {
                            NavigatorError::Enrichment(format!("invalid response body: {}", e))
                        });
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    last_error = Some(NavigatorError::Enrichment(format!(
                        "inference API returned HTTP {}",
                        status
                    )));
                    if !retryable {
                        break;
                    }
                }
                Err(e) => {
                    last_error = Some(NavigatorError::Http(e));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!(
                        "Inference attempt {} failed for {}, retrying in {:?}",
                        attempt + 1,
                        model,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| NavigatorError::Enrichment("inference call failed".to_string())))
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceBackend {
    fn backend_name(&self) -> String {
        format!("huggingface ({})", self.config.summarization_model)
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "inputs": text,
            "parameters": {
                "max_length": self.config.summary_max_length,
                "truncation": "longest_first",
            }
        });

        let value = self
            .post_inference(&self.config.summarization_model, body)
            .await?;
        decode_summary(value)
    }

    async fn generate(&self, prompt: &str, params: &GenerateParams) -> Result<String> {
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_length": params.max_length,
                "temperature": params.temperature,
                "top_p": 0.95,
                "return_full_text": false,
            }
        });

        let value = self
            .post_inference(&self.config.generation_model, body)
            .await?;
        decode_generated(value)
    }
}

fn decode_summary(value: serde_json::Value) -> Result<String> {
    let decoded: SummaryResponse = serde_json::from_value(value)
        .map_err(|_| NavigatorError::Enrichment("unrecognized summarization response shape".to_string()))?;

    let text = match decoded {
        SummaryResponse::One(payload) => payload.summary_text,
        SummaryResponse::Many(payloads) => payloads
            .into_iter()
            .next()
            .map(|p| p.summary_text)
            .ok_or_else(|| NavigatorError::Enrichment("empty summarization response".to_string()))?,
    };

    Ok(text.trim().to_string())
}

fn decode_generated(value: serde_json::Value) -> Result<String> {
    let decoded: GenerateResponse = serde_json::from_value(value)
        .map_err(|_| NavigatorError::Enrichment("unrecognized generation response shape".to_string()))?;

    let text = match decoded {
        GenerateResponse::Text(text) => text,
        GenerateResponse::Many(payloads) => payloads
            .into_iter()
            .next()
            .map(|p| p.generated_text)
            .ok_or_else(|| NavigatorError::Enrichment("empty generation response".to_string()))?,
    };

    Ok(text.trim().to_string())
}

/// Deterministic in-process backend for development and testing.
pub struct MockInferenceBackend {
    name: String,
    response_delay_ms: u64,
    fail_marker: Option<String>,
    concepts: Vec<String>,
    summarize_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

impl MockInferenceBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_delay_ms: 0,
            fail_marker: None,
            concepts: vec!["rust".to_string(), "testing".to_string()],
            summarize_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    /// Any input containing the marker makes the call fail.
    pub fn with_fail_marker(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn with_concepts(mut self, concepts: Vec<String>) -> Self {
        self.concepts = concepts;
        self
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    async fn simulate_processing(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }
    }

    fn check_marker(&self, input: &str) -> Result<()> {
        if let Some(marker) = &self.fail_marker {
            if input.contains(marker.as_str()) {
                return Err(NavigatorError::Enrichment("simulated backend failure".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceBackend for MockInferenceBackend {
    fn backend_name(&self) -> String {
        format!("mock ({})", self.name)
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_processing().await;
        self.check_marker(text)?;

        let first_sentence = text.split('.').next().unwrap_or("").trim();
        if first_sentence.is_empty() {
            return Ok("No content".to_string());
        }
        Ok(format!("{}.", first_sentence))
    }

    async fn generate(&self, prompt: &str, _params: &GenerateParams) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_processing().await;
        self.check_marker(prompt)?;

        Ok(self.concepts.join(", "))
    }
}

/// Result of enriching one batch: successes in input order minus
/// failures, each failure paired with its reason.
#[derive(Debug)]
pub struct BatchOutcome {
    pub succeeded: Vec<EnrichedEntry>,
    pub failed: Vec<(NormalizedEntry, String)>,
}

/// Orchestrates summarization and concept extraction against the
/// inference backend. Per-article failures are recorded and never
/// escape the batch loop.
pub struct EnrichmentClient {
    backend: Arc<dyn InferenceBackend>,
    config: InferenceConfig,
}

impl EnrichmentClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: InferenceConfig) -> Self {
        Self { backend, config }
    }

    /// Summarize a text, truncated to the configured input limit before
    /// sending. Returns the backend output verbatim, trimmed.
    pub async fn summarize(&self, text: &str) -> Result<String> {
        let input = truncate_chars(text, self.config.max_input_chars);
        let summary = self.with_timeout(self.backend.summarize(input)).await?;
        Ok(summary.trim().to_string())
    }

    /// Ask the backend for salient terms from the summary (not the raw
    /// body, to bias toward already-distilled signal). First-seen order
    /// is preserved; case variants are not collapsed here.
    pub async fn extract_concepts(&self, summary: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "List the key concepts in this text as a short comma-separated \
             list of terms, with no other output:\n\n{}",
            summary
        );
        let params = GenerateParams {
            max_length: 100,
            temperature: self.config.temperature,
        };

        let raw = self
            .with_timeout(self.backend.generate(&prompt, &params))
            .await?;
        Ok(split_concepts(&raw))
    }

    /// Enrich a batch sequentially with a fixed pause between articles.
    /// The pause is a throughput throttle against the shared capability,
    /// not error recovery.
    pub async fn process_batch(&self, entries: Vec<NormalizedEntry>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };

        for (i, entry) in entries.into_iter().enumerate() {
            if i > 0 && self.config.inter_call_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_call_delay_ms)).await;
            }

            match self.enrich_one(&entry).await {
                Ok((summary, concepts)) => {
                    debug!("Enriched article: {}", entry.title);
                    outcome.succeeded.push(EnrichedEntry {
                        entry,
                        summary,
                        concepts,
                    });
                }
                Err(e) => {
                    warn!("Enrichment failed for {}: {}", entry.url, e);
                    outcome.failed.push((entry, e.to_string()));
                }
            }
        }

        info!(
            "Batch enrichment completed. Succeeded: {}, failed: {}",
            outcome.succeeded.len(),
            outcome.failed.len()
        );
        outcome
    }

    async fn enrich_one(&self, entry: &NormalizedEntry) -> Result<(String, Vec<String>)> {
        if entry.cleaned_body.is_empty() {
            return Err(NavigatorError::Enrichment("no content to process".to_string()));
        }

        let summary = self.summarize(&entry.cleaned_body).await?;
        let concepts = self.extract_concepts(&summary).await?;
        Ok((summary, concepts))
    }

    /// Generate key insights for a topic bucket's articles. Falls back to
    /// generic statements on any failure; insight generation never fails
    /// a caller.
    pub async fn topic_insights(&self, bucket: TopicBucket, articles: &[Article]) -> Vec<String> {
        let mut context = String::new();
        for article in articles.iter().take(8) {
            context.push_str(&format!("Title: {}\n", article.title));
            context.push_str(&format!("Summary: {}\n\n", article.summary));
        }

        let prompt = format!(
            "Based on these {} news articles and as a tech analyst, provide 3 key \
             insights about the current state and trends in this field:\n\n{}\n\
             Each insight should be a complete statement about the trends or \
             implications shown in these articles.",
            bucket, context
        );
        let params = GenerateParams {
            max_length: self.config.insights_max_length,
            temperature: self.config.temperature,
        };

        match self.with_timeout(self.backend.generate(&prompt, &params)).await {
            Ok(raw) => {
                let insights = parse_insight_lines(&raw);
                if insights.is_empty() {
                    fallback_insights(bucket)
                } else {
                    insights
                }
            }
            Err(e) => {
                warn!("Insight generation failed for {}: {}", bucket, e);
                fallback_insights(bucket)
            }
        }
    }

    async fn with_timeout<F>(&self, fut: F) -> Result<String>
    where
        F: std::future::Future<Output = Result<String>>,
    {
        let limit = Duration::from_secs(self.config.timeout_seconds);
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(NavigatorError::Enrichment("inference call timed out".to_string())),
        }
    }
}

/// Split a comma-separated concept list: trim each term, drop empties,
/// keep first-seen order. Case variants within one call are kept; the
/// concept index folds them across time.
pub fn split_concepts(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn parse_insight_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            !line.is_empty()
                && !lower.starts_with("key insight")
                && !lower.starts_with("please provide")
                && !lower.starts_with("based on")
                && line.len() > 20
        })
        .map(str::to_string)
        .take(3)
        .collect()
}

fn fallback_insights(bucket: TopicBucket) -> Vec<String> {
    vec![
        format!("Major developments in {} show increasing industry focus", bucket),
        format!("Multiple companies are advancing {} capabilities", bucket.as_str().to_lowercase()),
        "Innovation continues to drive industry transformation".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_concepts_trims_and_drops_empty_terms() {
        let concepts = split_concepts(" ai , machine learning ,, rust ,");
        assert_eq!(concepts, vec!["ai", "machine learning", "rust"]);
    }

    #[test]
    fn split_concepts_preserves_order_and_case_variants() {
        let concepts = split_concepts("Rust, rust, RUST");
        assert_eq!(concepts, vec!["Rust", "rust", "RUST"]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn decodes_summary_object_and_list_shapes() {
        let object = serde_json::json!({"summary_text": "  a summary  "});
        assert_eq!(decode_summary(object).unwrap(), "a summary");

        let list = serde_json::json!([{"summary_text": "from list"}]);
        assert_eq!(decode_summary(list).unwrap(), "from list");
    }

    #[test]
    fn unrecognized_summary_shape_is_an_enrichment_failure() {
        let bogus = serde_json::json!({"error": "model loading"});
        let err = decode_summary(bogus).unwrap_err();
        assert!(matches!(err, NavigatorError::Enrichment(_)));

        let empty = serde_json::json!([]);
        assert!(decode_summary(empty).is_err());
    }

    #[test]
    fn decodes_generated_list_and_bare_string_shapes() {
        let list = serde_json::json!([{"generated_text": "a, b, c"}]);
        assert_eq!(decode_generated(list).unwrap(), "a, b, c");

        let bare = serde_json::json!("plain text");
        assert_eq!(decode_generated(bare).unwrap(), "plain text");

        let bogus = serde_json::json!(42);
        assert!(decode_generated(bogus).is_err());
    }

    #[test]
    fn insight_lines_drop_prompt_echoes_and_short_lines() {
        let raw = "Based on these articles, here you go\n\
                   Key insight: ignored\n\
                   too short\n\
                   The industry is consolidating around open models rapidly\n\
                   Funding for infrastructure startups keeps accelerating\n";
        let insights = parse_insight_lines(raw);
        assert_eq!(insights.len(), 2);
        assert!(insights[0].starts_with("The industry"));
    }

    #[tokio::test]
    async fn mock_backend_fails_on_marker() {
        let backend = MockInferenceBackend::new("test").with_fail_marker("POISON");
        assert!(backend.summarize("fine text").await.is_ok());
        assert!(backend.summarize("has POISON inside").await.is_err());
        assert_eq!(backend.summarize_calls(), 2);
    }
}
