use serde::{Deserialize, Serialize};
use std::fmt;

/// The single classification label assigned to an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicBucket {
    AiMl,
    Business,
    Cybersecurity,
    Innovation,
    /// Reserved default when no keyword matches.
    Tech,
}

impl TopicBucket {
    /// All buckets in classification order.
    pub const ALL: [TopicBucket; 5] = [
        TopicBucket::AiMl,
        TopicBucket::Business,
        TopicBucket::Cybersecurity,
        TopicBucket::Innovation,
        TopicBucket::Tech,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicBucket::AiMl => "AI_ML",
            TopicBucket::Business => "Business",
            TopicBucket::Cybersecurity => "Cybersecurity",
            TopicBucket::Innovation => "Innovation",
            TopicBucket::Tech => "Tech",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "AI_ML" => TopicBucket::AiMl,
            "Business" => TopicBucket::Business,
            "Cybersecurity" => TopicBucket::Cybersecurity,
            "Innovation" => TopicBucket::Innovation,
            _ => TopicBucket::Tech,
        }
    }
}

impl fmt::Display for TopicBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket order is the tie-break policy: when text matches keywords from
/// several buckets, the earlier-listed bucket wins.
const BUCKET_KEYWORDS: &[(TopicBucket, &[&str])] = &[
    (
        TopicBucket::AiMl,
        &[
            "ai",
            "machine learning",
            "neural",
            "gpt",
            "llm",
            "artificial intelligence",
            "chatgpt",
            "openai",
            "model",
            "deep learning",
        ],
    ),
    (
        TopicBucket::Business,
        &[
            "startup",
            "funding",
            "acquisition",
            "partnership",
            "launch",
            "announces",
            "market",
            "investment",
        ],
    ),
    (
        TopicBucket::Cybersecurity,
        &[
            "security",
            "breach",
            "hack",
            "privacy",
            "vulnerability",
            "data",
            "cyber",
            "protection",
        ],
    ),
    (
        TopicBucket::Innovation,
        &[
            "research",
            "breakthrough",
            "innovation",
            "development",
            "discovery",
            "patent",
            "scientific",
            "future",
        ],
    ),
];

/// Assign a topic bucket from title, cleaned body, and summary. Pure and
/// deterministic: identical inputs always yield the identical bucket.
pub fn classify(title: &str, cleaned_body: &str, summary: &str) -> TopicBucket {
    let title = title.to_lowercase();
    let body = cleaned_body.to_lowercase();
    let summary = summary.to_lowercase();

    for (bucket, keywords) in BUCKET_KEYWORDS {
        let hit = keywords.iter().any(|keyword| {
            title.contains(keyword) || body.contains(keyword) || summary.contains(keyword)
        });
        if hit {
            return *bucket;
        }
    }

    TopicBucket::Tech
}
