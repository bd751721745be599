use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::analysis::types::{SimilarSource, WebSearchVerdict};
use crate::error::SearchError;

const COPIED_THRESHOLD: f64 = 0.8;
const SIMILAR_THRESHOLD: f64 = 0.6;
const RESULTS_PER_QUERY: u8 = 5;
const PHRASE_WORDS: usize = 8;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_phrase(&self, phrase: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Daily request budget for the search API. Reset is driven by the caller's
/// clock so it can be tested without real time passing. Single-instance only;
/// the counter lives in this process.
#[derive(Debug)]
pub struct SearchQuota {
    limit: u32,
    used: u32,
    window_start: DateTime<Utc>,
}

impl SearchQuota {
    pub fn new(limit: u32, now: DateTime<Utc>) -> Self {
        SearchQuota {
            limit,
            used: 0,
            window_start: now,
        }
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        if now.date_naive() != self.window_start.date_naive() {
            self.used = 0;
            self.window_start = now;
        }
    }

    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> bool {
        self.reset(now);
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.used
    }
}

/// Shared-word ratio between two texts, weighted by word length. Only words
/// longer than 3 characters count.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let words_a = significant_words(a);
    let words_b = significant_words(b);

    if words_a.is_empty() && words_b.is_empty() {
        return if a.trim().to_lowercase() == b.trim().to_lowercase() {
            1.0
        } else {
            0.0
        };
    }

    let union_weight: usize = words_a.union(&words_b).map(|w| w.len()).sum();
    if union_weight == 0 {
        return 0.0;
    }
    let shared_weight: usize = words_a.intersection(&words_b).map(|w| w.len()).sum();

    shared_weight as f64 / union_weight as f64
}

fn significant_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

fn search_phrase_for(comment: &str) -> String {
    comment
        .split_whitespace()
        .take(PHRASE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

fn domain_of(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = stripped.split('/').next().unwrap_or(stripped);
    host.trim_start_matches("www.").to_string()
}

/// Scores each hit against the review text and classifies: above 0.8 a
/// near-duplicate, 0.6-0.8 similar content (non-authoritative), below that
/// nothing worth reporting.
pub fn verdict_from_hits(comment: &str, hits: &[SearchHit]) -> WebSearchVerdict {
    let mut best: f64 = 0.0;
    let mut sources = Vec::new();

    for hit in hits {
        let similarity = lexical_similarity(comment, &format!("{} {}", hit.title, hit.snippet));
        if similarity >= SIMILAR_THRESHOLD {
            sources.push(SimilarSource {
                url: hit.url.clone(),
                domain: domain_of(&hit.url),
                similarity,
            });
        }
        best = best.max(similarity);
    }

    sources.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if best > COPIED_THRESHOLD {
        WebSearchVerdict {
            found: true,
            is_copied: true,
            confidence: best,
            analysis: format!(
                "Near-duplicate of existing web content ({} match(es), best similarity {:.2}).",
                sources.len(),
                best
            ),
            sources,
        }
    } else if best >= SIMILAR_THRESHOLD {
        WebSearchVerdict {
            found: true,
            is_copied: false,
            confidence: best,
            analysis: format!(
                "Similar content found on the web (best similarity {:.2}); not conclusive evidence of copying.",
                best
            ),
            sources,
        }
    } else {
        WebSearchVerdict::no_match()
    }
}

pub struct WebSearchClient {
    client: Client,
    api_key: String,
    engine_id: String,
}

impl WebSearchClient {
    pub fn new(api_key: String, engine_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            engine_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

#[async_trait]
impl SearchProvider for WebSearchClient {
    async fn search_phrase(&self, phrase: &str) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get("https://www.googleapis.com/customsearch/v1")
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", &format!("\"{}\"", phrase)),
                ("num", &RESULTS_PER_QUERY.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Service {
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response.json().await?;
        let hits = parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let url = item.link?;
                Some(SearchHit {
                    title: item.title.unwrap_or_default(),
                    snippet: item.snippet.unwrap_or_default(),
                    url,
                })
            })
            .collect();

        Ok(hits)
    }
}

/// Wraps a provider with the quota. Without a provider (no API key
/// configured) every check reports nothing found.
pub struct SearchService {
    provider: Option<Arc<dyn SearchProvider>>,
    quota: Mutex<SearchQuota>,
}

impl SearchService {
    pub fn new(provider: Arc<dyn SearchProvider>, daily_quota: u32) -> Self {
        SearchService {
            provider: Some(provider),
            quota: Mutex::new(SearchQuota::new(daily_quota, Utc::now())),
        }
    }

    pub fn disabled() -> Self {
        SearchService {
            provider: None,
            quota: Mutex::new(SearchQuota::new(0, Utc::now())),
        }
    }

    /// None when the augmentation is disabled; otherwise always a verdict.
    /// Quota exhaustion and API failures degrade to "nothing found".
    pub async fn check_copied_content(&self, comment: &str) -> Option<WebSearchVerdict> {
        let provider = self.provider.as_ref()?;

        {
            let mut quota = self.quota.lock().await;
            if !quota.try_acquire(Utc::now()) {
                warn!("daily search quota exhausted; skipping web check");
                return Some(WebSearchVerdict::no_match());
            }
            info!("web search quota remaining today: {}", quota.remaining());
        }

        let phrase = search_phrase_for(comment);
        if phrase.is_empty() {
            return Some(WebSearchVerdict::no_match());
        }

        match provider.search_phrase(&phrase).await {
            Ok(hits) => Some(verdict_from_hits(comment, &hits)),
            Err(e) => {
                warn!("web search failed: {}", e);
                Some(WebSearchVerdict::no_match())
            }
        }
    }
}
