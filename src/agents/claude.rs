use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use super::{ImageAttachment, ModelClient, ModelRequest};
use crate::error::AiClientError;

const CLAUDE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// Low temperature keeps the output close to the requested JSON schema.
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

pub struct ClaudeAgent {
    client: Client,
    api_key: String,
    model_index: AtomicUsize,
}

impl ClaudeAgent {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            model_index: AtomicUsize::new(0),
        }
    }

    fn current_model(&self) -> &'static str {
        CLAUDE_MODELS[self.model_index.load(Ordering::Relaxed).min(CLAUDE_MODELS.len() - 1)]
    }

    /// Falls through to the next model in the list; returns false when the
    /// list is exhausted.
    fn downgrade_model(&self) -> bool {
        let current = self.model_index.load(Ordering::Relaxed);
        if current < CLAUDE_MODELS.len() - 1 {
            self.model_index.store(current + 1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    fn build_body(&self, request: &ModelRequest, model: &str) -> ClaudeRequest {
        let mut content = Vec::new();
        if let Some(image) = &request.image {
            content.push(ContentBlock::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: image.media_type.clone(),
                    data: image.data.clone(),
                },
            });
        }
        content.push(ContentBlock::Text {
            text: request.user.clone(),
        });

        ClaudeRequest {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: request.system.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
        }
    }
}

#[async_trait]
impl ModelClient for ClaudeAgent {
    async fn analyze(&self, request: &ModelRequest) -> Result<String, AiClientError> {
        let max_retries = 3;
        let mut retry_count = 0;
        let mut backoff = 2u64;

        loop {
            let model = self.current_model();
            info!(
                "Analyzing review with model {} (prompt length: {} chars)",
                model,
                request.user.len()
            );

            let body = self.build_body(request, model);

            let response = self
                .client
                .post(MESSAGES_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ClaudeResponse = serde_json::from_str(&text)
                    .map_err(|_| AiClientError::EmptyResponse)?;

                if let Some(t) = parsed.content.iter().find_map(|b| b.text.as_ref()) {
                    info!("Model {} returned {} chars", model, t.len());
                    return Ok(t.clone());
                }
                return Err(AiClientError::EmptyResponse);
            }

            if status.as_u16() == 429 {
                warn!("Rate limit with model {}", model);
                if self.downgrade_model() {
                    retry_count = 0;
                    continue;
                }
                return Err(AiClientError::RateLimited);
            }

            if status.as_u16() == 404 {
                warn!("Model not found: {}", model);
                if self.downgrade_model() {
                    retry_count = 0;
                    continue;
                }
            }

            if retry_count >= max_retries {
                let message = serde_json::from_str::<ApiError>(&text)
                    .ok()
                    .and_then(|e| e.message)
                    .unwrap_or(text);
                return Err(AiClientError::Service {
                    status: status.as_u16(),
                    message,
                });
            }

            retry_count += 1;
            tokio::time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }

    fn model_version(&self) -> String {
        self.current_model().to_string()
    }

    async fn fetch_image(&self, url: &str) -> Option<ImageAttachment> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("image fetch returned {} for {}", r.status(), url);
                return None;
            }
            Err(e) => {
                warn!("image fetch failed for {}: {}", url, e);
                return None;
            }
        };

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        if !media_type.starts_with("image/") {
            warn!("skipping non-image attachment ({}) at {}", media_type, url);
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("image read failed for {}: {}", url, e);
                return None;
            }
        };

        Some(ImageAttachment {
            media_type,
            data: base64::engine::general_purpose::STANDARD.encode(&bytes),
        })
    }
}
