mod claude;

pub use claude::ClaudeAgent;

use async_trait::async_trait;

use crate::error::AiClientError;

#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    pub image: Option<ImageAttachment>,
}

/// Seam between the pipeline and the generative-AI vendor; tests drive the
/// pipeline through a deterministic implementation of this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn analyze(&self, request: &ModelRequest) -> Result<String, AiClientError>;

    fn model_version(&self) -> String;

    /// Downloads a review image for vision analysis. Optional; the default
    /// keeps requests text-only.
    async fn fetch_image(&self, _url: &str) -> Option<ImageAttachment> {
        None
    }
}
