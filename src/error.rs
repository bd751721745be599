use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AnalysisError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
            AnalysisError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AnalysisError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };

        (
            status,
            axum::Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiClientError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rate limited by AI service")]
    RateLimited,

    #[error("AI service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("no text in model response")]
    EmptyResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("search service error ({status})")]
    Service { status: u16 },

    #[error("daily search quota exhausted")]
    QuotaExhausted,
}
