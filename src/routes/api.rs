use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::analysis;
use crate::db::{self, ReviewEdit};
use crate::error::AnalysisError;
use crate::moderation::{self, AdminAction};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubmitReview {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i16,
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
}

fn validate_submission(rating: i16, comment: &str) -> Result<(), AnalysisError> {
    if !(1..=5).contains(&rating) {
        return Err(AnalysisError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    if comment.trim().is_empty() {
        return Err(AnalysisError::Validation(
            "comment must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Submits a review and analyzes it inline, within the request. The review
/// is stored even when the AI call fails; it then waits for manual review.
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitReview>,
) -> Result<impl IntoResponse, AnalysisError> {
    validate_submission(body.rating, &body.comment)?;

    db::get_product(state.pool.as_ref(), body.product_id)
        .await?
        .ok_or(AnalysisError::NotFound {
            entity: "product",
            id: body.product_id,
        })?;

    let review = db::insert_review(
        state.pool.as_ref(),
        body.user_id,
        body.product_id,
        body.rating,
        &body.comment,
        &body.images,
    )
    .await?;

    let result = analysis::analyze_review(
        state.pool.as_ref(),
        state.model.as_ref(),
        &state.search,
        &review,
    )
    .await?;
    let status = moderation::persist_analysis(state.pool.as_ref(), review.id, &result).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": review.id,
            "status": status.as_str(),
            "aiAnalysis": result,
        })),
    ))
}

pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AnalysisError> {
    let review = db::get_review(state.pool.as_ref(), id)
        .await?
        .ok_or(AnalysisError::NotFound {
            entity: "review",
            id,
        })?;
    Ok(Json(review))
}

#[derive(Deserialize)]
pub struct EditReview {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

/// Edits append the previous comment/rating to the edit history, reset the
/// analysis, and re-analyze with the new text.
pub async fn edit_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<EditReview>,
) -> Result<impl IntoResponse, AnalysisError> {
    let review = db::get_review(state.pool.as_ref(), id)
        .await?
        .ok_or(AnalysisError::NotFound {
            entity: "review",
            id,
        })?;

    let comment = body.comment.unwrap_or_else(|| review.comment.clone());
    let rating = body.rating.unwrap_or(review.rating);
    validate_submission(rating, &comment)?;

    let edit = ReviewEdit {
        previous_comment: review.comment.clone(),
        previous_rating: review.rating,
        edited_at: Utc::now(),
    };

    let updated = db::apply_review_edit(state.pool.as_ref(), id, &comment, rating, &edit).await?;

    let result = analysis::analyze_review(
        state.pool.as_ref(),
        state.model.as_ref(),
        &state.search,
        &updated,
    )
    .await?;
    let status = moderation::persist_analysis(state.pool.as_ref(), id, &result).await?;

    Ok(Json(json!({
        "id": id,
        "status": status.as_str(),
        "aiAnalysis": result,
        "editCount": updated.edit_history.0.len(),
    })))
}

pub async fn reanalyze_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AnalysisError> {
    let review = db::get_review(state.pool.as_ref(), id)
        .await?
        .ok_or(AnalysisError::NotFound {
            entity: "review",
            id,
        })?;

    let result = analysis::analyze_review(
        state.pool.as_ref(),
        state.model.as_ref(),
        &state.search,
        &review,
    )
    .await?;
    let status = moderation::persist_analysis(state.pool.as_ref(), id, &result).await?;

    Ok(Json(json!({
        "id": id,
        "status": status.as_str(),
        "aiAnalysis": result,
    })))
}

/// Kicks off a sequential background pass over every review. The fixed
/// inter-item delay is a throttle against the AI and search APIs, so the
/// loop is deliberately not parallel.
pub async fn reanalyze_all(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AnalysisError> {
    let ids = db::list_review_ids(state.pool.as_ref()).await?;
    let count = ids.len();

    let state = state.clone();
    tokio::spawn(async move {
        let delay = Duration::from_millis(state.config.batch_delay_ms);
        for id in ids {
            let review = match db::get_review(state.pool.as_ref(), id).await {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("batch reanalysis: failed to load {}: {}", id, e);
                    continue;
                }
            };

            match analysis::analyze_review(
                state.pool.as_ref(),
                state.model.as_ref(),
                &state.search,
                &review,
            )
            .await
            {
                Ok(result) => {
                    if let Err(e) =
                        moderation::persist_analysis(state.pool.as_ref(), id, &result).await
                    {
                        tracing::error!("batch reanalysis: failed to persist {}: {}", id, e);
                    }
                }
                Err(e) => tracing::error!("batch reanalysis: {} skipped: {}", id, e),
            }

            tokio::time::sleep(delay).await;
        }
        tracing::info!("batch reanalysis finished ({} reviews)", count);
    });

    Ok(Json(json!({ "status": "started", "count": count })))
}

#[derive(Deserialize)]
pub struct ModerateRequest {
    pub action: String,
}

pub async fn moderate_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ModerateRequest>,
) -> Result<impl IntoResponse, AnalysisError> {
    let action = AdminAction::parse(&body.action).ok_or_else(|| {
        AnalysisError::Validation(format!("unknown moderation action: {}", body.action))
    })?;

    let status = moderation::apply_admin_action(state.pool.as_ref(), id, action).await?;

    Ok(Json(json!({ "id": id, "status": status.as_str() })))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AnalysisError> {
    if !db::delete_review(state.pool.as_ref(), id).await? {
        return Err(AnalysisError::NotFound {
            entity: "review",
            id,
        });
    }
    Ok(Json(json!({ "id": id, "deleted": true })))
}
