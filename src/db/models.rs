use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::types::AiAnalysis;

#[derive(Debug, FromRow, Serialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub status: String,
    pub ai_analysis: Option<Json<AiAnalysis>>,
    pub edit_history: Json<Vec<ReviewEdit>>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEdit {
    pub previous_comment: String,
    pub previous_rating: i16,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct QualifyingOrder {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}
