mod models;

pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::analysis::types::AiAnalysis;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_review(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    rating: i16,
    comment: &str,
    images: &[String],
) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (id, user_id, product_id, rating, comment, images)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .bind(rating)
    .bind(comment)
    .bind(images)
    .fetch_one(pool)
    .await
}

pub async fn get_review(pool: &PgPool, id: Uuid) -> Result<Option<Review>, sqlx::Error> {
    sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The single canonical "did this user buy this product" query. Every call
/// site goes through this; qualifying means payment completed and the order
/// at least in fulfilment (processing or delivered).
pub async fn latest_qualifying_order(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<Option<QualifyingOrder>, sqlx::Error> {
    sqlx::query_as::<_, QualifyingOrder>(
        r#"
        SELECT o.id, o.created_at
        FROM orders o
        JOIN order_items oi ON oi.order_id = o.id
        WHERE o.user_id = $1
          AND oi.product_id = $2
          AND o.payment_status = 'completed'
          AND o.status IN ('processing', 'delivered')
        ORDER BY o.created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await
}

/// Idempotent: re-running analysis simply overwrites the previous one.
pub async fn update_review_analysis(
    pool: &PgPool,
    id: Uuid,
    analysis: &AiAnalysis,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE reviews
        SET ai_analysis = $2, status = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(Json(analysis))
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

/// Applies a user edit: the previous comment/rating goes into the edit
/// history and the analysis is cleared pending re-analysis.
pub async fn apply_review_edit(
    pool: &PgPool,
    id: Uuid,
    comment: &str,
    rating: i16,
    edit: &ReviewEdit,
) -> Result<Review, sqlx::Error> {
    sqlx::query_as::<_, Review>(
        r#"
        UPDATE reviews
        SET comment = $2,
            rating = $3,
            edit_history = edit_history || $4,
            ai_analysis = NULL,
            status = 'under_review',
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(comment)
    .bind(rating)
    .bind(Json(edit))
    .fetch_one(pool)
    .await
}

pub async fn set_review_status(
    pool: &PgPool,
    id: Uuid,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE reviews SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_review_ids(pool: &PgPool) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM reviews ORDER BY created_at")
        .fetch_all(pool)
        .await
}

pub async fn delete_review(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
