use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::analysis::types::PurchaseRecord;
use crate::db;

/// Outcome of purchase verification. Unknown means the lookup itself failed;
/// the pipeline continues with an inconclusive phrasing rather than aborting.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseVerification {
    Verified(PurchaseRecord),
    Unverified,
    Unknown,
}

impl PurchaseVerification {
    pub fn has_purchased(&self) -> Option<bool> {
        match self {
            PurchaseVerification::Verified(_) => Some(true),
            PurchaseVerification::Unverified => Some(false),
            PurchaseVerification::Unknown => None,
        }
    }

    pub fn record(&self) -> PurchaseRecord {
        match self {
            PurchaseVerification::Verified(record) => record.clone(),
            _ => PurchaseRecord::none(),
        }
    }
}

/// Checks whether the reviewer bought the reviewed product. A purchase counts
/// when payment completed and the order reached processing or delivered; the
/// most recent qualifying order supplies the purchase date.
pub async fn verify_purchase(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> PurchaseVerification {
    match db::latest_qualifying_order(pool, user_id, product_id).await {
        Ok(Some(order)) => PurchaseVerification::Verified(PurchaseRecord {
            has_purchased: true,
            purchase_date: Some(order.created_at),
            order_id: Some(order.id),
        }),
        Ok(None) => PurchaseVerification::Unverified,
        Err(e) => {
            warn!("purchase lookup failed for user {}: {}", user_id, e);
            PurchaseVerification::Unknown
        }
    }
}
