use chrono::{DateTime, Utc};

use crate::analysis::purchase::PurchaseVerification;
use crate::db::{Product, Review};

/// Days elapsed between purchase and review. Unknown when there is no
/// purchase date to compare against; Invalid when the review predates the
/// purchase (inconsistent timestamps, kept distinct from Unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaysSincePurchase {
    Days(i64),
    Unknown,
    Invalid,
}

impl std::fmt::Display for DaysSincePurchase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaysSincePurchase::Days(d) => write!(f, "{}", d),
            DaysSincePurchase::Unknown => write!(f, "N/A"),
            DaysSincePurchase::Invalid => write!(f, "invalid (review predates purchase)"),
        }
    }
}

pub fn days_since_purchase(
    purchase_date: Option<DateTime<Utc>>,
    review_date: DateTime<Utc>,
) -> DaysSincePurchase {
    match purchase_date {
        None => DaysSincePurchase::Unknown,
        Some(purchased) if review_date < purchased => DaysSincePurchase::Invalid,
        Some(purchased) => DaysSincePurchase::Days((review_date - purchased).num_days()),
    }
}

/// Everything the prompt builder needs, flattened into one record.
#[derive(Debug, Clone)]
pub struct ReviewContext {
    pub comment: String,
    pub rating: i16,
    pub product_name: String,
    pub product_description: String,
    pub product_category: String,
    pub product_price: f64,
    pub verification: PurchaseVerification,
    pub days_since_purchase: DaysSincePurchase,
    pub edit_count: usize,
    pub has_image: bool,
}

pub fn assemble(
    review: &Review,
    product: &Product,
    verification: PurchaseVerification,
) -> ReviewContext {
    let purchase_date = verification.record().purchase_date;

    ReviewContext {
        comment: review.comment.clone(),
        rating: review.rating,
        product_name: product.name.clone(),
        product_description: product.description.clone(),
        product_category: product.category.clone(),
        product_price: product.price,
        days_since_purchase: days_since_purchase(purchase_date, review.created_at),
        edit_count: review.edit_history.0.len(),
        has_image: !review.images.is_empty(),
        verification,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn day_count_when_both_dates_known() {
        let review_date = Utc::now();
        let purchase = Some(review_date - Duration::days(10));
        assert_eq!(
            days_since_purchase(purchase, review_date),
            DaysSincePurchase::Days(10)
        );
    }

    #[test]
    fn missing_purchase_date_is_unknown() {
        assert_eq!(
            days_since_purchase(None, Utc::now()),
            DaysSincePurchase::Unknown
        );
        assert_eq!(DaysSincePurchase::Unknown.to_string(), "N/A");
    }

    #[test]
    fn review_before_purchase_is_invalid_not_unknown() {
        let review_date = Utc::now();
        let purchase = Some(review_date + Duration::days(3));
        let result = days_since_purchase(purchase, review_date);
        assert_eq!(result, DaysSincePurchase::Invalid);
        assert_ne!(result.to_string(), "N/A");
    }

    #[test]
    fn same_day_purchase_counts_as_zero_days() {
        let t = Utc::now();
        assert_eq!(days_since_purchase(Some(t), t), DaysSincePurchase::Days(0));
    }
}
