use sqlx::PgPool;
use uuid::Uuid;

use crate::analysis::types::{AiAnalysis, Classification};
use crate::db;
use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Published,
    UnderReview,
    Flagged,
    Hidden,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "published",
            ReviewStatus::UnderReview => "under_review",
            ReviewStatus::Flagged => "flagged",
            ReviewStatus::Hidden => "hidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "published" => Some(ReviewStatus::Published),
            "under_review" => Some(ReviewStatus::UnderReview),
            "flagged" => Some(ReviewStatus::Flagged),
            "hidden" => Some(ReviewStatus::Hidden),
            _ => None,
        }
    }
}

/// Moderation status derived from a completed analysis. Suspicious reviews
/// land in the moderation queue; "flagged" is reserved for explicit admin
/// action so the policy stays consistent across call sites.
pub fn derive_status(analysis: &AiAnalysis) -> ReviewStatus {
    match analysis.classification {
        Classification::Suspicious => ReviewStatus::UnderReview,
        Classification::Pending if analysis.needs_manual_review => ReviewStatus::UnderReview,
        _ => ReviewStatus::Published,
    }
}

/// Validates at the persistence boundary, then overwrites the review's
/// analysis and status in one update. Re-running is idempotent.
pub async fn persist_analysis(
    pool: &PgPool,
    review_id: Uuid,
    analysis: &AiAnalysis,
) -> Result<ReviewStatus, AnalysisError> {
    analysis.validate()?;
    let status = derive_status(analysis);
    db::update_review_analysis(pool, review_id, analysis, status.as_str()).await?;
    Ok(status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Approve,
    Flag,
    Hide,
}

impl AdminAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(AdminAction::Approve),
            "flag" => Some(AdminAction::Flag),
            "hide" => Some(AdminAction::Hide),
            _ => None,
        }
    }

    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            AdminAction::Approve => ReviewStatus::Published,
            AdminAction::Flag => ReviewStatus::Flagged,
            AdminAction::Hide => ReviewStatus::Hidden,
        }
    }
}

/// No terminal state: approve reverts flagged or hidden reviews.
pub async fn apply_admin_action(
    pool: &PgPool,
    review_id: Uuid,
    action: AdminAction,
) -> Result<ReviewStatus, AnalysisError> {
    if db::get_review(pool, review_id).await?.is_none() {
        return Err(AnalysisError::NotFound {
            entity: "review",
            id: review_id,
        });
    }

    let status = action.resulting_status();
    db::set_review_status(pool, review_id, status.as_str()).await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::{fallback_analysis, parse_model_response};
    use crate::analysis::purchase::PurchaseVerification;

    fn analysis_for(raw: &str) -> AiAnalysis {
        parse_model_response(raw, &PurchaseVerification::Unverified, "m")
    }

    #[test]
    fn suspicious_reviews_go_to_the_moderation_queue() {
        let analysis = analysis_for(r#"{"classification": "suspicious"}"#);
        assert_eq!(derive_status(&analysis), ReviewStatus::UnderReview);
    }

    #[test]
    fn genuine_reviews_are_published() {
        let analysis = analysis_for(r#"{"classification": "genuine"}"#);
        assert_eq!(derive_status(&analysis), ReviewStatus::Published);
    }

    #[test]
    fn failed_analysis_waits_for_manual_review() {
        let analysis = fallback_analysis(&PurchaseVerification::Unverified, "timeout", "m");
        assert_eq!(derive_status(&analysis), ReviewStatus::UnderReview);
    }

    #[test]
    fn pending_without_manual_review_is_published() {
        let analysis = analysis_for(r#"{"classification": "pending", "needsManualReview": false}"#);
        assert_eq!(derive_status(&analysis), ReviewStatus::Published);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ReviewStatus::Published,
            ReviewStatus::UnderReview,
            ReviewStatus::Flagged,
            ReviewStatus::Hidden,
        ] {
            assert_eq!(ReviewStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReviewStatus::parse("deleted"), None);
    }

    #[test]
    fn admin_actions_map_to_statuses() {
        assert_eq!(
            AdminAction::parse("approve").map(|a| a.resulting_status()),
            Some(ReviewStatus::Published)
        );
        assert_eq!(
            AdminAction::parse("flag").map(|a| a.resulting_status()),
            Some(ReviewStatus::Flagged)
        );
        assert_eq!(
            AdminAction::parse("hide").map(|a| a.resulting_status()),
            Some(ReviewStatus::Hidden)
        );
        assert_eq!(AdminAction::parse("promote"), None);
    }
}
