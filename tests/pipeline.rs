use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

use reviewguard::agents::{ModelClient, ModelRequest};
use reviewguard::analysis::context::{days_since_purchase, ReviewContext};
use reviewguard::analysis::purchase::PurchaseVerification;
use reviewguard::analysis::run_analysis;
use reviewguard::analysis::types::{
    Classification, PurchaseRecord, FLAG_ANALYSIS_FAILED, FLAG_COPIED_CONTENT,
    FLAG_NO_PURCHASE_RECORD, FLAG_UNVERIFIED_REVIEWER,
};
use reviewguard::error::{AiClientError, SearchError};
use reviewguard::moderation::{derive_status, ReviewStatus};
use reviewguard::search::{SearchHit, SearchProvider, SearchService};

const GENUINE_RESPONSE: &str = r#"Based on the evidence, here is my verdict:
{
  "classification": "genuine",
  "confidence": 0.93,
  "flags": [],
  "reasoning": "Specific detail about delivery and condition, consistent with a verified purchase made shortly before the review.",
  "needsManualReview": false,
  "scores": {
    "sentiment": 0.9,
    "authenticity": 0.9,
    "productRelevance": 0.92,
    "purchaseVerification": 0.95,
    "overallRisk": 0.08
  },
  "riskLevel": "low"
}"#;

/// Deterministic stand-in for the Claude agent.
struct ScriptedModel {
    response: Option<&'static str>,
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn analyze(&self, _request: &ModelRequest) -> Result<String, AiClientError> {
        match self.response {
            Some(text) => Ok(text.to_string()),
            None => Err(AiClientError::EmptyResponse),
        }
    }

    fn model_version(&self) -> String {
        "scripted-model".to_string()
    }
}

struct ScriptedSearch {
    hits: Vec<SearchHit>,
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search_phrase(&self, _phrase: &str) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self.hits.clone())
    }
}

const COMMENT: &str = "Excellent quality, exactly as described, arrived in 2 days";

fn context_with(verification: PurchaseVerification) -> ReviewContext {
    let review_date = Utc::now();
    let purchase_date = verification.record().purchase_date;

    ReviewContext {
        comment: COMMENT.to_string(),
        rating: 5,
        product_name: "Stainless Steel Kettle".to_string(),
        product_description: "1.7L electric kettle with auto shut-off".to_string(),
        product_category: "Kitchen".to_string(),
        product_price: 39.99,
        days_since_purchase: days_since_purchase(purchase_date, review_date),
        edit_count: 0,
        has_image: false,
        verification,
    }
}

fn verified_ten_days_ago() -> PurchaseVerification {
    PurchaseVerification::Verified(PurchaseRecord {
        has_purchased: true,
        purchase_date: Some(Utc::now() - Duration::days(10)),
        order_id: Some(uuid::Uuid::new_v4()),
    })
}

#[tokio::test]
async fn verified_five_star_review_comes_out_genuine() {
    let model = ScriptedModel {
        response: Some(GENUINE_RESPONSE),
    };
    let search = SearchService::disabled();
    let ctx = context_with(verified_ten_days_ago());

    let analysis = run_analysis(&model, &search, &ctx, None).await;

    assert_eq!(analysis.classification, Classification::Genuine);
    assert!(analysis.scores.purchase_verification > 0.8);
    assert!(!analysis.has_flag(FLAG_NO_PURCHASE_RECORD));
    assert!(!analysis.has_flag(FLAG_UNVERIFIED_REVIEWER));
    assert_eq!(analysis.model_version, "scripted-model");
    assert!(analysis.validate().is_ok());
    assert_eq!(derive_status(&analysis), ReviewStatus::Published);
}

#[tokio::test]
async fn same_review_without_purchase_gets_purchase_flags() {
    let model = ScriptedModel {
        response: Some(GENUINE_RESPONSE),
    };
    let search = SearchService::disabled();
    let ctx = context_with(PurchaseVerification::Unverified);

    let analysis = run_analysis(&model, &search, &ctx, None).await;

    // The model claimed a high purchase-verification score; purchase facts win.
    assert!(analysis.has_flag(FLAG_NO_PURCHASE_RECORD));
    assert!(analysis.scores.purchase_verification < 0.3);
    assert!(analysis.validate().is_ok());
}

#[tokio::test]
async fn model_failure_produces_the_fallback_analysis() {
    let model = ScriptedModel { response: None };
    let search = SearchService::disabled();
    let ctx = context_with(verified_ten_days_ago());

    let analysis = run_analysis(&model, &search, &ctx, None).await;

    assert_eq!(analysis.classification, Classification::Pending);
    assert!(analysis.has_flag(FLAG_ANALYSIS_FAILED));
    assert!(analysis.needs_manual_review);
    assert_eq!(analysis.confidence, 0.5);
    assert!(analysis.validate().is_ok());
    assert_eq!(derive_status(&analysis), ReviewStatus::UnderReview);
}

#[tokio::test]
async fn unparsable_model_text_produces_the_fallback_analysis() {
    let model = ScriptedModel {
        response: Some("I am sorry, I cannot evaluate this review."),
    };
    let search = SearchService::disabled();
    let ctx = context_with(PurchaseVerification::Unverified);

    let analysis = run_analysis(&model, &search, &ctx, None).await;

    assert_eq!(analysis.classification, Classification::Pending);
    assert!(analysis.has_flag(FLAG_ANALYSIS_FAILED));
    assert!(analysis.needs_manual_review);
    // Non-purchaser invariant holds even on the fallback path.
    assert!(analysis.has_flag(FLAG_NO_PURCHASE_RECORD));
}

#[tokio::test]
async fn reanalysis_with_the_same_inputs_is_idempotent() {
    let model = ScriptedModel {
        response: Some(GENUINE_RESPONSE),
    };
    let search = SearchService::disabled();
    let ctx = context_with(verified_ten_days_ago());

    let first = run_analysis(&model, &search, &ctx, None).await;
    let second = run_analysis(&model, &search, &ctx, None).await;

    assert_eq!(first.classification, second.classification);
    assert_eq!(first.flags, second.flags);
    assert_eq!(first.scores, second.scores);
    assert_eq!(first.confidence, second.confidence);
}

#[tokio::test]
async fn copied_content_annotates_but_never_reclassifies() {
    let model = ScriptedModel {
        response: Some(GENUINE_RESPONSE),
    };
    let search = SearchService::new(
        Arc::new(ScriptedSearch {
            hits: vec![SearchHit {
                title: COMMENT.to_string(),
                snippet: COMMENT.to_string(),
                url: "https://www.otherstore.com/reviews/42".to_string(),
            }],
        }),
        10,
    );
    let ctx = context_with(verified_ten_days_ago());

    let analysis = run_analysis(&model, &search, &ctx, None).await;

    assert_eq!(analysis.classification, Classification::Genuine);
    assert!(analysis.has_flag(FLAG_COPIED_CONTENT));
    assert!(analysis.needs_manual_review);

    let web = analysis.web_search.as_ref().unwrap();
    assert!(web.found);
    assert!(web.is_copied);
    assert_eq!(web.sources[0].domain, "otherstore.com");
    assert!(analysis.validate().is_ok());
}

#[tokio::test]
async fn all_scores_stay_in_range_for_every_outcome() {
    let search = SearchService::disabled();

    for (response, verification) in [
        (Some(GENUINE_RESPONSE), verified_ten_days_ago()),
        (Some(GENUINE_RESPONSE), PurchaseVerification::Unverified),
        (Some("{\"confidence\": 99, \"scores\": {\"overallRisk\": -4}}"), PurchaseVerification::Unknown),
        (None, PurchaseVerification::Unverified),
    ] {
        let model = ScriptedModel { response };
        let ctx = context_with(verification);
        let analysis = run_analysis(&model, &search, &ctx, None).await;

        assert!((0.0..=1.0).contains(&analysis.confidence));
        for (_, value) in analysis.scores.as_named() {
            assert!((0.0..=1.0).contains(&value));
        }
        assert!(analysis.validate().is_ok());
    }
}
