pub mod context;
pub mod parser;
pub mod prompt;
pub mod purchase;
pub mod types;

use sqlx::PgPool;
use tracing::warn;

use crate::agents::{ModelClient, ModelRequest};
use crate::analysis::context::ReviewContext;
use crate::analysis::types::{
    AiAnalysis, WebSearchVerdict, FLAG_COPIED_CONTENT, FLAG_SIMILAR_CONTENT,
};
use crate::db::{self, Review};
use crate::error::AnalysisError;
use crate::search::SearchService;

/// Full pipeline for one review: purchase verification, context assembly,
/// model call, parsing, web augmentation. Only upstream-data lookups can
/// error; everything past them degrades to the fallback analysis.
pub async fn analyze_review(
    pool: &PgPool,
    model: &dyn ModelClient,
    search: &SearchService,
    review: &Review,
) -> Result<AiAnalysis, AnalysisError> {
    let product = db::get_product(pool, review.product_id)
        .await?
        .ok_or(AnalysisError::NotFound {
            entity: "product",
            id: review.product_id,
        })?;

    let verification = purchase::verify_purchase(pool, review.user_id, review.product_id).await;
    let ctx = context::assemble(review, &product, verification);

    Ok(run_analysis(model, search, &ctx, review.images.first().map(String::as_str)).await)
}

/// Core of the pipeline, independent of storage. Total: always produces a
/// valid analysis.
pub async fn run_analysis(
    model: &dyn ModelClient,
    search: &SearchService,
    ctx: &ReviewContext,
    image_url: Option<&str>,
) -> AiAnalysis {
    let image = match image_url {
        Some(url) => model.fetch_image(url).await,
        None => None,
    };

    let request = ModelRequest {
        system: prompt::SYSTEM_PROMPT.to_string(),
        user: prompt::build_user_prompt(ctx),
        image,
    };

    let mut analysis = match model.analyze(&request).await {
        Ok(raw) => parser::parse_model_response(&raw, &ctx.verification, &model.model_version()),
        Err(e) => {
            warn!("AI call failed: {}", e);
            parser::fallback_analysis(&ctx.verification, &e.to_string(), &model.model_version())
        }
    };

    if let Some(verdict) = search.check_copied_content(&ctx.comment).await {
        merge_web_verdict(&mut analysis, verdict);
    }

    analysis
}

/// Folds the web-similarity verdict into the analysis. Annotation only: it
/// adds flags and the sub-record but never overrides the classification.
pub fn merge_web_verdict(analysis: &mut AiAnalysis, verdict: WebSearchVerdict) {
    if verdict.is_copied {
        if !analysis.has_flag(FLAG_COPIED_CONTENT) {
            analysis.flags.push(FLAG_COPIED_CONTENT.to_string());
        }
        analysis.needs_manual_review = true;
    } else if verdict.found && !analysis.has_flag(FLAG_SIMILAR_CONTENT) {
        analysis.flags.push(FLAG_SIMILAR_CONTENT.to_string());
    }
    analysis.web_search = Some(verdict);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse_model_response;
    use crate::analysis::purchase::PurchaseVerification;
    use crate::analysis::types::{Classification, SimilarSource};

    fn genuine_analysis() -> AiAnalysis {
        parse_model_response(
            r#"{"classification": "genuine", "confidence": 0.9}"#,
            &PurchaseVerification::Unverified,
            "m",
        )
    }

    fn copied_verdict() -> WebSearchVerdict {
        WebSearchVerdict {
            found: true,
            is_copied: true,
            confidence: 0.95,
            sources: vec![SimilarSource {
                url: "https://example.com/r".to_string(),
                domain: "example.com".to_string(),
                similarity: 0.95,
            }],
            analysis: "Near-duplicate".to_string(),
        }
    }

    #[test]
    fn copied_content_annotates_without_reclassifying() {
        let mut analysis = genuine_analysis();
        merge_web_verdict(&mut analysis, copied_verdict());

        assert_eq!(analysis.classification, Classification::Genuine);
        assert!(analysis.has_flag(FLAG_COPIED_CONTENT));
        assert!(analysis.needs_manual_review);
        assert!(analysis.web_search.is_some());
        assert!(analysis.validate().is_ok());
    }

    #[test]
    fn similar_content_adds_a_softer_flag() {
        let mut analysis = genuine_analysis();
        let mut verdict = copied_verdict();
        verdict.is_copied = false;
        verdict.confidence = 0.7;

        merge_web_verdict(&mut analysis, verdict);
        assert!(analysis.has_flag(FLAG_SIMILAR_CONTENT));
        assert!(!analysis.has_flag(FLAG_COPIED_CONTENT));
    }

    #[test]
    fn no_match_only_records_the_verdict() {
        let mut analysis = genuine_analysis();
        let flags_before = analysis.flags.clone();

        merge_web_verdict(&mut analysis, WebSearchVerdict::no_match());
        assert_eq!(analysis.flags, flags_before);
        assert_eq!(analysis.web_search.as_ref().map(|w| w.found), Some(false));
    }
}
