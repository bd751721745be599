use regex::Regex;

use crate::analysis::context::ReviewContext;
use crate::analysis::purchase::PurchaseVerification;

pub const SYSTEM_PROMPT: &str = r#"You are a review-authenticity analyst for an online store. You are given one product review together with product context and the reviewer's purchase-verification status, and you judge whether the review is genuine or suspicious.

Respond with a single JSON object and nothing else, using exactly this shape:

{
  "classification": "genuine" | "suspicious" | "pending",
  "confidence": 0.0-1.0,
  "flags": ["..."],
  "reasoning": "short explanation of the verdict",
  "needsManualReview": true | false,
  "scores": {
    "sentiment": 0.0-1.0,
    "authenticity": 0.0-1.0,
    "productRelevance": 0.0-1.0,
    "purchaseVerification": 0.0-1.0,
    "overallRisk": 0.0-1.0
  },
  "riskLevel": "low" | "medium" | "high",
  "imageAnalysis": "only present when an image was provided"
}

Flags must be drawn from this exact list:
no_purchase_record, unverified_reviewer, generic_review, excessive_superlatives, rating_text_mismatch, suspicious_timing, incoherent_text, promotional_content, image_mismatch

Hard rules:
1. NEVER flag a verified purchaser with "no_purchase_record" or "unverified_reviewer".
2. ALWAYS include "no_purchase_record" for a reviewer with no purchase record, and give them a low purchaseVerification score.
3. Judge the text on its own merits otherwise: relevance to the product, specificity, coherence with the rating.
4. When purchase history is inconclusive, do not guess either way; reflect the uncertainty in purchaseVerification."#;

const MAX_REVIEW_CHARS: usize = 4000;

/// Neutralizes reviewer-supplied text before it is embedded in the prompt:
/// braces are replaced so the text cannot mimic the required JSON shape,
/// control characters are stripped, and length is capped.
pub fn sanitize_review_text(raw: &str) -> String {
    let control = Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap();
    let cleaned = control.replace_all(raw, "");
    let cleaned = cleaned.replace('{', "(").replace('}', ")");

    if cleaned.chars().count() > MAX_REVIEW_CHARS {
        cleaned.chars().take(MAX_REVIEW_CHARS).collect()
    } else {
        cleaned
    }
}

fn purchase_statement(ctx: &ReviewContext) -> String {
    match &ctx.verification {
        PurchaseVerification::Verified(record) => {
            let date = record
                .purchase_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown date".to_string());
            format!(
                "PURCHASE VERIFIED: this reviewer bought the product (order placed {}, {} days before the review). Do not flag them as unverified.",
                date, ctx.days_since_purchase
            )
        }
        PurchaseVerification::Unverified => {
            "NO PURCHASE RECORD: this reviewer has no qualifying purchase of the product. Flag the review with \"no_purchase_record\".".to_string()
        }
        PurchaseVerification::Unknown => {
            "PURCHASE UNKNOWN: purchase history could not be checked for this review. Treat verification as inconclusive.".to_string()
        }
    }
}

/// Deterministic rendering of the assembled context into the user prompt.
pub fn build_user_prompt(ctx: &ReviewContext) -> String {
    let mut prompt = String::new();

    prompt.push_str("Analyze this product review.\n\n");
    prompt.push_str(&format!(
        "Product: {}\nCategory: {}\nPrice: {:.2}\nDescription: {}\n\n",
        sanitize_review_text(&ctx.product_name),
        sanitize_review_text(&ctx.product_category),
        ctx.product_price,
        sanitize_review_text(&ctx.product_description),
    ));
    prompt.push_str(&format!("Rating: {}/5\n", ctx.rating));
    prompt.push_str(&format!(
        "Review text:\n\"{}\"\n\n",
        sanitize_review_text(&ctx.comment)
    ));
    prompt.push_str(&purchase_statement(ctx));
    prompt.push('\n');
    prompt.push_str(&format!(
        "Days between purchase and review: {}\n",
        ctx.days_since_purchase
    ));
    if ctx.edit_count > 0 {
        prompt.push_str(&format!(
            "This review has been edited {} time(s) since submission.\n",
            ctx.edit_count
        ));
    }
    if ctx.has_image {
        prompt.push_str(
            "An image accompanies this review; describe whether it matches the product in \"imageAnalysis\".\n",
        );
    }

    prompt
}
