use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::analysis::purchase::PurchaseVerification;
use crate::analysis::types::{
    is_known_flag, AiAnalysis, Classification, RiskLevel, Scores, FLAG_ANALYSIS_FAILED,
    FLAG_NO_PURCHASE_RECORD, FLAG_UNVERIFIED_REVIEWER,
};

/// Finds the first balanced `{...}` substring that parses as a JSON object.
/// The model is told to return pure JSON but is not trusted to.
pub fn first_json_object(raw: &str) -> Option<Value> {
    for (start, _) in raw.char_indices().filter(|(_, c)| *c == '{') {
        if let Some(candidate) = balanced_object_at(raw, start) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }
    None
}

fn balanced_object_at(raw: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn score_field(scores: Option<&Value>, key: &str, default: f64) -> f64 {
    scores
        .and_then(|s| s.get(key))
        .and_then(Value::as_f64)
        .map(clamp01)
        .unwrap_or(default)
}

fn push_flag(flags: &mut Vec<String>, flag: &str) {
    if !flags.iter().any(|f| f == flag) {
        flags.push(flag.to_string());
    }
}

/// Purchase facts win over whatever the model said: a verified purchaser is
/// never marked unverified, and a reviewer without a purchase record always
/// carries the no_purchase_record flag with a low verification score.
fn reconcile_with_purchase(analysis: &mut AiAnalysis, verification: &PurchaseVerification) {
    match verification.has_purchased() {
        Some(true) => {
            analysis
                .flags
                .retain(|f| f != FLAG_NO_PURCHASE_RECORD && f != FLAG_UNVERIFIED_REVIEWER);
            if analysis.scores.purchase_verification < 0.9 {
                analysis.scores.purchase_verification = 0.9;
            }
        }
        Some(false) => {
            push_flag(&mut analysis.flags, FLAG_NO_PURCHASE_RECORD);
            if analysis.scores.purchase_verification > 0.2 {
                analysis.scores.purchase_verification = 0.2;
            }
        }
        None => {
            // Inconclusive lookup: cap rather than assert either way.
            if analysis.scores.purchase_verification > 0.5 {
                analysis.scores.purchase_verification = 0.5;
            }
        }
    }
}

/// Normalizes raw model text into an AiAnalysis. Total: any shape of garbage
/// in produces the deterministic fallback out, never an error.
pub fn parse_model_response(
    raw: &str,
    verification: &PurchaseVerification,
    model_version: &str,
) -> AiAnalysis {
    let value = match first_json_object(raw) {
        Some(v) => v,
        None => {
            warn!("no JSON object in model response ({} chars)", raw.len());
            return fallback_analysis(
                verification,
                "model response contained no JSON object",
                model_version,
            );
        }
    };

    let has_purchased = verification.has_purchased() == Some(true);
    let baseline = Scores::baseline(has_purchased);

    let classification = value
        .get("classification")
        .and_then(Value::as_str)
        .and_then(Classification::parse)
        .unwrap_or(Classification::Pending);

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map(clamp01)
        .unwrap_or(0.5);

    let mut flags: Vec<String> = Vec::new();
    if let Some(raw_flags) = value.get("flags").and_then(Value::as_array) {
        for flag in raw_flags.iter().filter_map(Value::as_str) {
            if is_known_flag(flag) {
                push_flag(&mut flags, flag);
            } else {
                warn!("dropping unknown flag from model: {}", flag);
            }
        }
    }

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("No reasoning provided by the model.")
        .to_string();

    let needs_manual_review = value
        .get("needsManualReview")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let raw_scores = value.get("scores");
    let scores = Scores {
        sentiment: score_field(raw_scores, "sentiment", baseline.sentiment),
        authenticity: score_field(raw_scores, "authenticity", baseline.authenticity),
        product_relevance: score_field(raw_scores, "productRelevance", baseline.product_relevance),
        purchase_verification: score_field(
            raw_scores,
            "purchaseVerification",
            baseline.purchase_verification,
        ),
        overall_risk: score_field(raw_scores, "overallRisk", baseline.overall_risk),
    };

    let risk_level = value
        .get("riskLevel")
        .and_then(Value::as_str)
        .and_then(RiskLevel::parse)
        .unwrap_or_else(|| RiskLevel::from_overall_risk(scores.overall_risk));

    let image_analysis = value
        .get("imageAnalysis")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut analysis = AiAnalysis {
        classification,
        confidence,
        flags,
        reasoning,
        scores,
        risk_level,
        needs_manual_review,
        analyzed_at: Utc::now(),
        model_version: model_version.to_string(),
        image_analysis,
        web_search: None,
    };

    reconcile_with_purchase(&mut analysis, verification);
    analysis
}

/// The always-safe result when the AI call or parsing fails. The review still
/// gets stored; it just lands in the manual moderation queue.
pub fn fallback_analysis(
    verification: &PurchaseVerification,
    reason: &str,
    model_version: &str,
) -> AiAnalysis {
    let has_purchased = verification.has_purchased() == Some(true);

    let mut analysis = AiAnalysis {
        classification: Classification::Pending,
        confidence: 0.5,
        flags: vec![FLAG_ANALYSIS_FAILED.to_string()],
        reasoning: format!(
            "Automatic analysis failed: {}. Review queued for manual moderation.",
            reason
        ),
        scores: Scores::baseline(has_purchased),
        risk_level: RiskLevel::Medium,
        needs_manual_review: true,
        analyzed_at: Utc::now(),
        model_version: model_version.to_string(),
        image_analysis: None,
        web_search: None,
    };

    reconcile_with_purchase(&mut analysis, verification);
    analysis
}
