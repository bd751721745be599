use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalysisError;

pub const FLAG_NO_PURCHASE_RECORD: &str = "no_purchase_record";
pub const FLAG_UNVERIFIED_REVIEWER: &str = "unverified_reviewer";
pub const FLAG_GENERIC_REVIEW: &str = "generic_review";
pub const FLAG_EXCESSIVE_SUPERLATIVES: &str = "excessive_superlatives";
pub const FLAG_RATING_TEXT_MISMATCH: &str = "rating_text_mismatch";
pub const FLAG_SUSPICIOUS_TIMING: &str = "suspicious_timing";
pub const FLAG_INCOHERENT_TEXT: &str = "incoherent_text";
pub const FLAG_PROMOTIONAL_CONTENT: &str = "promotional_content";
pub const FLAG_IMAGE_MISMATCH: &str = "image_mismatch";
pub const FLAG_COPIED_CONTENT: &str = "copied_content";
pub const FLAG_SIMILAR_CONTENT: &str = "similar_content_found";
pub const FLAG_ANALYSIS_FAILED: &str = "analysis_failed";

/// Downstream moderation logic keys off exact flag strings, so anything
/// outside this vocabulary is rejected at the persistence boundary.
pub const KNOWN_FLAGS: &[&str] = &[
    FLAG_NO_PURCHASE_RECORD,
    FLAG_UNVERIFIED_REVIEWER,
    FLAG_GENERIC_REVIEW,
    FLAG_EXCESSIVE_SUPERLATIVES,
    FLAG_RATING_TEXT_MISMATCH,
    FLAG_SUSPICIOUS_TIMING,
    FLAG_INCOHERENT_TEXT,
    FLAG_PROMOTIONAL_CONTENT,
    FLAG_IMAGE_MISMATCH,
    FLAG_COPIED_CONTENT,
    FLAG_SIMILAR_CONTENT,
    FLAG_ANALYSIS_FAILED,
];

pub fn is_known_flag(flag: &str) -> bool {
    KNOWN_FLAGS.contains(&flag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Genuine,
    Suspicious,
    Pending,
}

impl Classification {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "genuine" => Some(Classification::Genuine),
            "suspicious" => Some(Classification::Suspicious),
            "pending" => Some(Classification::Pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn from_overall_risk(risk: f64) -> Self {
        if risk < 0.4 {
            RiskLevel::Low
        } else if risk < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub sentiment: f64,
    pub authenticity: f64,
    pub product_relevance: f64,
    pub purchase_verification: f64,
    pub overall_risk: f64,
}

impl Scores {
    /// Defaults used when the model omits a score. Lower authenticity and
    /// purchase-verification baselines for reviewers with no purchase record.
    pub fn baseline(has_purchased: bool) -> Self {
        if has_purchased {
            Scores {
                sentiment: 0.5,
                authenticity: 0.6,
                product_relevance: 0.5,
                purchase_verification: 0.9,
                overall_risk: 0.3,
            }
        } else {
            Scores {
                sentiment: 0.5,
                authenticity: 0.3,
                product_relevance: 0.5,
                purchase_verification: 0.1,
                overall_risk: 0.6,
            }
        }
    }

    pub fn as_named(&self) -> [(&'static str, f64); 5] {
        [
            ("sentiment", self.sentiment),
            ("authenticity", self.authenticity),
            ("productRelevance", self.product_relevance),
            ("purchaseVerification", self.purchase_verification),
            ("overallRisk", self.overall_risk),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSource {
    pub url: String,
    pub domain: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchVerdict {
    pub found: bool,
    pub is_copied: bool,
    pub confidence: f64,
    pub sources: Vec<SimilarSource>,
    pub analysis: String,
}

impl WebSearchVerdict {
    pub fn no_match() -> Self {
        WebSearchVerdict {
            found: false,
            is_copied: false,
            confidence: 0.0,
            sources: Vec::new(),
            analysis: "No matching content found on the web.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub classification: Classification,
    pub confidence: f64,
    pub flags: Vec<String>,
    pub reasoning: String,
    pub scores: Scores,
    pub risk_level: RiskLevel,
    pub needs_manual_review: bool,
    pub analyzed_at: DateTime<Utc>,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search: Option<WebSearchVerdict>,
}

impl AiAnalysis {
    /// Persistence-boundary check: out-of-range scores or flags outside the
    /// vocabulary are rejected, not coerced.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(AnalysisError::Validation(format!(
                "confidence {} outside [0,1]",
                self.confidence
            )));
        }
        for (name, value) in self.scores.as_named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::Validation(format!(
                    "score {} = {} outside [0,1]",
                    name, value
                )));
            }
        }
        for flag in &self.flags {
            if !is_known_flag(flag) {
                return Err(AnalysisError::Validation(format!(
                    "unknown flag: {}",
                    flag
                )));
            }
        }
        Ok(())
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Derived per analysis call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub has_purchased: bool,
    pub purchase_date: Option<DateTime<Utc>>,
    pub order_id: Option<Uuid>,
}

impl PurchaseRecord {
    pub fn none() -> Self {
        PurchaseRecord {
            has_purchased: false,
            purchase_date: None,
            order_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_analysis() -> AiAnalysis {
        AiAnalysis {
            classification: Classification::Genuine,
            confidence: 0.9,
            flags: vec![FLAG_GENERIC_REVIEW.to_string()],
            reasoning: "Looks fine.".to_string(),
            scores: Scores::baseline(true),
            risk_level: RiskLevel::Low,
            needs_manual_review: false,
            analyzed_at: Utc::now(),
            model_version: "test".to_string(),
            image_analysis: None,
            web_search: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_analysis() {
        assert!(valid_analysis().validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut a = valid_analysis();
        a.confidence = 1.3;
        assert!(a.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_score() {
        let mut a = valid_analysis();
        a.scores.overall_risk = -0.1;
        assert!(a.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_flag() {
        let mut a = valid_analysis();
        a.flags.push("definitely_not_a_flag".to_string());
        assert!(a.validate().is_err());
    }

    #[test]
    fn classification_parse_is_case_insensitive() {
        assert_eq!(Classification::parse("GENUINE"), Some(Classification::Genuine));
        assert_eq!(Classification::parse(" suspicious "), Some(Classification::Suspicious));
        assert_eq!(Classification::parse("bogus"), None);
    }

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_overall_risk(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_overall_risk(0.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_overall_risk(0.9), RiskLevel::High);
    }
}
