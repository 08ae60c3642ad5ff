//! Field candidates, source tiers and review routing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::BoundingBox;

/// Provenance and trust level of an extracted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTier {
    /// Matched by a rule shared by every company.
    Universal,
    /// Matched by a rule authored for one company.
    CompanySpecific,
    /// Proposed by a classification model.
    ModelClassified,
    /// Read directly from the vendor-structured result.
    VendorDirect,
}

impl SourceTier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Universal => "UNIVERSAL",
            Self::CompanySpecific => "COMPANY_SPECIFIC",
            Self::ModelClassified => "MODEL_CLASSIFIED",
            Self::VendorDirect => "VENDOR_DIRECT",
        }
    }

    /// Map a collaborator `source` label onto a tier.
    ///
    /// Unknown labels are treated as universal rule matches.
    pub fn from_source_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "vendor" | "vendor_direct" | "azure" => Self::VendorDirect,
            "model" | "model_classified" | "llm" => Self::ModelClassified,
            "company" | "company_specific" | "tier2" => Self::CompanySpecific,
            _ => Self::Universal,
        }
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One proposed value for a named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCandidate {
    pub field_name: String,
    /// `None` means the field is present but has no value.
    pub value: Option<String>,
    /// Raw confidence in `[0, 1]`.
    pub raw_confidence: f64,
    pub source_tier: SourceTier,
}

impl FieldCandidate {
    pub fn new(
        field_name: impl Into<String>,
        value: Option<String>,
        raw_confidence: f64,
        source_tier: SourceTier,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            value,
            raw_confidence,
            source_tier,
        }
    }

    /// Candidate with a value, full confidence and universal tier.
    pub fn text(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field_name, Some(value.into()), 1.0, SourceTier::Universal)
    }
}

/// A field value as delivered by the OCR/vision collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFieldValue {
    pub field_name: String,
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source: String,
}

impl From<ExtractedFieldValue> for FieldCandidate {
    fn from(extracted: ExtractedFieldValue) -> Self {
        let confidence = extracted.confidence.unwrap_or(0.0);
        Self {
            field_name: extracted.field_name,
            value: extracted.value,
            raw_confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            source_tier: SourceTier::from_source_label(&extracted.source),
        }
    }
}

/// Human-review routing decision derived from a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewType {
    AutoApprove,
    QuickReview,
    FullReview,
}

impl ReviewType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApprove => "AUTO_APPROVE",
            Self::QuickReview => "QUICK_REVIEW",
            Self::FullReview => "FULL_REVIEW",
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::AutoApprove => "accepted without review",
            Self::QuickReview => "confirm at a glance",
            Self::FullReview => "verify against the document",
        }
    }
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized confidence for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceAssessment {
    /// Score in `[0, 100]`.
    pub score: f64,
    pub review_type: ReviewType,
    pub tier: SourceTier,
}
