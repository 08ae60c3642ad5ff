//! Tier-weighted confidence scoring and review routing.

use invx_model::{ConfidenceAssessment, ReviewType, SourceTier};

/// Score at or above which a value is accepted without review.
pub const AUTO_APPROVE_THRESHOLD: f64 = 90.0;
/// Score at or above which a quick review suffices.
pub const QUICK_REVIEW_THRESHOLD: f64 = 70.0;
/// Highest score a model-classified value can reach.
pub const MODEL_CLASSIFIED_CAP: f64 = 89.0;

/// Converts raw candidate confidence into a 0-100 score and a review decision.
///
/// Tier weights:
/// - [`SourceTier::VendorDirect`] and [`SourceTier::CompanySpecific`]: unchanged
/// - [`SourceTier::Universal`]: 0.95
/// - [`SourceTier::ModelClassified`]: 0.85, capped at [`MODEL_CLASSIFIED_CAP`]
///   so it is never auto-approved
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceClassifier;

impl ConfidenceClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Multiplier applied to the base score for a tier.
    pub const fn tier_weight(tier: SourceTier) -> f64 {
        match tier {
            SourceTier::VendorDirect | SourceTier::CompanySpecific => 1.0,
            SourceTier::Universal => 0.95,
            SourceTier::ModelClassified => 0.85,
        }
    }

    #[must_use]
    pub fn classify(&self, raw_confidence: f64, tier: SourceTier) -> ConfidenceAssessment {
        let raw = if raw_confidence.is_nan() {
            0.0
        } else {
            raw_confidence.clamp(0.0, 1.0)
        };
        let mut score = raw * 100.0 * Self::tier_weight(tier);
        if tier == SourceTier::ModelClassified {
            score = score.min(MODEL_CLASSIFIED_CAP);
        }
        let score = score.clamp(0.0, 100.0);

        ConfidenceAssessment {
            score,
            review_type: Self::review_type(score),
            tier,
        }
    }

    /// Routing for an already-computed score.
    #[must_use]
    pub fn review_type(score: f64) -> ReviewType {
        if score >= AUTO_APPROVE_THRESHOLD {
            ReviewType::AutoApprove
        } else if score >= QUICK_REVIEW_THRESHOLD {
            ReviewType::QuickReview
        } else {
            ReviewType::FullReview
        }
    }
}
