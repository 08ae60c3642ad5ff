//! Rule-driven field extraction.
//!
//! Rules are grouped by field name and tried in ascending priority. The
//! first rule whose pattern yields a non-empty normalized value wins; the
//! value is then validated and scored. Fields without any hit fall back to a
//! configured default value or are reported as unmatched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};

use invx_model::{
    ConfidenceAssessment, DocumentInput, ExtractionMethod, ExtractionPattern, FieldCandidate,
    ReviewType, SourceTier,
};

use crate::classify::ConfidenceClassifier;
use crate::error::{ExtractError, Result};
use crate::evaluator::PatternEvaluator;
use crate::normalize::ValueNormalizer;

/// Raw confidence given to a configured default value.
pub const DEFAULT_VALUE_CONFIDENCE: f64 = 0.5;

/// Reason reported for a field no rule could fill.
pub const NO_MATCHING_RULE: &str = "no_matching_rule";

/// An authored rule locating one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRule {
    pub id: String,
    pub field_name: String,
    pub pattern: ExtractionPattern,
    /// Lower numbers are tried first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_tier")]
    pub tier: SourceTier,
    /// Only applies when extracting for this company.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    /// Regex the normalized value must match from its start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

fn default_tier() -> SourceTier {
    SourceTier::Universal
}

/// One field value produced by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedField {
    pub field_name: String,
    /// Normalized value.
    pub value: String,
    /// Value as matched, before normalization.
    pub raw_value: String,
    pub raw_confidence: f64,
    pub assessment: ConfidenceAssessment,
    /// `None` when the value is a default.
    pub rule_id: Option<String>,
    pub method: Option<ExtractionMethod>,
    pub is_validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    pub used_default: bool,
}

impl ExtractedField {
    pub fn to_candidate(&self) -> FieldCandidate {
        FieldCandidate::new(
            self.field_name.clone(),
            Some(self.value.clone()),
            self.raw_confidence,
            self.assessment.tier,
        )
    }
}

/// A field that produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedField {
    pub field_name: String,
    pub reason: String,
    /// Methods tried, in rule order.
    pub attempts: Vec<ExtractionMethod>,
    pub is_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStatistics {
    pub total_fields: usize,
    pub mapped_fields: usize,
    pub unmapped_fields: usize,
    /// Mean score of extracted fields, two decimals.
    pub average_score: f64,
    pub processing_time_ms: u64,
    /// Fields filled by a rule rather than a default.
    pub rules_applied: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub fields: Vec<ExtractedField>,
    pub unmatched: Vec<UnmatchedField>,
    pub statistics: ExtractionStatistics,
}

impl ExtractionOutcome {
    /// Candidates for the mapping stage.
    pub fn candidates(&self) -> Vec<FieldCandidate> {
        self.fields.iter().map(ExtractedField::to_candidate).collect()
    }

    pub fn field(&self, field_name: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.field_name == field_name)
    }

    /// Required fields that ended up unmatched.
    pub fn missing_required(&self) -> impl Iterator<Item = &UnmatchedField> {
        self.unmatched.iter().filter(|u| u.is_required)
    }
}

/// Review workload of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub by_review_type: BTreeMap<ReviewType, usize>,
    pub missing_required: Vec<String>,
}

impl ReviewSummary {
    pub fn from_outcome(outcome: &ExtractionOutcome) -> Self {
        let mut by_review_type = BTreeMap::new();
        for field in &outcome.fields {
            *by_review_type.entry(field.assessment.review_type).or_insert(0) += 1;
        }
        Self {
            by_review_type,
            missing_required: outcome
                .missing_required()
                .map(|u| u.field_name.clone())
                .collect(),
        }
    }

    pub fn count(&self, review_type: ReviewType) -> usize {
        self.by_review_type.get(&review_type).copied().unwrap_or(0)
    }

    /// Whether a person has to look at this document at all.
    pub fn needs_review(&self) -> bool {
        !self.missing_required.is_empty()
            || self.count(ReviewType::QuickReview) + self.count(ReviewType::FullReview) > 0
    }
}

/// Runs extraction rules over a document.
#[derive(Debug)]
pub struct FieldExtractor {
    /// Field names in order of first appearance, each with its rules sorted.
    fields: Vec<(String, Vec<ExtractionRule>)>,
    validators: HashMap<String, Regex>,
    evaluator: PatternEvaluator,
    normalizer: ValueNormalizer,
    classifier: ConfidenceClassifier,
}

impl FieldExtractor {
    /// Build an extractor, compiling every validation pattern up front.
    pub fn new(rules: Vec<ExtractionRule>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut validators = HashMap::new();
        let mut fields: Vec<(String, Vec<ExtractionRule>)> = Vec::new();

        for rule in rules {
            if !ids.insert(rule.id.clone()) {
                return Err(ExtractError::DuplicateRuleId(rule.id));
            }
            if let Some(pattern) = &rule.validation_pattern {
                let regex =
                    Regex::new(pattern).map_err(|source| ExtractError::InvalidValidationPattern {
                        rule_id: rule.id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                validators.insert(rule.id.clone(), regex);
            }
            match fields.iter_mut().find(|(name, _)| *name == rule.field_name) {
                Some((_, group)) => group.push(rule),
                None => fields.push((rule.field_name.clone(), vec![rule])),
            }
        }

        for (_, group) in &mut fields {
            group.sort_by_key(|rule| rule.priority);
        }

        Ok(Self {
            fields,
            validators,
            evaluator: PatternEvaluator::new(),
            normalizer: ValueNormalizer::new(),
            classifier: ConfidenceClassifier::new(),
        })
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Extract every configured field from `document`.
    ///
    /// Rules scoped to a company only take part when `company_id` names it.
    pub fn extract(&self, document: &DocumentInput, company_id: Option<&str>) -> ExtractionOutcome {
        let started = Instant::now();
        let mut outcome = ExtractionOutcome::default();
        let mut rules_applied = 0;

        for (field_name, rules) in &self.fields {
            let applicable: Vec<&ExtractionRule> = rules
                .iter()
                .filter(|r| r.company_id.is_none() || r.company_id.as_deref() == company_id)
                .collect();
            if applicable.is_empty() {
                continue;
            }

            if let Some(field) = self.extract_field(field_name, &applicable, document) {
                rules_applied += 1;
                outcome.fields.push(field);
                continue;
            }

            if let Some(field) = self.default_field(field_name, &applicable) {
                tracing::debug!(field = %field_name, "No rule matched, using default value");
                outcome.fields.push(field);
                continue;
            }

            tracing::debug!(field = %field_name, attempts = applicable.len(), "No rule matched");
            outcome.unmatched.push(UnmatchedField {
                field_name: field_name.clone(),
                reason: NO_MATCHING_RULE.to_string(),
                attempts: applicable.iter().map(|r| r.pattern.method()).collect(),
                is_required: applicable.iter().any(|r| r.is_required),
            });
        }

        let mapped = outcome.fields.len();
        let average = if mapped == 0 {
            0.0
        } else {
            outcome.fields.iter().map(|f| f.assessment.score).sum::<f64>() / mapped as f64
        };
        outcome.statistics = ExtractionStatistics {
            total_fields: mapped + outcome.unmatched.len(),
            mapped_fields: mapped,
            unmapped_fields: outcome.unmatched.len(),
            average_score: (average * 100.0).round() / 100.0,
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            rules_applied,
        };

        tracing::info!(
            total = outcome.statistics.total_fields,
            mapped = outcome.statistics.mapped_fields,
            unmapped = outcome.statistics.unmapped_fields,
            "Field extraction complete"
        );
        outcome
    }

    fn extract_field(
        &self,
        field_name: &str,
        rules: &[&ExtractionRule],
        document: &DocumentInput,
    ) -> Option<ExtractedField> {
        for rule in rules {
            let found = self.evaluator.evaluate(&rule.pattern, document);
            let Some(raw_value) = found.value else {
                tracing::trace!(
                    field = %field_name,
                    rule_id = %rule.id,
                    reason = found.reason.as_deref().unwrap_or_default(),
                    "Rule did not match"
                );
                continue;
            };

            let value = self.normalizer.normalize(field_name, &raw_value);
            if value.is_empty() {
                continue;
            }

            let tier = if found.vendor_direct {
                SourceTier::VendorDirect
            } else {
                rule.tier
            };
            let validation_error = self.validate(rule, &value);
            tracing::debug!(
                field = %field_name,
                rule_id = %rule.id,
                method = %found.method,
                "Field extracted"
            );

            return Some(ExtractedField {
                field_name: field_name.to_string(),
                value,
                raw_value,
                raw_confidence: found.confidence,
                assessment: self.classifier.classify(found.confidence, tier),
                rule_id: Some(rule.id.clone()),
                method: Some(found.method),
                is_validated: validation_error.is_none(),
                validation_error,
                used_default: false,
            });
        }
        None
    }

    fn default_field(&self, field_name: &str, rules: &[&ExtractionRule]) -> Option<ExtractedField> {
        let rule = rules.iter().find(|r| r.default_value.is_some())?;
        let value = rule.default_value.clone()?;
        Some(ExtractedField {
            field_name: field_name.to_string(),
            raw_value: value.clone(),
            value,
            raw_confidence: DEFAULT_VALUE_CONFIDENCE,
            assessment: self.classifier.classify(DEFAULT_VALUE_CONFIDENCE, rule.tier),
            rule_id: None,
            method: None,
            is_validated: true,
            validation_error: None,
            used_default: true,
        })
    }

    fn validate(&self, rule: &ExtractionRule, value: &str) -> Option<String> {
        let regex = self.validators.get(&rule.id)?;
        let anchored = regex.find(value).is_some_and(|m| m.start() == 0);
        (!anchored).then(|| format!("value does not match pattern: {}", regex.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use invx_model::VendorFieldValue;

    use super::*;

    fn regex_rule(id: &str, field: &str, pattern: &str, priority: i32) -> ExtractionRule {
        ExtractionRule {
            id: id.to_string(),
            field_name: field.to_string(),
            pattern: ExtractionPattern::Regex {
                pattern: pattern.to_string(),
                flags: Some("i".to_string()),
                group_index: Some(1),
                confidence_boost: None,
            },
            priority,
            tier: SourceTier::Universal,
            company_id: None,
            validation_pattern: None,
            default_value: None,
            is_required: false,
        }
    }

    #[test]
    fn lower_priority_rule_is_tried_first() {
        let extractor = FieldExtractor::new(vec![
            regex_rule("late", "invoice_number", r"ref (\w+)", 5),
            regex_rule("early", "invoice_number", r"invoice (\w+)", 1),
        ])
        .unwrap();
        let doc = DocumentInput::from_text("Invoice A1 ref B2");
        let outcome = extractor.extract(&doc, None);
        let field = outcome.field("invoice_number").unwrap();
        assert_eq!(field.value, "A1");
        assert_eq!(field.rule_id.as_deref(), Some("early"));
    }

    #[test]
    fn value_is_normalized_and_validated() {
        let mut rule = regex_rule("r1", "invoice_date", r"date: (.+)", 1);
        rule.validation_pattern = Some(r"\d{4}-\d{2}-\d{2}$".to_string());
        let extractor = FieldExtractor::new(vec![rule]).unwrap();

        let outcome = extractor.extract(&DocumentInput::from_text("Date: 18.12.2024"), None);
        let field = outcome.field("invoice_date").unwrap();
        assert_eq!(field.value, "2024-12-18");
        assert_eq!(field.raw_value, "18.12.2024");
        assert!(field.is_validated);

        let outcome = extractor.extract(&DocumentInput::from_text("Date: soon"), None);
        let field = outcome.field("invoice_date").unwrap();
        assert!(!field.is_validated);
        assert!(field.validation_error.is_some());
    }

    #[test]
    fn vendor_hit_is_vendor_direct() {
        let rule = ExtractionRule {
            pattern: ExtractionPattern::VendorField {
                name: "InvoiceTotal".to_string(),
                fallback_pattern: None,
                confidence_boost: None,
            },
            ..regex_rule("v1", "total_amount", "", 1)
        };
        let extractor = FieldExtractor::new(vec![rule]).unwrap();
        let doc = DocumentInput::default().with_vendor_fields(BTreeMap::from([(
            "InvoiceTotal".to_string(),
            VendorFieldValue::text("1,200.5"),
        )]));
        let field = extractor.extract(&doc, None).fields.remove(0);
        assert_eq!(field.value, "1200.50");
        assert_eq!(field.assessment.tier, SourceTier::VendorDirect);
        assert_eq!(field.assessment.review_type, ReviewType::AutoApprove);
    }

    #[test]
    fn default_value_gets_full_review() {
        let mut rule = regex_rule("r1", "currency", r"currency (\w+)", 1);
        rule.default_value = Some("USD".to_string());
        rule.tier = SourceTier::CompanySpecific;
        let extractor = FieldExtractor::new(vec![rule]).unwrap();

        let outcome = extractor.extract(&DocumentInput::from_text("nothing here"), None);
        let field = outcome.field("currency").unwrap();
        assert!(field.used_default);
        assert_eq!(field.raw_confidence, DEFAULT_VALUE_CONFIDENCE);
        assert_eq!(field.assessment.review_type, ReviewType::FullReview);
        assert_eq!(outcome.statistics.rules_applied, 0);
    }

    #[test]
    fn unmatched_field_lists_attempts() {
        let mut keyword = regex_rule("k1", "shipper", "", 2);
        keyword.pattern = ExtractionPattern::Keyword {
            keywords: vec!["Shipper".to_string()],
            proximity_words: vec![],
            max_distance: None,
            confidence_boost: None,
        };
        keyword.is_required = true;
        let extractor =
            FieldExtractor::new(vec![regex_rule("r1", "shipper", r"from (\w+)", 1), keyword])
                .unwrap();

        let outcome = extractor.extract(&DocumentInput::from_text("blank"), None);
        assert_eq!(outcome.unmatched.len(), 1);
        let unmatched = &outcome.unmatched[0];
        assert_eq!(unmatched.reason, NO_MATCHING_RULE);
        assert_eq!(
            unmatched.attempts,
            vec![ExtractionMethod::Regex, ExtractionMethod::Keyword]
        );
        assert_eq!(outcome.missing_required().count(), 1);
        assert_eq!(outcome.statistics.unmapped_fields, 1);
    }

    #[test]
    fn company_rules_only_apply_to_their_company() {
        let mut scoped = regex_rule("c1", "booking_ref", r"bk (\w+)", 1);
        scoped.company_id = Some("ACME".to_string());
        scoped.tier = SourceTier::CompanySpecific;
        let extractor = FieldExtractor::new(vec![scoped]).unwrap();
        let doc = DocumentInput::from_text("BK 991");

        assert!(extractor.extract(&doc, None).fields.is_empty());
        let outcome = extractor.extract(&doc, Some("ACME"));
        assert_eq!(outcome.fields[0].assessment.tier, SourceTier::CompanySpecific);
    }

    #[test]
    fn invalid_validation_pattern_is_rejected() {
        let mut rule = regex_rule("r1", "x", "(x)", 1);
        rule.validation_pattern = Some("[".to_string());
        let err = FieldExtractor::new(vec![rule]).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidValidationPattern { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = FieldExtractor::new(vec![
            regex_rule("r1", "a", "(a)", 1),
            regex_rule("r1", "b", "(b)", 1),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate extraction rule id 'r1'");
    }
}
