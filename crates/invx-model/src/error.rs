//! Authoring-time validation errors.
//!
//! These are raised before a rule or config is persisted. The mapping engine
//! re-checks the same contract at execution time and fails the individual
//! field when a rule does not satisfy it.

use thiserror::Error;

use crate::rule::TransformType;

/// A mapping rule that violates the authoring contract for its transform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuleAuthoringError {
    /// Rule has no source fields at all.
    #[error("rule '{rule_id}' has no source fields")]
    NoSourceFields {
        /// Offending rule.
        rule_id: String,
    },

    /// CONCAT needs at least two inputs.
    #[error("rule '{rule_id}': CONCAT requires at least 2 source fields, found {found}")]
    ConcatTooFewSources {
        /// Offending rule.
        rule_id: String,
        /// Number of source fields configured.
        found: usize,
    },

    #[error("rule '{rule_id}': SPLIT requires a non-empty delimiter")]
    EmptyDelimiter { rule_id: String },

    #[error("rule '{rule_id}': LOOKUP requires a non-empty lookup table")]
    EmptyLookupTable { rule_id: String },

    #[error("rule '{rule_id}': CUSTOM requires a non-empty expression")]
    EmptyExpression { rule_id: String },

    /// Rule declares a config id other than the config that holds it.
    #[error("rule '{rule_id}' belongs to config '{declared}', not '{actual}'")]
    ForeignConfig {
        rule_id: String,
        declared: String,
        actual: String,
    },

    /// Two rules of one config share a target field and priority.
    #[error(
        "rules '{first}' and '{second}' both target '{target_field}' with priority {priority}"
    )]
    DuplicatePriority {
        target_field: String,
        priority: i32,
        first: String,
        second: String,
    },
}

impl RuleAuthoringError {
    /// The transform kind whose parameter contract was violated, if any.
    pub fn transform_type(&self) -> Option<TransformType> {
        match self {
            Self::ConcatTooFewSources { .. } => Some(TransformType::Concat),
            Self::EmptyDelimiter { .. } => Some(TransformType::Split),
            Self::EmptyLookupTable { .. } => Some(TransformType::Lookup),
            Self::EmptyExpression { .. } => Some(TransformType::Custom),
            _ => None,
        }
    }
}

/// All problems found while validating one mapping config.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("config '{config_id}' is invalid: {}", .issues.join("; "))]
pub struct ConfigValidationError {
    /// Config that failed validation.
    pub config_id: String,
    /// Human-readable issues, in discovery order.
    pub issues: Vec<String>,
}
