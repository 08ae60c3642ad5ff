//! Error types for extraction setup.
//!
//! Evaluating a pattern never fails: a pattern that does not match yields an
//! empty [`PatternMatch`](crate::PatternMatch). These errors are raised when
//! an extractor or identifier is built from invalid authored input.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExtractError {
    /// A rule's validation pattern does not compile.
    #[error("rule '{rule_id}': invalid validation pattern '{pattern}': {source}")]
    InvalidValidationPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A company's reference-number format does not compile.
    #[error("company '{company_id}': invalid format pattern '{pattern}': {source}")]
    InvalidFormatPattern {
        company_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Two rules share an id.
    #[error("duplicate extraction rule id '{0}'")]
    DuplicateRuleId(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
