//! Invoice field extraction.
//!
//! Turns raw document inputs into scored field candidates:
//! - [`PatternEvaluator`] runs one extraction pattern (regex, keyword,
//!   page position or vendor field)
//! - [`ValueNormalizer`] normalizes dates, amounts and weights by field name
//! - [`ConfidenceClassifier`] weights raw confidence by source tier and routes
//!   the value to a review type
//! - [`FieldExtractor`] applies prioritized rules per field
//! - [`CompanyIdentifier`] determines which company issued a document

pub mod classify;
pub mod error;
pub mod evaluator;
pub mod extractor;
pub mod identify;
pub mod normalize;

pub use classify::ConfidenceClassifier;
pub use error::{ExtractError, Result};
pub use evaluator::{PatternEvaluator, PatternMatch};
pub use extractor::{
    ExtractedField, ExtractionOutcome, ExtractionRule, ExtractionStatistics, FieldExtractor,
    ReviewSummary, UnmatchedField,
};
pub use identify::{
    CompanyIdentifier, CompanyPattern, Identification, IdentificationStatus, SignalKind,
    SignalMatch,
};
pub use normalize::ValueNormalizer;
