//! Data model for invoice field extraction and dynamic field mapping.
//!
//! This crate holds the types shared by the extraction and mapping crates:
//! - [`pattern`]: extraction patterns evaluated against raw document inputs
//! - [`document`]: OCR text, vendor-structured fields and page geometry
//! - [`candidate`]: per-field candidates, source tiers and review routing
//! - [`rule`]: mapping rules and the execution-side [`Transform`] variant
//! - [`config`]: scoped mapping configurations and their resolved snapshots
//! - [`result`]: mapping context, mapped values and the final [`MappingResult`]

pub mod candidate;
pub mod config;
pub mod document;
pub mod error;
pub mod pattern;
pub mod result;
pub mod rule;

pub use candidate::{
    ConfidenceAssessment, ExtractedFieldValue, FieldCandidate, ReviewType, SourceTier,
};
pub use config::{ConfigScope, MappingConfig, ResolvedConfig, ScopeKey};
pub use document::{BoundingBox, DocumentInput, PageLayout, TextLine, VendorFieldValue};
pub use error::{ConfigValidationError, RuleAuthoringError};
pub use pattern::{ExtractionMethod, ExtractionPattern, PositionRegion};
pub use result::{
    AppliedConfig, ConfigUsage, MappedFieldValue, MappingContext, MappingDiagnostics,
    MappingResult, UnmappedField,
};
pub use rule::{MappingRule, Transform, TransformParams, TransformType};
