//! Extraction patterns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a single field value is located in a document.
///
/// Serialized with a `method` tag so authored rules read like
/// `{"method": "regex", "pattern": "INV-(\\d+)", "groupIndex": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "method",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ExtractionPattern {
    /// Regular expression over the full OCR text.
    Regex {
        pattern: String,
        /// Any of `i`, `m`, `s`, `x`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flags: Option<String>,
        /// Capture group to extract (default 0, the whole match).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence_boost: Option<f64>,
    },

    /// Keyword search, optionally constrained to appear near proximity words.
    Keyword {
        keywords: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        proximity_words: Vec<String>,
        /// Maximum token distance between keyword and proximity word.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_distance: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence_boost: Option<f64>,
    },

    /// Fixed region on a page; ordinary text matches are ignored.
    Position {
        /// 1-based page number (default 1).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        region: PositionRegion,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence_boost: Option<f64>,
    },

    /// Named field from the vendor-structured extraction result.
    VendorField {
        name: String,
        /// Regex used when the vendor result lacks the field.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence_boost: Option<f64>,
    },
}

impl ExtractionPattern {
    /// The extraction method this pattern uses.
    pub fn method(&self) -> ExtractionMethod {
        match self {
            Self::Regex { .. } => ExtractionMethod::Regex,
            Self::Keyword { .. } => ExtractionMethod::Keyword,
            Self::Position { .. } => ExtractionMethod::Position,
            Self::VendorField { .. } => ExtractionMethod::VendorField,
        }
    }

    /// Configured confidence boost, clamped to `[0, 1]`.
    pub fn confidence_boost(&self) -> f64 {
        let boost = match self {
            Self::Regex {
                confidence_boost, ..
            }
            | Self::Keyword {
                confidence_boost, ..
            }
            | Self::Position {
                confidence_boost, ..
            }
            | Self::VendorField {
                confidence_boost, ..
            } => confidence_boost.unwrap_or(0.0),
        };
        if boost.is_nan() {
            return 0.0;
        }
        boost.clamp(0.0, 1.0)
    }
}

/// Extraction method discriminant, used for diagnostics and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Regex,
    Keyword,
    Position,
    VendorField,
}

impl ExtractionMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Keyword => "keyword",
            Self::Position => "position",
            Self::VendorField => "vendor_field",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rectangular page region, expressed as fractions (0.0 to 1.0) of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRegion {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl PositionRegion {
    /// Whether the point `(x, y)` lies inside the region (edges inclusive).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left
            && x <= self.left + self.width
            && y >= self.top
            && y <= self.top + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_pattern_deserializes_from_tagged_json() {
        let json = r#"{"method":"regex","pattern":"INV-(\\d+)","groupIndex":1,"confidenceBoost":0.05}"#;
        let pattern: ExtractionPattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.method(), ExtractionMethod::Regex);
        assert!((pattern.confidence_boost() - 0.05).abs() < f64::EPSILON);
        match pattern {
            ExtractionPattern::Regex { group_index, .. } => assert_eq!(group_index, Some(1)),
            other => panic!("unexpected pattern {other:?}"),
        }
    }

    #[test]
    fn boost_is_clamped() {
        let pattern = ExtractionPattern::VendorField {
            name: "InvoiceId".to_string(),
            fallback_pattern: None,
            confidence_boost: Some(3.0),
        };
        assert_eq!(pattern.confidence_boost(), 1.0);

        let negative = ExtractionPattern::Keyword {
            keywords: vec!["Total".to_string()],
            proximity_words: vec![],
            max_distance: None,
            confidence_boost: Some(-0.4),
        };
        assert_eq!(negative.confidence_boost(), 0.0);
    }

    #[test]
    fn region_contains_edges() {
        let region = PositionRegion {
            top: 0.1,
            left: 0.5,
            width: 0.4,
            height: 0.2,
        };
        assert!(region.contains(0.5, 0.1));
        assert!(region.contains(0.7, 0.2));
        assert!(!region.contains(0.4, 0.2));
        assert!(!region.contains(0.7, 0.35));
    }
}
