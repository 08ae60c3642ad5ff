//! Raw document inputs handed over by the OCR/vision collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything a pattern may look at for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    /// Full OCR text.
    #[serde(default)]
    pub text: String,
    /// Vendor-structured extraction result keyed by vendor field name.
    #[serde(default)]
    pub vendor_fields: BTreeMap<String, VendorFieldValue>,
    /// Line geometry per page.
    #[serde(default)]
    pub pages: Vec<PageLayout>,
}

impl DocumentInput {
    /// Create a text-only document.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach vendor-structured fields.
    #[must_use]
    pub fn with_vendor_fields(mut self, fields: BTreeMap<String, VendorFieldValue>) -> Self {
        self.vendor_fields = fields;
        self
    }

    /// Attach page geometry.
    #[must_use]
    pub fn with_pages(mut self, pages: Vec<PageLayout>) -> Self {
        self.pages = pages;
        self
    }

    /// Layout of a 1-based page, if present.
    pub fn page(&self, number: u32) -> Option<&PageLayout> {
        self.pages.iter().find(|p| p.page == number)
    }
}

/// A single field from the vendor's structured result.
///
/// Vendors report either a normalized `value`, the raw `content`, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorFieldValue {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl VendorFieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// The usable text: `value` first, then `content`; blanks count as missing.
    pub fn resolved(&self) -> Option<&str> {
        self.value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.content.as_deref().filter(|c| !c.trim().is_empty()))
    }
}

/// Lines recognized on one page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLayout {
    /// 1-based page number.
    pub page: u32,
    #[serde(default)]
    pub lines: Vec<TextLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLine {
    pub text: String,
    pub bounding_box: BoundingBox,
}

/// Axis-aligned box in page-relative coordinates (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}
