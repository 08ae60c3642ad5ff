//! Mapping rules and transform definitions.
//!
//! Rules are authored with a loosely-typed parameter bag ([`TransformParams`])
//! that carries fields for every transform kind at once. The execution side
//! works with [`Transform`], a tagged variant built from the bag by
//! [`MappingRule::transform`], so each kind only ever sees its own parameters.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RuleAuthoringError;

/// Transform kind as authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    Direct,
    Concat,
    Split,
    Lookup,
    Custom,
}

impl TransformType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Concat => "CONCAT",
            Self::Split => "SPLIT",
            Self::Lookup => "LOOKUP",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoring-side parameter bag shared by all transform kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// Execution-side transform with only the parameters its kind uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// First source value, unchanged.
    Direct,
    /// All source values joined in source order.
    Concat { separator: String },
    /// Trimmed element `index` of the first source value split by `delimiter`.
    Split { delimiter: String, index: usize },
    /// Table lookup of the first source value.
    Lookup {
        table: BTreeMap<String, String>,
        case_sensitive: bool,
        default_value: String,
    },
    /// `${field}` placeholder template. Substitution only, never evaluation.
    Custom { expression: String },
}

impl Transform {
    pub fn transform_type(&self) -> TransformType {
        match self {
            Self::Direct => TransformType::Direct,
            Self::Concat { .. } => TransformType::Concat,
            Self::Split { .. } => TransformType::Split,
            Self::Lookup { .. } => TransformType::Lookup,
            Self::Custom { .. } => TransformType::Custom,
        }
    }

    /// Flatten back into the authoring parameter bag.
    pub fn to_params(&self) -> TransformParams {
        match self {
            Self::Direct => TransformParams::default(),
            Self::Concat { separator } => TransformParams {
                separator: Some(separator.clone()),
                ..TransformParams::default()
            },
            Self::Split { delimiter, index } => TransformParams {
                delimiter: Some(delimiter.clone()),
                index: Some(*index),
                ..TransformParams::default()
            },
            Self::Lookup {
                table,
                case_sensitive,
                default_value,
            } => TransformParams {
                lookup_table: Some(table.clone()),
                case_sensitive: Some(*case_sensitive),
                default_value: Some(default_value.clone()),
                ..TransformParams::default()
            },
            Self::Custom { expression } => TransformParams {
                expression: Some(expression.clone()),
                ..TransformParams::default()
            },
        }
    }
}

fn default_active() -> bool {
    true
}

/// A rule that derives one target field from one or more source fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub id: String,
    pub config_id: String,
    pub source_fields: Vec<String>,
    pub target_field: String,
    pub transform_type: TransformType,
    #[serde(default)]
    pub transform_params: TransformParams,
    /// Lower numbers take precedence.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl MappingRule {
    /// Build an active rule from an execution-side transform.
    pub fn from_transform(
        id: impl Into<String>,
        config_id: impl Into<String>,
        source_fields: Vec<String>,
        target_field: impl Into<String>,
        transform: &Transform,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            config_id: config_id.into(),
            source_fields,
            target_field: target_field.into(),
            transform_type: transform.transform_type(),
            transform_params: transform.to_params(),
            priority,
            is_active: true,
        }
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Re-express the parameter bag as a [`Transform`], enforcing the
    /// authoring contract for the rule's transform kind.
    pub fn transform(&self) -> Result<Transform, RuleAuthoringError> {
        if self.source_fields.is_empty() {
            return Err(RuleAuthoringError::NoSourceFields {
                rule_id: self.id.clone(),
            });
        }
        let params = &self.transform_params;
        match self.transform_type {
            TransformType::Direct => Ok(Transform::Direct),
            TransformType::Concat => {
                if self.source_fields.len() < 2 {
                    return Err(RuleAuthoringError::ConcatTooFewSources {
                        rule_id: self.id.clone(),
                        found: self.source_fields.len(),
                    });
                }
                Ok(Transform::Concat {
                    separator: params.separator.clone().unwrap_or_else(|| " ".to_string()),
                })
            }
            TransformType::Split => match params.delimiter.as_deref() {
                Some(delimiter) if !delimiter.is_empty() => Ok(Transform::Split {
                    delimiter: delimiter.to_string(),
                    index: params.index.unwrap_or(0),
                }),
                _ => Err(RuleAuthoringError::EmptyDelimiter {
                    rule_id: self.id.clone(),
                }),
            },
            TransformType::Lookup => match &params.lookup_table {
                Some(table) if !table.is_empty() => Ok(Transform::Lookup {
                    table: table.clone(),
                    case_sensitive: params.case_sensitive.unwrap_or(true),
                    default_value: params.default_value.clone().unwrap_or_default(),
                }),
                _ => Err(RuleAuthoringError::EmptyLookupTable {
                    rule_id: self.id.clone(),
                }),
            },
            TransformType::Custom => match params.expression.as_deref() {
                Some(expression) if !expression.trim().is_empty() => Ok(Transform::Custom {
                    expression: expression.to_string(),
                }),
                _ => Err(RuleAuthoringError::EmptyExpression {
                    rule_id: self.id.clone(),
                }),
            },
        }
    }
}
