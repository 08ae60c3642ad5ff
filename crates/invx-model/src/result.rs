//! Mapping request context and result types.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigScope, ScopeKey};
use crate::rule::TransformType;

fn default_true() -> bool {
    true
}

/// Per-request mapping context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_format_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Read and populate the config cache.
    #[serde(default = "default_true")]
    pub enable_cache: bool,
    /// Skip cache reads; resolved configs are still cached.
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for MappingContext {
    fn default() -> Self {
        Self {
            company_id: None,
            document_format_id: None,
            user_id: None,
            document_id: None,
            enable_cache: true,
            force_refresh: false,
        }
    }
}

impl MappingContext {
    #[must_use]
    pub fn with_company(mut self, company_id: impl Into<String>) -> Self {
        self.company_id = Some(company_id.into());
        self
    }

    #[must_use]
    pub fn with_format(mut self, document_format_id: impl Into<String>) -> Self {
        self.document_format_id = Some(document_format_id.into());
        self
    }

    #[must_use]
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }

    #[must_use]
    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    /// Cache keys for every tier this request may draw on, least specific first.
    pub fn scope_keys(&self) -> Vec<ScopeKey> {
        let mut keys = vec![ScopeKey::global()];
        if let Some(company) = &self.company_id {
            keys.push(ScopeKey::company(company.clone()));
        }
        if let Some(format) = &self.document_format_id {
            keys.push(ScopeKey::format(format.clone(), self.company_id.clone()));
        }
        keys
    }
}

/// Which config and rule produced a mapped value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedConfig {
    pub config_id: String,
    pub scope: ConfigScope,
    pub version: u32,
    pub rule_id: String,
    pub priority: i32,
}

/// One target field produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedFieldValue {
    pub target_field: String,
    pub value: Option<String>,
    pub source_fields: Vec<String>,
    pub transform_type: TransformType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_config: Option<AppliedConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A target field that did not produce a value, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedField {
    pub target_field: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

/// A config that took part in a mapping call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUsage {
    pub key: ScopeKey,
    pub config_id: String,
    pub version: u32,
    /// Served from the cache rather than the store.
    pub cached: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDiagnostics {
    pub cache_hits: usize,
    pub store_fetches: usize,
    pub configs: Vec<ConfigUsage>,
}

/// Outcome of one `map_fields` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub success: bool,
    pub mapped_fields: Vec<MappedFieldValue>,
    pub unmapped_fields: Vec<UnmappedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub configs_used: usize,
    pub rules_applied: usize,
    #[serde(default)]
    pub diagnostics: MappingDiagnostics,
}

impl MappingResult {
    /// A failed call with no field output.
    pub fn failure(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            mapped_fields: Vec::new(),
            unmapped_fields: Vec::new(),
            error: Some(error.into()),
            execution_time_ms,
            configs_used: 0,
            rules_applied: 0,
            diagnostics: MappingDiagnostics::default(),
        }
    }

    /// Mapped value for a target field, if one was produced.
    pub fn value_of(&self, target_field: &str) -> Option<&str> {
        self.mapped_fields
            .iter()
            .find(|f| f.target_field == target_field)
            .and_then(|f| f.value.as_deref())
    }

    pub fn unmapped(&self, target_field: &str) -> Option<&UnmappedField> {
        self.unmapped_fields
            .iter()
            .find(|f| f.target_field == target_field)
    }
}
