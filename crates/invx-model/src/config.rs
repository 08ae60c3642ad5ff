//! Mapping configurations and the scope keys they are cached under.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigValidationError, RuleAuthoringError};
use crate::rule::MappingRule;

/// Configuration hierarchy level, least to most specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigScope {
    Global,
    Company,
    Format,
}

impl ConfigScope {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Company => "COMPANY",
            Self::Format => "FORMAT",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one tier of resolved configuration.
///
/// Format keys also carry the company they were resolved with, so a company
/// invalidation can reach the format entries resolved on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeKey {
    pub scope: ConfigScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_format_id: Option<String>,
}

impl ScopeKey {
    pub fn global() -> Self {
        Self {
            scope: ConfigScope::Global,
            company_id: None,
            document_format_id: None,
        }
    }

    pub fn company(company_id: impl Into<String>) -> Self {
        Self {
            scope: ConfigScope::Company,
            company_id: Some(company_id.into()),
            document_format_id: None,
        }
    }

    pub fn format(document_format_id: impl Into<String>, company_id: Option<String>) -> Self {
        Self {
            scope: ConfigScope::Format,
            company_id,
            document_format_id: Some(document_format_id.into()),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            ConfigScope::Global => write!(f, "global"),
            ConfigScope::Company => {
                write!(f, "company:{}", self.company_id.as_deref().unwrap_or("*"))
            }
            ConfigScope::Format => {
                write!(
                    f,
                    "format:{}",
                    self.document_format_id.as_deref().unwrap_or("*")
                )?;
                if let Some(company) = &self.company_id {
                    write!(f, "@{company}")?;
                }
                Ok(())
            }
        }
    }
}

fn default_active() -> bool {
    true
}

/// A set of mapping rules for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    pub id: String,
    pub scope: ConfigScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_format_id: Option<String>,
    #[serde(default)]
    pub rules: Vec<MappingRule>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Incremented on every successful store write.
    #[serde(default)]
    pub version: u32,
}

impl MappingConfig {
    /// Active global config with no rules.
    pub fn global(id: impl Into<String>) -> Self {
        Self::empty(id, ConfigScope::Global, None, None)
    }

    pub fn company(id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self::empty(id, ConfigScope::Company, Some(company_id.into()), None)
    }

    pub fn format(
        id: impl Into<String>,
        document_format_id: impl Into<String>,
        company_id: Option<String>,
    ) -> Self {
        Self::empty(
            id,
            ConfigScope::Format,
            company_id,
            Some(document_format_id.into()),
        )
    }

    fn empty(
        id: impl Into<String>,
        scope: ConfigScope,
        company_id: Option<String>,
        document_format_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope,
            company_id,
            document_format_id,
            rules: Vec::new(),
            is_active: true,
            version: 0,
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: Vec<MappingRule>) -> Self {
        self.rules = rules;
        self
    }

    /// The key this config is stored under on its own.
    ///
    /// The resolver may build a format key that carries the requesting
    /// company instead; see [`ScopeKey::format`].
    pub fn scope_key(&self) -> ScopeKey {
        match self.scope {
            ConfigScope::Global => ScopeKey::global(),
            ConfigScope::Company => ScopeKey {
                scope: ConfigScope::Company,
                company_id: self.company_id.clone(),
                document_format_id: None,
            },
            ConfigScope::Format => ScopeKey {
                scope: ConfigScope::Format,
                company_id: self.company_id.clone(),
                document_format_id: self.document_format_id.clone(),
            },
        }
    }

    /// Rules currently in effect.
    pub fn active_rules(&self) -> impl Iterator<Item = &MappingRule> {
        self.rules.iter().filter(|r| r.is_active)
    }

    /// Per-rule authoring violations, in rule order.
    pub fn rule_errors(&self) -> Vec<RuleAuthoringError> {
        let mut errors = Vec::new();
        let mut seen: BTreeMap<(&str, i32), &str> = BTreeMap::new();

        for rule in &self.rules {
            if let Err(err) = rule.transform() {
                errors.push(err);
            }
            if rule.config_id != self.id {
                errors.push(RuleAuthoringError::ForeignConfig {
                    rule_id: rule.id.clone(),
                    declared: rule.config_id.clone(),
                    actual: self.id.clone(),
                });
            }
            let slot = (rule.target_field.as_str(), rule.priority);
            if let Some(first) = seen.get(&slot) {
                errors.push(RuleAuthoringError::DuplicatePriority {
                    target_field: rule.target_field.clone(),
                    priority: rule.priority,
                    first: (*first).to_string(),
                    second: rule.id.clone(),
                });
            } else {
                seen.insert(slot, rule.id.as_str());
            }
        }
        errors
    }

    /// Check scope/id consistency and the authoring contract of every rule.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let mut issues = Vec::new();

        if self.id.trim().is_empty() {
            issues.push("config id must not be blank".to_string());
        }
        let blank_rules = self.rules.iter().filter(|r| r.id.trim().is_empty()).count();
        if blank_rules > 0 {
            issues.push(format!("{blank_rules} rule(s) have a blank id"));
        }

        match self.scope {
            ConfigScope::Global => {
                if self.company_id.is_some() || self.document_format_id.is_some() {
                    issues.push("GLOBAL config must not name a company or format".to_string());
                }
            }
            ConfigScope::Company => {
                if self.company_id.as_deref().is_none_or(str::is_empty) {
                    issues.push("COMPANY config requires a companyId".to_string());
                }
                if self.document_format_id.is_some() {
                    issues.push("COMPANY config must not name a format".to_string());
                }
            }
            ConfigScope::Format => {
                if self.document_format_id.as_deref().is_none_or(str::is_empty) {
                    issues.push("FORMAT config requires a documentFormatId".to_string());
                }
            }
        }

        issues.extend(self.rule_errors().iter().map(ToString::to_string));

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError {
                config_id: self.id.clone(),
                issues,
            })
        }
    }
}

/// An immutable config snapshot tagged with the key it was resolved under.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    key: ScopeKey,
    config: MappingConfig,
    resolved_at: SystemTime,
}

impl ResolvedConfig {
    pub fn new(key: ScopeKey, config: MappingConfig) -> Self {
        Self {
            key,
            config,
            resolved_at: SystemTime::now(),
        }
    }

    pub fn key(&self) -> &ScopeKey {
        &self.key
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn resolved_at(&self) -> SystemTime {
        self.resolved_at
    }
}
