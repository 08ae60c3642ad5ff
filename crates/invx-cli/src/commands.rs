use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, info_span, trace};

use invx_extract::{
    CompanyIdentifier, CompanyPattern, ExtractionOutcome, ExtractionRule, FieldExtractor,
    Identification, ReviewSummary,
};
use invx_map::{ConfigStore, DynamicMappingService, JsonConfigRepository};
use invx_model::{
    ConfigScope, DocumentInput, ExtractedFieldValue, FieldCandidate, MappingConfig,
    MappingContext, MappingResult,
};

use crate::cli::{ExtractArgs, IdentifyArgs, MapArgs, ValidateArgs};
use crate::logging::redact_value;
use crate::settings::Settings;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    pub outcome: ExtractionOutcome,
    pub summary: ReviewSummary,
}

/// Result of checking one stored config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCheck {
    pub config_id: String,
    pub scope: ConfigScope,
    pub key: String,
    pub version: u32,
    pub is_active: bool,
    pub rules: usize,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub checks: Vec<ConfigCheck>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.issues.is_empty())
    }

    pub fn issue_count(&self) -> usize {
        self.checks.iter().map(|c| c.issues.len()).sum()
    }
}

pub fn run_extract(args: &ExtractArgs) -> Result<ExtractReport> {
    let _span = info_span!("extract", text = %args.text.display()).entered();

    let text = fs::read_to_string(&args.text)
        .with_context(|| format!("Failed to read document text {}", args.text.display()))?;
    let rules: Vec<ExtractionRule> = read_json(&args.rules, "extraction rules")?;

    let mut document = DocumentInput::from_text(text);
    if let Some(path) = &args.vendor {
        document = document.with_vendor_fields(read_json(path, "vendor fields")?);
    }
    if let Some(path) = &args.layout {
        document = document.with_pages(read_json(path, "page layout")?);
    }

    let extractor = FieldExtractor::new(rules).context("Invalid extraction rules")?;
    let outcome = extractor.extract(&document, args.company.as_deref());
    for field in &outcome.fields {
        trace!(
            field = %field.field_name,
            value = redact_value(&field.value),
            score = field.assessment.score,
            "Extracted field"
        );
    }

    let summary = ReviewSummary::from_outcome(&outcome);
    info!(
        mapped = outcome.statistics.mapped_fields,
        unmapped = outcome.statistics.unmapped_fields,
        missing_required = summary.missing_required.len(),
        "Extraction complete"
    );
    Ok(ExtractReport { outcome, summary })
}

pub fn run_identify(args: &IdentifyArgs) -> Result<Identification> {
    let text = fs::read_to_string(&args.text)
        .with_context(|| format!("Failed to read document text {}", args.text.display()))?;
    let patterns: Vec<CompanyPattern> = read_json(&args.patterns, "company patterns")?;
    let identifier = CompanyIdentifier::new(patterns).context("Invalid company patterns")?;
    Ok(identifier.identify(&text))
}

pub fn run_map(args: &MapArgs, settings: &Settings) -> Result<MappingResult> {
    let config_dir = settings.config_dir(args.store.as_deref());
    let store = JsonConfigRepository::new(&config_dir)
        .with_context(|| format!("Failed to open config store {}", config_dir.display()))?;
    let service = DynamicMappingService::with_options(Arc::new(store), settings.mapping_options());

    let extracted: Vec<ExtractedFieldValue> = read_json(&args.candidates, "extracted fields")?;
    let candidates: Vec<FieldCandidate> = extracted.into_iter().map(FieldCandidate::from).collect();

    let mut context = MappingContext::default();
    context.company_id.clone_from(&args.company);
    context.document_format_id.clone_from(&args.format);
    context.document_id.clone_from(&args.document_id);
    if args.no_cache {
        context = context.without_cache();
    }

    Ok(service.map_fields(&candidates, &context))
}

pub fn run_validate(args: &ValidateArgs, settings: &Settings) -> Result<ValidationReport> {
    let config_dir = settings.config_dir(args.store.as_deref());
    let store = JsonConfigRepository::new(&config_dir)
        .with_context(|| format!("Failed to open config store {}", config_dir.display()))?;
    let configs = store
        .list_configs()
        .with_context(|| format!("Failed to load configs from {}", config_dir.display()))?;
    Ok(validate_configs(&configs))
}

/// Check each config on its own, then flag scopes claimed by more than one
/// active config.
pub fn validate_configs(configs: &[MappingConfig]) -> ValidationReport {
    let mut checks: Vec<ConfigCheck> = configs
        .iter()
        .map(|config| ConfigCheck {
            config_id: config.id.clone(),
            scope: config.scope,
            key: config.scope_key().to_string(),
            version: config.version,
            is_active: config.is_active,
            rules: config.rules.len(),
            issues: config.validate().err().map(|e| e.issues).unwrap_or_default(),
        })
        .collect();

    let mut claims: BTreeMap<(ConfigScope, Option<&str>), Vec<usize>> = BTreeMap::new();
    for (index, config) in configs.iter().enumerate().filter(|(_, c)| c.is_active) {
        let id = match config.scope {
            ConfigScope::Global => None,
            ConfigScope::Company => config.company_id.as_deref(),
            ConfigScope::Format => config.document_format_id.as_deref(),
        };
        claims.entry((config.scope, id)).or_default().push(index);
    }
    for ((scope, id), indices) in claims.into_iter().filter(|(_, v)| v.len() > 1) {
        let ids: Vec<&str> = indices.iter().map(|&i| configs[i].id.as_str()).collect();
        let message = format!(
            "{} active {scope} configs claim {}: {}",
            ids.len(),
            id.unwrap_or("the global scope"),
            ids.join(", ")
        );
        for index in indices {
            checks[index].issues.push(message.clone());
        }
    }

    ValidationReport { checks }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {what} from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use invx_model::{MappingRule, Transform};

    use super::*;

    #[test]
    fn duplicate_active_scopes_are_flagged() {
        let mut retired = MappingConfig::company("acme-v0", "acme");
        retired.is_active = false;
        let configs = [
            MappingConfig::company("acme-a", "acme"),
            MappingConfig::company("acme-b", "acme"),
            retired,
            MappingConfig::global("g"),
        ];
        let report = validate_configs(&configs);
        assert!(!report.is_valid());
        assert_eq!(report.issue_count(), 2);
        assert_eq!(
            report.checks[0].issues,
            ["2 active COMPANY configs claim acme: acme-a, acme-b"]
        );
        assert!(report.checks[2].issues.is_empty());
    }

    #[test]
    fn authoring_issues_are_reported_per_config() {
        let rule = MappingRule::from_transform(
            "r1",
            "g",
            vec!["A".to_string()],
            "T",
            &Transform::Concat {
                separator: " ".to_string(),
            },
            1,
        );
        let report = validate_configs(&[MappingConfig::global("g").with_rules(vec![rule])]);
        assert_eq!(report.checks[0].issues.len(), 1);
        assert_eq!(report.checks[0].rules, 1);
        assert_eq!(report.checks[0].key, "global");
    }
}
