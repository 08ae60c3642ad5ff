//! Rule selection and application.
//!
//! For every target field named by any rule, configs are consulted from the
//! most specific tier down and, within a config, active rules in ascending
//! priority. The first rule whose source fields are all present wins.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use invx_model::{
    AppliedConfig, FieldCandidate, MappedFieldValue, MappingRule, ResolvedConfig, UnmappedField,
};

use crate::transform::{SourceValues, TransformExecutor};

/// Reason recorded when no config has an active rule for a target.
pub const NO_APPLICABLE_RULE: &str = "no applicable rule";

/// Per-target results of one engine pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Executed rules in target order; failed transforms have `success == false`.
    pub values: Vec<MappedFieldValue>,
    /// Targets for which no rule was executed.
    pub unmapped: Vec<UnmappedField>,
    /// Rules executed, successful or not.
    pub rules_applied: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMappingEngine {
    executor: TransformExecutor,
}

enum Selection<'a> {
    Apply(&'a ResolvedConfig, &'a MappingRule),
    Skip(UnmappedField),
}

impl FieldMappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the rules of `configs` (least specific first) to `candidates`.
    pub fn apply_rules(
        &self,
        candidates: &[FieldCandidate],
        configs: &[Arc<ResolvedConfig>],
    ) -> EngineOutput {
        let values = source_values(candidates);
        let targets: BTreeSet<&str> = configs
            .iter()
            .flat_map(|c| c.config().rules.iter())
            .map(|r| r.target_field.as_str())
            .collect();

        let mut output = EngineOutput::default();
        for target in targets {
            match select_rule(target, &values, configs) {
                Selection::Apply(resolved, rule) => {
                    output.rules_applied += 1;
                    output.values.push(self.execute(resolved, rule, &values));
                }
                Selection::Skip(unmapped) => {
                    tracing::debug!(target_field = target, reason = %unmapped.reason, "Target unmapped");
                    output.unmapped.push(unmapped);
                }
            }
        }
        output
    }

    fn execute(
        &self,
        resolved: &ResolvedConfig,
        rule: &MappingRule,
        values: &SourceValues,
    ) -> MappedFieldValue {
        let config = resolved.config();
        let applied = AppliedConfig {
            config_id: config.id.clone(),
            scope: config.scope,
            version: config.version,
            rule_id: rule.id.clone(),
            priority: rule.priority,
        };
        let (value, success, error) = match self.executor.execute(values, rule) {
            Ok(value) => (value, true, None),
            Err(err) => {
                tracing::warn!(
                    target_field = %rule.target_field,
                    rule_id = %rule.id,
                    config_id = %config.id,
                    error = %err,
                    "Transform failed"
                );
                (None, false, Some(err.to_string()))
            }
        };
        MappedFieldValue {
            target_field: rule.target_field.clone(),
            value,
            source_fields: rule.source_fields.clone(),
            transform_type: rule.transform_type,
            success,
            rule_id: Some(rule.id.clone()),
            applied_config: Some(applied),
            error,
        }
    }
}

/// One value per field name; the most confident candidate wins, first on ties.
fn source_values(candidates: &[FieldCandidate]) -> SourceValues {
    let mut best: BTreeMap<&str, &FieldCandidate> = BTreeMap::new();
    for candidate in candidates {
        best.entry(candidate.field_name.as_str())
            .and_modify(|current| {
                if candidate.raw_confidence > current.raw_confidence {
                    *current = candidate;
                }
            })
            .or_insert(candidate);
    }
    best.into_iter()
        .map(|(name, c)| (name.to_string(), c.value.clone()))
        .collect()
}

fn is_applicable(rule: &MappingRule, values: &SourceValues) -> bool {
    rule.source_fields.iter().all(|f| values.contains_key(f))
}

fn select_rule<'a>(
    target: &str,
    values: &SourceValues,
    configs: &'a [Arc<ResolvedConfig>],
) -> Selection<'a> {
    let mut first_active: Option<&MappingRule> = None;

    for resolved in configs.iter().rev() {
        let mut rules: Vec<&MappingRule> = resolved
            .config()
            .active_rules()
            .filter(|r| r.target_field == target)
            .collect();
        rules.sort_by_key(|r| r.priority);
        if first_active.is_none() {
            first_active = rules.first().copied();
        }

        let Some(chosen) = rules.iter().copied().find(|r| is_applicable(r, values)) else {
            continue;
        };
        if let Some(rival) = rules
            .iter()
            .find(|r| r.id != chosen.id && r.priority == chosen.priority && is_applicable(r, values))
        {
            tracing::warn!(
                target_field = target,
                config_id = %resolved.config().id,
                priority = chosen.priority,
                "Rules share a priority"
            );
            return Selection::Skip(UnmappedField {
                target_field: target.to_string(),
                reason: format!(
                    "configuration conflict: rules '{}' and '{}' in config '{}' share priority {}",
                    chosen.id,
                    rival.id,
                    resolved.config().id,
                    chosen.priority
                ),
                rule_id: Some(chosen.id.clone()),
            });
        }

        tracing::debug!(
            target_field = target,
            rule_id = %chosen.id,
            config_id = %resolved.config().id,
            scope = %resolved.config().scope,
            "Selected rule"
        );
        return Selection::Apply(resolved.as_ref(), chosen);
    }

    let (reason, rule_id) = match first_active {
        Some(rule) => {
            let missing: Vec<&str> = rule
                .source_fields
                .iter()
                .filter(|f| !values.contains_key(*f))
                .map(String::as_str)
                .collect();
            (
                format!("source fields missing: {}", missing.join(", ")),
                Some(rule.id.clone()),
            )
        }
        None => (NO_APPLICABLE_RULE.to_string(), None),
    };
    Selection::Skip(UnmappedField {
        target_field: target.to_string(),
        reason,
        rule_id,
    })
}

#[cfg(test)]
mod tests {
    use invx_model::{MappingConfig, ScopeKey, SourceTier, Transform};

    use super::*;

    fn direct(id: &str, config: &str, source: &str, target: &str, priority: i32) -> MappingRule {
        MappingRule::from_transform(
            id,
            config,
            vec![source.to_string()],
            target,
            &Transform::Direct,
            priority,
        )
    }

    fn resolved(config: MappingConfig) -> Arc<ResolvedConfig> {
        Arc::new(ResolvedConfig::new(config.scope_key(), config))
    }

    #[test]
    fn most_confident_candidate_supplies_the_value() {
        let candidates = [
            FieldCandidate::new("A", Some("low".into()), 0.4, SourceTier::Universal),
            FieldCandidate::new("A", Some("high".into()), 0.9, SourceTier::Universal),
            FieldCandidate::new("A", Some("tie".into()), 0.9, SourceTier::Universal),
        ];
        let values = source_values(&candidates);
        assert_eq!(values["A"].as_deref(), Some("high"));
    }

    #[test]
    fn lowest_priority_applicable_rule_wins() {
        let config = MappingConfig::global("g").with_rules(vec![
            direct("r5", "g", "B", "T", 5),
            direct("r1", "g", "A", "T", 1),
        ]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("A", "a"), FieldCandidate::text("B", "b")], &[resolved(config)]);
        assert_eq!(out.values[0].value.as_deref(), Some("a"));
        assert_eq!(out.values[0].rule_id.as_deref(), Some("r1"));
        assert_eq!(out.rules_applied, 1);
    }

    #[test]
    fn falls_through_to_rule_with_present_sources() {
        let config = MappingConfig::global("g").with_rules(vec![
            direct("r1", "g", "A", "T", 1),
            direct("r2", "g", "B", "T", 2),
        ]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("B", "b")], &[resolved(config)]);
        assert_eq!(out.values[0].rule_id.as_deref(), Some("r2"));
    }

    #[test]
    fn null_value_counts_as_present() {
        let config = MappingConfig::global("g").with_rules(vec![direct("r1", "g", "A", "T", 1)]);
        let candidate = FieldCandidate::new("A", None, 0.5, SourceTier::Universal);
        let out = FieldMappingEngine::new().apply_rules(&[candidate], &[resolved(config)]);
        assert!(out.values[0].success);
        assert_eq!(out.values[0].value, None);
    }

    #[test]
    fn same_priority_rules_conflict() {
        let config = MappingConfig::global("g").with_rules(vec![
            direct("r1", "g", "A", "T", 1),
            direct("r2", "g", "A", "T", 1),
        ]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("A", "a")], &[resolved(config)]);
        assert!(out.values.is_empty());
        assert!(out.unmapped[0].reason.starts_with("configuration conflict"));
        assert_eq!(out.rules_applied, 0);
    }

    #[test]
    fn inactive_rules_name_targets_but_never_apply() {
        let config = MappingConfig::global("g")
            .with_rules(vec![direct("r1", "g", "A", "T", 1).inactive()]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("A", "a")], &[resolved(config)]);
        assert_eq!(out.unmapped[0].target_field, "T");
        assert_eq!(out.unmapped[0].reason, NO_APPLICABLE_RULE);
    }

    #[test]
    fn missing_sources_are_listed() {
        let rule = MappingRule::from_transform(
            "r1",
            "g",
            vec!["first".into(), "middle".into(), "last".into()],
            "full_name",
            &Transform::Concat {
                separator: " ".into(),
            },
            1,
        );
        let config = MappingConfig::global("g").with_rules(vec![rule]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("first", "Jane")], &[resolved(config)]);
        assert_eq!(out.unmapped[0].reason, "source fields missing: middle, last");
    }

    #[test]
    fn failed_transform_is_reported_not_dropped() {
        let rule = MappingRule::from_transform(
            "r1",
            "g",
            vec!["A".into()],
            "T",
            &Transform::Custom {
                expression: "${Z}".into(),
            },
            1,
        );
        let config = MappingConfig::global("g").with_rules(vec![rule]);
        let out = FieldMappingEngine::new()
            .apply_rules(&[FieldCandidate::text("A", "a")], &[resolved(config)]);
        assert!(!out.values[0].success);
        assert!(out.values[0].error.is_some());
        assert_eq!(out.rules_applied, 1);
        assert_eq!(
            out.values[0].applied_config.as_ref().map(|a| a.config_id.as_str()),
            Some("g")
        );
    }

    #[test]
    fn snapshot_key_does_not_affect_selection() {
        let config = MappingConfig::format("f", "F1", None)
            .with_rules(vec![direct("r1", "f", "A", "T", 1)]);
        let snapshot = Arc::new(ResolvedConfig::new(
            ScopeKey::format("F1", Some("ACME".into())),
            config,
        ));
        let out = FieldMappingEngine::new().apply_rules(&[FieldCandidate::text("A", "a")], &[snapshot]);
        assert_eq!(out.values[0].value.as_deref(), Some("a"));
    }
}
