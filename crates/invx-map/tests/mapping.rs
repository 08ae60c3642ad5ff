//! Mapping service behaviour over the in-memory store.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use invx_map::{
    ConfigStore, DynamicMappingService, InMemoryConfigStore, MappingOptions, StoreError,
};
use invx_model::{
    ConfigScope, FieldCandidate, MappingConfig, MappingContext, MappingRule, Transform,
};

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

fn service_with(configs: Vec<MappingConfig>) -> (Arc<InMemoryConfigStore>, DynamicMappingService) {
    let store = Arc::new(InMemoryConfigStore::new());
    let service = DynamicMappingService::new(store.clone());
    for config in configs {
        service.save_config(config, None).unwrap();
    }
    (store, service)
}

#[test]
fn end_to_end_full_name() {
    let rule = MappingRule::from_transform(
        "full-name",
        "global-default",
        vec!["first_name".to_string(), "last_name".to_string()],
        "full_name",
        &Transform::Concat {
            separator: " ".to_string(),
        },
        1,
    );
    let (_, service) = service_with(vec![
        MappingConfig::global("global-default").with_rules(vec![rule]),
    ]);

    let candidates = [
        FieldCandidate::text("first_name", "Jane"),
        FieldCandidate::text("last_name", "Doe"),
    ];
    let mut result = service.map_fields(&candidates, &MappingContext::default());
    result.execution_time_ms = 0;

    insta::assert_snapshot!(serde_json::to_string_pretty(&result).unwrap(), @r#"
    {
      "success": true,
      "mappedFields": [
        {
          "targetField": "full_name",
          "value": "Jane Doe",
          "sourceFields": [
            "first_name",
            "last_name"
          ],
          "transformType": "CONCAT",
          "success": true,
          "ruleId": "full-name",
          "appliedConfig": {
            "configId": "global-default",
            "scope": "GLOBAL",
            "version": 1,
            "ruleId": "full-name",
            "priority": 1
          }
        }
      ],
      "unmappedFields": [],
      "executionTimeMs": 0,
      "configsUsed": 1,
      "rulesApplied": 1,
      "diagnostics": {
        "cacheHits": 0,
        "storeFetches": 1,
        "configs": [
          {
            "key": {
              "scope": "GLOBAL"
            },
            "configId": "global-default",
            "version": 1,
            "cached": false
          }
        ]
      }
    }
    "#);
}

#[test]
fn format_rule_overrides_company_rule() {
    let (_, service) = service_with(vec![
        MappingConfig::company("acme", "acme")
            .with_rules(vec![direct("company-rule", "acme", "A", "X", 1)]),
        MappingConfig::format("acme-inv", "inv-v2", Some("acme".to_string()))
            .with_rules(vec![direct("format-rule", "acme-inv", "B", "X", 50)]),
    ]);
    let context = MappingContext::default()
        .with_company("acme")
        .with_format("inv-v2");
    let candidates = [FieldCandidate::text("A", "from-a"), FieldCandidate::text("B", "from-b")];

    let result = service.map_fields(&candidates, &context);
    assert!(result.success);
    assert_eq!(result.value_of("X"), Some("from-b"));
    let applied = result.mapped_fields[0].applied_config.as_ref().unwrap();
    assert_eq!(applied.scope, ConfigScope::Format);
    assert_eq!(result.configs_used, 2);
}

#[test]
fn company_rule_applies_when_format_rule_lacks_sources() {
    let (_, service) = service_with(vec![
        MappingConfig::company("acme", "acme")
            .with_rules(vec![direct("company-rule", "acme", "A", "X", 1)]),
        MappingConfig::format("acme-inv", "inv-v2", None)
            .with_rules(vec![direct("format-rule", "acme-inv", "B", "X", 1)]),
    ]);
    let context = MappingContext::default()
        .with_company("acme")
        .with_format("inv-v2");

    let result = service.map_fields(&[FieldCandidate::text("A", "a")], &context);
    assert_eq!(result.value_of("X"), Some("a"));
}

#[test]
fn invalidation_forces_store_fetch() {
    let (store, service) = service_with(vec![
        MappingConfig::global("g"),
        MappingConfig::company("acme", "acme").with_rules(vec![direct("r1", "acme", "A", "X", 1)]),
    ]);
    let context = MappingContext::default().with_company("acme");
    let candidates = [FieldCandidate::text("A", "a")];

    service.map_fields(&candidates, &context);
    let key = invx_model::ScopeKey::company("acme");
    let first = service.cache().get(&key).unwrap();
    let fetches = store.fetch_count();

    let cached = service.map_fields(&candidates, &context);
    assert_eq!(store.fetch_count(), fetches);
    assert_eq!(cached.diagnostics.cache_hits, 2);

    service.invalidate_cache(ConfigScope::Company, Some("acme"));
    let refreshed = service.map_fields(&candidates, &context);
    assert!(store.fetch_count() > fetches);
    assert!(refreshed.diagnostics.configs[0].cached);
    assert!(!refreshed.diagnostics.configs[1].cached);
    let second = service.cache().get(&key).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn force_refresh_and_disabled_cache_reach_the_store() {
    let (store, service) = service_with(vec![MappingConfig::global("g")
        .with_rules(vec![direct("r1", "g", "A", "X", 1)])]);
    let candidates = [FieldCandidate::text("A", "a")];

    service.map_fields(&candidates, &MappingContext::default());
    let before = store.fetch_count();
    service.map_fields(&candidates, &MappingContext::default().force_refresh());
    assert_eq!(store.fetch_count(), before + 1);

    service.clear_cache();
    service.map_fields(&candidates, &MappingContext::default().without_cache());
    assert!(service.cache().is_empty());

    let uncached = DynamicMappingService::with_options(
        store.clone(),
        MappingOptions::default().without_cache(),
    );
    uncached.map_fields(&candidates, &MappingContext::default());
    assert!(uncached.cache().is_empty());
}

#[test]
fn missing_source_is_unmapped_with_reason() {
    let (_, service) = service_with(vec![MappingConfig::global("g").with_rules(vec![
        MappingRule::from_transform(
            "r1",
            "g",
            vec!["first_name".to_string(), "last_name".to_string()],
            "full_name",
            &Transform::Concat {
                separator: " ".to_string(),
            },
            1,
        ),
    ])]);

    let result = service.map_fields(
        &[FieldCandidate::text("first_name", "Jane")],
        &MappingContext::default(),
    );
    assert!(result.success);
    assert!(result.mapped_fields.is_empty());
    let unmapped = result.unmapped("full_name").unwrap();
    assert_eq!(unmapped.reason, "source fields missing: last_name");
    assert_eq!(unmapped.rule_id.as_deref(), Some("r1"));
}

#[test]
fn failed_transform_lands_in_unmapped() {
    let mut bad = direct("r1", "g", "A", "X", 1);
    bad.transform_type = invx_model::TransformType::Split;
    let config = MappingConfig::global("g").with_rules(vec![bad, direct("r2", "g", "A", "Y", 1)]);
    let store = Arc::new(InMemoryConfigStore::with_configs([config]));
    let service = DynamicMappingService::new(store);

    let result = service.map_fields(&[FieldCandidate::text("A", "a")], &MappingContext::default());
    assert!(result.success);
    assert_eq!(result.value_of("Y"), Some("a"));
    assert_eq!(result.rules_applied, 2);
    let unmapped = result.unmapped("X").unwrap();
    assert!(unmapped.reason.contains("SPLIT"));
}

#[test]
fn repeated_calls_are_identical() {
    let (_, service) = service_with(vec![MappingConfig::global("g").with_rules(vec![
        direct("r1", "g", "A", "X", 1),
        direct("r2", "g", "missing", "Y", 1),
    ])]);
    let candidates = [FieldCandidate::text("A", "a")];
    let context = MappingContext::default();

    let first = service.map_fields(&candidates, &context);
    let second = service.map_fields(&candidates, &context);
    assert_eq!(first.mapped_fields, second.mapped_fields);
    assert_eq!(first.unmapped_fields, second.unmapped_fields);
}

struct OfflineStore;

impl ConfigStore for OfflineStore {
    fn fetch_global_config(&self) -> Result<Option<MappingConfig>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
    fn fetch_company_config(&self, _: &str) -> Result<Option<MappingConfig>, StoreError> {
        Ok(None)
    }
    fn fetch_format_config(&self, _: &str) -> Result<Option<MappingConfig>, StoreError> {
        Ok(None)
    }
    fn save_config(
        &self,
        _: MappingConfig,
        _: Option<u32>,
    ) -> Result<MappingConfig, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
    fn list_configs(&self) -> Result<Vec<MappingConfig>, StoreError> {
        Ok(Vec::new())
    }
}

#[test]
fn store_failure_fails_the_call() {
    let service = DynamicMappingService::new(Arc::new(OfflineStore));
    let result = service.map_fields(
        &[FieldCandidate::text("A", "a")],
        &MappingContext::default(),
    );
    assert!(!result.success);
    assert!(result.mapped_fields.is_empty());
    assert!(result.unmapped_fields.is_empty());
    assert_eq!(
        result.error.as_deref(),
        Some("failed to fetch global config: config store unavailable: connection refused")
    );
}

type Edit = Box<dyn FnOnce() + Send>;

/// Runs a one-shot edit while a company fetch is in flight.
struct EditDuringFetch {
    inner: Arc<InMemoryConfigStore>,
    edit: Mutex<Option<Edit>>,
}

impl ConfigStore for EditDuringFetch {
    fn fetch_global_config(&self) -> Result<Option<MappingConfig>, StoreError> {
        self.inner.fetch_global_config()
    }
    fn fetch_company_config(&self, id: &str) -> Result<Option<MappingConfig>, StoreError> {
        let fetched = self.inner.fetch_company_config(id);
        let edit = self.edit.lock().unwrap().take();
        if let Some(edit) = edit {
            edit();
        }
        fetched
    }
    fn fetch_format_config(&self, id: &str) -> Result<Option<MappingConfig>, StoreError> {
        self.inner.fetch_format_config(id)
    }
    fn save_config(
        &self,
        config: MappingConfig,
        expected_version: Option<u32>,
    ) -> Result<MappingConfig, StoreError> {
        self.inner.save_config(config, expected_version)
    }
    fn list_configs(&self) -> Result<Vec<MappingConfig>, StoreError> {
        self.inner.list_configs()
    }
}

#[test]
fn edit_during_fetch_is_not_cached_stale() {
    let inner = Arc::new(InMemoryConfigStore::new());
    let saved = inner
        .save_config(
            MappingConfig::company("acme", "acme")
                .with_rules(vec![direct("r1", "acme", "A", "OLD", 1)]),
            None,
        )
        .unwrap();
    let store = Arc::new(EditDuringFetch {
        inner: Arc::clone(&inner),
        edit: Mutex::new(None),
    });
    let service = DynamicMappingService::new(store.clone());

    let cache = service.cache().clone();
    let edited = MappingConfig::company("acme", "acme")
        .with_rules(vec![direct("r1", "acme", "A", "NEW", 1)]);
    *store.edit.lock().unwrap() = Some(Box::new(move || {
        inner.save_config(edited, Some(saved.version)).unwrap();
        cache.invalidate(ConfigScope::Company, Some("acme"));
    }));

    let context = MappingContext::default().with_company("acme");
    let candidates = [FieldCandidate::text("A", "x")];
    let first = service.map_fields(&candidates, &context);
    assert_eq!(first.value_of("OLD"), Some("x"));

    let second = service.map_fields(&candidates, &context);
    assert_eq!(second.value_of("NEW"), Some("x"));
    assert_eq!(second.value_of("OLD"), None);
    assert!(!second.diagnostics.configs.iter().any(|c| c.cached && c.config_id == "acme"));
}

#[test]
fn concurrent_calls_share_the_cache() {
    let (store, service) = service_with(vec![MappingConfig::global("g")
        .with_rules(vec![direct("r1", "g", "A", "X", 1)])]);
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                let value = format!("v{i}");
                let result = service.map_fields(
                    &[FieldCandidate::text("A", value.clone())],
                    &MappingContext::default(),
                );
                assert_eq!(result.value_of("X"), Some(value.as_str()));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(store.fetch_count() <= 8);
    assert_eq!(service.cache().len(), 1);
}

proptest! {
    #[test]
    fn lower_priority_number_wins(a in -100i32..100, b in -100i32..100) {
        prop_assume!(a != b);
        let store = Arc::new(InMemoryConfigStore::with_configs([
            MappingConfig::global("g").with_rules(vec![
                direct("ra", "g", "A", "T", a),
                direct("rb", "g", "B", "T", b),
            ]),
        ]));
        let service = DynamicMappingService::new(store);
        let result = service.map_fields(
            &[FieldCandidate::text("A", "a"), FieldCandidate::text("B", "b")],
            &MappingContext::default(),
        );
        let expected = if a < b { "a" } else { "b" };
        prop_assert_eq!(result.value_of("T"), Some(expected));
    }
}
