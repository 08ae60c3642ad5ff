//! Config store contract and the in-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use invx_model::{ConfigScope, MappingConfig, ScopeKey};

use crate::error::{Result, StoreError};

/// Source of truth for mapping configs.
///
/// Fetches return the single active config for a scope, `None` when there is
/// none, and [`StoreError::Conflict`] when more than one active config claims
/// the scope. Writes are compare-and-swap on [`MappingConfig::version`].
pub trait ConfigStore: Send + Sync {
    fn fetch_global_config(&self) -> Result<Option<MappingConfig>>;

    fn fetch_company_config(&self, company_id: &str) -> Result<Option<MappingConfig>>;

    fn fetch_format_config(&self, document_format_id: &str) -> Result<Option<MappingConfig>>;

    /// Write `config` if the stored version equals `expected_version`.
    ///
    /// `None` means the config must not exist yet. Returns the config as
    /// stored, with its version incremented.
    fn save_config(
        &self,
        config: MappingConfig,
        expected_version: Option<u32>,
    ) -> Result<MappingConfig>;

    /// Every stored config, active or not, ordered by id.
    fn list_configs(&self) -> Result<Vec<MappingConfig>>;

    /// Fetch the config for one scope key.
    fn fetch(&self, key: &ScopeKey) -> Result<Option<MappingConfig>> {
        match key.scope {
            ConfigScope::Global => self.fetch_global_config(),
            ConfigScope::Company => match key.company_id.as_deref() {
                Some(company) => self.fetch_company_config(company),
                None => Ok(None),
            },
            ConfigScope::Format => match key.document_format_id.as_deref() {
                Some(format) => self.fetch_format_config(format),
                None => Ok(None),
            },
        }
    }
}

/// What a fetch is looking for.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Selector<'a> {
    Global,
    Company(&'a str),
    Format(&'a str),
}

impl Selector<'_> {
    fn scope(self) -> ConfigScope {
        match self {
            Self::Global => ConfigScope::Global,
            Self::Company(_) => ConfigScope::Company,
            Self::Format(_) => ConfigScope::Format,
        }
    }

    fn label(self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Company(id) => format!("company:{id}"),
            Self::Format(id) => format!("format:{id}"),
        }
    }

    fn matches(self, config: &MappingConfig) -> bool {
        config.scope == self.scope()
            && match self {
                Self::Global => true,
                Self::Company(id) => config.company_id.as_deref() == Some(id),
                Self::Format(id) => config.document_format_id.as_deref() == Some(id),
            }
    }
}

/// Pick the single active config matching `selector`.
pub(crate) fn select_active<'a>(
    selector: Selector<'_>,
    configs: impl IntoIterator<Item = &'a MappingConfig>,
) -> Result<Option<MappingConfig>> {
    let mut matching: Vec<&MappingConfig> = configs
        .into_iter()
        .filter(|c| c.is_active && selector.matches(c))
        .collect();

    match matching.len() {
        0 => Ok(None),
        1 => Ok(matching.pop().cloned()),
        count => Err(StoreError::Conflict {
            scope: selector.scope(),
            key: selector.label(),
            count,
            config_ids: matching.iter().map(|c| c.id.clone()).collect(),
        }),
    }
}

/// Check a compare-and-swap write and return the version to store.
pub(crate) fn next_version(
    config_id: &str,
    expected: Option<u32>,
    current: Option<u32>,
) -> Result<u32> {
    if expected != current {
        return Err(StoreError::VersionConflict {
            config_id: config_id.to_string(),
            expected,
            actual: current,
        });
    }
    Ok(current.map_or(1, |v| v + 1))
}

/// Thread-safe in-memory store.
///
/// Counts fetches so callers can observe whether a mapping call reached the
/// store or was served from cache.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<BTreeMap<String, MappingConfig>>,
    fetches: AtomicUsize,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with configs as-is, versions untouched.
    pub fn with_configs(configs: impl IntoIterator<Item = MappingConfig>) -> Self {
        let configs = configs.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            configs: RwLock::new(configs),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetch calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn select(&self, selector: Selector<'_>) -> Result<Option<MappingConfig>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        select_active(selector, configs.values())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn fetch_global_config(&self) -> Result<Option<MappingConfig>> {
        self.select(Selector::Global)
    }

    fn fetch_company_config(&self, company_id: &str) -> Result<Option<MappingConfig>> {
        self.select(Selector::Company(company_id))
    }

    fn fetch_format_config(&self, document_format_id: &str) -> Result<Option<MappingConfig>> {
        self.select(Selector::Format(document_format_id))
    }

    fn save_config(
        &self,
        mut config: MappingConfig,
        expected_version: Option<u32>,
    ) -> Result<MappingConfig> {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        let current = configs.get(&config.id).map(|c| c.version);
        config.version = next_version(&config.id, expected_version, current)?;
        configs.insert(config.id.clone(), config.clone());
        tracing::debug!(config_id = %config.id, version = config.version, "Config saved");
        Ok(config)
    }

    fn list_configs(&self) -> Result<Vec<MappingConfig>> {
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(configs.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryConfigStore {
        let mut retired = MappingConfig::company("acme-old", "acme");
        retired.is_active = false;
        InMemoryConfigStore::with_configs([
            MappingConfig::global("global"),
            MappingConfig::company("acme", "acme"),
            retired,
            MappingConfig::format("f1", "F1", Some("acme".to_string())),
        ])
    }

    #[test]
    fn fetches_return_active_config_for_scope() {
        let store = store();
        assert_eq!(store.fetch_global_config().unwrap().unwrap().id, "global");
        assert_eq!(store.fetch_company_config("acme").unwrap().unwrap().id, "acme");
        assert_eq!(store.fetch_format_config("F1").unwrap().unwrap().id, "f1");
        assert!(store.fetch_company_config("globex").unwrap().is_none());
        assert_eq!(store.fetch_count(), 4);
    }

    #[test]
    fn two_active_globals_conflict() {
        let store = InMemoryConfigStore::with_configs([
            MappingConfig::global("g1"),
            MappingConfig::global("g2"),
        ]);
        let err = store.fetch_global_config().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { count: 2, ref config_ids, .. } if config_ids == &["g1", "g2"]
        ));
    }

    #[test]
    fn fetch_dispatches_on_key() {
        let store = store();
        let found = store
            .fetch(&ScopeKey::format("F1", Some("acme".to_string())))
            .unwrap();
        assert_eq!(found.unwrap().id, "f1");
    }

    #[test]
    fn save_is_compare_and_swap() {
        let store = InMemoryConfigStore::new();
        let saved = store
            .save_config(MappingConfig::global("g"), None)
            .unwrap();
        assert_eq!(saved.version, 1);

        let again = store.save_config(MappingConfig::global("g"), None);
        assert!(matches!(
            again,
            Err(StoreError::VersionConflict {
                expected: None,
                actual: Some(1),
                ..
            })
        ));

        let updated = store.save_config(saved, Some(1)).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(store.list_configs().unwrap().len(), 1);
    }
}
