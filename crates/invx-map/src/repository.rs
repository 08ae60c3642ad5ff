//! File-system config store.
//!
//! Each config is one pretty-printed JSON file named after its id:
//! `{normalized_id}.json`. Writes go to a `.json.tmp` sibling first and are
//! renamed over the target, so a reader never sees a half-written file.
//! Writes within one process are serialized; the version check and the
//! rename happen under the same lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use invx_model::MappingConfig;

use crate::error::{Result, StoreError};
use crate::store::{ConfigStore, Selector, next_version, select_active};

const EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Directory of JSON config files.
#[derive(Debug)]
pub struct JsonConfigRepository {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
    fetches: AtomicUsize,
}

impl JsonConfigRepository {
    /// Open a repository, creating the directory if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(|source| StoreError::Io {
            operation: "create config directory",
            path: base_dir.clone(),
            source,
        })?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
            fetches: AtomicUsize::new(0),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Path a config with this id is stored at.
    pub fn config_path(&self, config_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{EXTENSION}", normalize_id(config_id)))
    }

    fn read_config(path: &Path) -> Result<MappingConfig> {
        let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
            operation: "read config",
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_existing(path: &Path) -> Result<Option<MappingConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::read_config(path).map(Some)
    }

    fn load_all(&self) -> Result<Vec<MappingConfig>> {
        let entries = fs::read_dir(&self.base_dir).map_err(|source| StoreError::Io {
            operation: "read config directory",
            path: self.base_dir.clone(),
            source,
        })?;

        let mut configs = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Io {
                    operation: "read config directory",
                    path: self.base_dir.clone(),
                    source,
                })?
                .path();
            // `.json.tmp` files have extension "tmp" and are skipped here.
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            configs.push(Self::read_config(&path)?);
        }
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(configs)
    }

    fn select(&self, selector: Selector<'_>) -> Result<Option<MappingConfig>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let configs = self.load_all()?;
        select_active(selector, &configs)
    }

    fn write_atomic(&self, path: &Path, config: &MappingConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config).map_err(|source| {
            StoreError::Serialize {
                config_id: config.id.clone(),
                source,
            }
        })?;

        let temp_path = path.with_extension(TEMP_EXTENSION);
        fs::write(&temp_path, json).map_err(|source| StoreError::Io {
            operation: "write temp config",
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
            temp_path,
            target_path: path.to_path_buf(),
            source,
        })
    }
}

impl ConfigStore for JsonConfigRepository {
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
        if normalize_id(&config.id).is_empty() {
            return Err(StoreError::BlankId(config.id));
        }
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.config_path(&config.id);

        let existing = Self::read_existing(&path)?;
        if let Some(existing) = &existing
            && existing.id != config.id
        {
            return Err(StoreError::IdCollision {
                config_id: config.id,
                existing_id: existing.id.clone(),
                path,
            });
        }

        config.version = next_version(
            &config.id,
            expected_version,
            existing.as_ref().map(|c| c.version),
        )?;
        self.write_atomic(&path, &config)?;

        tracing::info!(
            config_id = %config.id,
            version = config.version,
            path = %path.display(),
            "Config saved"
        );
        Ok(config)
    }

    fn list_configs(&self) -> Result<Vec<MappingConfig>> {
        self.load_all()
    }
}

/// Make an id safe for use as a file stem.
fn normalize_id(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn normalize_replaces_path_characters() {
        assert_eq!(normalize_id(" acme/f1.v2 "), "acme_f1_v2");
        assert_eq!(normalize_id("global-default"), "global-default");
    }

    #[test]
    fn save_and_fetch_round_trip_through_files() {
        let dir = tempdir().unwrap();
        let repo = JsonConfigRepository::new(dir.path().join("configs")).unwrap();

        let saved = repo
            .save_config(MappingConfig::company("acme", "ACME"), None)
            .unwrap();
        assert_eq!(saved.version, 1);
        assert!(repo.config_path("acme").exists());
        assert!(!repo.config_path("acme").with_extension(TEMP_EXTENSION).exists());

        let fetched = repo.fetch_company_config("ACME").unwrap().unwrap();
        assert_eq!(fetched, saved);
        assert!(repo.fetch_global_config().unwrap().is_none());
        assert_eq!(repo.fetch_count(), 2);
    }

    #[test]
    fn stale_version_is_rejected() {
        let dir = tempdir().unwrap();
        let repo = JsonConfigRepository::new(dir.path()).unwrap();
        let v1 = repo.save_config(MappingConfig::global("g"), None).unwrap();
        repo.save_config(v1.clone(), Some(1)).unwrap();

        let err = repo.save_config(v1, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: Some(1),
                actual: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn colliding_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let repo = JsonConfigRepository::new(dir.path()).unwrap();
        repo.save_config(MappingConfig::global("a/b"), None).unwrap();
        let err = repo
            .save_config(MappingConfig::company("a.b", "x"), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::IdCollision { .. }));
    }

    #[test]
    fn blank_id_is_rejected_before_writing() {
        let dir = tempdir().unwrap();
        let repo = JsonConfigRepository::new(dir.path()).unwrap();
        for id in ["", "  "] {
            let err = repo.save_config(MappingConfig::global(id), None).unwrap_err();
            assert!(matches!(err, StoreError::BlankId(_)));
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unparseable_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let repo = JsonConfigRepository::new(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("ignored.json.tmp"), "{not json").unwrap();
        assert!(matches!(
            repo.list_configs(),
            Err(StoreError::Parse { .. })
        ));
    }
}
