//! Dynamic mapping service.
//!
//! `map_fields` is a synchronous pipeline:
//!
//! 1. read the cache for each scope the context names (unless disabled or
//!    refreshing)
//! 2. resolve the remaining scopes through the [`ConfigResolver`] and cache them
//! 3. run the [`FieldMappingEngine`]
//! 4. assemble the [`MappingResult`]
//!
//! Independent calls may run concurrently; the cache is the only shared
//! mutable state.

use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use invx_model::{
    ConfigScope, ConfigUsage, FieldCandidate, MappingConfig, MappingContext, MappingDiagnostics,
    MappingResult, ResolvedConfig, UnmappedField,
};

use crate::cache::MappingCache;
use crate::engine::FieldMappingEngine;
use crate::error::{ResolveError, SaveError};
use crate::options::MappingOptions;
use crate::resolver::{ConfigResolver, Deadline};
use crate::store::ConfigStore;

#[derive(Debug)]
pub struct DynamicMappingService {
    resolver: ConfigResolver,
    cache: MappingCache,
    engine: FieldMappingEngine,
    options: MappingOptions,
}

impl DynamicMappingService {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self::with_options(store, MappingOptions::default())
    }

    pub fn with_options(store: Arc<dyn ConfigStore>, options: MappingOptions) -> Self {
        Self {
            resolver: ConfigResolver::new(store),
            cache: MappingCache::new(options.cache_ttl),
            engine: FieldMappingEngine::new(),
            options,
        }
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    pub fn cache(&self) -> &MappingCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        self.resolver.store()
    }

    /// Map extracted candidates onto target fields for one request.
    ///
    /// A failed config fetch fails the whole call with `success == false`
    /// and empty field lists. Per-field transform failures do not.
    pub fn map_fields(
        &self,
        candidates: &[FieldCandidate],
        context: &MappingContext,
    ) -> MappingResult {
        let started = Instant::now();
        let _span = tracing::info_span!(
            "map_fields",
            document_id = context.document_id.as_deref(),
            company_id = context.company_id.as_deref(),
            document_format_id = context.document_format_id.as_deref()
        )
        .entered();

        let (configs, diagnostics) = match self.load_configs(context) {
            Ok(loaded) => loaded,
            Err(err) => {
                let message = error_chain(&err);
                tracing::error!(scope = %err.scope(), error = %message, "Config resolution failed");
                return MappingResult::failure(message, elapsed_ms(started));
            }
        };

        let output = self.engine.apply_rules(candidates, &configs);

        let (mapped_fields, failed): (Vec<_>, Vec<_>) =
            output.values.into_iter().partition(|v| v.success);
        let mut unmapped_fields = output.unmapped;
        unmapped_fields.extend(failed.into_iter().map(|v| UnmappedField {
            reason: v.error.unwrap_or_else(|| "transform failed".to_string()),
            target_field: v.target_field,
            rule_id: v.rule_id,
        }));
        unmapped_fields.sort_by(|a, b| a.target_field.cmp(&b.target_field));

        let result = MappingResult {
            success: true,
            mapped_fields,
            unmapped_fields,
            error: None,
            execution_time_ms: elapsed_ms(started),
            configs_used: configs.len(),
            rules_applied: output.rules_applied,
            diagnostics,
        };

        tracing::info!(
            mapped = result.mapped_fields.len(),
            unmapped = result.unmapped_fields.len(),
            configs = result.configs_used,
            rules_applied = result.rules_applied,
            cache_hits = result.diagnostics.cache_hits,
            duration_ms = result.execution_time_ms,
            "Mapping complete"
        );
        result
    }

    fn load_configs(
        &self,
        context: &MappingContext,
    ) -> Result<(Vec<Arc<ResolvedConfig>>, MappingDiagnostics), ResolveError> {
        let use_cache = self.options.enable_cache && context.enable_cache;
        let read_cache = use_cache && !context.force_refresh;
        let deadline = Deadline::start(self.options.fetch_timeout);

        let mut configs = Vec::new();
        let mut diagnostics = MappingDiagnostics::default();
        for key in context.scope_keys() {
            let cached = if read_cache { self.cache.get(&key) } else { None };
            let (resolved, from_cache) = match cached {
                Some(hit) => {
                    diagnostics.cache_hits += 1;
                    (hit, true)
                }
                None => {
                    diagnostics.store_fetches += 1;
                    let generation = self.cache.generation();
                    let Some(resolved) = self.resolver.resolve_scope(&key, &deadline)? else {
                        continue;
                    };
                    if use_cache {
                        self.cache
                            .set_if_current(key.clone(), Arc::clone(&resolved), generation);
                    }
                    (resolved, false)
                }
            };

            let config = resolved.config();
            diagnostics.configs.push(ConfigUsage {
                key,
                config_id: config.id.clone(),
                version: config.version,
                cached: from_cache,
            });
            configs.push(resolved);
        }
        Ok((configs, diagnostics))
    }

    /// Drop cached configs for a scope. See [`MappingCache::invalidate`].
    pub fn invalidate_cache(&self, scope: ConfigScope, id: Option<&str>) -> usize {
        self.cache.invalidate(scope, id)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::debug!("Config cache cleared");
    }

    /// Validate and store a config, then invalidate its scope.
    ///
    /// `expected_version` is the version the caller last read; `None` for a
    /// new config.
    pub fn save_config(
        &self,
        config: MappingConfig,
        expected_version: Option<u32>,
    ) -> Result<MappingConfig, SaveError> {
        config.validate()?;
        let saved = self.store().save_config(config, expected_version)?;

        let id = match saved.scope {
            ConfigScope::Global => None,
            ConfigScope::Company => saved.company_id.as_deref(),
            ConfigScope::Format => saved.document_format_id.as_deref(),
        };
        self.invalidate_cache(saved.scope, id);
        Ok(saved)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Render an error and its sources as `outer: inner: ...`.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
