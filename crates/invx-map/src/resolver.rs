//! Config resolution against a [`ConfigStore`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use invx_model::{MappingContext, ResolvedConfig, ScopeKey};

use crate::error::ResolveError;
use crate::store::ConfigStore;

/// Time budget shared by the fetches of one resolution.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    /// Start a budget now; `None` never expires.
    pub fn start(timeout: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn none() -> Self {
        Self::start(None)
    }

    fn check(&self, key: &ScopeKey) -> Result<(), ResolveError> {
        match self.timeout {
            Some(timeout) if self.started.elapsed() > timeout => {
                Err(ResolveError::DeadlineExceeded {
                    key: key.clone(),
                    timeout,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Fetches scoped configs from the store.
#[derive(Clone)]
pub struct ConfigResolver {
    store: Arc<dyn ConfigStore>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver").finish_non_exhaustive()
    }
}

impl ConfigResolver {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// Fetch the active config for one scope.
    ///
    /// The snapshot is tagged with `key`, which for a format scope also
    /// carries the requesting company.
    pub fn resolve_scope(
        &self,
        key: &ScopeKey,
        deadline: &Deadline,
    ) -> Result<Option<Arc<ResolvedConfig>>, ResolveError> {
        deadline.check(key)?;
        let fetched = self
            .store
            .fetch(key)
            .map_err(|source| ResolveError::Fetch {
                key: key.clone(),
                source,
            })?;
        deadline.check(key)?;

        Ok(match fetched {
            Some(config) if config.is_active => {
                tracing::debug!(key = %key, config_id = %config.id, version = config.version, "Resolved config");
                Some(Arc::new(ResolvedConfig::new(key.clone(), config)))
            }
            Some(config) => {
                tracing::debug!(key = %key, config_id = %config.id, "Ignoring inactive config");
                None
            }
            None => None,
        })
    }

    /// Resolve every tier the context names, least specific first.
    ///
    /// Tiers without an active config are omitted. Any failed fetch fails
    /// the whole resolution.
    pub fn resolve_configs(
        &self,
        context: &MappingContext,
        timeout: Option<Duration>,
    ) -> Result<Vec<Arc<ResolvedConfig>>, ResolveError> {
        let _span = tracing::debug_span!(
            "resolve_configs",
            company_id = context.company_id.as_deref(),
            document_format_id = context.document_format_id.as_deref()
        )
        .entered();

        let deadline = Deadline::start(timeout);
        let mut resolved = Vec::new();
        for key in context.scope_keys() {
            if let Some(config) = self.resolve_scope(&key, &deadline)? {
                resolved.push(config);
            }
        }
        Ok(resolved)
    }
}
