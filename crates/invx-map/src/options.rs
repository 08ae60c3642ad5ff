//! Mapping service options.

use std::time::Duration;

use crate::cache::DEFAULT_TTL;

/// Options for [`DynamicMappingService`](crate::DynamicMappingService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOptions {
    /// Lifetime of a cached config snapshot.
    pub cache_ttl: Duration,
    /// Budget for all store fetches of one mapping call.
    pub fetch_timeout: Option<Duration>,
    /// Service-wide cache switch; a request can only narrow it.
    pub enable_cache: bool,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            fetch_timeout: None,
            enable_cache: true,
        }
    }
}

impl MappingOptions {
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.enable_cache = false;
        self
    }
}
