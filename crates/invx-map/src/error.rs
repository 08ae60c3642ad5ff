//! Error types for config storage, resolution and rule execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use invx_model::{ConfigScope, ConfigValidationError, RuleAuthoringError, ScopeKey};

/// Failure reading or writing mapping configs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// File I/O error.
    #[error("failed to {operation} {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored config file is not valid JSON for a config.
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config '{config_id}'")]
    Serialize {
        config_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// Temp file could not be renamed over the target.
    #[error("failed to complete write of {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// More than one active config claims the same scope.
    #[error("{count} active {scope} configs for {key}: {config_ids:?}")]
    Conflict {
        scope: ConfigScope,
        key: String,
        count: usize,
        config_ids: Vec<String>,
    },

    /// Compare-and-swap write lost against a concurrent writer.
    #[error("config '{config_id}' is at version {actual:?}, expected {expected:?}")]
    VersionConflict {
        config_id: String,
        expected: Option<u32>,
        actual: Option<u32>,
    },

    /// Two config ids map onto the same storage file.
    #[error("config '{config_id}' collides with stored config '{existing_id}' at {path}")]
    IdCollision {
        config_id: String,
        existing_id: String,
        path: PathBuf,
    },

    /// A config id that yields no usable file name.
    #[error("config id {0:?} is blank")]
    BlankId(String),

    /// The store cannot be reached.
    #[error("config store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same call could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Unavailable(_) | Self::VersionConflict { .. }
        )
    }
}

/// Failure resolving the configs for a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    #[error("failed to fetch {key} config")]
    Fetch {
        key: ScopeKey,
        #[source]
        source: StoreError,
    },

    #[error("fetching {key} config exceeded the {timeout:?} deadline")]
    DeadlineExceeded { key: ScopeKey, timeout: Duration },
}

impl ResolveError {
    /// Scope whose fetch failed.
    pub fn scope(&self) -> &ScopeKey {
        match self {
            Self::Fetch { key, .. } | Self::DeadlineExceeded { key, .. } => key,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => source.is_recoverable(),
            Self::DeadlineExceeded { .. } => true,
        }
    }
}

/// Failure computing one target value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransformError {
    /// Rule does not satisfy the authoring contract for its transform.
    #[error(transparent)]
    Authoring(#[from] RuleAuthoringError),

    #[error("rule '{rule_id}': source field '{field}' has no value entry")]
    MissingSource { rule_id: String, field: String },

    #[error("rule '{rule_id}': malformed template: {detail}")]
    MalformedTemplate { rule_id: String, detail: String },
}

/// Failure saving a config through the mapping service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] ConfigValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
