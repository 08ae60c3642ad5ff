//! Dynamic field mapping.
//!
//! Extracted field candidates are mapped onto target fields by rules taken
//! from scoped configurations. A request draws on up to three tiers
//! (global, company, document format); the most specific tier wins.
//!
//! - [`store`] / [`repository`]: where configs live
//! - [`resolver`]: fetching the configs a request needs
//! - [`cache`]: TTL cache of resolved snapshots with scoped invalidation
//! - [`transform`]: rule transforms
//! - [`engine`]: rule selection per target field
//! - [`service`]: the `map_fields` entry point

pub mod cache;
pub mod engine;
pub mod error;
pub mod options;
pub mod repository;
pub mod resolver;
pub mod service;
pub mod store;
pub mod transform;

pub use cache::{CacheStats, DEFAULT_TTL, MappingCache};
pub use engine::{EngineOutput, FieldMappingEngine, NO_APPLICABLE_RULE};
pub use error::{ResolveError, SaveError, StoreError, TransformError};
pub use options::MappingOptions;
pub use repository::JsonConfigRepository;
pub use resolver::{ConfigResolver, Deadline};
pub use service::DynamicMappingService;
pub use store::{ConfigStore, InMemoryConfigStore};
pub use transform::{SourceValues, TransformExecutor};
