//! Typed repository binding for a metadata-store-backed model registry.
//!
//! A [`Spec`] declares the named artifact, context and execution types an
//! application needs. [`bind`] validates it against the live type catalog
//! and returns a [`RepoSet`] of ready repositories.

pub mod binder;
pub mod catalog;
pub mod config;
pub mod connector;
pub mod db;
pub mod logging;
pub mod registry;
pub mod repo;
pub mod repo_set;
pub mod spec;

pub use binder::{
    bind, bind_with_reader, ArtifactTypeMap, BindError, BindResult, ContextTypeMap, Environment,
    ExecutionTypeMap, InitSite, TypeIdValue,
};
pub use catalog::{
    ensure_types, type_properties, CatalogError, CatalogResult, EnsureReport, TypeCatalogEntry,
    TypeCatalogReader,
};
pub use config::{ConfigError, ConnectorConfig};
pub use connector::{connect, ConnectError, ConnectResult, RegistryConnection};
pub use db::{open_db, open_db_in_memory, DbError, DbHandle, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use registry::model_registry_spec;
pub use repo::record_repo::{
    Record, RecordRepository, RepoError, RepoResult, SqliteRecordRepository,
};
pub use repo_set::{LookupError, LookupResult, RepoSet, SharedRepoSet};
pub use spec::{
    BoxError, Category, FromEnvironment, InitOutput, Initializer, IntoInitializer, PropertyKind,
    Repository, RuntimeType, Spec, SpecType,
};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
