//! One-call setup: config to open store to registered types to `RepoSet`.

use crate::binder::{bind, BindError};
use crate::catalog::{ensure_types, CatalogError};
use crate::config::{ConfigError, ConnectorConfig};
use crate::db::{open_db, open_db_in_memory, DbError, DbHandle};
use crate::logging::{default_log_level, init_logging, LoggingError};
use crate::repo_set::RepoSet;
use crate::spec::Spec;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ConnectResult<T> = Result<T, ConnectError>;

#[derive(Debug)]
pub enum ConnectError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Catalog(CatalogError),
    Bind(BindError),
}

impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "failed to open metadata store: {err}"),
            Self::Catalog(err) => write!(f, "failed to register types: {err}"),
            Self::Bind(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConnectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Catalog(err) => Some(err),
            Self::Bind(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ConnectError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for ConnectError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for ConnectError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<CatalogError> for ConnectError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<BindError> for ConnectError {
    fn from(value: BindError) -> Self {
        Self::Bind(value)
    }
}

/// Live metadata store together with its bound repositories.
#[derive(Debug)]
pub struct RegistryConnection {
    pub db: DbHandle,
    pub repos: RepoSet,
}

/// Opens the store described by `config`, optionally registers the types
/// of `spec`, and binds `spec` against the result.
pub fn connect(
    config: &ConnectorConfig,
    spec: &Spec,
) -> ConnectResult<RegistryConnection> {
    config.validate()?;

    if let Some(log_dir) = &config.log_dir {
        let level = config.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let db = match &config.database_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    if config.ensure_types {
        ensure_types(&db, spec)?;
    }

    let repos = bind(spec, db.clone())?;
    Ok(RegistryConnection { db, repos })
}
