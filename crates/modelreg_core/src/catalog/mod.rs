//! Type catalog boundary.
//!
//! # Responsibility
//! - Define the read contract the binder consumes (`TypeCatalogReader`).
//! - Provide the SQLite implementation and idempotent type registration.
//!
//! # Invariants
//! - Type names are unique within one catalog.
//! - Ids are assigned by the store and never reused for another name.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::{ensure_types, type_properties, EnsureReport};

pub type CatalogResult<T> = Result<T, CatalogError>;

/// One registered domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCatalogEntry {
    pub name: String,
    pub id: i32,
}

impl TypeCatalogEntry {
    pub fn new(name: impl Into<String>, id: i32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Read access to every registered type.
pub trait TypeCatalogReader {
    fn get_all(&self) -> CatalogResult<Vec<TypeCatalogEntry>>;
}

#[derive(Debug)]
pub enum CatalogError {
    Db(DbError),
    /// Non-SQLite backends report transport failures here.
    Unavailable(String),
    InvalidName(String),
    InvalidData(String),
    TypeConflict { name: String, reason: String },
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "type catalog unavailable: {message}"),
            Self::InvalidName(name) => write!(f, "invalid type name `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted type data: {message}"),
            Self::TypeConflict { name, reason } => {
                write!(f, "type `{name}` conflicts with catalog: {reason}")
            }
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for CatalogError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
