//! Record repositories scoped to one catalog type.
//!
//! # Responsibility
//! - Create, read, rename and list artifact/context/execution records of a
//!   single bound type id.
//!
//! # Invariants
//! - Every query is constrained to the repository's own `type_id`.
//! - Record names are unique per type and never blank.

use crate::binder::TypeIdValue;
use crate::db::{DbError, DbHandle};
use crate::spec::Category;
use rusqlite::{params, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(i64),
    InvalidName(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidName(name) => write!(f, "invalid record name `{name}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidName(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored artifact, context or execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub type_id: i32,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// Interface shared by every record repository.
pub trait RecordRepository: Send + Sync {
    fn category(&self) -> Category;
    fn type_id(&self) -> TypeIdValue;
    fn create(&self, name: &str) -> RepoResult<i64>;
    fn get(&self, id: i64) -> RepoResult<Option<Record>>;
    fn rename(&self, id: i64, name: &str) -> RepoResult<()>;
    fn list(&self) -> RepoResult<Vec<Record>>;
}

/// SQLite record repository bound to one type id.
#[derive(Debug, Clone)]
pub struct SqliteRecordRepository {
    db: DbHandle,
    category: Category,
    type_id: TypeIdValue,
}

impl SqliteRecordRepository {
    pub fn new(db: DbHandle, category: Category, type_id: TypeIdValue) -> Self {
        Self {
            db,
            category,
            type_id,
        }
    }

    fn table(&self) -> &'static str {
        match self.category {
            Category::Artifact => "artifacts",
            Category::Context => "contexts",
            Category::Execution => "executions",
        }
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn category(&self) -> Category {
        self.category
    }

    fn type_id(&self) -> TypeIdValue {
        self.type_id
    }

    fn create(&self, name: &str) -> RepoResult<i64> {
        let name = validate_name(name)?;
        self.db.with_conn(|conn| -> RepoResult<i64> {
            conn.execute(
                &format!("INSERT INTO {} (type_id, name) VALUES (?1, ?2);", self.table()),
                params![self.type_id.get(), name],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn get(&self, id: i64) -> RepoResult<Option<Record>> {
        self.db.with_conn(|conn| -> RepoResult<Option<Record>> {
            let record = conn
                .query_row(
                    &format!(
                        "SELECT id, type_id, name, created_at, updated_at FROM {}
                         WHERE id = ?1 AND type_id = ?2;",
                        self.table()
                    ),
                    params![id, self.type_id.get()],
                    parse_record_row,
                )
                .optional()?;
            Ok(record)
        })
    }

    fn rename(&self, id: i64, name: &str) -> RepoResult<()> {
        let name = validate_name(name)?;
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "UPDATE {}
                     SET name = ?1, updated_at = (strftime('%s', 'now') * 1000)
                     WHERE id = ?2 AND type_id = ?3;",
                    self.table()
                ),
                params![name, id, self.type_id.get()],
            )
        })?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn list(&self) -> RepoResult<Vec<Record>> {
        self.db.with_conn(|conn| -> RepoResult<Vec<Record>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, type_id, name, created_at, updated_at FROM {}
                 WHERE type_id = ?1
                 ORDER BY id ASC;",
                self.table()
            ))?;
            let records = stmt
                .query_map([self.type_id.get()], parse_record_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }
}

fn validate_name(name: &str) -> RepoResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RepoError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

fn parse_record_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get("id")?,
        type_id: row.get("type_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
