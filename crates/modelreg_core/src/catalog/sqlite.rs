//! SQLite-backed type catalog.
//!
//! # Invariants
//! - `ensure_types` is idempotent and runs in a single transaction.
//! - A name is registered under exactly one category (`types.type_kind`).
//! - A property keeps the kind it was first registered with.

use super::{CatalogError, CatalogResult, TypeCatalogEntry, TypeCatalogReader};
use crate::db::DbHandle;
use crate::spec::{Category, PropertyKind, Spec};
use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::time::Instant;

static TYPE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("valid type name regex"));

/// Outcome counters of one `ensure_types` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub types_created: usize,
    pub types_existing: usize,
    pub properties_added: usize,
}

impl TypeCatalogReader for DbHandle {
    fn get_all(&self) -> CatalogResult<Vec<TypeCatalogEntry>> {
        self.with_conn(|conn| -> CatalogResult<Vec<TypeCatalogEntry>> {
            let mut stmt = conn.prepare("SELECT id, name FROM types ORDER BY id ASC;")?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_id: i64 = row.get(0)?;
                let id = i32::try_from(raw_id).map_err(|_| {
                    CatalogError::InvalidData(format!("type id `{raw_id}` exceeds i32 in types.id"))
                })?;
                entries.push(TypeCatalogEntry::new(row.get::<_, String>(1)?, id));
            }
            Ok(entries)
        })
    }
}

/// Registers every type declared in `spec` together with its properties.
///
/// Existing types are left untouched apart from newly declared properties.
///
/// # Errors
/// - `InvalidName` when a declared name is not a valid type identifier.
/// - `TypeConflict` when a name exists under another category, or a
///   property exists with another kind.
pub fn ensure_types(db: &DbHandle, spec: &Spec) -> CatalogResult<EnsureReport> {
    let started_at = Instant::now();

    for name in spec.all_names() {
        if !TYPE_NAME_RE.is_match(name) {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
    }

    let result = db.with_conn_mut(|conn| -> CatalogResult<EnsureReport> {
        let tx = conn.transaction()?;
        let mut report = EnsureReport::default();
        for category in Category::ALL {
            for (name, spec_type) in spec.types(category) {
                let type_id = match find_type(&tx, name)? {
                    Some((id, kind)) if kind == category.type_kind() => {
                        report.types_existing += 1;
                        id
                    }
                    Some((_, kind)) => {
                        let stored = Category::from_type_kind(kind)
                            .map_or("unknown", Category::as_str);
                        return Err(CatalogError::TypeConflict {
                            name: name.clone(),
                            reason: format!(
                                "registered as {stored}, declared as {}",
                                category.as_str()
                            ),
                        });
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO types (name, type_kind) VALUES (?1, ?2);",
                            params![name, category.type_kind()],
                        )?;
                        report.types_created += 1;
                        tx.last_insert_rowid()
                    }
                };

                for (property, kind) in spec_type.properties() {
                    let stored: Option<i64> = tx
                        .query_row(
                            "SELECT data_type FROM type_properties WHERE type_id = ?1 AND name = ?2;",
                            params![type_id, property],
                            |row| row.get(0),
                        )
                        .optional()?;
                    match stored {
                        Some(code) if code == kind.code() => {}
                        Some(code) => {
                            return Err(CatalogError::TypeConflict {
                                name: name.clone(),
                                reason: format!(
                                    "property `{property}` stored as {}, declared as {kind:?}",
                                    describe_kind(code)
                                ),
                            });
                        }
                        None => {
                            tx.execute(
                                "INSERT INTO type_properties (type_id, name, data_type) VALUES (?1, ?2, ?3);",
                                params![type_id, property, kind.code()],
                            )?;
                            report.properties_added += 1;
                        }
                    }
                }
            }
        }
        tx.commit()?;
        Ok(report)
    });

    match &result {
        Ok(report) => info!(
            "event=types_ensure module=catalog status=ok duration_ms={} created={} existing={} properties_added={}",
            started_at.elapsed().as_millis(),
            report.types_created,
            report.types_existing,
            report.properties_added
        ),
        Err(err) => error!(
            "event=types_ensure module=catalog status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Returns the stored property schema of one type, or `None` if unknown.
pub fn type_properties(
    db: &DbHandle,
    name: &str,
) -> CatalogResult<Option<BTreeMap<String, PropertyKind>>> {
    db.with_conn(|conn| -> CatalogResult<Option<BTreeMap<String, PropertyKind>>> {
        let Some((type_id, _)) = find_type(conn, name)? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT name, data_type FROM type_properties WHERE type_id = ?1 ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([type_id])?;
        let mut properties = BTreeMap::new();
        while let Some(row) = rows.next()? {
            let property: String = row.get(0)?;
            let code: i64 = row.get(1)?;
            let kind = PropertyKind::from_code(code).ok_or_else(|| {
                CatalogError::InvalidData(format!(
                    "invalid data_type `{code}` in type_properties for `{name}.{property}`"
                ))
            })?;
            properties.insert(property, kind);
        }
        Ok(Some(properties))
    })
}

fn find_type(conn: &Connection, name: &str) -> CatalogResult<Option<(i64, i64)>> {
    let found = conn
        .query_row(
            "SELECT id, type_kind FROM types WHERE name = ?1;",
            [name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

fn describe_kind(code: i64) -> String {
    PropertyKind::from_code(code).map_or_else(|| format!("code {code}"), |kind| format!("{kind:?}"))
}
