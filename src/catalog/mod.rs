//! Schema metadata, stored as reserved-prefix rows in the same B+-tree
//! that holds table data.
//!
//! There is no separate catalog page or structure: `__catalog__tables:`,
//! `__catalog__columns:`, `__catalog__indexes:` and `__catalog__stats:`
//! are just key prefixes no user table name is allowed to collide with.
//! This mirrors how [`crate::concurrency::Engine`] itself is just another
//! consumer of the B+-tree's key/value interface — the catalog is not a
//! privileged layer, only a convention over keys.

mod column_type;
mod keys;

use crate::common::{Error, Result};
use crate::concurrency::Engine;

pub use column_type::ColumnType;
use keys::{column_key, index_key, prefix_range, stats_key, table_key};

const DELETED: &[u8] = b"DELETED";

/// Prefix reserved for catalog rows (see `keys.rs`). No name coming from
/// user SQL — table, column, or index — may begin with it, or a created
/// row would alias into the catalog's own key range.
const RESERVED_PREFIX: &str = "__catalog__";

/// Reject a user-supplied name that would collide with the catalog's own
/// reserved key prefix.
fn reject_reserved_name(kind: &str, name: &str) -> Result<()> {
    if name.starts_with(RESERVED_PREFIX) {
        return Err(Error::schema(format!(
            "{kind} name '{name}' is reserved (must not begin with '{RESERVED_PREFIX}')"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub col_type: ColumnType,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    pub column: String,
}

/// Create a table with the given columns. Errors if a non-deleted table
/// of the same name already exists, or if `table` or any column name is
/// reserved for catalog use.
pub fn create_table(engine: &Engine, table: &str, columns: &[(String, ColumnType)]) -> Result<()> {
    reject_reserved_name("table", table)?;
    for (name, _) in columns {
        reject_reserved_name("column", name)?;
    }
    let key = table_key(table);
    // Existence is checked with a range scan over the exact key, not a
    // point lookup, so a soft-deleted row (present but marked DELETED)
    // doesn't get mistaken for "doesn't exist" by a get()-and-catch path.
    let existing = engine.range_scan(&key, &key)?;
    if existing.iter().any(|(_, v)| v != DELETED) {
        return Err(Error::schema(format!("table '{table}' already exists")));
    }

    engine.insert(key, format!("columns={}", columns.len()).into_bytes())?;
    for (ordinal, (name, col_type)) in columns.iter().enumerate() {
        engine.insert(
            column_key(table, name),
            format!("type={},ordinal={}", col_type.as_str(), ordinal).into_bytes(),
        )?;
    }
    engine.insert(stats_key(table), b"rows=0".to_vec())?;
    Ok(())
}

/// Soft-delete a table, its columns and any indexes defined on it.
pub fn drop_table(engine: &Engine, table: &str) -> Result<()> {
    if !table_exists(engine, table)? {
        return Err(Error::schema(format!("unknown table '{table}'")));
    }
    engine.insert(table_key(table), DELETED.to_vec())?;

    let (lo, hi) = prefix_range(&format!("__catalog__columns:{table}:"));
    for (key, value) in engine.range_scan(&lo, &hi)? {
        if value != DELETED {
            engine.insert(key, DELETED.to_vec())?;
        }
    }

    for index in list_indexes(engine)? {
        if index.table == table {
            engine.insert(index_key(&index.name), DELETED.to_vec())?;
        }
    }
    Ok(())
}

/// Whether `table` currently has a non-deleted catalog row.
pub fn table_exists(engine: &Engine, table: &str) -> Result<bool> {
    let key = table_key(table);
    let rows = engine.range_scan(&key, &key)?;
    Ok(rows.iter().any(|(_, v)| v != DELETED))
}

/// Append a column to an existing table.
pub fn add_column(engine: &Engine, table: &str, name: &str, col_type: ColumnType) -> Result<()> {
    reject_reserved_name("column", name)?;
    let columns = describe_table(engine, table)?;
    let next_ordinal = columns.len();
    engine.insert(
        column_key(table, name),
        format!("type={},ordinal={}", col_type.as_str(), next_ordinal).into_bytes(),
    )?;
    engine.insert(
        table_key(table),
        format!("columns={}", next_ordinal + 1).into_bytes(),
    )?;
    Ok(())
}

/// List every non-deleted table name, in catalog key order.
pub fn list_tables(engine: &Engine) -> Result<Vec<String>> {
    let (lo, hi) = prefix_range("__catalog__tables:");
    let mut tables = Vec::new();
    for (key, value) in engine.range_scan(&lo, &hi)? {
        if value == DELETED {
            continue;
        }
        let name = String::from_utf8_lossy(&key["__catalog__tables:".len()..]).into_owned();
        tables.push(name);
    }
    Ok(tables)
}

/// Columns of `table`, in declared (ordinal) order.
pub fn describe_table(engine: &Engine, table: &str) -> Result<Vec<ColumnInfo>> {
    let (lo, hi) = prefix_range(&format!("__catalog__columns:{table}:"));
    let mut columns = Vec::new();
    for (key, value) in engine.range_scan(&lo, &hi)? {
        if value == DELETED {
            continue;
        }
        let name = String::from_utf8_lossy(&key[format!("__catalog__columns:{table}:").len()..])
            .into_owned();
        let (col_type, ordinal) = parse_column_meta(&value)?;
        columns.push(ColumnInfo {
            name,
            col_type,
            ordinal,
        });
    }
    columns.sort_by_key(|c| c.ordinal);
    Ok(columns)
}

fn parse_column_meta(value: &[u8]) -> Result<(ColumnType, usize)> {
    let text = String::from_utf8_lossy(value);
    let mut col_type = None;
    let mut ordinal = None;
    for part in text.split(',') {
        if let Some(t) = part.strip_prefix("type=") {
            col_type = Some(ColumnType::parse(t)?);
        } else if let Some(o) = part.strip_prefix("ordinal=") {
            ordinal = Some(
                o.parse::<usize>()
                    .map_err(|_| Error::CorruptionError("malformed catalog ordinal".into()))?,
            );
        }
    }
    match (col_type, ordinal) {
        (Some(t), Some(o)) => Ok((t, o)),
        _ => Err(Error::CorruptionError("malformed catalog column row".into())),
    }
}

/// Create a secondary index entry (metadata only — no physical index
/// structure is built for it; see the module-level note).
pub fn create_index(engine: &Engine, index_name: &str, table: &str, column: &str) -> Result<()> {
    reject_reserved_name("index", index_name)?;
    if !table_exists(engine, table)? {
        return Err(Error::schema(format!("unknown table '{table}'")));
    }
    engine.insert(
        index_key(index_name),
        format!("table={table},column={column}").into_bytes(),
    )?;
    Ok(())
}

pub fn drop_index(engine: &Engine, index_name: &str) -> Result<()> {
    engine.insert(index_key(index_name), DELETED.to_vec())?;
    Ok(())
}

pub fn list_indexes(engine: &Engine) -> Result<Vec<IndexInfo>> {
    let (lo, hi) = prefix_range("__catalog__indexes:");
    let mut indexes = Vec::new();
    for (key, value) in engine.range_scan(&lo, &hi)? {
        if value == DELETED {
            continue;
        }
        let name = String::from_utf8_lossy(&key["__catalog__indexes:".len()..]).into_owned();
        let text = String::from_utf8_lossy(&value);
        let mut table = None;
        let mut column = None;
        for part in text.split(',') {
            if let Some(t) = part.strip_prefix("table=") {
                table = Some(t.to_string());
            } else if let Some(c) = part.strip_prefix("column=") {
                column = Some(c.to_string());
            }
        }
        if let (Some(table), Some(column)) = (table, column) {
            indexes.push(IndexInfo { name, table, column });
        }
    }
    Ok(indexes)
}

/// The index on `table.column`, if one has been created.
pub fn index_for_column(engine: &Engine, table: &str, column: &str) -> Result<Option<IndexInfo>> {
    Ok(list_indexes(engine)?
        .into_iter()
        .find(|i| i.table == table && i.column == column))
}

/// Current row count recorded for `table`.
pub fn row_count(engine: &Engine, table: &str) -> Result<u64> {
    match engine.get_opt(&stats_key(table))? {
        Some(value) => parse_row_count(&value),
        None => Ok(0),
    }
}

fn parse_row_count(value: &[u8]) -> Result<u64> {
    let text = String::from_utf8_lossy(value);
    text.strip_prefix("rows=")
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| Error::CorruptionError("malformed catalog stats row".into()))
}

/// Adjust `table`'s recorded row count by `delta` (which may be negative).
pub fn adjust_row_count(engine: &Engine, table: &str, delta: i64) -> Result<()> {
    let current = row_count(engine, table)? as i64;
    let updated = (current + delta).max(0) as u64;
    engine.insert(stats_key(table), format!("rows={updated}").into_bytes())?;
    Ok(())
}
