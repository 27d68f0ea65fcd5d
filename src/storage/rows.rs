//! Table-agnostic row codec used by sync.
//!
//! Export and import work on any synced table without per-entity code: the
//! column list comes from `PRAGMA table_info`, rows become JSON objects with
//! fields named exactly like the columns, and objects go back in through a
//! cached `INSERT .. ON CONFLICT(id) DO UPDATE` statement.
//!
//! Objects are built as `BTreeMap`s so keys always serialize in sorted order.
//! Together with `ORDER BY id` this makes the dump canonical: the same
//! logical table content always produces the same bytes.

use std::collections::BTreeMap;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Row, Transaction};
use serde_json::{Number, Value};

use crate::sync::Table;

/// A row as a canonical JSON object.
pub type JsonRow = BTreeMap<String, Value>;

/// Column names of a table in declaration order.
///
/// # Errors
///
/// Returns an error if the pragma query fails.
pub fn column_names(conn: &Connection, table: Table) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(&format!("PRAGMA table_info(\"{}\")", table.as_str()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

/// Number of rows in a table.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_rows(conn: &Connection, table: Table) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{}\"", table.as_str()),
        [],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Dump a whole table as canonical JSON lines, ordered by primary key.
///
/// # Errors
///
/// Returns an error if the query or serialization fails.
pub fn dump_table(conn: &Connection, table: Table) -> crate::error::Result<Vec<String>> {
    let columns = column_names(conn, table)?;
    let select = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = conn.prepare(&format!(
        "SELECT {select} FROM \"{}\" ORDER BY id",
        table.as_str()
    ))?;

    let rows = stmt
        .query_map([], |row| row_to_json(row, &columns))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in rows {
        lines.push(serde_json::to_string(&row)?);
    }
    Ok(lines)
}

/// Convert one result row into a JSON object keyed by column name.
///
/// # Errors
///
/// Returns an error if a column cannot be read.
pub fn row_to_json(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<JsonRow> {
    let mut obj = BTreeMap::new();
    for (idx, name) in columns.iter().enumerate() {
        obj.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
    }
    Ok(obj)
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        // Nested values belong to TEXT blob columns such as `metadata`
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Upsert one JSON object into `table`, keyed by its `id`.
///
/// Keys that are not columns of the table are ignored; columns missing from
/// the object keep their default (on insert) or current value (on update).
/// Returns the number of rows changed.
///
/// # Errors
///
/// Returns an error if the object has no `id` column value or the statement
/// fails (constraint violations included).
pub fn upsert_json(
    tx: &Transaction<'_>,
    table: Table,
    columns: &[String],
    obj: &serde_json::Map<String, Value>,
) -> rusqlite::Result<usize> {
    let present: Vec<&String> = columns.iter().filter(|c| obj.contains_key(*c)).collect();
    if !present.iter().any(|c| c.as_str() == "id") {
        return Err(rusqlite::Error::InvalidColumnName("id".to_string()));
    }

    let names = present
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=present.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = present
        .iter()
        .filter(|c| c.as_str() != "id")
        .map(|c| format!("\"{c}\" = excluded.\"{c}\""))
        .collect::<Vec<_>>();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    let sql = format!(
        "INSERT INTO \"{}\" ({names}) VALUES ({placeholders}) ON CONFLICT(id) {conflict}",
        table.as_str()
    );

    let values: Vec<SqlValue> = present
        .iter()
        .map(|c| obj.get(c.as_str()).map_or(SqlValue::Null, json_to_sql))
        .collect();

    let mut stmt = tx.prepare_cached(&sql)?;
    stmt.execute(rusqlite::params_from_iter(values.iter()))
}

/// Delete rows by id, returning how many existed.
///
/// # Errors
///
/// Returns an error if a delete statement fails.
pub fn delete_ids(tx: &Transaction<'_>, table: Table, ids: &[String]) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(&format!(
        "DELETE FROM \"{}\" WHERE id = ?1",
        table.as_str()
    ))?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute([id])?;
    }
    Ok(deleted)
}
