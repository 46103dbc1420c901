//! JSON persistence: two documents per table, rewritten wholesale through
//! a temp file and an atomic rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::warn;
use serde_json::{json, Map};

use crate::error::{DbError, DbResult};
use crate::index::IndexManager;
use crate::schema::Table;
use crate::storage::{Row, Storage, TableState};
use crate::types::{Fields, Value};

const WRITE_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_millis(20);

fn schema_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.schema.json"))
}

fn data_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.data.json"))
}

/// Writes contents to a sibling temp file, then renames over the target.
/// Transient failures are retried a few times before giving up.
fn atomic_write(path: &Path, contents: &str) -> DbResult<()> {
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = fs::write(&tmp, contents).and_then(|_| fs::rename(&tmp, path));
        match result {
            Ok(()) => return Ok(()),
            Err(err) if attempt < WRITE_ATTEMPTS => {
                warn!(
                    "retrying write of {} after error: {err}",
                    path.display()
                );
                thread::sleep(RETRY_DELAY);
            }
            Err(err) => {
                return Err(DbError::Persistence(format!(
                    "failed to write {}: {err}",
                    path.display()
                )));
            }
        }
    }
}

impl Storage {
    pub(crate) fn save_table_schema(&self, table: &str) -> DbResult<()> {
        let st = self.state(table)?;
        let doc = serde_json::to_string_pretty(&st.table)
            .map_err(|e| DbError::Persistence(format!("schema encode failed: {e}")))?;
        atomic_write(&schema_path(self.data_dir(), table), &doc)
    }

    pub(crate) fn save_table_data(&self, table: &str) -> DbResult<()> {
        let st = self.state(table)?;
        let mut rows = Vec::with_capacity(st.rows.len());
        for row in &st.rows {
            let mut obj = Map::new();
            obj.insert("_row_id".to_string(), json!(row.id));
            for (name, value) in row.fields.iter() {
                let encoded = serde_json::to_value(value)
                    .map_err(|e| DbError::Persistence(format!("row encode failed: {e}")))?;
                obj.insert(name.to_string(), encoded);
            }
            rows.push(serde_json::Value::Object(obj));
        }
        let doc = json!({
            "next_row_id": st.next_row_id,
            "rows": rows,
        });
        let text = serde_json::to_string_pretty(&doc)
            .map_err(|e| DbError::Persistence(format!("data encode failed: {e}")))?;
        atomic_write(&data_path(self.data_dir(), table), &text)
    }

    /// Loads every table in the data directory. A schema document that
    /// fails to parse is skipped with a warning so one corrupt table does
    /// not take the database down.
    pub(crate) fn load_all(&mut self) -> DbResult<()> {
        let entries = fs::read_dir(self.data_dir())?;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(table_name) = name.strip_suffix(".schema.json") else {
                continue;
            };
            match load_table(self.data_dir(), table_name) {
                Ok(state) => {
                    self.tables.insert(table_name.to_string(), state);
                }
                Err(err) => {
                    warn!("skipping corrupt schema document {}: {err}", path.display());
                }
            }
        }
        Ok(())
    }
}

fn load_table(dir: &Path, table_name: &str) -> DbResult<TableState> {
    let schema_text = fs::read_to_string(schema_path(dir, table_name))?;
    let table: Table = serde_json::from_str(&schema_text)
        .map_err(|e| DbError::Persistence(format!("schema decode failed: {e}")))?;

    let mut rows = Vec::new();
    let mut next_row_id = 0u64;
    let data_file = data_path(dir, table_name);
    if data_file.exists() {
        let data_text = fs::read_to_string(&data_file)?;
        let doc: serde_json::Value = serde_json::from_str(&data_text)
            .map_err(|e| DbError::Persistence(format!("data decode failed: {e}")))?;
        if let Some(stored) = doc.get("rows").and_then(|r| r.as_array()) {
            for raw in stored {
                let Some(obj) = raw.as_object() else {
                    warn!("skipping malformed row in {}", data_file.display());
                    continue;
                };
                let Some(id) = obj.get("_row_id").and_then(|v| v.as_u64()) else {
                    warn!("skipping row without _row_id in {}", data_file.display());
                    continue;
                };
                rows.push(Row {
                    id,
                    fields: decode_fields(&table, obj),
                });
            }
        }
        next_row_id = doc
            .get("next_row_id")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
    }
    let max_id = rows.iter().map(|r| r.id + 1).max().unwrap_or(0);
    next_row_id = next_row_id.max(max_id);

    let mut indexes = IndexManager::new();
    for col in table.unique_columns() {
        indexes.create(vec![col.name.clone()], None);
    }
    for spec in &table.indexes {
        indexes.create(spec.columns.clone(), Some(spec.name.clone()));
    }
    for row in &rows {
        indexes.insert(&row.fields, row.id);
    }

    Ok(TableState {
        table,
        rows,
        indexes,
        next_row_id,
    })
}

/// Rebuilds a field map from a stored object, re-coercing each value
/// through its column so types (Dates in particular) survive the JSON
/// round trip. A value that no longer converts is kept as decoded.
fn decode_fields(table: &Table, obj: &Map<String, serde_json::Value>) -> Fields {
    let mut fields = Fields::new();
    for col in &table.columns {
        let raw = obj.get(&col.name).cloned().unwrap_or(serde_json::Value::Null);
        let value: Value = serde_json::from_value(raw).unwrap_or(Value::Null);
        let coerced = col.convert(&value).unwrap_or(value);
        fields.push(col.name.clone(), coerced);
    }
    fields
}
