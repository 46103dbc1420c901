//! The storage manager: table lifecycle, row CRUD, constraint enforcement
//! and index maintenance for one database directory.

pub mod persist;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{DbError, DbResult};
use crate::index::{IndexKey, IndexManager};
use crate::schema::{IndexSpec, Table};
use crate::sql::ast::{LogicOp, Predicate};
use crate::types::{Fields, FkAction, Value};

/// A stored row: the internal id plus the schema-ordered field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u64,
    pub fields: Fields,
}

#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) table: Table,
    pub(crate) rows: Vec<Row>,
    pub(crate) indexes: IndexManager,
    pub(crate) next_row_id: u64,
}

#[derive(Debug)]
pub struct Storage {
    data_dir: PathBuf,
    tables: HashMap<String, TableState>,
}

impl Storage {
    /// Opens (creating if necessary) a database directory and loads every
    /// table found in it. Corrupt schema documents are skipped with a
    /// warning rather than failing the whole database.
    pub fn open(data_dir: impl AsRef<Path>) -> DbResult<Storage> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        let mut storage = Storage {
            data_dir,
            tables: HashMap::new(),
        };
        storage.load_all()?;
        Ok(storage)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub(crate) fn state(&self, table: &str) -> DbResult<&TableState> {
        self.tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    fn state_mut(&mut self, table: &str) -> DbResult<&mut TableState> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    pub fn table(&self, name: &str) -> DbResult<&Table> {
        Ok(&self.state(name)?.table)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn row_count(&self, table: &str) -> DbResult<usize> {
        Ok(self.state(table)?.rows.len())
    }

    /// Rows with their internal ids, for executors that need id-addressed
    /// access (joins through an index).
    pub fn table_rows(&self, table: &str) -> DbResult<&[Row]> {
        Ok(&self.state(table)?.rows)
    }

    pub fn index_manager(&self, table: &str) -> DbResult<&IndexManager> {
        Ok(&self.state(table)?.indexes)
    }

    /// Registers a new table and persists its schema document. The primary
    /// key and every unique column get an index immediately.
    pub fn create_table(&mut self, table: Table) -> DbResult<()> {
        if self.tables.contains_key(&table.name) {
            return Err(DbError::Constraint(format!(
                "table '{}' already exists",
                table.name
            )));
        }
        let mut indexes = IndexManager::new();
        for col in table.unique_columns() {
            indexes.create(vec![col.name.clone()], None);
        }
        let name = table.name.clone();
        self.tables.insert(
            name.clone(),
            TableState {
                table,
                rows: Vec::new(),
                indexes,
                next_row_id: 0,
            },
        );
        self.save_table_schema(&name)
    }

    /// Builds a secondary index, backfills it from existing rows, records
    /// it in the schema document and returns its name. An unnamed request
    /// for columns that already carry an index is a no-op returning the
    /// existing name; an explicitly named request always registers the
    /// requested name, even alongside an automatic one.
    pub fn create_index(
        &mut self,
        table: &str,
        columns: &[String],
        name: Option<&str>,
    ) -> DbResult<String> {
        {
            let st = self.state(table)?;
            for col in columns {
                if st.table.column(col).is_none() {
                    return Err(DbError::ColumnNotFound(col.clone()));
                }
            }
            if let Some(name) = name {
                if let Some(existing) = st.indexes.by_name(name) {
                    if existing.columns != columns {
                        return Err(DbError::Constraint(format!(
                            "index '{name}' already exists on {table}"
                        )));
                    }
                }
            }
        }
        let st = self.state_mut(table)?;
        let before = st.indexes.list().len();
        let index_name = st
            .indexes
            .create(columns.to_vec(), name.map(str::to_string));
        let created = st.indexes.list().len() > before;
        if created {
            let rows: Vec<(Fields, u64)> = st
                .rows
                .iter()
                .map(|r| (r.fields.clone(), r.id))
                .collect();
            for (fields, id) in rows {
                st.indexes.insert_into(&index_name, &fields, id);
            }
            let spec_known = st
                .table
                .indexes
                .iter()
                .any(|s| s.name == index_name);
            if !spec_known {
                st.table.indexes.push(IndexSpec {
                    name: index_name.clone(),
                    columns: columns.to_vec(),
                });
            }
            self.save_table_schema(table)?;
        }
        Ok(index_name)
    }

    /// Validates, appends and indexes one row, then persists the table.
    /// If persisting fails the append is rolled back: the row and its index
    /// entries are removed and the id counter rewound when no newer id has
    /// been handed out.
    pub fn insert_row(&mut self, table: &str, input: HashMap<String, Value>) -> DbResult<u64> {
        let schema = self.state(table)?.table.clone();
        for col in schema.generated_columns() {
            if input.contains_key(&col.name) {
                return Err(DbError::Validation(format!(
                    "cannot insert into generated column '{}'",
                    col.name
                )));
            }
        }
        let fields = schema.validate_row(&input)?;
        self.check_unique(table, &fields, None)?;
        self.check_foreign_keys(&schema, &fields)?;
        let st = self.state_mut(table)?;
        let row_id = st.next_row_id;
        st.next_row_id += 1;
        st.rows.push(Row {
            id: row_id,
            fields: fields.clone(),
        });
        st.indexes.insert(&fields, row_id);
        debug!("insert into '{}' assigned row id {}", table, row_id);
        if let Err(err) = self.save_table_data(table) {
            if let Ok(st) = self.state_mut(table) {
                st.indexes.delete(&fields, row_id);
                st.rows.retain(|r| r.id != row_id);
                if st.next_row_id == row_id + 1 {
                    st.next_row_id = row_id;
                }
            }
            return Err(err);
        }
        Ok(row_id)
    }

    /// Reads rows matching the predicate (all rows when `None`). When the
    /// predicate flattens to an all-AND equality chain covered by an index,
    /// candidate rows come from the index and the full predicate is still
    /// applied as a residual filter.
    pub fn select_rows(
        &self,
        table: &str,
        condition: Option<&Predicate>,
    ) -> DbResult<Vec<Fields>> {
        let st = self.state(table)?;
        let Some(pred) = condition else {
            return Ok(st.rows.iter().map(|r| r.fields.clone()).collect());
        };
        if let Some(ids) = self.index_candidates(st, pred) {
            debug!(
                "select on '{}' using index lookup ({} candidates)",
                table,
                ids.len()
            );
            return Ok(st
                .rows
                .iter()
                .filter(|r| ids.contains(&r.id))
                .filter(|r| Self::matches(&st.table, &r.fields, pred))
                .map(|r| r.fields.clone())
                .collect());
        }
        Ok(st
            .rows
            .iter()
            .filter(|r| Self::matches(&st.table, &r.fields, pred))
            .map(|r| r.fields.clone())
            .collect())
    }

    /// Row ids fetched through the most specific usable index, or `None`
    /// when the predicate cannot use one.
    fn index_candidates(&self, st: &TableState, pred: &Predicate) -> Option<HashSet<u64>> {
        let bindings = pred.equality_bindings()?;
        let bound: Vec<String> = bindings.iter().map(|(c, _)| c.to_string()).collect();
        let def = st.indexes.best_for(&bound)?;
        let mut key_values = Vec::with_capacity(def.columns.len());
        for col in &def.columns {
            let (_, raw) = bindings.iter().find(|(c, _)| c == col)?;
            let value = st
                .table
                .column(col)
                .and_then(|c| c.convert(raw).ok())
                .unwrap_or_else(|| (*raw).clone());
            key_values.push(value);
        }
        let key = IndexKey::from_values(key_values.iter())?;
        Some(def.index.search(&key).into_iter().collect())
    }

    /// Evaluates a predicate against one row. Literals are coerced through
    /// the column's type first; a reference to a column the row does not
    /// carry is simply false. AND/OR chains fold strictly left to right.
    pub fn matches(table: &Table, fields: &Fields, pred: &Predicate) -> bool {
        match pred {
            Predicate::Compare { column, op, value } => {
                let Some(actual) = fields.get(column) else {
                    return false;
                };
                let expected = table
                    .column(column)
                    .and_then(|c| c.convert(value).ok())
                    .unwrap_or_else(|| value.clone());
                op.evaluate(actual, &expected)
            }
            Predicate::Chain {
                conditions,
                operators,
            } => {
                let mut iter = conditions.iter();
                let mut result = iter
                    .next()
                    .map(|c| Self::matches(table, fields, c))
                    .unwrap_or(true);
                for (cond, op) in iter.zip(operators) {
                    let next = Self::matches(table, fields, cond);
                    result = match op {
                        LogicOp::And => result && next,
                        LogicOp::Or => result || next,
                    };
                }
                result
            }
        }
    }

    /// Full-scan update. Each matching row is revalidated (generated
    /// columns recomputed), checked against unique and foreign-key
    /// constraints, and its index entries moved.
    pub fn update_rows(
        &mut self,
        table: &str,
        assignments: &[(String, Value)],
        condition: Option<&Predicate>,
    ) -> DbResult<usize> {
        let schema = self.state(table)?.table.clone();
        for (col, _) in assignments {
            let def = schema
                .column(col)
                .ok_or_else(|| DbError::ColumnNotFound(col.clone()))?;
            if def.generated.is_some() {
                return Err(DbError::Validation(format!(
                    "cannot assign to generated column '{col}'"
                )));
            }
        }
        let target_ids: Vec<u64> = {
            let st = self.state(table)?;
            st.rows
                .iter()
                .filter(|r| {
                    condition.map_or(true, |p| Self::matches(&st.table, &r.fields, p))
                })
                .map(|r| r.id)
                .collect()
        };
        for row_id in &target_ids {
            let old_fields = {
                let st = self.state(table)?;
                st.rows
                    .iter()
                    .find(|r| r.id == *row_id)
                    .map(|r| r.fields.clone())
                    .ok_or_else(|| DbError::TableNotFound(table.to_string()))?
            };
            let mut input: HashMap<String, Value> = HashMap::new();
            for col in &schema.columns {
                if col.generated.is_none() {
                    if let Some(v) = old_fields.get(&col.name) {
                        input.insert(col.name.clone(), v.clone());
                    }
                }
            }
            for (col, value) in assignments {
                input.insert(col.clone(), value.clone());
            }
            let new_fields = schema.validate_row(&input)?;
            self.check_unique(table, &new_fields, Some(*row_id))?;
            self.check_foreign_keys(&schema, &new_fields)?;
            let st = self.state_mut(table)?;
            st.indexes.update(&old_fields, &new_fields, *row_id);
            if let Some(row) = st.rows.iter_mut().find(|r| r.id == *row_id) {
                row.fields = new_fields;
            }
        }
        if !target_ids.is_empty() {
            self.save_table_data(table)?;
        }
        Ok(target_ids.len())
    }

    /// Full-scan delete with referential actions. The whole cascade closure
    /// is validated first; only when no RESTRICT or NOT NULL target blocks
    /// the delete are the ON DELETE actions applied and the parent rows
    /// removed.
    pub fn delete_rows(
        &mut self,
        table: &str,
        condition: Option<&Predicate>,
    ) -> DbResult<usize> {
        let doomed: Vec<(u64, Fields)> = {
            let st = self.state(table)?;
            st.rows
                .iter()
                .filter(|r| {
                    condition.map_or(true, |p| Self::matches(&st.table, &r.fields, p))
                })
                .map(|r| (r.id, r.fields.clone()))
                .collect()
        };
        if doomed.is_empty() {
            return Ok(0);
        }
        let mut seen = Vec::new();
        self.validate_referential_actions(table, &doomed, &mut seen)?;
        self.apply_referential_actions(table, &doomed)?;
        let st = self.state_mut(table)?;
        let ids: HashSet<u64> = doomed.iter().map(|(id, _)| *id).collect();
        for (id, fields) in &doomed {
            st.indexes.delete(fields, *id);
        }
        st.rows.retain(|r| !ids.contains(&r.id));
        self.save_table_data(table)?;
        Ok(doomed.len())
    }

    /// Walks the cascade closure of a delete without mutating anything and
    /// fails on the first RESTRICT reference or SET NULL into a NOT NULL
    /// column, whichever table it sits in. `seen` tracks visited foreign-key
    /// edges so self-referencing chains terminate.
    fn validate_referential_actions(
        &self,
        table: &str,
        doomed: &[(u64, Fields)],
        seen: &mut Vec<(String, String)>,
    ) -> DbResult<()> {
        for (child_name, child_state) in &self.tables {
            if child_name.as_str() == table {
                continue;
            }
            for col in &child_state.table.columns {
                let Some(fk) = &col.foreign_key else { continue };
                if fk.table != table {
                    continue;
                }
                let edge = (child_name.clone(), col.name.clone());
                if seen.contains(&edge) {
                    continue;
                }
                let values = referenced_values(doomed, &fk.column);
                if values.is_empty() {
                    continue;
                }
                let referencing: Vec<(u64, Fields)> = child_state
                    .rows
                    .iter()
                    .filter(|r| {
                        r.fields
                            .get(&col.name)
                            .is_some_and(|v| values.contains(v))
                    })
                    .map(|r| (r.id, r.fields.clone()))
                    .collect();
                if referencing.is_empty() {
                    continue;
                }
                match fk.on_delete {
                    FkAction::Restrict => {
                        return Err(DbError::ReferentialIntegrity(format!(
                            "cannot delete from '{table}': rows are referenced by {child_name}.{}",
                            col.name
                        )));
                    }
                    FkAction::SetNull => {
                        if col.not_null {
                            return Err(DbError::ReferentialIntegrity(format!(
                                "cannot set {child_name}.{} to NULL: column is NOT NULL",
                                col.name
                            )));
                        }
                    }
                    FkAction::Cascade => {
                        seen.push(edge);
                        self.validate_referential_actions(child_name, &referencing, seen)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_referential_actions(
        &mut self,
        table: &str,
        doomed: &[(u64, Fields)],
    ) -> DbResult<()> {
        let children: Vec<(String, Table)> = self
            .tables
            .iter()
            .filter(|(name, _)| name.as_str() != table)
            .map(|(name, st)| (name.clone(), st.table.clone()))
            .collect();
        for (child_name, child_schema) in children {
            for col in &child_schema.columns {
                let Some(fk) = &col.foreign_key else { continue };
                if fk.table != table {
                    continue;
                }
                let values = referenced_values(doomed, &fk.column);
                if values.is_empty() {
                    continue;
                }
                let referenced = {
                    let st = self.state(&child_name)?;
                    st.rows.iter().any(|r| {
                        r.fields
                            .get(&col.name)
                            .is_some_and(|v| values.contains(v))
                    })
                };
                if !referenced {
                    continue;
                }
                match fk.on_delete {
                    FkAction::Restrict => {
                        return Err(DbError::ReferentialIntegrity(format!(
                            "cannot delete from '{table}': rows are referenced by {child_name}.{}",
                            col.name
                        )));
                    }
                    FkAction::Cascade => {
                        let pred = equality_chain(&col.name, &values);
                        debug!(
                            "cascade delete from '{}' via {}.{}",
                            child_name, child_name, col.name
                        );
                        self.delete_rows(&child_name, Some(&pred))?;
                    }
                    FkAction::SetNull => {
                        if col.not_null {
                            return Err(DbError::ReferentialIntegrity(format!(
                                "cannot set {child_name}.{} to NULL: column is NOT NULL",
                                col.name
                            )));
                        }
                        let st = self.state_mut(&child_name)?;
                        let mut changed = false;
                        let row_ids: Vec<u64> = st
                            .rows
                            .iter()
                            .filter(|r| {
                                r.fields
                                    .get(&col.name)
                                    .is_some_and(|v| values.contains(v))
                            })
                            .map(|r| r.id)
                            .collect();
                        for row_id in row_ids {
                            if let Some(row) =
                                st.rows.iter_mut().find(|r| r.id == row_id)
                            {
                                let old = row.fields.clone();
                                row.fields.set(&col.name, Value::Null);
                                let new = row.fields.clone();
                                st.indexes.update(&old, &new, row_id);
                                changed = true;
                            }
                        }
                        if changed {
                            self.save_table_data(&child_name)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Linear scan enforcing unique/primary-key columns. NULL values never
    /// collide; `exclude` skips the row being updated.
    fn check_unique(
        &self,
        table: &str,
        fields: &Fields,
        exclude: Option<u64>,
    ) -> DbResult<()> {
        let st = self.state(table)?;
        for col in st.table.unique_columns() {
            let Some(value) = fields.get(&col.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let clash = st.rows.iter().any(|r| {
                exclude != Some(r.id) && r.fields.get(&col.name) == Some(value)
            });
            if clash {
                let kind = if col.primary_key { "primary key" } else { "unique" };
                return Err(DbError::Constraint(format!(
                    "{kind} constraint violation: column '{}' already contains {value}",
                    col.name
                )));
            }
        }
        Ok(())
    }

    /// Every non-NULL foreign-key value must exist in the referenced
    /// table's referenced column.
    fn check_foreign_keys(&self, schema: &Table, fields: &Fields) -> DbResult<()> {
        for col in &schema.columns {
            let Some(fk) = &col.foreign_key else { continue };
            let Some(value) = fields.get(&col.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let parent = self.tables.get(&fk.table).ok_or_else(|| {
                DbError::Constraint(format!(
                    "foreign key constraint violation: referenced table '{}' does not exist",
                    fk.table
                ))
            })?;
            let found = parent
                .rows
                .iter()
                .any(|r| r.fields.get(&fk.column) == Some(value));
            if !found {
                return Err(DbError::Constraint(format!(
                    "foreign key constraint violation: value {value} does not exist in {}.{}",
                    fk.table, fk.column
                )));
            }
        }
        Ok(())
    }
}

/// Distinct non-NULL values the doomed rows carry in the referenced column.
fn referenced_values(doomed: &[(u64, Fields)], column: &str) -> Vec<Value> {
    let mut values: Vec<Value> = Vec::new();
    for (_, fields) in doomed {
        if let Some(v) = fields.get(column) {
            if !v.is_null() && !values.contains(v) {
                values.push(v.clone());
            }
        }
    }
    values
}

/// Builds `col = v1 OR col = v2 OR ...` for cascade fan-out.
fn equality_chain(column: &str, values: &[Value]) -> Predicate {
    use crate::sql::ast::CompareOp;
    if values.len() == 1 {
        return Predicate::Compare {
            column: column.to_string(),
            op: CompareOp::Equals,
            value: values[0].clone(),
        };
    }
    Predicate::Chain {
        conditions: values
            .iter()
            .map(|v| Predicate::Compare {
                column: column.to_string(),
                op: CompareOp::Equals,
                value: v.clone(),
            })
            .collect(),
        operators: vec![LogicOp::Or; values.len() - 1],
    }
}
