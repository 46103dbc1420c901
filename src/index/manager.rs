use crate::index::{BTreeIndex, IndexKey};
use crate::types::Fields;

/// A named index over one or more columns of a single table.
#[derive(Debug)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub index: BTreeIndex,
}

/// All indexes of one table. Keeps row changes fanned out to every
/// definition; rows with a NULL key component are simply not indexed.
#[derive(Debug, Default)]
pub struct IndexManager {
    defs: Vec<IndexDefinition>,
}

impl IndexManager {
    pub fn new() -> IndexManager {
        IndexManager { defs: Vec::new() }
    }

    /// Registers an index over `columns` and returns its effective name.
    /// An unnamed request for an already indexed column list is a no-op
    /// returning the existing name; an explicitly named request registers a
    /// second definition under that name. Single-column indexes default to
    /// the column name, composite ones to `idx_<a>_<b>`.
    pub fn create(&mut self, columns: Vec<String>, name: Option<String>) -> String {
        match &name {
            Some(requested) => {
                if self.defs.iter().any(|d| &d.name == requested) {
                    return requested.clone();
                }
            }
            None => {
                if let Some(existing) = self.defs.iter().find(|d| d.columns == columns) {
                    return existing.name.clone();
                }
            }
        }
        let name = name.unwrap_or_else(|| {
            if columns.len() == 1 {
                columns[0].clone()
            } else {
                format!("idx_{}", columns.join("_"))
            }
        });
        self.defs.push(IndexDefinition {
            name: name.clone(),
            columns,
            index: BTreeIndex::new(),
        });
        name
    }

    pub fn list(&self) -> &[IndexDefinition] {
        &self.defs
    }

    pub fn by_name(&self, name: &str) -> Option<&IndexDefinition> {
        self.defs.iter().find(|d| d.name == name)
    }

    pub fn for_columns(&self, columns: &[String]) -> Option<&IndexDefinition> {
        self.defs.iter().find(|d| d.columns == columns)
    }

    /// The most specific index whose columns are all bound by equality.
    pub fn best_for(&self, bound: &[String]) -> Option<&IndexDefinition> {
        self.defs
            .iter()
            .filter(|d| d.columns.iter().all(|c| bound.contains(c)))
            .max_by_key(|d| d.columns.len())
    }

    fn build_key(fields: &Fields, columns: &[String]) -> Option<IndexKey> {
        let mut values = Vec::with_capacity(columns.len());
        for col in columns {
            values.push(fields.get(col)?);
        }
        IndexKey::from_values(values)
    }

    /// Adds one row to the named definition only, used to backfill a
    /// freshly created index.
    pub fn insert_into(&mut self, name: &str, fields: &Fields, row_id: u64) {
        if let Some(def) = self.defs.iter_mut().find(|d| d.name == name) {
            if let Some(key) = Self::build_key(fields, &def.columns) {
                def.index.insert(key, row_id);
            }
        }
    }

    pub fn insert(&mut self, fields: &Fields, row_id: u64) {
        for def in &mut self.defs {
            if let Some(key) = Self::build_key(fields, &def.columns) {
                def.index.insert(key, row_id);
            }
        }
    }

    pub fn delete(&mut self, fields: &Fields, row_id: u64) {
        for def in &mut self.defs {
            if let Some(key) = Self::build_key(fields, &def.columns) {
                def.index.delete(&key, row_id);
            }
        }
    }

    /// Applies an in-place row change: the old key comes out, the new key
    /// goes in, each side skipped when its key has a NULL component.
    pub fn update(&mut self, old: &Fields, new: &Fields, row_id: u64) {
        for def in &mut self.defs {
            let old_key = Self::build_key(old, &def.columns);
            let new_key = Self::build_key(new, &def.columns);
            if old_key == new_key {
                continue;
            }
            if let Some(key) = old_key {
                def.index.delete(&key, row_id);
            }
            if let Some(key) = new_key {
                def.index.insert(key, row_id);
            }
        }
    }
}
