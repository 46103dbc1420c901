//! Multi-database support: maps validated database names to subdirectories
//! of an explicit base directory. No ambient or global state; callers hand
//! the base directory in.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{DbError, DbResult};
use crate::storage::Storage;

#[derive(Debug)]
pub struct DatabaseManager {
    base_dir: PathBuf,
}

fn validate_name(name: &str) -> DbResult<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(DbError::Validation(format!(
            "invalid database name '{name}'"
        )))
    }
}

impl DatabaseManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> DbResult<DatabaseManager> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(DatabaseManager { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn database_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    pub fn database_exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.database_path(name).is_dir()
    }

    pub fn create_database(&mut self, name: &str) -> DbResult<()> {
        validate_name(name)?;
        let path = self.database_path(name);
        if path.is_dir() {
            return Err(DbError::Constraint(format!(
                "database '{name}' already exists"
            )));
        }
        fs::create_dir_all(&path)?;
        debug!("created database '{}' at {}", name, path.display());
        Ok(())
    }

    pub fn drop_database(&mut self, name: &str) -> DbResult<()> {
        validate_name(name)?;
        let path = self.database_path(name);
        if !path.is_dir() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        fs::remove_dir_all(&path)?;
        debug!("dropped database '{}'", name);
        Ok(())
    }

    pub fn list_databases(&self) -> DbResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn open_storage(&self, name: &str) -> DbResult<Storage> {
        validate_name(name)?;
        let path = self.database_path(name);
        if !path.is_dir() {
            return Err(DbError::DatabaseNotFound(name.to_string()));
        }
        Storage::open(path)
    }
}
