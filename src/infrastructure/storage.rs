use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::fs;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Opens the database at `path`, creating missing parent directories, and
/// applies the schema. Every statement is `IF NOT EXISTS`, so re-running
/// against an existing database is a no-op.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
