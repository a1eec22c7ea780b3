pub mod init;
pub mod query;
pub mod rewrite;
pub mod schema;
pub mod session;
pub mod tool_spec;

use anyhow::Result;

use crate::config::{RuntimePaths, ToolSettings};
use crate::sqlite::{Database, ensure_sqlite_schema};

pub(crate) fn database_for(runtime_paths: &RuntimePaths, settings: &ToolSettings) -> Database {
    Database::new(&runtime_paths.database_path).with_busy_timeout(settings.busy_timeout)
}

/// Opens the store read-write and makes sure every table exists.
pub(crate) fn prepared_database(
    runtime_paths: &RuntimePaths,
    settings: &ToolSettings,
) -> Result<Database> {
    let database = database_for(runtime_paths, settings);
    let connection = database.open()?;
    ensure_sqlite_schema(&connection)?;
    Ok(database)
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    println!("{encoded}");
    Ok(())
}
