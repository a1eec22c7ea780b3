use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::prepared_database;
use crate::config::{RuntimePaths, ToolSettings};
use crate::models::Envelope;
use crate::sqlite::SQLITE_SCHEMA_VERSION;

#[derive(Debug, Clone, Args)]
pub struct InitArgs {}

pub fn run(_args: &InitArgs, runtime_paths: &RuntimePaths, settings: &ToolSettings) -> Result<()> {
    let database = prepared_database(runtime_paths, settings)?;
    tracing::info!(path = %database.path().display(), "sqlite schema ready");

    let envelope = Envelope::ok(
        "init",
        json!({
            "database_path": database.path().display().to_string(),
            "schema_version": SQLITE_SCHEMA_VERSION,
        }),
    );
    println!("{}", envelope.to_json()?);
    Ok(())
}
