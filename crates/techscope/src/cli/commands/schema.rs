use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use super::database_for;
use crate::config::{RuntimePaths, ToolSettings};
use crate::models::Envelope;
use crate::schema::{COMPANIES_TABLE, COMPANY_TOOLS_TABLE, SchemaRegistry, TOOLS_TABLE};

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {
    /// Read columns from the database instead of the built-in registry.
    #[arg(long, default_value_t = false)]
    pub from_database: bool,
}

pub fn run(args: &SchemaArgs, runtime_paths: &RuntimePaths, settings: &ToolSettings) -> Result<()> {
    let (registry, source) = if args.from_database {
        let connection = database_for(runtime_paths, settings).open_read_only()?;
        let registry = SchemaRegistry::from_connection(
            &connection,
            &[COMPANIES_TABLE, TOOLS_TABLE, COMPANY_TOOLS_TABLE],
        )
        .context("failed to introspect dataset tables")?;
        (registry, "database")
    } else {
        (SchemaRegistry::technographics(), "builtin")
    };

    let tables = serde_json::to_value(&registry).context("failed to encode schema registry")?;
    let envelope = Envelope::ok("schema", tables).with_meta("source", json!(source));
    println!("{}", envelope.to_json()?);
    Ok(())
}
