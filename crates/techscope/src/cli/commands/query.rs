use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::database_for;
use crate::config::{RuntimePaths, ToolSettings};
use crate::models::Envelope;
use crate::schema::SchemaRegistry;
use crate::sqlite::SqliteQueryBackend;
use crate::tool::QueryTool;

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,

    /// Wrap the tool text in a JSON envelope with the outcome kind.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long, value_name = "MS")]
    pub query_deadline_ms: Option<u64>,
}

pub fn run(args: &QueryArgs, runtime_paths: &RuntimePaths, settings: &ToolSettings) -> Result<()> {
    let settings = settings.with_query_deadline_ms(args.query_deadline_ms);
    let backend = SqliteQueryBackend::new(database_for(runtime_paths, &settings))
        .with_deadline(settings.query_deadline);
    let tool = QueryTool::new(backend, SchemaRegistry::technographics());

    let outcome = tool.evaluate(&args.sql)?;
    if !args.json {
        println!("{outcome}");
        return Ok(());
    }

    let envelope = Envelope::ok(
        "query",
        json!({
            "outcome": outcome.kind(),
            "text": outcome.to_string(),
        }),
    )
    .with_meta(
        "query_deadline_ms",
        json!(settings.query_deadline.as_millis() as u64),
    );
    println!("{}", envelope.to_json()?);
    Ok(())
}
