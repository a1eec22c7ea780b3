use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    init::InitArgs, query::QueryArgs, rewrite::RewriteArgs, schema::SchemaArgs,
    session::SessionArgs, tool_spec::ToolSpecArgs,
};
use crate::logging::DEFAULT_LOG_LEVEL;

#[derive(Debug, Parser)]
#[command(
    name = "techscope",
    version,
    about = "Read-only SQL tool and chat session store for technographics questions"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the dataset and session tables.
    Init(InitArgs),
    /// Run one statement through the query tool.
    Query(QueryArgs),
    /// Show how a statement would be rewritten and labeled.
    Rewrite(RewriteArgs),
    /// Print the schema registry.
    Schema(SchemaArgs),
    /// Print the function-calling definition of the query tool.
    ToolSpec(ToolSpecArgs),
    /// Inspect or append to a chat session.
    Session(SessionArgs),
}
