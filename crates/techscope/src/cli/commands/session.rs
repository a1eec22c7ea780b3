use anyhow::{Context, Error, Result};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;

use super::prepared_database;
use crate::config::{RuntimePaths, ToolSettings};
use crate::models::{Envelope, EnvelopeFailure, MessageRole};
use crate::session::SessionStore;

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SessionCommand {
    Show(SessionShowArgs),
    Append(SessionAppendArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SessionShowArgs {
    #[arg(value_name = "SESSION_ID")]
    pub session_id: String,
}

#[derive(Debug, Clone, Args)]
pub struct SessionAppendArgs {
    #[arg(value_name = "SESSION_ID")]
    pub session_id: String,

    #[arg(long, value_enum)]
    pub role: RoleArg,

    #[arg(value_name = "CONTENT", allow_hyphen_values = true)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Human,
    Ai,
}

impl From<RoleArg> for MessageRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Human => Self::Human,
            RoleArg::Ai => Self::Ai,
        }
    }
}

pub fn run(args: &SessionArgs, runtime_paths: &RuntimePaths, settings: &ToolSettings) -> Result<()> {
    let store = SessionStore::new(prepared_database(runtime_paths, settings)?);
    match &args.command {
        SessionCommand::Show(show_args) => run_show(&store, show_args),
        SessionCommand::Append(append_args) => run_append(&store, append_args),
    }
}

fn run_show(store: &SessionStore, args: &SessionShowArgs) -> Result<()> {
    let Some(session) = store.session(&args.session_id)? else {
        let envelope = Envelope::error(
            "session.show",
            "session_not_found",
            format!("session `{}` does not exist", args.session_id),
        )
        .with_error_details(json!({ "session_id": args.session_id }));
        return Err(Error::new(EnvelopeFailure::new(envelope)));
    };
    let history = store.load_history(&args.session_id)?;
    let message_count = history.len();

    let envelope = Envelope::ok(
        "session.show",
        json!({
            "session": session,
            "messages": history,
        }),
    )
    .with_meta("message_count", json!(message_count));
    println!("{}", envelope.to_json()?);
    Ok(())
}

fn run_append(store: &SessionStore, args: &SessionAppendArgs) -> Result<()> {
    let message = store
        .append_message(&args.session_id, args.role.into(), &args.content)
        .with_context(|| format!("failed to append to session `{}`", args.session_id))?;
    let title = store.session_title(&args.session_id)?;

    let envelope = Envelope::ok(
        "session.append",
        json!({
            "message": message,
            "title": title,
        }),
    );
    println!("{}", envelope.to_json()?);
    Ok(())
}
