#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use techscope::cli::app::{Cli, Command, RuntimeArgs};
use techscope::cli::commands;
use techscope::config::{RuntimePaths, ToolSettings};
use techscope::models::EnvelopeFailure;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_COMMAND_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    if let Err(error) = techscope::logging::init_logging(&cli.runtime.log_level) {
        eprintln!("techscope: {error:#}");
        return EXIT_USAGE_ERROR;
    }

    let command_name = command_name(&cli.command);
    tracing::info!("techscope: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            tracing::info!("techscope: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            tracing::error!("techscope: failed `{command_name}` (exit_code={exit_code})");
            match error.downcast_ref::<EnvelopeFailure>() {
                Some(failure) => println!("{failure}"),
                None => eprintln!("{error:#}"),
            }
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let settings = ToolSettings::default();
    match cli.command {
        Command::Init(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::init::run(&args, &runtime_paths, &settings)
        }
        Command::Query(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::query::run(&args, &runtime_paths, &settings)
        }
        Command::Rewrite(args) => commands::rewrite::run(&args),
        Command::Schema(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::schema::run(&args, &runtime_paths, &settings)
        }
        Command::ToolSpec(args) => commands::tool_spec::run(&args),
        Command::Session(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::session::run(&args, &runtime_paths, &settings)
        }
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<EnvelopeFailure>().is_some() {
        EXIT_COMMAND_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init(_) => "init",
        Command::Query(_) => "query",
        Command::Rewrite(_) => "rewrite",
        Command::Schema(_) => "schema",
        Command::ToolSpec(_) => "tool-spec",
        Command::Session(_) => "session",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    techscope::config::resolve_runtime_paths(&home_dir, &cwd, args.database.as_deref())
}
