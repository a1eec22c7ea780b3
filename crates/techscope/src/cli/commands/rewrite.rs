use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::models::Envelope;
use crate::rewrite::{PatternRewriter, QueryRewriter};

#[derive(Debug, Clone, Args)]
pub struct RewriteArgs {
    #[arg(value_name = "SQL")]
    pub sql: String,
}

pub fn run(args: &RewriteArgs) -> Result<()> {
    let rewriter = PatternRewriter::default();
    let rewritten = rewriter.rewrite(&args.sql);
    let columns = rewriter.projected_columns(&rewritten);
    let changed = rewritten != args.sql.as_str();

    let envelope = Envelope::ok(
        "rewrite",
        json!({
            "input": args.sql,
            "rewritten": rewritten,
            "changed": changed,
            "projected_columns": columns,
        }),
    );
    println!("{}", envelope.to_json()?);
    Ok(())
}
