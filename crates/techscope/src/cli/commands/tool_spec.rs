use anyhow::Result;
use clap::Args;

use super::print_json;
use crate::tool::tool_definition;

#[derive(Debug, Clone, Args)]
pub struct ToolSpecArgs {}

pub fn run(_args: &ToolSpecArgs) -> Result<()> {
    print_json(&tool_definition()?)
}
