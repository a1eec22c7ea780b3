use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NO_RESULTS_MESSAGE: &str = "No results found in the database. Please try another query.";
pub const NO_VALID_RESULTS_MESSAGE: &str = "No valid results returned from the database.";

/// Arguments of the single tool the agent may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteQueryInput {
    /// One read-only SQL SELECT statement over companies, tools and company_tools.
    pub query: String,
}

/// Function-calling tool definition handed to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What one tool invocation produced. Only `Rows` carries data; every other
/// variant is guidance the calling agent reads before deciding to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Rows(String),
    NoResults,
    DecodeFailed { raw: String },
    Malformed,
    Rejected { reason: String },
    ExecutionFailed { detail: String },
    DeadlineExceeded { deadline_ms: u64 },
    InvalidArguments { detail: String },
}

impl ToolOutcome {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::NoResults => "no_results",
            Self::DecodeFailed { .. } => "decode_failed",
            Self::Malformed => "malformed",
            Self::Rejected { .. } => "rejected",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::InvalidArguments { .. } => "invalid_arguments",
        }
    }
}

impl Display for ToolOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows(text) => f.write_str(text),
            Self::NoResults => f.write_str(NO_RESULTS_MESSAGE),
            Self::DecodeFailed { raw } => write!(
                f,
                "Error parsing database result: {raw}. Please refine the query."
            ),
            Self::Malformed => f.write_str(NO_VALID_RESULTS_MESSAGE),
            Self::Rejected { reason } => write!(
                f,
                "Query rejected: {reason}. Only a single read-only SELECT statement is allowed."
            ),
            Self::ExecutionFailed { detail } => write!(
                f,
                "Error executing query: {detail}. Please refine the query."
            ),
            Self::DeadlineExceeded { deadline_ms } => write!(
                f,
                "Query exceeded the {deadline_ms} ms execution deadline. Please try a narrower query."
            ),
            Self::InvalidArguments { detail } => write!(
                f,
                "Invalid tool arguments: {detail}. Pass a JSON object with a single `query` string."
            ),
        }
    }
}
