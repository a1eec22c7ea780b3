//! The one capability the agent may invoke: run a read-only query and get
//! text back.
//!
//! Query-content problems (wildcards, empty results, undecodable or
//! malformed rows, statements the store refuses) always come back as text
//! the agent can react to. Only infrastructure failures surface as `Err`.

use std::fmt::{Display, Formatter};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{ExecuteQueryInput, ResultRow, SqlScalar, ToolDefinition, ToolOutcome};
use crate::normalize::normalize_rows;
use crate::rewrite::{PatternRewriter, QueryRewriter};
use crate::schema::SchemaRegistry;

pub const TOOL_NAME: &str = "sql_tool";

const TOOL_DESCRIPTION: &str = "Executes one read-only SQL SELECT statement against the \
companies, tools and company_tools tables and returns the rows as a JSON array of arrays. \
Name the columns you need explicitly; `SELECT *` is rewritten to the table's column list. \
When the result is a message instead of rows, read it and try a different query.";

/// What the store handed back before decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Rows(Vec<ResultRow>),
    Text(String),
}

impl RawResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Rows(rows) => rows.is_empty(),
            Self::Text(text) => text.trim().is_empty(),
        }
    }
}

/// Executes statements on behalf of the tool. Implementations report
/// statements they refuse or cannot run as [`StatementFailure`] inside the
/// returned error; any other error is treated as the store being down.
pub trait QueryBackend {
    fn run(&self, sql: &str) -> Result<RawResult>;
}

impl<T: QueryBackend + ?Sized> QueryBackend for &T {
    fn run(&self, sql: &str) -> Result<RawResult> {
        (**self).run(sql)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFailureKind {
    Rejected,
    Invalid,
    DeadlineExceeded { deadline_ms: u64 },
}

/// A statement-level failure the agent can fix by writing a different query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    pub kind: StatementFailureKind,
    pub detail: String,
}

impl StatementFailure {
    #[must_use]
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            kind: StatementFailureKind::Rejected,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn invalid(detail: impl Into<String>) -> Self {
        Self {
            kind: StatementFailureKind::Invalid,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn deadline_exceeded(deadline_ms: u64) -> Self {
        Self {
            kind: StatementFailureKind::DeadlineExceeded { deadline_ms },
            detail: format!("statement interrupted after {deadline_ms} ms"),
        }
    }

    #[must_use]
    pub fn to_outcome(&self) -> ToolOutcome {
        match self.kind {
            StatementFailureKind::Rejected => ToolOutcome::Rejected {
                reason: self.detail.clone(),
            },
            StatementFailureKind::Invalid => ToolOutcome::ExecutionFailed {
                detail: self.detail.clone(),
            },
            StatementFailureKind::DeadlineExceeded { deadline_ms } => {
                ToolOutcome::DeadlineExceeded { deadline_ms }
            }
        }
    }
}

impl Display for StatementFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for StatementFailure {}

/// Object-safe view of the tool for orchestration code.
pub trait ToolInvoker {
    fn execute_query(&self, sql: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct QueryTool<B, R = PatternRewriter> {
    backend: B,
    rewriter: R,
}

impl<B: QueryBackend> QueryTool<B> {
    #[must_use]
    pub fn new(backend: B, registry: SchemaRegistry) -> Self {
        Self::with_rewriter(backend, PatternRewriter::new(registry))
    }
}

impl<B: QueryBackend, R: QueryRewriter> QueryTool<B, R> {
    #[must_use]
    pub fn with_rewriter(backend: B, rewriter: R) -> Self {
        Self { backend, rewriter }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Rewrites, executes and normalizes one statement. `Err` means the
    /// store itself failed; every query-content problem is an outcome.
    pub fn evaluate(&self, sql: &str) -> Result<ToolOutcome> {
        let rewritten = self.rewriter.rewrite(sql);
        tracing::debug!(query = sql, rewritten = %rewritten, "executing tool query");

        let raw = match self.backend.run(&rewritten) {
            Ok(raw) => raw,
            Err(error) => {
                if let Some(failure) = error.downcast_ref::<StatementFailure>() {
                    tracing::info!(%failure, "store refused tool query");
                    return Ok(failure.to_outcome());
                }
                return Err(error.context("tool query execution failed"));
            }
        };

        if raw.is_empty() {
            tracing::info!("tool query returned no rows");
            return Ok(ToolOutcome::NoResults);
        }

        let columns = self.rewriter.projected_columns(&rewritten);
        let rows = match raw {
            RawResult::Rows(rows) => rows,
            RawResult::Text(text) => match decode_result_text(&text) {
                Ok(rows) => rows,
                Err(DecodeError::Unparsable) => {
                    tracing::warn!(raw = %text, "tool query result could not be decoded");
                    return Ok(ToolOutcome::DecodeFailed { raw: text });
                }
                Err(DecodeError::NotRows) => return Ok(ToolOutcome::Malformed),
            },
        };

        match normalize_rows(&columns, rows) {
            Ok(normalized) => {
                tracing::info!(rows = normalized.row_count(), "tool query returned rows");
                Ok(ToolOutcome::Rows(normalized.to_string()))
            }
            Err(error) => {
                tracing::info!(%error, ?columns, "tool query rows were malformed");
                Ok(ToolOutcome::Malformed)
            }
        }
    }

    /// Text boundary of the tool: the success payload or a diagnostic.
    pub fn execute_query(&self, sql: &str) -> Result<String> {
        Ok(self.evaluate(sql)?.to_string())
    }

    /// Accepts the raw argument JSON of a tool call.
    pub fn call_json(&self, arguments: &str) -> Result<String> {
        match serde_json::from_str::<ExecuteQueryInput>(arguments) {
            Ok(input) => self.execute_query(&input.query),
            Err(error) => Ok(ToolOutcome::InvalidArguments {
                detail: error.to_string(),
            }
            .to_string()),
        }
    }
}

impl<B: QueryBackend, R: QueryRewriter> ToolInvoker for QueryTool<B, R> {
    fn execute_query(&self, sql: &str) -> Result<String> {
        Ok(self.evaluate(sql)?.to_string())
    }
}

/// Function-calling definition with a JSON schema generated from
/// [`ExecuteQueryInput`].
pub fn tool_definition() -> Result<ToolDefinition> {
    let schema = schemars::schema_for!(ExecuteQueryInput);
    let parameters =
        serde_json::to_value(schema).context("failed to serialize tool parameter schema")?;

    Ok(ToolDefinition {
        name: TOOL_NAME.to_string(),
        description: TOOL_DESCRIPTION.to_string(),
        parameters,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Unparsable,
    NotRows,
}

/// Decodes text results: a JSON array whose items are arrays of scalars.
pub fn decode_result_text(raw: &str) -> Result<Vec<ResultRow>, DecodeError> {
    let decoded =
        serde_json::from_str::<Value>(raw.trim()).map_err(|_| DecodeError::Unparsable)?;
    let Value::Array(items) = decoded else {
        return Err(DecodeError::NotRows);
    };
    if items.is_empty() {
        return Err(DecodeError::NotRows);
    }

    items
        .into_iter()
        .map(|item| match item {
            Value::Array(cells) => cells
                .into_iter()
                .map(|cell| SqlScalar::from_json(cell).ok_or(DecodeError::NotRows))
                .collect(),
            _ => Err(DecodeError::NotRows),
        })
        .collect()
}
