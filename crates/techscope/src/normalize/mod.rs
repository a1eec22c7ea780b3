//! Null substitution and timestamp canonicalization for tool results.
//!
//! The rendered form is a JSON array of row arrays. The agent reads it as
//! quoted evidence, and any JSON parser reads it back with the same shape.

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{NO_VALID_RESULTS_MESSAGE, ResultRow, SqlScalar};
use crate::utils::time::{canonicalize_timestamp_text, format_canonical};

/// Column name → value substituted for a null cell in that column.
pub const NULL_DEFAULTS: &[(&str, &str)] = &[
    ("name", "Unknown Name"),
    ("type", "Other Software"),
    ("company_name", "Unknown Company"),
    ("tool_name", "Unknown Tool"),
    ("source", "Unknown Source"),
    ("description", "No description available"),
    ("company_size", "Unknown Size"),
    ("state", "Unknown State"),
    ("country", "Unknown Country"),
    ("city", "Unknown City"),
    ("zip_code", "Unknown Zip"),
    ("address", "Unknown Address"),
    ("url", "Unknown URL"),
    ("last_updated", "1970-01-01 00:00:00"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    EmptyRows,
    RowWidthMismatch {
        row_index: usize,
        expected: usize,
        actual: usize,
    },
}

impl Display for NormalizeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRows => f.write_str("result contains no rows"),
            Self::RowWidthMismatch {
                row_index,
                expected,
                actual,
            } => write!(
                f,
                "row {row_index} has {actual} cells but {expected} columns were projected"
            ),
        }
    }
}

impl std::error::Error for NormalizeError {}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    rows: Vec<ResultRow>,
}

impl NormalizedResult {
    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Display for NormalizedResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.rows) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str(NO_VALID_RESULTS_MESSAGE),
        }
    }
}

/// Applies null defaults and timestamp formatting to every cell. Every row
/// must be exactly as wide as `columns`.
pub fn normalize_rows(
    columns: &[String],
    rows: Vec<ResultRow>,
) -> Result<NormalizedResult, NormalizeError> {
    if rows.is_empty() {
        return Err(NormalizeError::EmptyRows);
    }
    if let Some((row_index, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != columns.len())
    {
        return Err(NormalizeError::RowWidthMismatch {
            row_index,
            expected: columns.len(),
            actual: row.len(),
        });
    }

    let defaults = columns
        .iter()
        .map(|label| null_default_for(label))
        .collect::<Vec<_>>();

    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&defaults)
                .map(|(cell, default)| normalize_cell(cell, *default))
                .collect()
        })
        .collect();

    Ok(NormalizedResult { rows })
}

/// Normalizes and renders in one step; malformed input renders the fixed
/// no-valid-results message instead of failing.
#[must_use]
pub fn render_rows(columns: &[String], rows: Vec<ResultRow>) -> String {
    match normalize_rows(columns, rows) {
        Ok(normalized) => normalized.to_string(),
        Err(error) => {
            tracing::debug!(%error, "result rows rejected by normalizer");
            NO_VALID_RESULTS_MESSAGE.to_string()
        }
    }
}

fn normalize_cell(cell: SqlScalar, default: Option<&'static str>) -> SqlScalar {
    match cell {
        SqlScalar::Null => default.map_or(SqlScalar::Null, SqlScalar::text),
        SqlScalar::Timestamp(timestamp) => {
            format_canonical(timestamp).map_or(SqlScalar::Null, SqlScalar::Text)
        }
        SqlScalar::Text(text) => match canonicalize_timestamp_text(&text) {
            Some(canonical) => SqlScalar::Text(canonical),
            None => SqlScalar::Text(text),
        },
        other => other,
    }
}

/// Default for a projected label, looked up by the label's output name.
#[must_use]
pub fn null_default_for(label: &str) -> Option<&'static str> {
    let name = output_column_name(label);
    NULL_DEFAULTS
        .iter()
        .find(|(column, _)| column.eq_ignore_ascii_case(name))
        .map(|(_, default)| *default)
}

/// The name a projected expression surfaces under: the alias after `AS`,
/// the last segment of a qualified column, or the label itself.
#[must_use]
pub fn output_column_name(label: &str) -> &str {
    let label = label.trim();
    if let Some(alias) = alias_regex()
        .captures(label)
        .and_then(|captures| captures.name("alias"))
    {
        return alias.as_str();
    }
    if qualified_column_regex().is_match(label) {
        return label.rsplit('.').next().unwrap_or(label).trim_matches('"');
    }
    label
}

fn alias_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\s+AS\s+"?(?P<alias>[A-Za-z_][A-Za-z0-9_]*)"?$"#)
            .expect("alias regex should compile")
    })
}

fn qualified_column_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"^"?[A-Za-z_][A-Za-z0-9_]*"?(\."?[A-Za-z_][A-Za-z0-9_]*"?)*$"#)
            .expect("qualified column regex should compile")
    })
}

#[cfg(test)]
mod tests {
    use super::{null_default_for, output_column_name};

    #[test]
    fn output_name_prefers_alias_then_last_segment() {
        assert_eq!(output_column_name("c.name AS company_name"), "company_name");
        assert_eq!(output_column_name("tools.type"), "type");
        assert_eq!(output_column_name("\"tools\".\"type\""), "type");
        assert_eq!(output_column_name("COUNT(*)"), "COUNT(*)");
        assert_eq!(output_column_name("  url "), "url");
    }

    #[test]
    fn defaults_resolve_through_qualifiers_and_aliases() {
        assert_eq!(null_default_for("type"), Some("Other Software"));
        assert_eq!(null_default_for("company_tools.last_updated"), Some("1970-01-01 00:00:00"));
        assert_eq!(null_default_for("t.name AS tool_name"), Some("Unknown Tool"));
        assert_eq!(null_default_for("NAME"), Some("Unknown Name"));
        assert_eq!(null_default_for("company_id"), None);
        assert_eq!(null_default_for("COUNT(*) AS users"), None);
    }
}
