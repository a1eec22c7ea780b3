//! Static table → column registry the rewriter expands wildcards from.
//!
//! The registry is assumed to match the live store; nothing here checks that
//! at runtime. `from_connection` exists for callers that would rather read
//! the columns back from SQLite than trust the built-in list.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use serde::Serialize;

pub const COMPANIES_TABLE: &str = "companies";
pub const TOOLS_TABLE: &str = "tools";
pub const COMPANY_TOOLS_TABLE: &str = "company_tools";

pub const COMPANIES_COLUMNS: &[&str] = &[
    "company_id",
    "name",
    "description",
    "company_size",
    "state",
    "country",
    "city",
    "zip_code",
    "address",
    "url",
    "created_at",
];
pub const TOOLS_COLUMNS: &[&str] = &["tool_id", "name", "type", "created_at"];
pub const COMPANY_TOOLS_COLUMNS: &[&str] = &["company_id", "tool_id", "source", "last_updated"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The companies/tools dataset this assistant answers questions about.
    #[must_use]
    pub fn technographics() -> Self {
        Self::new()
            .with_table(COMPANIES_TABLE, COMPANIES_COLUMNS)
            .with_table(TOOLS_TABLE, TOOLS_COLUMNS)
            .with_table(COMPANY_TOOLS_TABLE, COMPANY_TOOLS_COLUMNS)
    }

    /// Adds a table, replacing any earlier entry with the same name.
    #[must_use]
    pub fn with_table<S: AsRef<str>>(mut self, name: &str, columns: &[S]) -> Self {
        let table = TableSchema {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        };
        match self
            .tables
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
        self
    }

    /// Builds a registry from `PRAGMA table_info` for the named tables.
    pub fn from_connection(connection: &Connection, tables: &[&str]) -> Result<Self> {
        let mut registry = Self::new();
        for table in tables {
            let columns = load_table_columns(connection, table)?;
            if columns.is_empty() {
                bail!("table `{table}` does not exist or has no columns");
            }
            registry = registry.with_table(table, &columns);
        }
        Ok(registry)
    }

    #[must_use]
    pub fn columns_for(&self, table: &str) -> Option<&[String]> {
        self.table(table).map(|table| table.columns.as_slice())
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }
}

fn load_table_columns(connection: &Connection, table: &str) -> Result<Vec<String>> {
    let pragma_sql = format!("PRAGMA table_info({})", sqlite_single_quoted(table));
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to prepare column introspection for `{table}`"))?;

    let column_rows = statement
        .query_map([], |row| row.get::<usize, String>(1))
        .with_context(|| format!("failed to execute column introspection for `{table}`"))?;

    column_rows
        .map(|row| row.context("failed to decode table_info row"))
        .collect()
}

fn sqlite_single_quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::SchemaRegistry;

    #[test]
    fn lookup_ignores_case_and_preserves_column_order() {
        let registry = SchemaRegistry::technographics();
        let columns = registry.columns_for("TOOLS").expect("tools should be registered");
        assert_eq!(columns, ["tool_id", "name", "type", "created_at"]);
    }

    #[test]
    fn unknown_tables_are_absent_not_errors() {
        assert!(SchemaRegistry::technographics()
            .columns_for("employees")
            .is_none());
    }

    #[test]
    fn with_table_replaces_existing_entry() {
        let registry = SchemaRegistry::new()
            .with_table("tools", &["tool_id"])
            .with_table("Tools", &["tool_id", "name"]);

        assert_eq!(registry.tables().count(), 1);
        assert_eq!(
            registry.columns_for("tools"),
            Some(["tool_id".to_string(), "name".to_string()].as_slice())
        );
    }
}
