use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};

use crate::utils::time::now_utc_rfc3339;

pub mod backend;
pub mod guardrail;

pub use backend::SqliteQueryBackend;
pub use guardrail::{GuardrailViolation, validate_read_only_sql};

pub const SQLITE_SCHEMA_VERSION: &str = "techscope.sqlite.v1";
pub const SESSION_DETAILS_TABLE: &str = "session_details";
pub const CHAT_HISTORY_TABLE: &str = "chat_history";
pub const SCHEMA_META_TABLE: &str = "techscope_schema_meta";
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_COMPANIES_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS companies (
    company_id TEXT NOT NULL PRIMARY KEY,
    name TEXT,
    description TEXT,
    company_size TEXT,
    state TEXT,
    country TEXT,
    city TEXT,
    zip_code TEXT,
    address TEXT,
    url TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_TOOLS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tools (
    tool_id TEXT NOT NULL PRIMARY KEY,
    name TEXT,
    type TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_COMPANY_TOOLS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS company_tools (
    company_id TEXT NOT NULL REFERENCES companies(company_id),
    tool_id TEXT NOT NULL REFERENCES tools(tool_id),
    source TEXT,
    last_updated TEXT,
    PRIMARY KEY (company_id, tool_id)
);
"#;

const CREATE_INDEX_COMPANY_TOOLS_TOOL_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_company_tools_tool
ON company_tools (tool_id, company_id);
"#;

const CREATE_SESSION_DETAILS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session_details (
    session_id TEXT NOT NULL PRIMARY KEY,
    title TEXT NOT NULL,
    created_at_utc TEXT NOT NULL,
    CHECK (session_id != '')
);
"#;

const CREATE_CHAT_HISTORY_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS chat_history (
    session_id TEXT NOT NULL REFERENCES session_details(session_id),
    message_type TEXT NOT NULL,
    message_content TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    created_at_utc TEXT NOT NULL,
    UNIQUE (session_id, sequence),
    CHECK (message_type IN ('human', 'ai')),
    CHECK (sequence > 0)
);
"#;

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS techscope_schema_meta (
    schema_version TEXT NOT NULL,
    applied_at_utc TEXT NOT NULL
);
"#;

#[must_use]
pub fn schema_statements() -> &'static [&'static str] {
    &[
        CREATE_COMPANIES_TABLE_SQL,
        CREATE_TOOLS_TABLE_SQL,
        CREATE_COMPANY_TOOLS_TABLE_SQL,
        CREATE_INDEX_COMPANY_TOOLS_TOOL_SQL,
        CREATE_SESSION_DETAILS_TABLE_SQL,
        CREATE_CHAT_HISTORY_TABLE_SQL,
        CREATE_META_TABLE_SQL,
    ]
}

#[must_use]
pub fn create_schema_sql() -> String {
    schema_statements().join("\n")
}

/// Location and connection policy of the shared store. Every caller opens
/// its own connection per operation; the connection closes when dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-write connection; creates the parent directory and file on
    /// first use.
    pub fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create sqlite parent directory: {}",
                    parent.display()
                )
            })?;
        }

        let connection = Connection::open(&self.path)
            .with_context(|| format!("failed to open sqlite database: {}", self.path.display()))?;
        self.configure(&connection)?;
        Ok(connection)
    }

    /// Read-only connection; fails when the database file does not exist.
    pub fn open_read_only(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(&self.path, flags).with_context(|| {
            format!(
                "failed to open sqlite database read-only: {}",
                self.path.display()
            )
        })?;
        self.configure(&connection)?;
        Ok(connection)
    }

    fn configure(&self, connection: &Connection) -> Result<()> {
        connection
            .busy_timeout(self.busy_timeout)
            .context("failed to set sqlite busy timeout")?;
        connection
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("failed to enable sqlite foreign keys")
    }
}

pub fn ensure_sqlite_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create sqlite schema")?;

    if schema_meta_has_version(connection, SQLITE_SCHEMA_VERSION)? {
        return Ok(());
    }

    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![SQLITE_SCHEMA_VERSION, now_utc_rfc3339()],
        )
        .context("failed to write sqlite schema meta row")?;

    Ok(())
}

fn schema_meta_has_version(connection: &Connection, schema_version: &str) -> Result<bool> {
    let query = format!(
        "SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1 LIMIT 1)"
    );
    let exists = connection
        .query_row(&query, [schema_version], |row| row.get::<usize, i64>(0))
        .context("failed to query sqlite schema version metadata")?;
    Ok(exists != 0)
}
