use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Error, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode};

use super::Database;
use super::guardrail::validate_read_only_sql;
use crate::models::{ResultRow, SqlScalar};
use crate::tool::{QueryBackend, RawResult, StatementFailure};

pub const DEFAULT_QUERY_DEADLINE: Duration = Duration::from_secs(5);

/// Runs tool statements on a fresh read-only connection, behind the
/// read-only guardrail and a bounded execution deadline.
#[derive(Debug, Clone)]
pub struct SqliteQueryBackend {
    database: Database,
    deadline: Duration,
}

impl SqliteQueryBackend {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            deadline: DEFAULT_QUERY_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    fn deadline_ms(&self) -> u64 {
        u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX)
    }
}

impl QueryBackend for SqliteQueryBackend {
    fn run(&self, sql: &str) -> Result<RawResult> {
        if let Err(violation) = validate_read_only_sql(sql) {
            return Err(Error::new(StatementFailure::rejected(violation.to_string())));
        }

        let connection = self.database.open_read_only()?;
        let _deadline = DeadlineGuard::arm(&connection, self.deadline);

        let rows = fetch_rows(&connection, sql).map_err(|error| self.classify(error))?;
        Ok(RawResult::Rows(rows))
    }
}

impl SqliteQueryBackend {
    /// Statement errors become [`StatementFailure`]; errors that mean the
    /// store is unusable stay plain errors and propagate.
    fn classify(&self, error: rusqlite::Error) -> Error {
        match error.sqlite_error_code() {
            Some(ErrorCode::OperationInterrupted) => {
                Error::new(StatementFailure::deadline_exceeded(self.deadline_ms()))
            }
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::OutOfMemory
                | ErrorCode::PermissionDenied
                | ErrorCode::FileLockingProtocolFailed,
            ) => Error::new(error).context("sqlite store failure while running tool query"),
            _ => Error::new(StatementFailure::invalid(error.to_string())),
        }
    }
}

fn fetch_rows(connection: &Connection, sql: &str) -> rusqlite::Result<Vec<ResultRow>> {
    let mut statement = connection.prepare(sql)?;
    let column_count = statement.column_count();

    let mut rows = statement.query([])?;
    let mut result_rows = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for index in 0..column_count {
            cells.push(SqlScalar::from(row.get::<usize, SqlValue>(index)?));
        }
        result_rows.push(cells);
    }
    Ok(result_rows)
}

/// Interrupts the connection's running statement once the deadline passes.
/// Dropping the guard disarms the watchdog and waits for it to exit.
struct DeadlineGuard {
    disarm: Option<Sender<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl DeadlineGuard {
    fn arm(connection: &Connection, deadline: Duration) -> Self {
        let interrupt = connection.get_interrupt_handle();
        let (disarm, disarmed) = mpsc::channel::<()>();
        let watchdog = std::thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = disarmed.recv_timeout(deadline) {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "interrupting tool query past its deadline"
                );
                interrupt.interrupt();
            }
        });

        Self {
            disarm: Some(disarm),
            watchdog: Some(watchdog),
        }
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        drop(self.disarm.take());
        if let Some(watchdog) = self.watchdog.take() {
            let _ = watchdog.join();
        }
    }
}
