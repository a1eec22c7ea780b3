//! Durable conversation state: one `session_details` row per session and
//! an append-only `chat_history` ordered by a per-session sequence.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::models::{DEFAULT_SESSION_TITLE, Message, MessageRole, Session};
use crate::sqlite::{CHAT_HISTORY_TABLE, Database, SESSION_DETAILS_TABLE};
use crate::utils::time::now_utc_rfc3339;

#[derive(Debug, Clone)]
pub struct SessionStore {
    database: Database,
}

impl SessionStore {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Creates the session with the placeholder title when it is absent.
    /// Safe to race: concurrent callers converge on a single row.
    pub fn ensure_session(&self, session_id: &str) -> Result<Session> {
        validate_session_id(session_id)?;
        let connection = self.database.open()?;
        upsert_session(&connection, session_id)?;

        read_session(&connection, session_id)?
            .with_context(|| format!("session `{session_id}` vanished after upsert"))
    }

    /// Appends one message with the next sequence number. The first human
    /// message of a session also becomes its title, in the same transaction.
    pub fn append_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        validate_session_id(session_id)?;
        let mut connection = self.database.open()?;
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("failed to begin session append transaction")?;

        upsert_session(&transaction, session_id)?;

        let sequence: i64 = transaction
            .query_row(
                &format!(
                    "SELECT COALESCE(MAX(sequence), 0) + 1 FROM {CHAT_HISTORY_TABLE} WHERE session_id = ?1"
                ),
                [session_id],
                |row| row.get(0),
            )
            .context("failed to allocate message sequence")?;

        let created_at_utc = now_utc_rfc3339();
        transaction
            .execute(
                &format!(
                    "INSERT INTO {CHAT_HISTORY_TABLE} (session_id, message_type, message_content, sequence, created_at_utc) \
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![session_id, role.as_str(), content, sequence, created_at_utc],
            )
            .with_context(|| format!("failed to insert message into session `{session_id}`"))?;

        if role == MessageRole::Human {
            let human_messages: i64 = transaction
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {CHAT_HISTORY_TABLE} WHERE session_id = ?1 AND message_type = 'human'"
                    ),
                    [session_id],
                    |row| row.get(0),
                )
                .context("failed to count human messages")?;
            if human_messages == 1 {
                transaction
                    .execute(
                        &format!(
                            "UPDATE {SESSION_DETAILS_TABLE} SET title = ?2 WHERE session_id = ?1"
                        ),
                        params![session_id, content],
                    )
                    .with_context(|| format!("failed to set title of session `{session_id}`"))?;
                tracing::info!(session_id, "session title derived from first human message");
            }
        }

        transaction
            .commit()
            .context("failed to commit session append transaction")?;

        let sequence = u64::try_from(sequence).context("message sequence out of range")?;
        tracing::info!(session_id, role = %role, sequence, "appended session message");

        Ok(Message {
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            sequence,
            created_at_utc,
        })
    }

    /// All messages of the session, ordered by sequence. Unknown sessions
    /// have an empty history.
    pub fn load_history(&self, session_id: &str) -> Result<Vec<Message>> {
        let connection = self.database.open()?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT message_type, message_content, sequence, created_at_utc \
                 FROM {CHAT_HISTORY_TABLE} WHERE session_id = ?1 ORDER BY sequence ASC"
            ))
            .context("failed to prepare history query")?;

        let rows = statement
            .query_map([session_id], |row| {
                Ok((
                    row.get::<usize, String>(0)?,
                    row.get::<usize, String>(1)?,
                    row.get::<usize, i64>(2)?,
                    row.get::<usize, String>(3)?,
                ))
            })
            .context("failed to query session history")?;

        let mut messages = Vec::new();
        for row in rows {
            let (message_type, content, sequence, created_at_utc) =
                row.context("failed to read session history row")?;
            messages.push(Message {
                session_id: session_id.to_string(),
                role: message_type.parse()?,
                content,
                sequence: u64::try_from(sequence).context("message sequence out of range")?,
                created_at_utc,
            });
        }

        Ok(messages)
    }

    pub fn session(&self, session_id: &str) -> Result<Option<Session>> {
        let connection = self.database.open()?;
        read_session(&connection, session_id)
    }

    pub fn session_title(&self, session_id: &str) -> Result<String> {
        Ok(self
            .session(session_id)?
            .map_or_else(|| DEFAULT_SESSION_TITLE.to_string(), |session| session.title))
    }
}

fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        bail!("session_id must not be empty");
    }
    Ok(())
}

fn upsert_session(connection: &Connection, session_id: &str) -> Result<()> {
    let inserted = connection
        .execute(
            &format!(
                "INSERT INTO {SESSION_DETAILS_TABLE} (session_id, title, created_at_utc) \
                 VALUES (?1, ?2, ?3) ON CONFLICT(session_id) DO NOTHING"
            ),
            params![session_id, DEFAULT_SESSION_TITLE, now_utc_rfc3339()],
        )
        .with_context(|| format!("failed to upsert session `{session_id}`"))?;
    if inserted > 0 {
        tracing::info!(session_id, "created session");
    }
    Ok(())
}

fn read_session(connection: &Connection, session_id: &str) -> Result<Option<Session>> {
    connection
        .query_row(
            &format!(
                "SELECT session_id, title, created_at_utc FROM {SESSION_DETAILS_TABLE} WHERE session_id = ?1"
            ),
            [session_id],
            |row| {
                Ok(Session {
                    session_id: row.get(0)?,
                    title: row.get(1)?,
                    created_at_utc: row.get(2)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to read session `{session_id}`"))
}
