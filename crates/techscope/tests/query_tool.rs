use std::cell::RefCell;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Result, anyhow};
use rusqlite::params;
use techscope::models::{NO_RESULTS_MESSAGE, NO_VALID_RESULTS_MESSAGE, SqlScalar, ToolOutcome};
use techscope::schema::SchemaRegistry;
use techscope::sqlite::{Database, SqliteQueryBackend, ensure_sqlite_schema};
use techscope::tool::{QueryBackend, QueryTool, RawResult, StatementFailure, ToolInvoker};

/// Returns a canned result and remembers every statement it was asked to run.
struct ScriptedBackend {
    result: Result<RawResult, fn() -> anyhow::Error>,
    seen: RefCell<Vec<String>>,
}

impl ScriptedBackend {
    fn returning(result: RawResult) -> Self {
        Self {
            result: Ok(result),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn failing(error: fn() -> anyhow::Error) -> Self {
        Self {
            result: Err(error),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl QueryBackend for ScriptedBackend {
    fn run(&self, sql: &str) -> Result<RawResult> {
        self.seen.borrow_mut().push(sql.to_string());
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

fn tool_over(backend: ScriptedBackend) -> QueryTool<ScriptedBackend> {
    QueryTool::new(backend, SchemaRegistry::technographics())
}

fn temp_db_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("techscope-tool-{label}-{nanos}.sqlite"))
}

fn seeded_database(label: &str) -> Database {
    let database = Database::new(temp_db_path(label));
    let connection = database.open().expect("db should open");
    ensure_sqlite_schema(&connection).expect("schema should apply");

    connection
        .execute(
            "INSERT INTO tools (tool_id, name, type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params!["t-1", "AWS", "Cloud", "2025-04-02 03:24:20.604245"],
        )
        .expect("tool insert should succeed");
    connection
        .execute(
            "INSERT INTO tools (tool_id, name, type, created_at) VALUES (?1, ?2, NULL, ?3)",
            params!["t-2", "Slack", "2025-04-02T03:29:12Z"],
        )
        .expect("tool insert should succeed");
    connection
        .execute(
            "INSERT INTO companies (company_id, name, state, country) VALUES (?1, ?2, NULL, ?3)",
            params!["c-1", "Acme", "US"],
        )
        .expect("company insert should succeed");
    connection
        .execute(
            "INSERT INTO company_tools (company_id, tool_id, source, last_updated) VALUES (?1, ?2, NULL, NULL)",
            params!["c-1", "t-2"],
        )
        .expect("company tool insert should succeed");

    database
}

#[test]
fn empty_result_returns_fixed_guidance() {
    let tool = tool_over(ScriptedBackend::returning(RawResult::Rows(Vec::new())));
    assert_eq!(
        tool.execute_query("SELECT name FROM tools WHERE 1 = 0")
            .expect("tool should answer"),
        NO_RESULTS_MESSAGE
    );

    let tool = tool_over(ScriptedBackend::returning(RawResult::Text("  ".to_string())));
    assert_eq!(
        tool.evaluate("SELECT name FROM tools").expect("tool should answer"),
        ToolOutcome::NoResults
    );
}

#[test]
fn undecodable_text_is_quoted_back_verbatim() {
    let raw = "[('AWS', None, datetime.datetime(2025, 4, 2))]";
    let tool = tool_over(ScriptedBackend::returning(RawResult::Text(raw.to_string())));

    let outcome = tool.evaluate("SELECT name, type, created_at FROM tools").expect("tool should answer");
    assert_eq!(
        outcome,
        ToolOutcome::DecodeFailed {
            raw: raw.to_string()
        }
    );
    assert!(outcome.to_string().contains(raw));
}

#[test]
fn decoded_text_that_is_not_rows_is_malformed() {
    for raw in ["[]", r#"{"name": "AWS"}"#, "[1, 2]", r#"[["AWS", "Cloud", "extra"]]"#] {
        let tool = tool_over(ScriptedBackend::returning(RawResult::Text(raw.to_string())));
        assert_eq!(
            tool.execute_query("SELECT name, type FROM tools")
                .expect("tool should answer"),
            NO_VALID_RESULTS_MESSAGE,
            "raw result: {raw}"
        );
    }
}

#[test]
fn wildcard_is_rewritten_before_execution_and_rows_are_normalized() {
    let backend = ScriptedBackend::returning(RawResult::Rows(vec![vec![
        SqlScalar::text("t-2"),
        SqlScalar::text("Slack"),
        SqlScalar::Null,
        SqlScalar::text("2025-04-02T03:29:12"),
    ]]));
    let tool = tool_over(backend);

    let text = tool.execute_query("SELECT * FROM tools").expect("tool should answer");

    assert_eq!(
        tool.backend().seen.borrow().as_slice(),
        ["SELECT tools.tool_id, tools.name, tools.type, tools.created_at FROM tools"]
    );
    assert_eq!(text, r#"[["t-2","Slack","Other Software","2025-04-02 03:29:12"]]"#);
}

#[test]
fn decoded_text_rows_are_normalized_like_native_rows() {
    let tool = tool_over(ScriptedBackend::returning(RawResult::Text(
        r#"[["AWS", null]]"#.to_string(),
    )));
    assert_eq!(
        tool.execute_query("SELECT name, type FROM tools")
            .expect("tool should answer"),
        r#"[["AWS","Other Software"]]"#
    );
}

#[test]
fn statement_failures_become_diagnostics() {
    let tool = tool_over(ScriptedBackend::failing(|| {
        anyhow::Error::new(StatementFailure::rejected("mutating SQL keyword `drop` is not allowed"))
    }));
    let outcome = tool.evaluate("DROP TABLE tools").expect("tool should answer");
    assert_eq!(outcome.kind(), "rejected");
    assert!(outcome.to_string().starts_with("Query rejected:"));

    let tool = tool_over(ScriptedBackend::failing(|| {
        anyhow::Error::new(StatementFailure::deadline_exceeded(250))
    }));
    assert_eq!(
        tool.evaluate("SELECT name FROM tools").expect("tool should answer"),
        ToolOutcome::DeadlineExceeded { deadline_ms: 250 }
    );
}

#[test]
fn infrastructure_failures_propagate() {
    let tool = tool_over(ScriptedBackend::failing(|| anyhow!("connection refused")));
    let error = tool
        .execute_query("SELECT name FROM tools")
        .expect_err("store outage must not be masked");
    assert!(format!("{error:#}").contains("connection refused"));
}

#[test]
fn tool_call_arguments_are_decoded_from_json() {
    let tool = tool_over(ScriptedBackend::returning(RawResult::Rows(vec![vec![
        SqlScalar::text("AWS"),
    ]])));

    assert_eq!(
        tool.call_json(r#"{"query": "SELECT name FROM tools"}"#)
            .expect("tool should answer"),
        r#"[["AWS"]]"#
    );
    let diagnostic = tool
        .call_json(r#"{"sql": "SELECT name FROM tools"}"#)
        .expect("tool should answer");
    assert!(diagnostic.starts_with("Invalid tool arguments:"), "{diagnostic}");
    assert_eq!(tool.backend().seen.borrow().len(), 1);
}

#[test]
fn sqlite_backend_runs_rewritten_queries_end_to_end() {
    let database = seeded_database("end-to-end");
    let tool = QueryTool::new(
        SqliteQueryBackend::new(database.clone()),
        SchemaRegistry::technographics(),
    );

    let text = tool
        .execute_query("SELECT * FROM tools ORDER BY tool_id")
        .expect("query should run");
    assert_eq!(
        text,
        r#"[["t-1","AWS","Cloud","2025-04-02 03:24:20"],["t-2","Slack","Other Software","2025-04-02 03:29:12"]]"#
    );

    let text = tool
        .execute_query(
            "SELECT c.name AS company_name, c.state, ct.source, ct.last_updated FROM company_tools ct JOIN companies c ON c.company_id = ct.company_id",
        )
        .expect("join should run");
    assert_eq!(
        text,
        r#"[["Acme","Unknown State","Unknown Source","1970-01-01 00:00:00"]]"#
    );

    assert_eq!(
        tool.execute_query("SELECT name FROM tools WHERE tool_id = 'missing'")
            .expect("query should run"),
        NO_RESULTS_MESSAGE
    );
}

#[test]
fn sqlite_backend_refuses_writes_and_reports_bad_sql() {
    let database = seeded_database("refusals");
    let tool = QueryTool::new(
        SqliteQueryBackend::new(database.clone()),
        SchemaRegistry::technographics(),
    );

    let outcome = tool.evaluate("DELETE FROM tools").expect("tool should answer");
    assert_eq!(outcome.kind(), "rejected");
    let outcome = tool
        .evaluate("SELECT name FROM tools; DROP TABLE tools")
        .expect("tool should answer");
    assert_eq!(outcome.kind(), "rejected");

    let outcome = tool
        .evaluate("SELECT missing_column FROM tools")
        .expect("tool should answer");
    assert_eq!(outcome.kind(), "execution_failed");
    assert!(outcome.to_string().contains("missing_column"));

    let remaining: i64 = database
        .open()
        .expect("db should open")
        .query_row("SELECT COUNT(*) FROM tools", [], |row| row.get(0))
        .expect("count should succeed");
    assert_eq!(remaining, 2);
}

#[test]
fn sqlite_backend_interrupts_statements_past_the_deadline() {
    let database = seeded_database("deadline");
    let tool = QueryTool::new(
        SqliteQueryBackend::new(database).with_deadline(Duration::from_millis(100)),
        SchemaRegistry::technographics(),
    );

    let outcome = tool
        .evaluate(
            "SELECT x FROM (WITH RECURSIVE counter(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM counter) SELECT x FROM counter) WHERE x < 0",
        )
        .expect("tool should answer");
    assert_eq!(outcome, ToolOutcome::DeadlineExceeded { deadline_ms: 100 });
}

#[test]
fn missing_database_is_an_infrastructure_failure() {
    let tool = QueryTool::new(
        SqliteQueryBackend::new(Database::new(temp_db_path("absent"))),
        SchemaRegistry::technographics(),
    );
    let invoker: &dyn ToolInvoker = &tool;

    assert!(invoker.execute_query("SELECT name FROM tools").is_err());
}
