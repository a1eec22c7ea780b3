use std::path::PathBuf;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use techscope::models::{DEFAULT_SESSION_TITLE, MessageRole};
use techscope::session::SessionStore;
use techscope::sqlite::{Database, ensure_sqlite_schema};

fn temp_db_path(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("techscope-sessions-{label}-{nanos}.sqlite"))
}

fn fresh_store(label: &str) -> SessionStore {
    let database = Database::new(temp_db_path(label));
    let connection = database.open().expect("db should open");
    ensure_sqlite_schema(&connection).expect("schema should apply");
    SessionStore::new(database)
}

#[test]
fn first_human_message_sets_title_once() {
    let store = fresh_store("title");

    let first = store
        .append_message("s-1", MessageRole::Human, "hi")
        .expect("first append should succeed");
    let second = store
        .append_message("s-1", MessageRole::Human, "bye")
        .expect("second append should succeed");

    assert_eq!(first.sequence, 1);
    assert_eq!(second.sequence, 2);
    assert_eq!(store.session_title("s-1").expect("title should load"), "hi");

    let session = store
        .session("s-1")
        .expect("lookup should succeed")
        .expect("session should exist");
    assert!(session.has_derived_title());
}

#[test]
fn history_is_ordered_by_sequence_with_roles() {
    let store = fresh_store("history");
    store
        .append_message("s-2", MessageRole::Human, "Which companies use Slack?")
        .expect("append should succeed");
    store
        .append_message("s-2", MessageRole::Ai, "- Acme\n- Globex")
        .expect("append should succeed");
    store
        .append_message("s-2", MessageRole::Human, "And AWS?")
        .expect("append should succeed");
    store
        .append_message("other", MessageRole::Human, "unrelated")
        .expect("append should succeed");

    let history = store.load_history("s-2").expect("history should load");
    let summary = history
        .iter()
        .map(|message| (message.sequence, message.role, message.content.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            (1, MessageRole::Human, "Which companies use Slack?"),
            (2, MessageRole::Ai, "- Acme\n- Globex"),
            (3, MessageRole::Human, "And AWS?"),
        ]
    );
    assert_eq!(
        store.load_history("other").expect("history should load")[0].sequence,
        1
    );
}

#[test]
fn ensure_session_then_append_keeps_one_row() {
    let store = fresh_store("ensure-append");
    let created = store.ensure_session("s-3").expect("ensure should succeed");
    assert_eq!(created.title, DEFAULT_SESSION_TITLE);

    store
        .append_message("s-3", MessageRole::Human, "top tools in Texas")
        .expect("append should succeed");
    let again = store.ensure_session("s-3").expect("ensure should succeed");

    assert_eq!(again.title, "top tools in Texas");
    assert_eq!(again.created_at_utc, created.created_at_utc);

    let rows: i64 = store
        .database()
        .open()
        .expect("db should open")
        .query_row(
            "SELECT COUNT(*) FROM session_details WHERE session_id = 's-3'",
            [],
            |row| row.get(0),
        )
        .expect("count should succeed");
    assert_eq!(rows, 1);
}

#[test]
fn concurrent_appends_get_distinct_sequences() {
    let store = fresh_store("concurrent");
    let writers = 4;
    let per_writer = 10;

    let handles = (0..writers)
        .map(|writer| {
            let store = store.clone();
            thread::spawn(move || {
                for index in 0..per_writer {
                    store
                        .append_message(
                            "shared",
                            MessageRole::Human,
                            &format!("writer {writer} message {index}"),
                        )
                        .expect("concurrent append should succeed");
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().expect("writer thread should finish");
    }

    let history = store.load_history("shared").expect("history should load");
    let sequences = history
        .iter()
        .map(|message| message.sequence)
        .collect::<Vec<_>>();
    let expected = (1..=(writers * per_writer) as u64).collect::<Vec<_>>();
    assert_eq!(sequences, expected);

    assert_eq!(
        store.session_title("shared").expect("title should load"),
        history[0].content
    );
}
