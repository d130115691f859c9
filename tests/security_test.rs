// ABOUTME: Security tests for the SQLite source
// ABOUTME: Validates path traversal protection and safe handling of hostile identifiers

use rowdump::config::ExportPolicy;
use rowdump::sink::{AsyncSink, SinkOptions};
use rowdump::sqlite::{self, SqliteSource};
use rowdump::run_dump;
use rusqlite::Connection;

// ============================================================================
// Path Traversal Prevention Tests
// ============================================================================

#[test]
fn test_path_traversal_unix_style() {
    let malicious_paths = vec![
        "../../../etc/passwd",
        "../../secret.db",
        "../etc/shadow",
        "./../../system.db",
    ];

    for path in malicious_paths {
        let result = sqlite::validate_sqlite_path(path);
        assert!(
            result.is_err(),
            "Path traversal should be rejected: {}",
            path
        );
    }
}

#[test]
fn test_path_traversal_absolute_paths() {
    let malicious_paths = vec!["/etc/passwd", "/etc/shadow", "/root/.ssh/id_rsa"];

    for path in malicious_paths {
        let result = sqlite::validate_sqlite_path(path);
        assert!(
            result.is_err(),
            "System file should be rejected: {}",
            path
        );
    }
}

#[test]
fn test_source_open_rejects_non_database_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("notes.txt");
    std::fs::write(&path, "not a database").unwrap();

    let result = SqliteSource::open(path.to_str().unwrap());
    assert!(result.is_err(), "Non-database extension should be rejected");
}

// ============================================================================
// Hostile Identifier Tests
// ============================================================================

#[tokio::test]
async fn test_hostile_table_name_leaves_source_intact() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("hostile.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER, name TEXT);
             INSERT INTO users VALUES (1, 'Alice');
             CREATE TABLE \"x\"\"; DROP TABLE users; --\" (id INTEGER);
             INSERT INTO \"x\"\"; DROP TABLE users; --\" VALUES (9);",
        )
        .unwrap();
    }

    let source = SqliteSource::open(db_path.to_str().unwrap()).unwrap();
    let sink = AsyncSink::from_writer(Vec::new(), SinkOptions::default());
    let (summary, outcome) = run_dump(source, ExportPolicy::default(), sink)
        .await
        .unwrap();
    assert_eq!(summary.tables_exported, 2);
    let output = String::from_utf8(outcome.writer).unwrap();
    assert!(output.contains("INSERT INTO USERS VALUES\n(1,'Alice');\n"));
    assert!(output.contains("LOCK TABLES `X\"; DROP TABLE USERS; --` WRITE;\n"));
    assert!(output.contains("(9);\n"));

    let conn = Connection::open(&db_path).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 1, "Source tables must survive the dump");
}

#[tokio::test]
async fn test_backtick_in_table_name_is_doubled_in_lock() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("backtick.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE \"a`b\" (id INTEGER); INSERT INTO \"a`b\" VALUES (1);")
            .unwrap();
    }

    let source = SqliteSource::open(db_path.to_str().unwrap()).unwrap();
    let sink = AsyncSink::from_writer(Vec::new(), SinkOptions::default());
    let (_, outcome) = run_dump(source, ExportPolicy::default(), sink)
        .await
        .unwrap();
    let output = String::from_utf8(outcome.writer).unwrap();
    assert!(output.contains("LOCK TABLES `A``B` WRITE;\n"));
}

#[tokio::test]
async fn test_hostile_schema_name_fails_cleanly() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("schema.db");
    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER);").unwrap();
    }

    let source = SqliteSource::open(db_path.to_str().unwrap()).unwrap();
    let policy = ExportPolicy {
        schema: "main\"; DROP TABLE users; --".to_string(),
        ..ExportPolicy::default()
    };
    let sink = AsyncSink::from_writer(Vec::new(), SinkOptions::default());
    assert!(run_dump(source, policy, sink).await.is_err());

    let conn = Connection::open(&db_path).unwrap();
    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'users'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1);
}
