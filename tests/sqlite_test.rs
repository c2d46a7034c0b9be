//! End-to-end tests for the Database helper against SQLite.
//!
//! Each test works on its own temporary database file.

use db_helper::db::SqliteDriver;
use db_helper::models::{CommandRequest, Value};
use db_helper::{Database, DbError};
use tempfile::NamedTempFile;

const CREATE_USERS: &str =
    "CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL, password TEXT)";
const INSERT_USER: &str = "INSERT INTO users (username, password, id) VALUES (?, ?, ?)";

/// Create a temporary database file with an empty users table.
async fn setup() -> (NamedTempFile, String) {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let url = format!("sqlite:{}", temp_file.path().display());

    let mut db = Database::new(SqliteDriver, url.clone(), false);
    db.execute_non_query(CREATE_USERS)
        .await
        .expect("Failed to create users table");
    db.dispose().await;

    (temp_file, url)
}

fn insert(db: &mut Database<SqliteDriver>, username: &str, password: Option<&str>, id: i64) -> CommandRequest {
    let params = db
        .get_parameters([
            ("Username", Value::from(username)),
            ("Password", Value::from(password)),
            ("Id", Value::from(id)),
        ])
        .unwrap();
    CommandRequest::text(INSERT_USER).with_parameters(params)
}

async fn count_users(url: &str) -> Option<Value> {
    let mut db = Database::new(SqliteDriver, url, false);
    let count = db
        .execute_scalar("SELECT COUNT(*) FROM users")
        .await
        .unwrap();
    db.dispose().await;
    count
}

#[tokio::test]
async fn test_sqlite_commit_makes_inserts_visible() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url.clone(), true);

    db.begin_transaction().await.unwrap();
    for (name, id) in [("alice", 1), ("bob", 2), ("carol", 3)] {
        let request = insert(&mut db, name, Some("secret"), id);
        assert_eq!(db.execute_non_query(request).await.unwrap(), 1);
    }
    db.commit_transaction().await.unwrap();
    db.dispose().await;

    assert_eq!(count_users(&url).await, Some(Value::Int(3)));
}

#[tokio::test]
async fn test_sqlite_rollback_discards_inserts() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url.clone(), true);

    db.begin_transaction().await.unwrap();
    for (name, id) in [("alice", 1), ("bob", 2), ("carol", 3)] {
        let request = insert(&mut db, name, Some("secret"), id);
        db.execute_non_query(request).await.unwrap();
    }
    assert_eq!(
        db.execute_scalar("SELECT COUNT(*) FROM users").await.unwrap(),
        Some(Value::Int(3))
    );
    db.rollback_transaction().await.unwrap();
    db.dispose().await;

    assert_eq!(count_users(&url).await, Some(Value::Int(0)));
}

#[tokio::test]
async fn test_sqlite_abort_any_transaction() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url.clone(), true);

    let tx = db.begin_transaction().await.unwrap();
    let request = insert(&mut db, "alice", None, 1);
    db.execute_non_query(request).await.unwrap();

    Database::abort_any_transaction(&tx).await.unwrap();
    assert!(db.get_connection().unwrap().is_closed());
    db.dispose().await;

    assert_eq!(count_users(&url).await, Some(Value::Int(0)));
}

#[tokio::test]
async fn test_sqlite_null_parameter_round_trip() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, false);

    let request = insert(&mut db, "alice", None, 1);
    db.execute_non_query(request).await.unwrap();

    let id = db.get_parameters([("Id", 1)]).unwrap();
    let password = db
        .execute_scalar(CommandRequest::text("SELECT password FROM users WHERE id = ?").with_parameters(id))
        .await
        .unwrap();
    assert_eq!(password, Some(Value::Null));

    let missing = db
        .execute_scalar("SELECT id FROM users WHERE id = -1")
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_sqlite_non_query_returns_affected_rows() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, true);

    for (name, id) in [("alice", 1), ("bob", 2), ("carol", 3)] {
        let request = insert(&mut db, name, Some("secret"), id);
        db.execute_non_query(request).await.unwrap();
    }
    let affected = db
        .execute_non_query("UPDATE users SET password = NULL")
        .await
        .unwrap();
    assert_eq!(affected, 3);
    db.dispose().await;
}

#[tokio::test]
async fn test_sqlite_reader_decodes_column_types() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, true);

    db.execute_non_query(
        "CREATE TABLE samples (i INTEGER, r REAL, t TEXT, b BLOB, flag BOOLEAN, doc JSON, missing TEXT)",
    )
    .await
    .unwrap();
    let params = db
        .get_parameters([
            ("i", Value::from(42)),
            ("r", Value::from(1.5)),
            ("t", Value::from("hello")),
            ("b", Value::from(vec![0u8, 1, 2])),
            ("flag", Value::from(true)),
            ("doc", Value::from(serde_json::json!({"k": [1, 2]}))),
        ])
        .unwrap();
    db.execute_non_query(
        CommandRequest::text(
            "INSERT INTO samples (i, r, t, b, flag, doc, missing) VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .with_parameters(params),
    )
    .await
    .unwrap();

    let mut reader = db
        .execute_reader("SELECT i, r, t, b, flag, doc, missing, i + 1 AS next FROM samples")
        .await
        .unwrap();
    let row = reader.read().await.unwrap().expect("one row");
    assert!(reader.read().await.unwrap().is_none());

    assert_eq!(row.get_by_name("i"), Some(&Value::Int(42)));
    assert_eq!(row.get_by_name("r"), Some(&Value::Float(1.5)));
    assert_eq!(row.get_by_name("t"), Some(&Value::Text("hello".into())));
    assert_eq!(row.get_by_name("b"), Some(&Value::Bytes(vec![0, 1, 2])));
    assert_eq!(row.get_by_name("flag"), Some(&Value::Bool(true)));
    // SQLite stores JSON documents as text
    assert_eq!(
        row.get_by_name("doc"),
        Some(&Value::Text(r#"{"k":[1,2]}"#.into()))
    );
    assert_eq!(row.get_by_name("missing"), Some(&Value::Null));
    assert_eq!(row.get_by_name("next"), Some(&Value::Int(43)));

    db.dispose().await;
}

#[tokio::test]
async fn test_sqlite_stored_procedures_unsupported() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, false);

    let err = db
        .execute_scalar(CommandRequest::stored_procedure("InsertUser_SP"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Unsupported { .. }));
    assert!(db.get_connection().unwrap().is_closed());
}

#[tokio::test]
async fn test_sqlite_backend_error_passes_through() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, false);

    let err = db
        .execute_non_query("INSERT INTO missing_table VALUES (1)")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Backend(sqlx::Error::Database(_))));
    assert!(err.to_string().contains("missing_table"));
    assert!(db.connection().unwrap().is_closed());
}

#[tokio::test]
async fn test_sqlite_multi_statement_script() {
    let (_file, url) = setup().await;
    let mut db = Database::new(SqliteDriver, url, true);

    db.execute_non_query("CREATE TABLE a (x INTEGER); CREATE TABLE b (y INTEGER);")
        .await
        .unwrap();
    let tables = db
        .execute_reader("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .await
        .unwrap()
        .collect_rows()
        .await
        .unwrap();
    let names: Vec<_> = tables
        .iter()
        .filter_map(|row| row.get(0).and_then(Value::as_str))
        .collect();
    assert_eq!(names, ["a", "b", "users"]);
    db.dispose().await;
}
