//! Exclusive sessions on the single SQLite connection.

use std::time::Duration;

use oxide_core::{Executor, Session};
use oxide_sqlite::SqliteExecutor;
use serde_json::json;

async fn table() -> SqliteExecutor {
    let db = SqliteExecutor::in_memory().await.unwrap();
    db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();
    db
}

async fn names(db: &SqliteExecutor) -> serde_json::Value {
    let result = db.execute("SELECT name FROM t ORDER BY id").await.unwrap();
    serde_json::to_value(result.results).unwrap()
}

#[tokio::test]
async fn dropped_session_rolls_back() {
    let db = table().await;

    {
        let mut session = db.session().await.unwrap();
        session.execute("BEGIN").await.unwrap();
        session
            .execute("INSERT INTO t (name) VALUES ('lost')")
            .await
            .unwrap();
    }

    assert_eq!(names(&db).await, json!([]));
    db.execute("BEGIN").await.unwrap();
    db.execute("COMMIT").await.unwrap();
}

#[tokio::test]
async fn committed_session_keeps_rows() {
    let db = table().await;

    let mut session = db.session().await.unwrap();
    session.execute("BEGIN").await.unwrap();
    session
        .execute("INSERT INTO t (name) VALUES ('kept')")
        .await
        .unwrap();
    session.execute("COMMIT").await.unwrap();
    drop(session);

    assert_eq!(names(&db).await, json!([{"name": "kept"}]));
}

#[tokio::test]
async fn other_statements_wait_for_the_session() {
    let db = table().await;

    let mut session = db.session().await.unwrap();
    session.execute("BEGIN").await.unwrap();

    let outside = tokio::time::timeout(Duration::from_millis(50), db.execute("SELECT 1")).await;
    assert!(outside.is_err(), "statement ran inside a foreign session");

    session.execute("ROLLBACK").await.unwrap();
    drop(session);
    db.execute("SELECT 1").await.unwrap();
}
