#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use oxide_core::schema::model;
use oxide_core::{
    field, DriverError, Engine, ExecResult, Executor, LiveSchema, Row, Schema, SchemaBuilder,
    Session,
};
use oxide_query::Client;
use serde_json::Value;

/// `users`, `posts` and `comments`, with forward relations
/// `posts.author`, `comments.post` and `comments.author`.
pub fn blog_schema() -> Arc<Schema> {
    let schema = SchemaBuilder::new()
        .model(
            model("users")
                .field("id", field::id())
                .field("username", field::string(64).trim())
                .field("password", field::string(64).length(8, 64))
                .field("email", field::email().unique().lowercase())
                .field("role", field::string(16).default("member")),
        )
        .model(
            model("posts")
                .field("id", field::id())
                .field("title", field::string(255))
                .field("views", field::integer().default(0))
                .field("published", field::boolean().default(false))
                .field("author", field::integer().references("users", "id")),
        )
        .model(
            model("comments")
                .field("id", field::id())
                .field("body", field::text())
                .field("post", field::integer().references("posts", "id"))
                .field("author", field::integer().references("users", "id")),
        )
        .build()
        .unwrap_or_else(|e| panic!("blog schema is invalid: {e}"));
    Arc::new(schema)
}

/// DDL matching [`blog_schema`] on SQLite.
pub const BLOG_DDL: [&str; 3] = [
    "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, username TEXT NOT NULL, \
     password TEXT NOT NULL, email TEXT NOT NULL UNIQUE, role TEXT NOT NULL DEFAULT 'member')",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT NOT NULL, \
     views INTEGER NOT NULL DEFAULT 0, published INTEGER NOT NULL DEFAULT 0, \
     author INTEGER NOT NULL REFERENCES users (id))",
    "CREATE TABLE comments (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT NOT NULL, \
     post INTEGER NOT NULL REFERENCES posts (id), author INTEGER NOT NULL REFERENCES users (id))",
];

/// Converts a JSON object literal into a row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Records every statement and answers with queued results.
#[derive(Debug, Default)]
pub struct Recorder {
    statements: Mutex<Vec<String>>,
    responses: Mutex<VecDeque<ExecResult>>,
    fail_on: Option<String>,
}

impl Recorder {
    /// Fails every statement containing `needle`.
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    /// Queues the result of the next statement that is not transaction
    /// control.
    pub fn respond(&self, rows: Vec<Row>) {
        self.responses.lock().unwrap().push_back(ExecResult {
            results: rows,
            ..ExecResult::default()
        });
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

/// A recorder session; dropping it inside a transaction records the
/// rollback the driver would send.
#[derive(Debug)]
pub struct RecorderSession<'a> {
    recorder: &'a Recorder,
    in_transaction: bool,
}

impl Session for RecorderSession<'_> {
    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        let result = self.recorder.execute(sql).await?;
        match sql {
            "BEGIN" => self.in_transaction = true,
            "COMMIT" | "ROLLBACK" => self.in_transaction = false,
            _ => {}
        }
        Ok(result)
    }
}

impl Drop for RecorderSession<'_> {
    fn drop(&mut self) {
        if self.in_transaction {
            self.recorder
                .statements
                .lock()
                .unwrap()
                .push(String::from("ROLLBACK"));
        }
    }
}

impl Executor for Recorder {
    type Session<'a> = RecorderSession<'a>;

    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn session(&self) -> Result<RecorderSession<'_>, DriverError> {
        Ok(RecorderSession {
            recorder: self,
            in_transaction: false,
        })
    }

    async fn execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        self.statements.lock().unwrap().push(sql.to_string());
        if self.fail_on.as_deref().is_some_and(|needle| sql.contains(needle)) {
            return Err(DriverError::message("constraint failed"));
        }
        if matches!(sql, "BEGIN" | "COMMIT" | "ROLLBACK") {
            return Ok(ExecResult::default());
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn get_schema(&self) -> Result<LiveSchema, DriverError> {
        Ok(LiveSchema::new())
    }
}

pub fn recording_client() -> Client<Recorder> {
    Client::new(Recorder::default(), blog_schema())
}
