//! Statement execution.

use oxide_core::{DriverError, Engine, ExecResult, Executor, LiveSchema, Row, Session};
use serde_json::{Map, Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Connection, Row as _, SqliteConnection, TypeInfo, ValueRef};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::introspect;

/// Statements whose rows are fetched rather than counted.
const ROW_PREFIXES: [&str; 4] = ["SELECT", "PRAGMA", "WITH", "VALUES"];

/// The connection plus a rollback owed by a dropped session.
#[derive(Debug)]
struct Slot {
    conn: SqliteConnection,
    abandoned: bool,
}

impl Slot {
    /// Settles an abandoned transaction before the connection is reused.
    async fn ready(&mut self) -> &mut SqliteConnection {
        if self.abandoned {
            self.abandoned = false;
            match sqlx::query("ROLLBACK").execute(&mut self.conn).await {
                Ok(_) => debug!("rolled back abandoned transaction"),
                Err(err) => warn!(error = %err, "rollback of abandoned transaction failed"),
            }
        }
        &mut self.conn
    }
}

/// Executes SQL text on one SQLite connection.
#[derive(Debug)]
pub struct SqliteExecutor {
    slot: Mutex<Slot>,
}

/// Exclusive hold on the [`SqliteExecutor`] connection.
///
/// Dropped with a transaction still open, the transaction is rolled back
/// before the connection serves anything else.
#[derive(Debug)]
pub struct SqliteSession<'a> {
    slot: MutexGuard<'a, Slot>,
    in_transaction: bool,
}

impl Session for SqliteSession<'_> {
    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        let result = run(&mut self.slot.conn, sql).await?;
        if starts_with_keyword(sql, "BEGIN") || starts_with_keyword(sql, "START TRANSACTION") {
            self.in_transaction = true;
        } else if ["COMMIT", "END", "ROLLBACK"]
            .iter()
            .any(|keyword| starts_with_keyword(sql, keyword))
        {
            self.in_transaction = false;
        }
        Ok(result)
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        if self.in_transaction {
            warn!("session released inside a transaction, rolling back");
            self.slot.abandoned = true;
        }
    }
}

impl SqliteExecutor {
    /// Opens a connection, e.g. `sqlite://app.db?mode=rwc`.
    ///
    /// # Errors
    ///
    /// The database cannot be opened.
    pub async fn connect(url: &str) -> Result<Self, DriverError> {
        let conn = SqliteConnection::connect(url)
            .await
            .map_err(DriverError::new)?;
        debug!(url = %url, "connected to sqlite");
        Ok(Self {
            slot: Mutex::new(Slot {
                conn,
                abandoned: false,
            }),
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// The database cannot be opened.
    pub async fn in_memory() -> Result<Self, DriverError> {
        Self::connect("sqlite::memory:").await
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// The connection did not shut down cleanly.
    pub async fn close(self) -> Result<(), DriverError> {
        self.slot
            .into_inner()
            .conn
            .close()
            .await
            .map_err(DriverError::new)
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.trim_start()
        .get(..keyword.len())
        .is_some_and(|start| start.eq_ignore_ascii_case(keyword))
}

fn returns_rows(sql: &str) -> bool {
    ROW_PREFIXES
        .iter()
        .any(|prefix| starts_with_keyword(sql, prefix))
        || sql.to_ascii_uppercase().contains(" RETURNING ")
}

fn decode_column(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Number::from_f64(row.try_get::<f64, _>(index)?).map_or(Value::Null, Value::Number),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row, sqlx::Error> {
    let mut out = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_column(row, index)?);
    }
    Ok(out)
}

async fn run(conn: &mut SqliteConnection, sql: &str) -> Result<ExecResult, DriverError> {
    if returns_rows(sql) {
        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(DriverError::new)?;
        let results = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DriverError::new)?;
        return Ok(ExecResult {
            results,
            affected_rows: 0,
            insert_id: None,
        });
    }

    let done = sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .map_err(DriverError::new)?;
    let insert_id = starts_with_keyword(sql, "INSERT").then(|| done.last_insert_rowid());
    Ok(ExecResult {
        results: Vec::new(),
        affected_rows: done.rows_affected(),
        insert_id,
    })
}

impl Executor for SqliteExecutor {
    type Session<'a> = SqliteSession<'a>;

    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        let mut slot = self.slot.lock().await;
        run(slot.ready().await, sql).await
    }

    async fn get_schema(&self) -> Result<LiveSchema, DriverError> {
        let mut slot = self.slot.lock().await;
        introspect::live_schema(slot.ready().await)
            .await
            .map_err(DriverError::new)
    }

    async fn session(&self) -> Result<SqliteSession<'_>, DriverError> {
        let mut slot = self.slot.lock().await;
        slot.ready().await;
        Ok(SqliteSession {
            slot,
            in_transaction: false,
        })
    }
}
