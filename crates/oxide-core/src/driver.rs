//! Contract between the compiler and a database driver.
//!
//! A driver executes SQL text and reports the live schema. Everything else
//! (statement building, escaping, result shaping) happens above it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DriverError;
use crate::value::Engine;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecResult {
    /// Rows returned by the statement.
    pub results: Vec<Row>,
    /// Rows inserted, updated or deleted.
    pub affected_rows: u64,
    /// Key generated by the last insert, if the engine reports one.
    pub insert_id: Option<i64>,
}

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    /// Column name.
    pub name: String,
    /// Declared SQL type.
    pub sql_type: String,
    /// Whether NOT NULL is enforced.
    pub notnull: bool,
    /// Default expression as reported by the engine.
    pub default_value: Option<String>,
    /// Whether the column is the primary key.
    pub primary_key: bool,
    /// Whether a plain single-column index exists.
    pub indexed: bool,
    /// Whether a unique single-column index exists.
    pub unique: bool,
}

/// Introspected tables and their columns, in engine order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSchema {
    tables: IndexMap<String, Vec<ColumnSnapshot>>,
}

impl LiveSchema {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of a table, if it exists.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&[ColumnSnapshot]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Mutable columns of a table.
    pub fn table_mut(&mut self, name: &str) -> Option<&mut Vec<ColumnSnapshot>> {
        self.tables.get_mut(name)
    }

    /// Whether a table exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Inserts or replaces a table.
    pub fn insert_table(&mut self, name: impl Into<String>, columns: Vec<ColumnSnapshot>) {
        self.tables.insert(name.into(), columns);
    }

    /// Removes a table.
    pub fn remove_table(&mut self, name: &str) -> Option<Vec<ColumnSnapshot>> {
        self.tables.shift_remove(name)
    }

    /// Table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Tables with their columns.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[ColumnSnapshot])> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Exclusive use of one connection until dropped.
///
/// Statements sent through a session never interleave with statements from
/// elsewhere. A transaction begun on a session belongs to it, and dropping
/// the session while that transaction is open rolls it back.
#[allow(async_fn_in_trait)]
pub trait Session {
    /// Executes one SQL statement on the held connection.
    async fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError>;
}

/// A database driver.
///
/// Implementations own their connection; `execute` receives one complete
/// statement at a time.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Connection held for the lifetime of a transaction.
    type Session<'a>: Session
    where
        Self: 'a;

    /// Engine the driver talks to.
    fn engine(&self) -> Engine;

    /// Executes one SQL statement.
    async fn execute(&self, sql: &str) -> Result<ExecResult, DriverError>;

    /// Introspects the live schema.
    async fn get_schema(&self) -> Result<LiveSchema, DriverError>;

    /// Takes a connection for exclusive use, waiting while another session
    /// holds it.
    async fn session(&self) -> Result<Self::Session<'_>, DriverError>;
}

impl<E: Executor> Executor for &E {
    type Session<'a> = E::Session<'a>
    where
        Self: 'a;

    fn engine(&self) -> Engine {
        (**self).engine()
    }

    async fn execute(&self, sql: &str) -> Result<ExecResult, DriverError> {
        (**self).execute(sql).await
    }

    async fn get_schema(&self) -> Result<LiveSchema, DriverError> {
        (**self).get_schema().await
    }

    async fn session(&self) -> Result<Self::Session<'_>, DriverError> {
        (**self).session().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> ColumnSnapshot {
        ColumnSnapshot {
            name: name.to_string(),
            sql_type: String::from("TEXT"),
            notnull: false,
            default_value: None,
            primary_key: false,
            indexed: false,
            unique: false,
        }
    }

    #[test]
    fn test_live_schema_tables() {
        let mut live = LiveSchema::new();
        assert!(live.is_empty());

        live.insert_table("users", vec![column("id"), column("name")]);
        live.insert_table("posts", vec![column("id")]);
        assert_eq!(live.table_names().collect::<Vec<_>>(), vec!["users", "posts"]);
        assert_eq!(live.table("users").map(<[ColumnSnapshot]>::len), Some(2));

        live.table_mut("posts").unwrap().push(column("title"));
        assert_eq!(live.table("posts").unwrap()[1].name, "title");

        live.remove_table("users");
        assert!(!live.has_table("users"));
        assert_eq!(live.len(), 1);
    }
}
