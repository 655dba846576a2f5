//! # oxide-sqlite
//!
//! SQLite implementation of [`oxide_core::Executor`], backed by `sqlx`.
//!
//! # How SQLite shapes the results
//!
//! - **[Type affinity]**: values are converted by their runtime storage
//!   class (`INTEGER`, `REAL`, `TEXT`, `BLOB`), not by the declared column
//!   type. Booleans therefore come back as `0`/`1`.
//! - **Single connection**: the executor owns exactly one connection. A
//!   [`SqliteSession`] holds it exclusively, so a transaction begun on the
//!   session sees only the session's statements while everything else
//!   waits. An in-memory database lives as long as the executor.
//! - **Introspection**: [`get_schema`](oxide_core::Executor::get_schema)
//!   reads `sqlite_master`, `PRAGMA table_info` and `PRAGMA index_list`.
//!   Only single-column indexes are reported as `unique`/`indexed`.
//!
//! [Type affinity]: https://www.sqlite.org/datatype3.html
//!
//! ## Example
//!
//! ```rust,ignore
//! use oxide_core::Executor;
//! use oxide_sqlite::SqliteExecutor;
//!
//! let db = SqliteExecutor::in_memory().await?;
//! db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)").await?;
//! let live = db.get_schema().await?;
//! assert!(live.has_table("t"));
//! ```

mod executor;
mod introspect;

pub use executor::{SqliteExecutor, SqliteSession};
