//! Declarative migrations for oxide-core schemas.
//!
//! `oxide-migrate` does not keep migration files or a history table. It
//! compares the declared [`oxide_core::Schema`] with the schema the database
//! reports and emits the operations that close the gap:
//!
//! - **Operations** - `CreateTable`, `AddColumn`, `AlterColumn`,
//!   `DropColumn`, `DropTable` and `RebuildTable` for engines that cannot
//!   alter columns in place
//! - **Autodetector** - diffs declared and live schemas, parents first
//! - **Dialect** - per-engine DDL (SQLite, PostgreSQL, MySQL)
//! - **Migrator** - plans against a live [`oxide_core::Executor`] and
//!   applies the plan operation by operation
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_migrate::prelude::*;
//!
//! let migrator = Migrator::new(executor, &schema);
//! for sql in migrator.generate_migration().await? {
//!     println!("{sql};");
//! }
//! let report = migrator.migrate(false).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the statements that would run
//! oxide-migrate --schema schema.json plan
//!
//! # Apply them
//! oxide-migrate --schema schema.json migrate
//!
//! # Drop and recreate every declared table
//! oxide-migrate --schema schema.json migrate --force
//!
//! # Print the live schema
//! oxide-migrate inspect
//! ```

pub mod dialect;
pub mod diff;
pub mod error;
pub mod migrator;
pub mod operations;
pub mod state;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dialect::{MigrationDialect, MysqlDialect, PostgresDialect, SqliteDialect};
    pub use crate::diff::{creation_order, Autodetector, DiffWarning, SchemaDiff};
    pub use crate::error::{MigrateError, Result};
    pub use crate::migrator::{MigrationReport, Migrator};
    pub use crate::operations::{ColumnChanges, ColumnDef, DefaultChange, ForeignKeyRef, MigrationOp};
    pub use crate::state::SchemaState;
}
