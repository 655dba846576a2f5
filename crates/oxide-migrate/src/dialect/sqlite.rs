//! SQLite dialect for migrations.

use oxide_core::{ColumnSnapshot, Engine, FieldKind};

use super::{copy_and_swap, MigrationDialect};
use crate::operations::{ColumnChanges, ColumnDef, ForeignKeyRef};

/// SQLite dialect for migration SQL generation.
///
/// SQLite cannot change a column in place, so the diff engine rebuilds the
/// table instead of emitting structural [`ColumnChanges`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn type_name(&self, kind: &FieldKind) -> String {
        // Type affinity names only; booleans are stored as 0/1.
        match kind {
            FieldKind::Id | FieldKind::Integer | FieldKind::BigInt | FieldKind::Boolean => {
                "INTEGER".to_string()
            }
            FieldKind::Float | FieldKind::Decimal { .. } => "REAL".to_string(),
            _ => "TEXT".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        " AUTOINCREMENT".to_string()
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_add_foreign_key(&self) -> bool {
        false
    }

    fn can_drop_column(&self, column: &ColumnSnapshot) -> bool {
        // Dropping an indexed column fails until the index is gone.
        !(column.unique || column.indexed || column.primary_key)
    }

    fn can_add_column(&self, column: &ColumnDef) -> bool {
        let default = column.default.as_deref();
        if column.primary_key || (column.notnull && default.is_none()) {
            return false;
        }
        if default.is_some_and(|d| d.to_ascii_uppercase().starts_with("CURRENT_")) {
            return false;
        }
        column.references.is_none() || default.is_none_or(|d| d.eq_ignore_ascii_case("NULL"))
    }

    fn alter_column(
        &self,
        table: &str,
        column: &ColumnDef,
        changes: &ColumnChanges,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        if changes.is_structural() {
            statements.push(format!(
                "-- SQLite does not support ALTER COLUMN for {table}.{}; table rebuild required",
                column.name
            ));
        }
        statements.extend(self.index_changes(table, column, changes));
        statements
    }

    fn add_foreign_key(&self, table: &str, column: &str, references: &ForeignKeyRef) -> String {
        format!(
            "-- SQLite does not support ADD CONSTRAINT for {table}.{column} -> {}; table rebuild required",
            references.table
        )
    }

    fn drop_index(&self, _table: &str, name: &str) -> String {
        // Index names are global, not per-table.
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(name))
    }

    fn rebuild_table(&self, table: &str, columns: &[ColumnDef], copy: &[String]) -> Vec<String> {
        let mut statements = vec![String::from("PRAGMA foreign_keys = OFF")];
        statements.extend(copy_and_swap(self, table, columns, copy));
        statements.push(String::from("PRAGMA foreign_keys = ON"));
        statements
    }
}
