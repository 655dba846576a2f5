//! Dialect-specific DDL generation.
//!
//! A dialect decides how a declared field is spelled as a column, renders
//! every [`MigrationOp`] into statements and normalizes what introspection
//! reports so declared and live columns compare equal when they match.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use oxide_core::{ColumnSnapshot, Engine, FieldDefinition, FieldKind};

use crate::operations::{ColumnChanges, ColumnDef, ForeignKeyRef, MigrationOp};

/// Returns the dialect for an engine.
#[must_use]
pub fn for_engine(engine: Engine) -> Box<dyn MigrationDialect + Send + Sync> {
    match engine {
        Engine::Sqlite => Box::new(SqliteDialect::new()),
        Engine::Postgresql => Box::new(PostgresDialect::new()),
        Engine::Mysql => Box::new(MysqlDialect::new()),
    }
}

/// Name of the unique index covering one column.
#[must_use]
pub fn unique_index_name(table: &str, column: &str) -> String {
    format!("uq_{table}_{column}")
}

/// Name of the plain index covering one column.
#[must_use]
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

/// Name of the foreign key constraint on one column.
#[must_use]
pub fn foreign_key_name(table: &str, column: &str) -> String {
    format!("fk_{table}_{column}")
}

/// Creates `{table}_new`, copies `copy` into it, drops the old table,
/// renames the new one and recreates its indexes.
pub(crate) fn copy_and_swap<D: MigrationDialect + ?Sized>(
    dialect: &D,
    table: &str,
    columns: &[ColumnDef],
    copy: &[String],
) -> Vec<String> {
    let staging = format!("{table}_new");
    let mut statements = vec![dialect.table_statement(&staging, columns)];
    if !copy.is_empty() {
        let list = copy
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        statements.push(format!(
            "INSERT INTO {} ({list}) SELECT {list} FROM {}",
            dialect.quote_identifier(&staging),
            dialect.quote_identifier(table)
        ));
    }
    statements.push(dialect.drop_table(table));
    statements.push(format!(
        "ALTER TABLE {} RENAME TO {}",
        dialect.quote_identifier(&staging),
        dialect.quote_identifier(table)
    ));
    for column in columns {
        statements.extend(dialect.column_indexes(table, column));
    }
    statements
}

/// Trait for dialect-specific migration SQL.
pub trait MigrationDialect {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Engine literals are rendered for.
    fn engine(&self) -> Engine;

    /// Column type for a field kind.
    fn type_name(&self, kind: &FieldKind) -> String;

    /// Keyword appended after `PRIMARY KEY` on generated keys.
    fn autoincrement_keyword(&self) -> String;

    /// Generates SQL for changing a column in place.
    fn alter_column(&self, table: &str, column: &ColumnDef, changes: &ColumnChanges)
        -> Vec<String>;

    /// Generates SQL for dropping a named index.
    fn drop_index(&self, table: &str, name: &str) -> String;

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Whether `ALTER TABLE .. ADD COLUMN` accepts this column.
    fn can_add_column(&self, _column: &ColumnDef) -> bool {
        true
    }

    /// Whether type, nullability and default can change in place.
    fn supports_alter_column(&self) -> bool {
        true
    }

    /// Whether a foreign key can be added to an existing table.
    fn supports_add_foreign_key(&self) -> bool {
        true
    }

    /// Whether `ALTER TABLE .. DROP COLUMN` accepts this live column.
    fn can_drop_column(&self, _column: &ColumnSnapshot) -> bool {
        true
    }

    /// Canonical spelling of a column type, for comparison.
    fn normalize_type(&self, sql_type: &str) -> String {
        sql_type
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase()
    }

    /// Canonical spelling of a default expression, for comparison.
    fn normalize_default(&self, default: &str) -> String {
        let mut expr = default.trim();
        while expr.len() >= 2 && expr.starts_with('(') && expr.ends_with(')') {
            expr = expr[1..expr.len() - 1].trim();
        }
        expr.to_string()
    }

    /// Describes a declared field as a column of this dialect.
    fn column_def(&self, field: &FieldDefinition) -> ColumnDef {
        ColumnDef {
            name: field.name.clone(),
            sql_type: self.type_name(&field.kind),
            notnull: field.primary_key || !field.nullable,
            default: field.default.as_ref().map(|d| d.to_sql(self.engine())),
            primary_key: field.primary_key,
            auto_increment: field.is_auto_increment(),
            unique: field.unique && !field.primary_key,
            indexed: field.indexed && !field.unique && !field.primary_key,
            references: None,
        }
    }

    /// Generates the statements for an operation.
    fn generate_sql(&self, op: &MigrationOp) -> Vec<String> {
        match op {
            MigrationOp::CreateTable { table, columns } => self.create_table(table, columns),
            MigrationOp::AddColumn { table, column } => self.add_column(table, column),
            MigrationOp::AlterColumn {
                table,
                column,
                changes,
            } => self.alter_column(table, column, changes),
            MigrationOp::AddForeignKey {
                table,
                column,
                references,
            } => vec![self.add_foreign_key(table, column, references)],
            MigrationOp::DropColumn { table, column } => vec![self.drop_column(table, column)],
            MigrationOp::DropTable { table } => vec![self.drop_table(table)],
            MigrationOp::RebuildTable {
                table,
                columns,
                copy,
            } => self.rebuild_table(table, columns, copy),
        }
    }

    /// Generates a column definition as used in CREATE TABLE.
    fn column_definition(&self, column: &ColumnDef) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.sql_type
        );

        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.auto_increment {
                sql.push_str(&self.autoincrement_keyword());
            }
        } else if column.notnull {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_clause(column, default));
        }
        sql
    }

    /// Spelling of a default expression inside a column definition.
    fn default_clause(&self, _column: &ColumnDef, default: &str) -> String {
        default.to_string()
    }

    /// Generates the CREATE TABLE statement alone.
    fn table_statement(&self, table: &str, columns: &[ColumnDef]) -> String {
        let mut parts: Vec<String> = columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        for column in columns {
            if let Some(fk) = &column.references {
                parts.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.quote_identifier(&column.name),
                    self.quote_identifier(&fk.table),
                    self.quote_identifier(&fk.column)
                ));
            }
        }
        format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table),
            parts.join(", ")
        )
    }

    /// Generates CREATE TABLE followed by the table's indexes.
    fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Vec<String> {
        let mut statements = vec![self.table_statement(table, columns)];
        for column in columns {
            statements.extend(self.column_indexes(table, column));
        }
        statements
    }

    /// Generates CREATE INDEX statements for one column's flags.
    fn column_indexes(&self, table: &str, column: &ColumnDef) -> Vec<String> {
        let mut statements = Vec::new();
        if column.unique {
            statements.push(self.create_index(table, column, true));
        }
        if column.indexed {
            statements.push(self.create_index(table, column, false));
        }
        statements
    }

    /// Generates CREATE INDEX (or CREATE UNIQUE INDEX) for one column.
    fn create_index(&self, table: &str, column: &ColumnDef, unique: bool) -> String {
        let Some(key) = self.index_key(column) else {
            return format!(
                "-- {} cannot index {table}.{} ({}); index skipped",
                self.name(),
                column.name,
                column.sql_type
            );
        };
        let (keyword, name) = if unique {
            ("CREATE UNIQUE INDEX", unique_index_name(table, &column.name))
        } else {
            ("CREATE INDEX", index_name(table, &column.name))
        };
        format!(
            "{keyword} {} ON {} ({})",
            self.quote_identifier(&name),
            self.quote_identifier(table),
            key
        )
    }

    /// Key part of an index on the column; `None` when the column type
    /// cannot be indexed.
    fn index_key(&self, column: &ColumnDef) -> Option<String> {
        Some(self.quote_identifier(&column.name))
    }

    /// Generates the index half of an ALTER COLUMN.
    fn index_changes(
        &self,
        table: &str,
        column: &ColumnDef,
        changes: &ColumnChanges,
    ) -> Vec<String> {
        let name = &column.name;
        let mut statements = Vec::new();
        match changes.unique {
            Some(true) => statements.push(self.create_index(table, column, true)),
            Some(false) => {
                statements.push(self.drop_index(table, &unique_index_name(table, name)));
            }
            None => {}
        }
        match changes.indexed {
            Some(true) => statements.push(self.create_index(table, column, false)),
            Some(false) => statements.push(self.drop_index(table, &index_name(table, name))),
            None => {}
        }
        statements
    }

    /// Generates ADD COLUMN plus the column's indexes.
    fn add_column(&self, table: &str, column: &ColumnDef) -> Vec<String> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        );
        if let Some(fk) = &column.references {
            sql.push_str(&format!(
                " REFERENCES {} ({})",
                self.quote_identifier(&fk.table),
                self.quote_identifier(&fk.column)
            ));
        }
        let mut statements = vec![sql];
        statements.extend(self.column_indexes(table, column));
        statements
    }

    /// Generates the named constraint for a foreign key on an existing
    /// column.
    fn add_foreign_key(&self, table: &str, column: &str, references: &ForeignKeyRef) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(table),
            self.quote_identifier(&foreign_key_name(table, column)),
            self.quote_identifier(column),
            self.quote_identifier(&references.table),
            self.quote_identifier(&references.column)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Generates the copy-and-swap sequence that recreates a table.
    fn rebuild_table(&self, table: &str, columns: &[ColumnDef], copy: &[String]) -> Vec<String> {
        copy_and_swap(self, table, columns, copy)
    }
}
