//! MySQL dialect for migrations.

use oxide_core::{Engine, FieldKind};

use super::MigrationDialect;
use crate::operations::{ColumnChanges, ColumnDef};

/// Prefix length of indexes on `TEXT` and `BLOB` columns.
const INDEX_PREFIX: usize = 255;

/// Types that only take expression defaults and cannot be indexed whole.
fn is_large_object(sql_type: &str) -> bool {
    let upper = sql_type.to_ascii_uppercase();
    upper == "JSON" || upper.ends_with("TEXT") || upper.ends_with("BLOB")
}

/// MySQL / MariaDB dialect for migration SQL generation.
///
/// `TEXT` and `BLOB` columns are indexed on their first 255 characters,
/// so uniqueness only covers that prefix. `JSON` columns are
/// never indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    fn type_name(&self, kind: &FieldKind) -> String {
        match kind {
            FieldKind::Id | FieldKind::Integer => "INT".to_string(),
            FieldKind::Uuid => "CHAR(36)".to_string(),
            FieldKind::String { max_length } => format!("VARCHAR({max_length})"),
            FieldKind::Email | FieldKind::Enum { .. } => "VARCHAR(255)".to_string(),
            FieldKind::Text => "TEXT".to_string(),
            FieldKind::BigInt => "BIGINT".to_string(),
            FieldKind::Float => "DOUBLE".to_string(),
            FieldKind::Decimal { precision, scale } => format!("DECIMAL({precision}, {scale})"),
            FieldKind::Boolean => "TINYINT(1)".to_string(),
            FieldKind::Date => "DATE".to_string(),
            FieldKind::DateTime => "DATETIME".to_string(),
            FieldKind::Json
            | FieldKind::Array { .. }
            | FieldKind::Object
            | FieldKind::Record
            | FieldKind::Tuple { .. } => "JSON".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        " AUTO_INCREMENT".to_string()
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn add_column(&self, table: &str, column: &ColumnDef) -> Vec<String> {
        // Inline REFERENCES is parsed and ignored, so the key is a clause.
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column)
        );
        if let Some(fk) = &column.references {
            sql.push_str(&format!(
                ", ADD FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote_identifier(&column.name),
                self.quote_identifier(&fk.table),
                self.quote_identifier(&fk.column)
            ));
        }
        let mut statements = vec![sql];
        statements.extend(self.column_indexes(table, column));
        statements
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
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.quote_identifier(table),
                self.column_definition(column)
            ));
        }
        statements.extend(self.index_changes(table, column, changes));
        statements
    }

    fn default_clause(&self, column: &ColumnDef, default: &str) -> String {
        if is_large_object(&column.sql_type) && !default.starts_with('(') {
            format!("({default})")
        } else {
            default.to_string()
        }
    }

    fn index_key(&self, column: &ColumnDef) -> Option<String> {
        let name = self.quote_identifier(&column.name);
        if column.sql_type.eq_ignore_ascii_case("JSON") {
            None
        } else if is_large_object(&column.sql_type) {
            Some(format!("{name}({INDEX_PREFIX})"))
        } else {
            Some(name)
        }
    }

    fn drop_index(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }
}
