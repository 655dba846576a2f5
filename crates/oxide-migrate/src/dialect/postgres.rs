//! PostgreSQL dialect for migrations.

use oxide_core::{Engine, FieldKind};

use super::MigrationDialect;
use crate::operations::{ColumnChanges, ColumnDef, DefaultChange};

/// PostgreSQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn engine(&self) -> Engine {
        Engine::Postgresql
    }

    fn type_name(&self, kind: &FieldKind) -> String {
        match kind {
            // SERIAL carries the sequence, no keyword needed.
            FieldKind::Id => "SERIAL".to_string(),
            FieldKind::Uuid => "UUID".to_string(),
            FieldKind::String { max_length } => format!("VARCHAR({max_length})"),
            FieldKind::Email => "VARCHAR(255)".to_string(),
            FieldKind::Text | FieldKind::Enum { .. } => "TEXT".to_string(),
            FieldKind::Integer => "INTEGER".to_string(),
            FieldKind::BigInt => "BIGINT".to_string(),
            FieldKind::Float => "DOUBLE PRECISION".to_string(),
            FieldKind::Decimal { precision, scale } => format!("NUMERIC({precision}, {scale})"),
            FieldKind::Boolean => "BOOLEAN".to_string(),
            FieldKind::Date => "DATE".to_string(),
            FieldKind::DateTime => "TIMESTAMP".to_string(),
            FieldKind::Json
            | FieldKind::Array { .. }
            | FieldKind::Object
            | FieldKind::Record
            | FieldKind::Tuple { .. } => "JSONB".to_string(),
        }
    }

    fn autoincrement_keyword(&self) -> String {
        String::new()
    }

    fn normalize_type(&self, sql_type: &str) -> String {
        let upper = sql_type
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match upper.as_str() {
            "SERIAL" | "INT" | "INT4" => "INTEGER".to_string(),
            "BIGSERIAL" | "INT8" => "BIGINT".to_string(),
            "FLOAT8" => "DOUBLE PRECISION".to_string(),
            "BOOL" => "BOOLEAN".to_string(),
            "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP".to_string(),
            _ => upper
                .replace("CHARACTER VARYING", "VARCHAR")
                .replace(", ", ","),
        }
    }

    fn normalize_default(&self, default: &str) -> String {
        // Introspection reports casts such as `'member'::character varying`.
        let trimmed = default.trim();
        let expr = match trimmed.rfind("::") {
            Some(at) if !trimmed[at..].contains('\'') => &trimmed[..at],
            _ => trimmed,
        };
        expr.trim_matches(['(', ')']).to_string()
    }

    fn alter_column(
        &self,
        table: &str,
        column: &ColumnDef,
        changes: &ColumnChanges,
    ) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name)
        );
        let mut statements = Vec::new();

        if let Some(sql_type) = &changes.sql_type {
            statements.push(format!("{prefix} TYPE {sql_type}"));
        }
        match changes.nullable {
            Some(true) => statements.push(format!("{prefix} DROP NOT NULL")),
            Some(false) => statements.push(format!("{prefix} SET NOT NULL")),
            None => {}
        }
        match &changes.default {
            Some(DefaultChange::Set(default)) => {
                statements.push(format!("{prefix} SET DEFAULT {default}"));
            }
            Some(DefaultChange::Drop) => statements.push(format!("{prefix} DROP DEFAULT")),
            None => {}
        }

        statements.extend(self.index_changes(table, column, changes));
        statements
    }

    fn drop_index(&self, _table: &str, name: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{ForeignKeyRef, MigrationOp};

    #[test]
    fn test_postgres_data_types() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.type_name(&FieldKind::Integer), "INTEGER");
        assert_eq!(dialect.type_name(&FieldKind::BigInt), "BIGINT");
        assert_eq!(
            dialect.type_name(&FieldKind::String { max_length: 255 }),
            "VARCHAR(255)"
        );
        assert_eq!(dialect.type_name(&FieldKind::Boolean), "BOOLEAN");
        assert_eq!(dialect.type_name(&FieldKind::DateTime), "TIMESTAMP");
        assert_eq!(
            dialect.type_name(&FieldKind::Decimal {
                precision: 10,
                scale: 2
            }),
            "NUMERIC(10, 2)"
        );
        assert_eq!(dialect.type_name(&FieldKind::Object), "JSONB");
    }

    #[test]
    fn test_create_table_with_serial() {
        let dialect = PostgresDialect::new();
        let sql = dialect.generate_sql(&MigrationOp::CreateTable {
            table: "users".into(),
            columns: vec![
                ColumnDef::new("id", "SERIAL").auto_key(),
                ColumnDef::new("active", "BOOLEAN")
                    .not_null()
                    .default_sql("TRUE"),
            ],
        });
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"users\" (\"id\" SERIAL PRIMARY KEY, \
                 \"active\" BOOLEAN NOT NULL DEFAULT TRUE)"
            ]
        );
    }

    #[test]
    fn test_alter_column_sql() {
        let dialect = PostgresDialect::new();
        let column = ColumnDef::new("email", "VARCHAR(320)").not_null();
        let changes = ColumnChanges {
            sql_type: Some("VARCHAR(320)".into()),
            nullable: Some(false),
            default: Some(DefaultChange::Drop),
            unique: Some(true),
            indexed: None,
        };

        assert_eq!(
            dialect.alter_column("users", &column, &changes),
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" TYPE VARCHAR(320)",
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" SET NOT NULL",
                "ALTER TABLE \"users\" ALTER COLUMN \"email\" DROP DEFAULT",
                "CREATE UNIQUE INDEX \"uq_users_email\" ON \"users\" (\"email\")",
            ]
        );
    }

    #[test]
    fn test_add_column_with_reference() {
        let dialect = PostgresDialect::new();
        let sql = dialect.add_column(
            "posts",
            &ColumnDef::new("editor", "INTEGER").references("users", "id"),
        );
        assert_eq!(
            sql,
            vec!["ALTER TABLE \"posts\" ADD COLUMN \"editor\" INTEGER REFERENCES \"users\" (\"id\")"]
        );
    }

    #[test]
    fn test_add_foreign_key() {
        let dialect = PostgresDialect::new();
        let sql = dialect.generate_sql(&MigrationOp::AddForeignKey {
            table: "teams".into(),
            column: "captain".into(),
            references: ForeignKeyRef {
                table: "players".into(),
                column: "id".into(),
            },
        });
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"teams\" ADD CONSTRAINT \"fk_teams_captain\" \
                 FOREIGN KEY (\"captain\") REFERENCES \"players\" (\"id\")"
            ]
        );
    }

    #[test]
    fn test_normalize_default_strips_casts() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.normalize_default("'member'::character varying"),
            "'member'"
        );
        assert_eq!(dialect.normalize_default("'a::b'"), "'a::b'");
        assert_eq!(dialect.normalize_default("0"), "0");
    }

    #[test]
    fn test_normalize_type_aliases() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.normalize_type("SERIAL"), "INTEGER");
        assert_eq!(dialect.normalize_type("character varying(64)"), "VARCHAR(64)");
        assert_eq!(
            dialect.normalize_type("numeric(10, 2)"),
            dialect.normalize_type("NUMERIC(10,2)")
        );
    }
}
