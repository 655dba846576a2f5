//! Migration operations.
//!
//! Operations carry column definitions already rendered for one dialect,
//! so the SQL they produce and the snapshot they simulate agree with what
//! introspection later reports.

use std::fmt;

use oxide_core::ColumnSnapshot;
use serde::Serialize;

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyRef {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
}

/// A column as it should exist after the migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// SQL type in the dialect's spelling.
    pub sql_type: String,
    /// Whether NOT NULL is enforced.
    pub notnull: bool,
    /// Default expression, already rendered.
    pub default: Option<String>,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Whether the database generates the key.
    pub auto_increment: bool,
    /// Whether a unique index covers the column.
    pub unique: bool,
    /// Whether a plain index covers the column.
    pub indexed: bool,
    /// Foreign key, when its target is known to exist.
    pub references: Option<ForeignKeyRef>,
}

impl ColumnDef {
    /// Creates a nullable column with no default or index.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            notnull: false,
            default: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            indexed: false,
            references: None,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.notnull = true;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_sql(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the column as the generated primary key.
    #[must_use]
    pub const fn auto_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = true;
        self.notnull = true;
        self
    }

    /// Adds a unique index.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds a plain index.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// The snapshot introspection reports once this column exists.
    #[must_use]
    pub fn snapshot(&self) -> ColumnSnapshot {
        ColumnSnapshot {
            name: self.name.clone(),
            sql_type: self.sql_type.clone(),
            notnull: self.notnull,
            default_value: self.default.clone(),
            primary_key: self.primary_key,
            indexed: self.indexed,
            unique: self.unique,
        }
    }
}

/// New default of an altered column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultChange {
    /// Set to this expression.
    Set(String),
    /// Remove the default.
    Drop,
}

/// What differs on an altered column. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnChanges {
    /// New SQL type.
    pub sql_type: Option<String>,
    /// New nullability.
    pub nullable: Option<bool>,
    /// New default.
    pub default: Option<DefaultChange>,
    /// New unique flag.
    pub unique: Option<bool>,
    /// New plain-index flag.
    pub indexed: Option<bool>,
}

impl ColumnChanges {
    /// Whether nothing changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sql_type.is_none()
            && self.nullable.is_none()
            && self.default.is_none()
            && self.unique.is_none()
            && self.indexed.is_none()
    }

    /// Whether the change touches the column itself rather than an index.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        self.sql_type.is_some() || self.nullable.is_some() || self.default.is_some()
    }
}

/// One schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MigrationOp {
    /// Create a table with its indexes.
    CreateTable {
        /// Table name.
        table: String,
        /// Columns in declaration order.
        columns: Vec<ColumnDef>,
    },
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// The new column.
        column: ColumnDef,
    },
    /// Change a column in place.
    AlterColumn {
        /// Table name.
        table: String,
        /// The column as it should end up.
        column: ColumnDef,
        /// What differs from the live column.
        changes: ColumnChanges,
    },
    /// Add a foreign key to an existing column.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Column holding the key.
        column: String,
        /// Referenced table and column.
        references: ForeignKeyRef,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Drop a table if it exists.
    DropTable {
        /// Table name.
        table: String,
    },
    /// Recreate a table under its new definition, keeping the rows of the
    /// copied columns.
    RebuildTable {
        /// Table name.
        table: String,
        /// Columns of the new table.
        columns: Vec<ColumnDef>,
        /// Columns copied from the old table.
        copy: Vec<String>,
    },
}

impl MigrationOp {
    /// Table the operation works on.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropColumn { table, .. }
            | Self::DropTable { table }
            | Self::RebuildTable { table, .. } => table,
        }
    }

    /// Whether the operation can lose data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropColumn { .. } | Self::DropTable { .. } | Self::RebuildTable { .. }
        )
    }
}

impl fmt::Display for MigrationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, .. } => write!(f, "create table {table}"),
            Self::AddColumn { table, column } => write!(f, "add column {table}.{}", column.name),
            Self::AlterColumn { table, column, .. } => {
                write!(f, "alter column {table}.{}", column.name)
            }
            Self::AddForeignKey { table, column, .. } => {
                write!(f, "add foreign key {table}.{column}")
            }
            Self::DropColumn { table, column } => write!(f, "drop column {table}.{column}"),
            Self::DropTable { table } => write!(f, "drop table {table}"),
            Self::RebuildTable { table, .. } => write!(f, "rebuild table {table}"),
        }
    }
}
