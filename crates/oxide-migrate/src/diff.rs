//! Schema diff engine.
//!
//! Compares the declared [`Schema`] against an introspected [`LiveSchema`]
//! and produces the operations that converge the database onto the
//! declaration. The diff is non-destructive: live tables that are not
//! declared are left alone, and primary keys are never altered.

use std::collections::HashSet;
use std::fmt;

use oxide_core::{ColumnSnapshot, FieldDefinition, LiveSchema, ModelSchema, Schema};
use serde::Serialize;

use crate::dialect::MigrationDialect;
use crate::operations::{ColumnChanges, ColumnDef, DefaultChange, ForeignKeyRef, MigrationOp};

/// Something the diff engine noticed but did not turn into an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffWarning {
    /// A primary-key column differs from its declaration.
    PrimaryKeyChange {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryKeyChange { table, column } => write!(
                f,
                "primary key column {table}.{column} differs from its declaration and was left unchanged"
            ),
        }
    }
}

/// Result of comparing the declared and live schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    /// Operations to apply, in order.
    pub operations: Vec<MigrationOp>,
    /// Differences that were not turned into operations.
    pub warnings: Vec<DiffWarning>,
}

impl SchemaDiff {
    /// Whether the database already matches the declaration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Generates SQL for every operation using the given dialect.
    #[must_use]
    pub fn to_sql<D: MigrationDialect + ?Sized>(&self, dialect: &D) -> Vec<String> {
        self.operations
            .iter()
            .flat_map(|op| dialect.generate_sql(op))
            .collect()
    }
}

/// Orders models so that referenced tables come before the tables that
/// reference them. Ties, and models caught in a cycle, keep declaration
/// order.
#[must_use]
pub fn creation_order(schema: &Schema) -> Vec<&ModelSchema> {
    let models: Vec<&ModelSchema> = schema.models().collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(models.len());

    while order.len() < models.len() {
        let pending = || models.iter().copied().filter(|m| !placed.contains(m.table()));
        let ready = pending().find(|m| {
            m.fields()
                .filter_map(|f| f.references.as_ref())
                .all(|r| r.table == m.table() || placed.contains(r.table.as_str()))
        });
        let Some(next) = ready.or_else(|| pending().next()) else {
            break;
        };
        placed.insert(next.table());
        order.push(next);
    }
    order
}

/// Detects the operations that converge a live schema onto a declared one.
#[derive(Debug)]
pub struct Autodetector<'d, D: ?Sized> {
    dialect: &'d D,
    force: bool,
}

impl<'d, D: MigrationDialect + ?Sized> Autodetector<'d, D> {
    /// Creates a non-destructive autodetector.
    #[must_use]
    pub const fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            force: false,
        }
    }

    /// Drops and recreates every declared table instead of converging.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Compares the declared schema with the live one.
    #[must_use]
    pub fn diff(&self, declared: &Schema, live: &LiveSchema) -> SchemaDiff {
        let order = creation_order(declared);
        let mut diff = SchemaDiff::default();
        let mut available: HashSet<&str> = live.table_names().collect();

        if self.force {
            for model in order.iter().rev() {
                diff.operations.push(MigrationOp::DropTable {
                    table: model.table().to_string(),
                });
                available.remove(model.table());
            }
        }

        let mut deferred = Vec::new();
        for model in &order {
            if !self.force && live.has_table(model.table()) {
                continue;
            }
            available.insert(model.table());
            let mut columns = Vec::new();
            let mut keys = Vec::new();
            for field in model.fields() {
                let (column, later) = self.column(field, &available);
                if let Some(references) = later {
                    keys.push((field.name.clone(), references));
                }
                columns.push(column);
            }
            if !keys.is_empty() {
                deferred.push((model.table(), columns.clone(), keys));
            }
            diff.operations.push(MigrationOp::CreateTable {
                table: model.table().to_string(),
                columns,
            });
        }

        // Every declared table exists from here on.
        for (table, columns, keys) in deferred {
            self.add_foreign_keys(table, columns, keys, &mut diff.operations);
        }

        if !self.force {
            for model in declared.models() {
                if let Some(columns) = live.table(model.table()) {
                    self.diff_table(model, columns, &available, &mut diff);
                }
            }
        }
        diff
    }

    /// The column for a field, plus the foreign key left for later when its
    /// target does not exist yet.
    fn column(
        &self,
        field: &FieldDefinition,
        available: &HashSet<&str>,
    ) -> (ColumnDef, Option<ForeignKeyRef>) {
        let mut column = self.dialect.column_def(field);
        let Some(reference) = &field.references else {
            return (column, None);
        };
        let key = ForeignKeyRef {
            table: reference.table.clone(),
            column: reference.field.clone(),
        };
        if available.contains(reference.table.as_str()) {
            column.references = Some(key);
            (column, None)
        } else {
            (column, Some(key))
        }
    }

    /// Adds keys left out of a table created earlier in the same diff.
    /// Dialects that cannot add a constraint rebuild the still empty table.
    fn add_foreign_keys(
        &self,
        table: &str,
        mut columns: Vec<ColumnDef>,
        keys: Vec<(String, ForeignKeyRef)>,
        operations: &mut Vec<MigrationOp>,
    ) {
        if self.dialect.supports_add_foreign_key() {
            operations.extend(keys.into_iter().map(|(column, references)| {
                MigrationOp::AddForeignKey {
                    table: table.to_string(),
                    column,
                    references,
                }
            }));
            return;
        }
        for (name, references) in keys {
            if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
                column.references = Some(references);
            }
        }
        operations.push(MigrationOp::RebuildTable {
            table: table.to_string(),
            columns,
            copy: Vec::new(),
        });
    }

    fn diff_table(
        &self,
        model: &ModelSchema,
        live: &[ColumnSnapshot],
        available: &HashSet<&str>,
        diff: &mut SchemaDiff,
    ) {
        let table = model.table();
        let mut drops = Vec::new();
        let mut adds = Vec::new();
        let mut alters = Vec::new();
        let mut rebuild = false;

        for column in live.iter().filter(|c| model.field(&c.name).is_none()) {
            if column.primary_key {
                diff.warnings.push(pk_warning(table, &column.name));
            } else if self.dialect.can_drop_column(column) {
                drops.push(MigrationOp::DropColumn {
                    table: table.to_string(),
                    column: column.name.clone(),
                });
            } else {
                rebuild = true;
            }
        }

        let mut declared = Vec::new();
        for field in model.fields() {
            let (column, _) = self.column(field, available);
            let existing = live.iter().find(|c| c.name == field.name);
            declared.push(column.clone());

            let Some(existing) = existing else {
                if field.primary_key {
                    diff.warnings.push(pk_warning(table, &field.name));
                } else if self.dialect.can_add_column(&column) {
                    adds.push(MigrationOp::AddColumn {
                        table: table.to_string(),
                        column,
                    });
                } else {
                    rebuild = true;
                }
                continue;
            };

            if field.primary_key || existing.primary_key {
                if field.primary_key != existing.primary_key
                    || self.compare(&column, existing).sql_type.is_some()
                {
                    diff.warnings.push(pk_warning(table, &field.name));
                }
                continue;
            }

            let changes = self.compare(&column, existing);
            if changes.is_empty() {
                continue;
            }
            if changes.is_structural() && !self.dialect.supports_alter_column() {
                rebuild = true;
            } else {
                alters.push(MigrationOp::AlterColumn {
                    table: table.to_string(),
                    column,
                    changes,
                });
            }
        }

        if rebuild {
            let copy = declared
                .iter()
                .filter(|c| live.iter().any(|l| l.name == c.name))
                .map(|c| c.name.clone())
                .collect();
            diff.operations.push(MigrationOp::RebuildTable {
                table: table.to_string(),
                columns: declared,
                copy,
            });
        } else {
            diff.operations.extend(drops);
            diff.operations.extend(adds);
            diff.operations.extend(alters);
        }
    }

    fn compare(&self, declared: &ColumnDef, live: &ColumnSnapshot) -> ColumnChanges {
        let mut changes = ColumnChanges::default();

        if self.dialect.normalize_type(&declared.sql_type) != self.dialect.normalize_type(&live.sql_type)
        {
            changes.sql_type = Some(declared.sql_type.clone());
        }
        if declared.notnull != live.notnull {
            changes.nullable = Some(!declared.notnull);
        }

        let wanted = self.default_of(declared.default.as_deref());
        if wanted != self.default_of(live.default_value.as_deref()) {
            changes.default = Some(match &declared.default {
                Some(default) if wanted.is_some() => DefaultChange::Set(default.clone()),
                _ => DefaultChange::Drop,
            });
        }

        if declared.unique != live.unique {
            changes.unique = Some(declared.unique);
        }
        if declared.indexed != live.indexed {
            changes.indexed = Some(declared.indexed);
        }
        changes
    }

    fn default_of(&self, default: Option<&str>) -> Option<String> {
        default
            .map(|d| self.dialect.normalize_default(d))
            .filter(|d| !d.eq_ignore_ascii_case("NULL"))
    }
}

fn pk_warning(table: &str, column: &str) -> DiffWarning {
    DiffWarning::PrimaryKeyChange {
        table: table.to_string(),
        column: column.to_string(),
    }
}
