//! Simulates operations on an introspected schema.
//!
//! Applying a diff to the snapshot it was computed from yields the snapshot
//! introspection would report after running it, which makes the diff
//! engine testable without a database.

use oxide_core::{ColumnSnapshot, LiveSchema};

use crate::operations::{ColumnChanges, ColumnDef, DefaultChange, MigrationOp};

/// Replays [`MigrationOp`]s on a [`LiveSchema`].
pub trait SchemaState {
    /// Applies one operation. Operations on missing tables are ignored.
    fn apply(&mut self, op: &MigrationOp);

    /// Applies every operation in order.
    #[must_use]
    fn apply_all<'a, I>(self, ops: I) -> Self
    where
        I: IntoIterator<Item = &'a MigrationOp>;
}

impl SchemaState for LiveSchema {
    fn apply(&mut self, op: &MigrationOp) {
        match op {
            MigrationOp::CreateTable { table, columns }
            | MigrationOp::RebuildTable { table, columns, .. } => {
                self.insert_table(table.clone(), columns.iter().map(ColumnDef::snapshot).collect());
            }
            MigrationOp::DropTable { table } => {
                self.remove_table(table);
            }
            MigrationOp::AddColumn { table, column } => {
                if let Some(columns) = self.table_mut(table) {
                    columns.retain(|c| c.name != column.name);
                    columns.push(column.snapshot());
                }
            }
            // Snapshots carry no foreign keys.
            MigrationOp::AddForeignKey { .. } => {}
            MigrationOp::DropColumn { table, column } => {
                if let Some(columns) = self.table_mut(table) {
                    columns.retain(|c| &c.name != column);
                }
            }
            MigrationOp::AlterColumn {
                table,
                column,
                changes,
            } => {
                let Some(live) = self
                    .table_mut(table)
                    .and_then(|columns| columns.iter_mut().find(|c| c.name == column.name))
                else {
                    return;
                };
                alter(live, changes);
            }
        }
    }

    fn apply_all<'a, I>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = &'a MigrationOp>,
    {
        for op in ops {
            self.apply(op);
        }
        self
    }
}

fn alter(live: &mut ColumnSnapshot, changes: &ColumnChanges) {
    if let Some(sql_type) = &changes.sql_type {
        live.sql_type.clone_from(sql_type);
    }
    if let Some(nullable) = changes.nullable {
        live.notnull = !nullable;
    }
    match &changes.default {
        Some(DefaultChange::Set(default)) => live.default_value = Some(default.clone()),
        Some(DefaultChange::Drop) => live.default_value = None,
        None => {}
    }
    if let Some(unique) = changes.unique {
        live.unique = unique;
    }
    if let Some(indexed) = changes.indexed {
        live.indexed = indexed;
    }
}
