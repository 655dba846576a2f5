//! Foreign key resolution.
//!
//! Forward relations are declared on fields with
//! [`FieldDefinition::references`](crate::FieldDefinition::references) and
//! take the field's name. Each forward relation `A.field -> B.key` derives
//! a reverse relation on `B`, named after `A` in plural form unless the
//! field overrides it.

use indexmap::IndexMap;
use serde::Serialize;

use super::ModelSchema;
use crate::error::ForeignKeyError;

/// Direction of a relation relative to the table it is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// The local table stores the key.
    Forward,
    /// The remote table stores the key.
    Reverse,
}

/// How many remote rows match one local row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// At most one row.
    One,
    /// Any number of rows.
    Many,
}

/// A resolved relation between two tables.
///
/// In both directions the join condition reads
/// `remote_table.remote_field = local_table.local_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationRef {
    /// Relation name on the local table.
    pub name: String,
    /// Direction.
    pub kind: RelationKind,
    /// Column on the local table.
    pub local_field: String,
    /// Table on the other end.
    pub remote_table: String,
    /// Column on the remote table.
    pub remote_field: String,
    /// Remote rows per local row.
    pub multiplicity: Multiplicity,
}

type RelationMaps = IndexMap<String, IndexMap<String, RelationRef>>;

/// Produces the relation map of every model.
pub(super) fn resolve(models: &IndexMap<String, ModelSchema>) -> Result<RelationMaps, ForeignKeyError> {
    let mut maps: RelationMaps = models
        .keys()
        .map(|table| (table.clone(), IndexMap::new()))
        .collect();

    let mut reverse = Vec::new();

    for model in models.values() {
        for field in model.fields() {
            let Some(reference) = &field.references else {
                continue;
            };

            let invalid = |reason: &str| ForeignKeyError::InvalidForeignKey {
                table: model.table().to_string(),
                field: field.name.clone(),
                target_table: reference.table.clone(),
                target_field: reference.field.clone(),
                reason: reason.to_string(),
            };

            let target = models
                .get(&reference.table)
                .ok_or_else(|| invalid("target table is not registered"))?;
            let target_field = target
                .field(&reference.field)
                .ok_or_else(|| invalid("target field does not exist"))?;
            if !target_field.primary_key && !target_field.unique {
                return Err(invalid("target field is neither a primary key nor unique"));
            }

            if let Some(forward) = maps.get_mut(model.table()) {
                forward.insert(
                    field.name.clone(),
                    RelationRef {
                        name: field.name.clone(),
                        kind: RelationKind::Forward,
                        local_field: field.name.clone(),
                        remote_table: target.table().to_string(),
                        remote_field: target_field.name.clone(),
                        multiplicity: Multiplicity::One,
                    },
                );
            }

            let name = reference
                .reverse_name
                .clone()
                .unwrap_or_else(|| reverse_name(model.table()));
            let multiplicity = if field.unique || field.primary_key {
                Multiplicity::One
            } else {
                Multiplicity::Many
            };
            reverse.push((
                target.table().to_string(),
                RelationRef {
                    name,
                    kind: RelationKind::Reverse,
                    local_field: target_field.name.clone(),
                    remote_table: model.table().to_string(),
                    remote_field: field.name.clone(),
                    multiplicity,
                },
            ));
        }
    }

    for (table, relation) in reverse {
        let taken_by_field = models
            .get(&table)
            .is_some_and(|m| m.field(&relation.name).is_some());
        let Some(map) = maps.get_mut(&table) else {
            continue;
        };
        if taken_by_field || map.contains_key(&relation.name) {
            return Err(ForeignKeyError::AliasCollision {
                table,
                name: relation.name,
                source_table: relation.remote_table,
            });
        }
        map.insert(relation.name.clone(), relation);
    }

    Ok(maps)
}

/// Reverse relation name derived from the source table.
fn reverse_name(table: &str) -> String {
    if table.ends_with('s') {
        table.to_string()
    } else {
        pluralize(table)
    }
}

/// English plural of a table name.
#[must_use]
pub fn pluralize(name: &str) -> String {
    if name.ends_with('s') || name.ends_with('x') || name.ends_with("ch") || name.ends_with("sh") {
        format!("{name}es")
    } else if let Some(stem) = name.strip_suffix('y') {
        if stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            format!("{name}s")
        } else {
            format!("{stem}ies")
        }
    } else {
        format!("{name}s")
    }
}
