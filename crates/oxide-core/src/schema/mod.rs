//! Schema registry.
//!
//! Models are registered on a [`SchemaBuilder`] and frozen by
//! [`SchemaBuilder::build`]. The resulting [`Schema`] is immutable and is
//! shared by reference (usually behind an `Arc`) with the query compiler
//! and the migration engine.

pub mod document;
mod path;
mod relations;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::SchemaError;
use crate::field::FieldDefinition;

pub use path::{RelationPath, DEFAULT_MAX_DEPTH};
pub use relations::{pluralize, Multiplicity, RelationKind, RelationRef};

/// Starts declaring a model for `table`.
#[must_use]
pub fn model(table: impl Into<String>) -> ModelBuilder {
    ModelBuilder::new(table)
}

/// A model being declared.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    table: String,
    fields: Vec<FieldDefinition>,
}

impl ModelBuilder {
    /// Creates an empty model for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    /// Attaches a field under `name`.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, mut definition: FieldDefinition) -> Self {
        definition.name = name.into();
        self.fields.push(definition);
        self
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn into_model(self) -> Result<ModelSchema, SchemaError> {
        check_identifier(&self.table)?;

        let mut fields = IndexMap::with_capacity(self.fields.len());
        for field in self.fields {
            check_identifier(&field.name)?;
            if fields.contains_key(&field.name) {
                return Err(SchemaError::DuplicateField {
                    table: self.table,
                    field: field.name,
                });
            }
            fields.insert(field.name.clone(), field);
        }

        let keys: Vec<&String> = fields
            .values()
            .filter(|f| f.primary_key)
            .map(|f| &f.name)
            .collect();
        if keys.len() != 1 {
            return Err(SchemaError::PrimaryKey {
                count: keys.len(),
                table: self.table,
            });
        }
        let primary_key = keys[0].clone();

        Ok(ModelSchema {
            table: self.table,
            fields,
            primary_key,
            relations: IndexMap::new(),
        })
    }
}

/// A registered table.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    table: String,
    fields: IndexMap<String, FieldDefinition>,
    primary_key: String,
    relations: IndexMap<String, RelationRef>,
}

impl ModelSchema {
    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values()
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// Name of the primary key field.
    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Relations, forward ones first.
    pub fn relations(&self) -> impl Iterator<Item = &RelationRef> {
        self.relations.values()
    }

    /// Looks up a relation.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationRef> {
        self.relations.get(name)
    }

    /// Whether `name` is taken by a field or a relation.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.relations.contains_key(name)
    }
}

/// Collects models before resolution.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    models: Vec<ModelBuilder>,
}

impl SchemaBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model.
    #[must_use]
    pub fn model(mut self, model: ModelBuilder) -> Self {
        self.models.push(model);
        self
    }

    /// Validates every model, resolves relations and freezes the schema.
    ///
    /// # Errors
    ///
    /// Fails on duplicate tables or fields, invalid identifiers, a model
    /// without exactly one primary key, or an unresolvable relation.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut models: IndexMap<String, ModelSchema> = IndexMap::new();
        for builder in self.models {
            if models.contains_key(builder.table()) {
                return Err(SchemaError::DuplicateModel(builder.table));
            }
            let model = builder.into_model()?;
            models.insert(model.table.clone(), model);
        }

        let mut resolved = relations::resolve(&models)?;
        for (table, model) in &mut models {
            if let Some(relations) = resolved.shift_remove(table) {
                model.relations = relations;
            }
        }

        debug!(
            models = models.len(),
            relations = models.values().map(|m| m.relations.len()).sum::<usize>(),
            "schema built"
        );

        Ok(Schema { models })
    }
}

/// An immutable, fully resolved set of models.
#[derive(Debug, Clone)]
pub struct Schema {
    models: IndexMap<String, ModelSchema>,
}

impl Schema {
    /// Looks up a model.
    #[must_use]
    pub fn model(&self, table: &str) -> Option<&ModelSchema> {
        self.models.get(table)
    }

    /// Looks up a model, failing if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownModel`] for unregistered tables.
    pub fn get(&self, table: &str) -> Result<&ModelSchema, SchemaError> {
        self.models
            .get(table)
            .ok_or_else(|| SchemaError::UnknownModel(table.to_string()))
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }

    /// Position of a model in registration order.
    #[must_use]
    pub fn position(&self, table: &str) -> Option<usize> {
        self.models.get_index_of(table)
    }

    /// Number of models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;

    fn blog() -> SchemaBuilder {
        SchemaBuilder::new()
            .model(
                model("users")
                    .field("id", field::id())
                    .field("username", field::string(64))
                    .field("email", field::email().unique()),
            )
            .model(
                model("posts")
                    .field("id", field::id())
                    .field("title", field::string(255))
                    .field("author", field::integer().references("users", "id")),
            )
    }

    #[test]
    fn test_build_keeps_declaration_order() {
        let schema = blog().build().unwrap();
        let tables: Vec<&str> = schema.models().map(ModelSchema::table).collect();
        assert_eq!(tables, vec!["users", "posts"]);

        let users = schema.model("users").unwrap();
        let fields: Vec<&str> = users.fields().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["id", "username", "email"]);
        assert_eq!(users.primary_key(), "id");
        assert_eq!(schema.position("posts"), Some(1));
    }

    #[test]
    fn test_duplicate_model() {
        let err = blog()
            .model(model("users").field("id", field::id()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateModel(t) if t == "users"));
    }

    #[test]
    fn test_duplicate_field() {
        let err = SchemaBuilder::new()
            .model(
                model("tags")
                    .field("id", field::id())
                    .field("name", field::text())
                    .field("name", field::text()),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { field, .. } if field == "name"));
    }

    #[test]
    fn test_requires_exactly_one_primary_key() {
        let none = SchemaBuilder::new()
            .model(model("tags").field("name", field::text()))
            .build()
            .unwrap_err();
        assert!(matches!(none, SchemaError::PrimaryKey { count: 0, .. }));

        let two = SchemaBuilder::new()
            .model(
                model("tags")
                    .field("id", field::id())
                    .field("code", field::uuid().primary_key()),
            )
            .build()
            .unwrap_err();
        assert!(matches!(two, SchemaError::PrimaryKey { count: 2, .. }));
    }

    #[test]
    fn test_rejects_invalid_identifiers() {
        let err = SchemaBuilder::new()
            .model(model("user accounts").field("id", field::id()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIdentifier(_)));

        let err = SchemaBuilder::new()
            .model(model("users").field("id", field::id()).field("1st", field::text()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidIdentifier(name) if name == "1st"));
    }

    #[test]
    fn test_unknown_model() {
        let schema = blog().build().unwrap();
        assert!(schema.get("comments").is_err());
        assert!(schema.get("posts").is_ok());
    }
}
