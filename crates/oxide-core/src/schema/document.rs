//! JSON schema documents.
//!
//! Tools that cannot link application code (the migration CLI) read models
//! from a JSON document instead:
//!
//! ```json
//! {
//!   "models": [
//!     {
//!       "table": "users",
//!       "fields": {
//!         "id": { "type": "id" },
//!         "password": { "type": "string", "max_length": 64, "length": { "min": 8, "max": 64 } },
//!         "email": { "type": "email", "unique": true, "transforms": ["trim", "lowercase"] }
//!       }
//!     }
//!   ]
//! }
//! ```

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{model, Schema, SchemaBuilder};
use crate::error::SchemaError;
use crate::field::{FieldDefinition, FieldKind, Transform, Validator};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    models: Vec<ModelSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelSpec {
    table: String,
    fields: IndexMap<String, FieldSpec>,
}

#[derive(Debug, Deserialize)]
struct FieldSpec {
    #[serde(flatten)]
    kind: FieldKind,
    #[serde(default)]
    primary_key: bool,
    #[serde(default)]
    nullable: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    indexed: bool,
    default: Option<Value>,
    #[serde(default)]
    default_now: bool,
    references: Option<ReferenceSpec>,
    length: Option<Bounds<usize>>,
    range: Option<Bounds<f64>>,
    pattern: Option<String>,
    one_of: Option<Vec<Value>>,
    #[serde(default)]
    transforms: Vec<TransformName>,
}

#[derive(Debug, Deserialize)]
struct ReferenceSpec {
    table: String,
    field: String,
    reverse_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Bounds<T> {
    min: Option<T>,
    max: Option<T>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransformName {
    Trim,
    Lowercase,
    Uppercase,
}

/// Parses a schema document and builds the schema.
///
/// # Errors
///
/// Fails on malformed JSON, invalid patterns, or anything
/// [`SchemaBuilder::build`] rejects.
pub fn parse(text: &str) -> Result<Schema, SchemaError> {
    let document: Document = serde_json::from_str(text)?;

    let mut builder = SchemaBuilder::new();
    for spec in document.models {
        let mut declared = model(&spec.table);
        for (name, field) in spec.fields {
            let definition = field_definition(&spec.table, &name, field)?;
            declared = declared.field(name, definition);
        }
        builder = builder.model(declared);
    }
    builder.build()
}

fn field_definition(
    table: &str,
    name: &str,
    spec: FieldSpec,
) -> Result<FieldDefinition, SchemaError> {
    let is_id = spec.kind == FieldKind::Id;
    let mut field = FieldDefinition::new(spec.kind);

    if spec.primary_key || is_id {
        field = field.primary_key();
    }
    field.nullable = spec.nullable;
    field.unique = spec.unique;
    field.indexed = spec.indexed;

    if spec.default_now {
        field = field.default_now();
    } else if let Some(default) = spec.default {
        field = field.default(default);
    }

    if let Some(reference) = spec.references {
        field = field.references(reference.table, reference.field);
        if let Some(reverse) = reference.reverse_name {
            field = field.reverse_name(reverse);
        }
    }

    if let Some(Bounds { min, max }) = spec.length {
        field = field.validate(Validator::Length { min, max });
    }
    if let Some(Bounds { min, max }) = spec.range {
        field = field.validate(Validator::Range { min, max });
    }
    if let Some(pattern) = spec.pattern {
        let re = Regex::new(&pattern).map_err(|source| SchemaError::InvalidPattern {
            table: table.to_string(),
            field: name.to_string(),
            source,
        })?;
        field = field.pattern(re);
    }
    if let Some(values) = spec.one_of {
        field = field.validate(Validator::OneOf(values));
    }

    for transform in spec.transforms {
        field = field.transform(match transform {
            TransformName::Trim => Transform::Trim,
            TransformName::Lowercase => Transform::Lowercase,
            TransformName::Uppercase => Transform::Uppercase,
        });
    }

    Ok(field)
}
