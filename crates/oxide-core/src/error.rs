//! Error types for schema registration, relation resolution and drivers.

use std::fmt;

use thiserror::Error;

/// Errors raised while building a [`Schema`](crate::Schema).
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The same table name was registered twice.
    #[error("model `{0}` is declared more than once")]
    DuplicateModel(String),

    /// A model declares the same field twice.
    #[error("model `{table}` declares field `{field}` more than once")]
    DuplicateField {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
    },

    /// A model must declare exactly one primary key field.
    #[error("model `{table}` declares {count} primary keys, expected exactly one")]
    PrimaryKey {
        /// Table name.
        table: String,
        /// Number of primary key fields found.
        count: usize,
    },

    /// Table or field names must be plain SQL identifiers.
    #[error("invalid identifier `{0}`")]
    InvalidIdentifier(String),

    /// A model was looked up that was never registered.
    #[error("unknown model `{0}`")]
    UnknownModel(String),

    /// A pattern validator could not be compiled.
    #[error("invalid pattern for `{table}.{field}`: {source}")]
    InvalidPattern {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Underlying regex error.
        source: regex::Error,
    },

    /// A schema document could not be parsed.
    #[error("invalid schema document: {0}")]
    Document(#[from] serde_json::Error),

    /// Relation resolution failed.
    #[error(transparent)]
    ForeignKey(#[from] ForeignKeyError),
}

/// Errors raised by the foreign key resolver.
#[derive(Debug, Error)]
pub enum ForeignKeyError {
    /// A forward relation points at something that cannot be referenced.
    #[error("invalid foreign key `{table}.{field}` -> `{target_table}.{target_field}`: {reason}")]
    InvalidForeignKey {
        /// Table declaring the relation.
        table: String,
        /// Field declaring the relation.
        field: String,
        /// Referenced table.
        target_table: String,
        /// Referenced field.
        target_field: String,
        /// What is wrong with the target.
        reason: String,
    },

    /// A derived reverse relation name is already taken on the target.
    #[error("relation `{name}` on `{table}` derived from `{source_table}` collides with an existing field or relation")]
    AliasCollision {
        /// Table receiving the reverse relation.
        table: String,
        /// The colliding name.
        name: String,
        /// Table whose forward relation produced the reverse.
        source_table: String,
    },
}

/// Errors raised while walking a requested relation tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelationGraphError {
    /// The requested tree revisits a table already on the current path.
    #[error("circular relation: {}", .path.join(" -> "))]
    CircularRelation {
        /// Tables on the walk, ending with the revisited one.
        path: Vec<String>,
    },

    /// A relation name does not exist on the table.
    #[error("unknown relation `{relation}` on `{table}`")]
    UnknownRelation {
        /// Table being walked.
        table: String,
        /// Requested relation name.
        relation: String,
    },

    /// The requested tree nests deeper than allowed.
    #[error("relation depth exceeds the maximum of {max}")]
    RelationDepthExceeded {
        /// Configured maximum depth.
        max: usize,
    },
}

/// A single rejected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Index of the row in a batch, if any.
    pub row: Option<usize>,
    /// Field name.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {row} `{}`: {}", self.field, self.message),
            None => write!(f, "`{}`: {}", self.field, self.message),
        }
    }
}

/// Validation failures collected over a whole payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("validation failed: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for a field.
    pub fn add(&mut self, row: Option<usize>, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            row,
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the recorded failures.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns the messages recorded for a field, across all rows.
    pub fn messages_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Merges another error set into this one.
    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    /// Returns `Err(self)` if anything was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// An error reported by a database driver.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl DriverError {
    /// Wraps any driver-specific error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// Creates a driver error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self(message.into())
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let mut errors = ValidationError::new();
        errors.add(Some(0), "password", "must be between 8 and 64 characters");
        errors.add(None, "email", "enter a valid email address");

        assert_eq!(
            errors.to_string(),
            "validation failed: row 0 `password`: must be between 8 and 64 characters; \
             `email`: enter a valid email address"
        );
        assert_eq!(
            errors.messages_for("password").collect::<Vec<_>>(),
            vec!["must be between 8 and 64 characters"]
        );
    }

    #[test]
    fn test_validation_error_into_result() {
        assert!(ValidationError::new().into_result().is_ok());

        let mut errors = ValidationError::new();
        errors.add(None, "age", "must be at least 18");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_circular_relation_display() {
        let err = RelationGraphError::CircularRelation {
            path: vec!["users".into(), "posts".into(), "users".into()],
        };
        assert_eq!(err.to_string(), "circular relation: users -> posts -> users");
    }

    #[test]
    fn test_driver_error_message() {
        let err = DriverError::message("no such table: users");
        assert_eq!(err.to_string(), "no such table: users");
    }
}
