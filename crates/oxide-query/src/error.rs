//! Error types for query compilation and execution.

use oxide_core::{DriverError, RelationGraphError, SchemaError, ValidationError};
use thiserror::Error;

use crate::hooks::Action;

/// A predicate tree that cannot be compiled against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// An operator key is not recognised, or a field was used as a relation.
    #[error("unknown operator `{operator}` on `{field}`")]
    UnknownOperator {
        /// Field or relation the operator was applied to.
        field: String,
        /// The offending key.
        operator: String,
    },

    /// A field does not exist on the table.
    #[error("unknown field `{field}` on `{table}`")]
    UnknownField {
        /// Table searched.
        table: String,
        /// Requested field.
        field: String,
    },

    /// The operator cannot be applied to the field's kind.
    #[error("operator `{operator}` is not allowed on `{table}.{field}` of type {kind}")]
    DisallowedFieldType {
        /// Table name.
        table: String,
        /// Field name.
        field: String,
        /// Field kind.
        kind: String,
        /// Operator or aggregate.
        operator: String,
    },

    /// The operand does not fit the operator.
    #[error("invalid operand for `{operator}` on `{field}`: {reason}")]
    InvalidOperand {
        /// Field name.
        field: String,
        /// Operator name.
        operator: String,
        /// What is wrong.
        reason: String,
    },

    /// The condition is not an object, array or group.
    #[error("malformed condition: {0}")]
    Malformed(String),
}

/// A request rejected by the configured safety rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    /// More rows requested than the cap allows.
    #[error("{action} on `{table}` requests {requested} rows, the maximum is {max}")]
    LimitExceeded {
        /// Table name.
        table: String,
        /// Action.
        action: Action,
        /// Requested row count.
        requested: usize,
        /// Configured cap.
        max: usize,
    },

    /// Update or delete without a predicate.
    #[error("{action} on `{table}` requires a where clause or the all-rows flag")]
    MissingWhereClause {
        /// Table name.
        table: String,
        /// Action.
        action: Action,
    },
}

/// A statement the driver rejected.
#[derive(Debug, Error)]
#[error("failed to execute `{statement}`: {source}")]
pub struct ExecutionError {
    /// The statement sent.
    pub statement: String,
    /// The driver error.
    #[source]
    pub source: DriverError,
}

/// Invalid client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document is not valid JSON.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Any failure of a client operation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown table or broken schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Relation tree problem.
    #[error(transparent)]
    Relation(#[from] RelationGraphError),

    /// Predicate compilation problem.
    #[error(transparent)]
    Predicate(#[from] PredicateError),

    /// Safety rule violation.
    #[error(transparent)]
    Safety(#[from] SafetyError),

    /// Payload validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Driver failure.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A request that cannot be interpreted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A before-hook refused the request.
    #[error("{action} rejected by hook: {reason}")]
    Rejected {
        /// Action being run.
        action: Action,
        /// Reason given by the hook.
        reason: String,
    },
}

impl QueryError {
    /// Whether the error was raised before any SQL was sent.
    #[must_use]
    pub const fn is_compile_error(&self) -> bool {
        !matches!(self, Self::Execution(_))
    }
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
