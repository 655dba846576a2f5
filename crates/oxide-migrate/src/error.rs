//! Error types for the migration engine.

use oxide_core::DriverError;

use crate::operations::MigrationOp;

/// Errors raised while planning or applying a migration.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// An operation failed; everything before it stays applied, including
    /// the statements of the failed operation that already ran.
    #[error(
        "failed to {failed} after {} applied operation(s) and {} of its statement(s): {source}",
        .applied.len(),
        .executed.len()
    )]
    OpFailed {
        /// Operations that completed, in order.
        applied: Vec<MigrationOp>,
        /// The operation that failed.
        failed: Box<MigrationOp>,
        /// Statements of the failed operation that ran before the rejected
        /// one.
        executed: Vec<String>,
        /// The statement the database rejected.
        statement: String,
        /// Driver error.
        source: DriverError,
    },

    /// The live schema could not be read.
    #[error("cannot read the live schema: {0}")]
    Introspection(#[from] DriverError),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
