//! Applies a schema diff to a database.

use oxide_core::{Executor, LiveSchema, Schema};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::diff::{Autodetector, DiffWarning, SchemaDiff};
use crate::dialect::{self, MigrationDialect};
use crate::error::{MigrateError, Result};
use crate::operations::MigrationOp;

/// Outcome of [`Migrator::migrate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Operations applied, in order.
    pub applied: Vec<MigrationOp>,
    /// Statements executed, in order.
    pub statements: Vec<String>,
    /// Differences that were left alone.
    pub warnings: Vec<DiffWarning>,
}

impl MigrationReport {
    /// Whether nothing had to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Converges one database onto a declared schema.
///
/// Operations run one at a time, outside any transaction; a failure stops
/// the run and everything before it stays applied.
pub struct Migrator<'s, E> {
    executor: E,
    schema: &'s Schema,
    dialect: Box<dyn MigrationDialect + Send + Sync>,
}

impl<E> std::fmt::Debug for Migrator<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl<'s, E: Executor> Migrator<'s, E> {
    /// Creates a migrator using the executor's engine dialect.
    #[must_use]
    pub fn new(executor: E, schema: &'s Schema) -> Self {
        let dialect = dialect::for_engine(executor.engine());
        Self {
            executor,
            schema,
            dialect,
        }
    }

    /// The dialect statements are rendered with.
    #[must_use]
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// The underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// Reads the live schema.
    ///
    /// # Errors
    ///
    /// Introspection failed.
    pub async fn inspect(&self) -> Result<LiveSchema> {
        Ok(self.executor.get_schema().await?)
    }

    /// Computes the diff without running it.
    ///
    /// # Errors
    ///
    /// Introspection failed.
    pub async fn plan(&self, force: bool) -> Result<SchemaDiff> {
        let live = self.inspect().await?;
        let diff = Autodetector::new(self.dialect.as_ref())
            .force(force)
            .diff(self.schema, &live);

        for warning in &diff.warnings {
            warn!(%warning, "schema difference left unchanged");
        }
        debug!(
            operations = diff.operations.len(),
            force, "planned migration"
        );
        Ok(diff)
    }

    /// Returns the SQL a non-forced migration would run.
    ///
    /// # Errors
    ///
    /// Introspection failed.
    pub async fn generate_migration(&self) -> Result<Vec<String>> {
        let diff = self.plan(false).await?;
        Ok(diff.to_sql(self.dialect.as_ref()))
    }

    /// Plans and applies the migration, operation by operation.
    ///
    /// # Errors
    ///
    /// Introspection failed, or an operation was rejected; the latter
    /// reports the operations applied before it.
    pub async fn migrate(&self, force: bool) -> Result<MigrationReport> {
        let diff = self.plan(force).await?;
        let mut applied = Vec::with_capacity(diff.operations.len());
        let mut statements = Vec::new();

        for op in diff.operations {
            let mut executed = Vec::new();
            for sql in self.dialect.generate_sql(&op) {
                if sql.starts_with("--") {
                    warn!(comment = %sql, "skipping unsupported statement");
                    continue;
                }
                debug!(sql = %sql, "executing migration statement");
                if let Err(source) = self.executor.execute(&sql).await {
                    if !executed.is_empty() {
                        warn!(%op, executed = executed.len(), "operation failed part way");
                    }
                    return Err(MigrateError::OpFailed {
                        applied,
                        failed: Box::new(op),
                        executed,
                        statement: sql,
                        source,
                    });
                }
                executed.push(sql);
            }
            info!(%op, "applied");
            statements.extend(executed);
            applied.push(op);
        }

        Ok(MigrationReport {
            applied,
            statements,
            warnings: diff.warnings,
        })
    }
}
