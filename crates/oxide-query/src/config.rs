//! Client configuration.

use std::collections::HashMap;

use oxide_core::schema::DEFAULT_MAX_DEPTH;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hooks::Action;

/// Default row cap.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Per-table overrides of the row cap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableLimits {
    /// Cap for every action on the table.
    pub max_rows: Option<usize>,
    /// Cap for finds.
    pub find: Option<usize>,
    /// Cap for creates.
    pub create: Option<usize>,
}

/// Safety caps and limits shared by every request of a client.
///
/// ```json
/// { "max_rows": 500, "max_relation_depth": 3,
///   "tables": { "audit_log": { "find": 50 } } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Row cap used when no override applies.
    pub max_rows: usize,
    /// How deeply select and predicate trees may nest relations.
    pub max_relation_depth: usize,
    /// Per-table overrides.
    pub tables: HashMap<String, TableLimits>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            max_relation_depth: DEFAULT_MAX_DEPTH,
            tables: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Malformed JSON or a zero cap.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the default row cap.
    #[must_use]
    pub const fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Sets the relation depth limit.
    #[must_use]
    pub const fn max_relation_depth(mut self, depth: usize) -> Self {
        self.max_relation_depth = depth;
        self
    }

    /// Overrides the caps of one table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>, limits: TableLimits) -> Self {
        self.tables.insert(table.into(), limits);
        self
    }

    /// Checks that every cap is positive.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows == 0 {
            return Err(ConfigError::Invalid(String::from("max_rows must be positive")));
        }
        for (table, limits) in &self.tables {
            let caps = [limits.max_rows, limits.find, limits.create];
            if caps.iter().flatten().any(|cap| *cap == 0) {
                return Err(ConfigError::Invalid(format!(
                    "limits for `{table}` must be positive"
                )));
            }
        }
        Ok(())
    }

    /// Row cap for an action on a table.
    #[must_use]
    pub fn cap(&self, table: &str, action: Action) -> usize {
        let Some(limits) = self.tables.get(table) else {
            return self.max_rows;
        };
        let specific = match action {
            Action::Find => limits.find,
            Action::Create => limits.create,
            Action::Update | Action::Delete | Action::Aggregate => None,
        };
        specific.or(limits.max_rows).unwrap_or(self.max_rows)
    }
}
