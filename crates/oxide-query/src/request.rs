//! Request arguments for each action.
//!
//! Every request deserializes from the JSON surface syntax, e.g.
//!
//! ```json
//! { "select": { "title": true, "author": { "select": { "username": true } } },
//!   "where": { "views": { "gt": 10 } },
//!   "limit": { "take": 20, "skip": 40 },
//!   "orderBy": { "views": "desc" } }
//! ```

use indexmap::IndexMap;
use oxide_core::Row;
use serde::Deserialize;
use serde_json::Value;

use crate::condition::ConditionNode;
use crate::error::QueryError;
use crate::select::SelectTree;

/// Row window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limit {
    /// Maximum rows.
    pub take: Option<usize>,
    /// Rows skipped first.
    #[serde(default)]
    pub skip: usize,
}

impl Limit {
    /// Takes `n` rows.
    #[must_use]
    pub const fn take(n: usize) -> Self {
        Self {
            take: Some(n),
            skip: 0,
        }
    }

    /// Skips `n` rows first.
    #[must_use]
    pub const fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field name.
    pub field: String,
    /// Descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Descending on `field`.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses `"field"` or `"-field"` (descending).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        s.strip_prefix('-').map_or_else(|| Self::asc(s), Self::desc)
    }
}

/// Sort keys, in priority order.
///
/// Accepts `"-views"`, `{"views": "desc"}` or an array of either.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Ordering(pub Vec<OrderBy>);

impl Ordering {
    /// Sort keys.
    #[must_use]
    pub fn keys(&self) -> &[OrderBy] {
        &self.0
    }
}

impl TryFrom<Value> for Ordering {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        fn push(value: &Value, out: &mut Vec<OrderBy>) -> Result<(), QueryError> {
            match value {
                Value::String(s) => out.push(OrderBy::parse(s)),
                Value::Object(entries) => {
                    for (field, direction) in entries {
                        match direction.as_str().map(str::to_ascii_lowercase).as_deref() {
                            Some("asc") => out.push(OrderBy::asc(field)),
                            Some("desc") => out.push(OrderBy::desc(field)),
                            _ => {
                                return Err(QueryError::InvalidRequest(format!(
                                    "order direction for `{field}` must be \"asc\" or \"desc\""
                                )))
                            }
                        }
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        push(item, out)?;
                    }
                }
                other => {
                    return Err(QueryError::InvalidRequest(format!(
                        "invalid orderBy `{other}`"
                    )))
                }
            }
            Ok(())
        }

        let mut keys = Vec::new();
        push(&value, &mut keys)?;
        Ok(Self(keys))
    }
}

/// Arguments of a find.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FindArgs {
    /// Columns and relations to return; all columns when absent.
    pub select: Option<SelectTree>,
    /// Row filter.
    #[serde(rename = "where")]
    pub condition: Option<ConditionNode>,
    /// Row window.
    pub limit: Option<Limit>,
    /// Sort keys.
    #[serde(default)]
    pub order_by: Ordering,
}

impl FindArgs {
    /// Finds every row, subject to the row cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selection.
    #[must_use]
    pub fn select(mut self, select: SelectTree) -> Self {
        self.select = Some(select);
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn filter(mut self, condition: ConditionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Sets the row window.
    #[must_use]
    pub const fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.0.push(order);
        self
    }
}

/// Arguments of a create.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateArgs {
    /// Rows to insert.
    pub data: Vec<Row>,
}

impl CreateArgs {
    /// Inserts `rows`.
    #[must_use]
    pub const fn new(data: Vec<Row>) -> Self {
        Self { data }
    }
}

/// Arguments of an update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateArgs {
    /// Columns to set.
    pub data: Row,
    /// Rows to update.
    #[serde(rename = "where")]
    pub condition: Option<ConditionNode>,
    /// Allows updating every row when no condition is given.
    #[serde(default)]
    pub all_rows: bool,
}

/// Arguments of a delete.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteArgs {
    /// Rows to delete.
    #[serde(rename = "where")]
    pub condition: Option<ConditionNode>,
    /// Allows deleting every row when no condition is given.
    #[serde(default)]
    pub all_rows: bool,
}

/// Aggregates requested for one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateSpec {
    /// `COUNT`.
    #[serde(default)]
    pub count: bool,
    /// `MIN`.
    #[serde(default)]
    pub min: bool,
    /// `MAX`.
    #[serde(default)]
    pub max: bool,
    /// `SUM`.
    #[serde(default)]
    pub sum: bool,
    /// `AVG`.
    #[serde(default)]
    pub avg: bool,
}

/// Arguments of an aggregate.
///
/// The field name `_all` counts rows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateArgs {
    /// Aggregates per field.
    pub aggregate: IndexMap<String, AggregateSpec>,
    /// Rows to aggregate.
    #[serde(rename = "where")]
    pub condition: Option<ConditionNode>,
}
