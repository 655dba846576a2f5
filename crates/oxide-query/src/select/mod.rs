//! Select trees.
//!
//! A select tree names the columns to return and the relations to load:
//!
//! ```json
//! { "title": true,
//!   "author": true,
//!   "comments": { "select": { "body": true }, "where": { "hidden": false },
//!                 "limit": { "take": 3 }, "orderBy": "-id" } }
//! ```
//!
//! `name: true` is a column, or a relation loaded with all its columns when
//! `name` is not a column. A nested object always loads a relation; it may
//! hold `select`/`where`/`limit`/`orderBy`, or be a select tree itself.
//! When no column is named, every column is returned.

mod plan;
pub(crate) mod stitch;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::condition::ConditionNode;
use crate::error::QueryError;
use crate::request::{Limit, Ordering};

pub use plan::{Link, PlanNode, QueryPlan, SelectResolver};

const ARG_KEYS: [&str; 4] = ["select", "where", "limit", "orderBy"];

/// One entry of a select tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectEntry {
    /// `name: true`.
    Include,
    /// `name: { .. }`.
    Relation(Box<RelationArgs>),
}

/// Arguments of a nested relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationArgs {
    /// Nested selection.
    pub select: Option<SelectTree>,
    /// Filter on related rows.
    pub condition: Option<ConditionNode>,
    /// Window applied per parent row.
    pub limit: Option<Limit>,
    /// Sort keys.
    pub order_by: Ordering,
}

/// A parsed selection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct SelectTree {
    entries: IndexMap<String, SelectEntry>,
}

impl SelectTree {
    /// Creates an empty selection (all columns).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name: true`.
    #[must_use]
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.entries.insert(name.into(), SelectEntry::Include);
        self
    }

    /// Adds a nested relation.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, args: RelationArgs) -> Self {
        self.entries
            .insert(name.into(), SelectEntry::Relation(Box::new(args)));
        self
    }

    /// Entries in request order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SelectEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses the JSON surface syntax.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidRequest`] for anything other than booleans and
    /// objects as entry values.
    pub fn parse(value: &Value) -> Result<Self, QueryError> {
        let Value::Object(entries) = value else {
            return Err(QueryError::InvalidRequest(format!(
                "select must be an object, found `{value}`"
            )));
        };

        let mut tree = Self::new();
        for (name, entry) in entries {
            match entry {
                Value::Bool(true) => tree = tree.include(name),
                Value::Bool(false) => {}
                Value::Object(nested) => tree = tree.relation(name, parse_relation(nested)?),
                other => {
                    return Err(QueryError::InvalidRequest(format!(
                        "select entry `{name}` must be a boolean or an object, found `{other}`"
                    )))
                }
            }
        }
        Ok(tree)
    }
}

impl TryFrom<Value> for SelectTree {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

fn parse_relation(nested: &Map<String, Value>) -> Result<RelationArgs, QueryError> {
    let is_args = !nested.is_empty() && nested.keys().all(|k| ARG_KEYS.contains(&k.as_str()));
    if !is_args {
        let select = if nested.is_empty() {
            None
        } else {
            Some(SelectTree::parse(&Value::Object(nested.clone()))?)
        };
        return Ok(RelationArgs {
            select,
            ..RelationArgs::default()
        });
    }

    let mut args = RelationArgs::default();
    if let Some(select) = nested.get("select") {
        args.select = Some(SelectTree::parse(select)?);
    }
    if let Some(condition) = nested.get("where") {
        args.condition = Some(ConditionNode::parse(condition)?);
    }
    if let Some(limit) = nested.get("limit") {
        args.limit = Some(
            serde_json::from_value(limit.clone())
                .map_err(|e| QueryError::InvalidRequest(format!("invalid limit: {e}")))?,
        );
    }
    if let Some(order) = nested.get("orderBy") {
        args.order_by = Ordering::try_from(order.clone())?;
    }
    Ok(args)
}
