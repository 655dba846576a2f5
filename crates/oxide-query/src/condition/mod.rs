//! Predicate trees.
//!
//! Conditions arrive as JSON and are parsed once into a [`ConditionNode`]:
//!
//! - an object is the AND of its entries,
//! - an array is the OR of its elements,
//! - `AND`, `OR` and `NOT` keys group explicitly,
//! - `field: { op: value, .. }` is a leaf (several operators are AND-ed),
//! - `field: value` is shorthand for `equals`,
//! - `relation: { .. }` without operator keys scopes a condition to a
//!   related table.
//!
//! Parsing is purely syntactic. Names are checked against the schema when
//! the tree is compiled.

mod compile;

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PredicateError;

pub use compile::PredicateCompiler;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`, or `IS NULL` for null.
    Equals,
    /// `<>`, or `IS NOT NULL` for null.
    Not,
    /// `IN (..)`.
    In,
    /// `NOT IN (..)`.
    NotIn,
    /// `<`.
    Lt,
    /// `<=`.
    Lte,
    /// `>`.
    Gt,
    /// `>=`.
    Gte,
    /// `BETWEEN a AND b`.
    Between,
    /// `LIKE '%x%'`.
    Contains,
    /// `LIKE 'x%'`.
    StartsWith,
    /// `LIKE '%x'`.
    EndsWith,
    /// `IS NULL` / `IS NOT NULL`.
    IsNull,
}

impl Operator {
    /// Parses an operator key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "equals" => Self::Equals,
            "not" => Self::Not,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "between" => Self::Between,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "isNull" => Self::IsNull,
            _ => return None,
        })
    }

    /// The key this operator is written as.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Not => "not",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::IsNull => "isNull",
        }
    }

    /// Operators rendered with `LIKE`.
    #[must_use]
    pub const fn is_pattern(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    /// Operators that need an ordered type.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Lt | Self::Lte | Self::Gt | Self::Gte | Self::Between
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed predicate tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum ConditionNode {
    /// `field operator value`.
    Leaf {
        /// Field name.
        field: String,
        /// Operator.
        operator: Operator,
        /// Operand.
        value: Value,
    },
    /// All children hold.
    And(Vec<ConditionNode>),
    /// Any child holds.
    Or(Vec<ConditionNode>),
    /// The child does not hold.
    Not(Box<ConditionNode>),
    /// The child holds for at least one related row.
    Relation {
        /// Relation name on the enclosing table.
        relation: String,
        /// Condition on the related table.
        condition: Box<ConditionNode>,
    },
}

impl ConditionNode {
    /// Creates a leaf.
    pub fn leaf(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Leaf {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Creates an `equals` leaf.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field, Operator::Equals, value)
    }

    /// Scopes a condition to a relation.
    pub fn relation(relation: impl Into<String>, condition: Self) -> Self {
        Self::Relation {
            relation: relation.into(),
            condition: Box::new(condition),
        }
    }

    /// Combines with another condition using AND.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut children) => {
                children.push(other);
                Self::And(children)
            }
            node => Self::And(vec![node, other]),
        }
    }

    /// Combines with another condition using OR.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut children) => {
                children.push(other);
                Self::Or(children)
            }
            node => Self::Or(vec![node, other]),
        }
    }

    /// Negates the condition.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Whether the tree contains any relation-scoped node.
    #[must_use]
    pub fn has_relations(&self) -> bool {
        match self {
            Self::Leaf { .. } => false,
            Self::And(children) | Self::Or(children) => children.iter().any(Self::has_relations),
            Self::Not(child) => child.has_relations(),
            Self::Relation { .. } => true,
        }
    }

    /// Parses the JSON surface syntax.
    ///
    /// # Errors
    ///
    /// [`PredicateError::Malformed`] for scalars outside a field entry and
    /// [`PredicateError::UnknownOperator`] for objects mixing operator and
    /// non-operator keys.
    pub fn parse(value: &Value) -> Result<Self, PredicateError> {
        match value {
            Value::Object(entries) => parse_object(entries),
            Value::Array(items) => items
                .iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Or),
            other => Err(PredicateError::Malformed(format!(
                "expected an object or an array, found `{other}`"
            ))),
        }
    }
}

impl TryFrom<Value> for ConditionNode {
    type Error = PredicateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

fn parse_object(entries: &Map<String, Value>) -> Result<ConditionNode, PredicateError> {
    let mut nodes = Vec::with_capacity(entries.len());

    for (key, value) in entries {
        match key.as_str() {
            "AND" => nodes.push(match value {
                Value::Array(items) => ConditionNode::And(
                    items
                        .iter()
                        .map(ConditionNode::parse)
                        .collect::<Result<_, _>>()?,
                ),
                other => ConditionNode::parse(other)?,
            }),
            "OR" => nodes.push(match value {
                Value::Array(items) => ConditionNode::Or(
                    items
                        .iter()
                        .map(ConditionNode::parse)
                        .collect::<Result<_, _>>()?,
                ),
                other => ConditionNode::Or(vec![ConditionNode::parse(other)?]),
            }),
            "NOT" => nodes.push(ConditionNode::parse(value)?.not()),
            _ => nodes.push(parse_entry(key, value)?),
        }
    }

    Ok(match nodes.len() {
        1 => nodes.remove(0),
        _ => ConditionNode::And(nodes),
    })
}

fn parse_entry(key: &str, value: &Value) -> Result<ConditionNode, PredicateError> {
    let Value::Object(inner) = value else {
        return Ok(ConditionNode::equals(key, value.clone()));
    };

    let operators = inner.keys().filter(|k| Operator::from_key(k).is_some()).count();

    // `{}` is left to the compiler: "has a related row" for a relation,
    // malformed for a field.
    if inner.is_empty() {
        return Ok(ConditionNode::relation(key, ConditionNode::And(Vec::new())));
    }
    if operators == 0 {
        return Ok(ConditionNode::relation(key, parse_object(inner)?));
    }

    if let Some(bad) = inner.keys().find(|k| Operator::from_key(k).is_none()) {
        return Err(PredicateError::UnknownOperator {
            field: key.to_string(),
            operator: bad.clone(),
        });
    }

    let mut leaves: Vec<ConditionNode> = inner
        .iter()
        .filter_map(|(op, operand)| {
            Operator::from_key(op).map(|operator| ConditionNode::leaf(key, operator, operand.clone()))
        })
        .collect();

    Ok(match leaves.len() {
        1 => leaves.remove(0),
        _ => ConditionNode::And(leaves),
    })
}
