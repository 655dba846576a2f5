//! Compiles predicate trees to SQL boolean expressions.

use oxide_core::schema::DEFAULT_MAX_DEPTH;
use oxide_core::{Engine, FieldKind, ModelSchema, RelationGraphError, RelationPath, Schema, SqlValue};
use serde_json::Value;

use super::{ConditionNode, Operator};
use crate::error::{PredicateError, Result};

/// A predicate no row satisfies.
const NEVER: &str = "1 = 0";

/// Turns a [`ConditionNode`] into a SQL fragment for one engine.
///
/// Columns are qualified with their table name and every literal is
/// escaped inline. Conditions on related tables become correlated
/// `EXISTS` subqueries.
#[derive(Debug, Clone, Copy)]
pub struct PredicateCompiler<'s> {
    schema: &'s Schema,
    engine: Engine,
    max_depth: usize,
}

impl<'s> PredicateCompiler<'s> {
    /// Creates a compiler for `engine`.
    #[must_use]
    pub const fn new(schema: &'s Schema, engine: Engine) -> Self {
        Self {
            schema,
            engine,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limits how deeply relation conditions may nest.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Compiles `node` against `table`.
    ///
    /// Returns `None` when the tree holds no condition at all (for example
    /// an empty object). An empty OR group matches no row and compiles to
    /// `1 = 0`.
    ///
    /// # Errors
    ///
    /// Unknown tables, fields, relations or operators, disallowed field
    /// kinds, bad operands and relation cycles.
    pub fn compile(&self, table: &str, node: &ConditionNode) -> Result<Option<String>> {
        let model = self.schema.get(table)?;
        let path = RelationPath::new(table, self.max_depth);
        self.compile_node(model, node, &path)
    }

    fn compile_node(
        &self,
        model: &ModelSchema,
        node: &ConditionNode,
        path: &RelationPath,
    ) -> Result<Option<String>> {
        match node {
            ConditionNode::Leaf {
                field,
                operator,
                value,
            } => self.compile_leaf(model, field, *operator, value).map(Some),
            ConditionNode::And(children) => self.compile_and(model, children, path),
            ConditionNode::Or(children) => self.compile_or(model, children, path),
            ConditionNode::Not(child) => Ok(Some(match self.compile_node(model, child, path)? {
                Some(inner) => format!("NOT ({inner})"),
                None => String::from(NEVER),
            })),
            ConditionNode::Relation {
                relation,
                condition,
            } => self.compile_relation(model, relation, condition, path).map(Some),
        }
    }

    /// Unconditional children drop out; none left means no condition.
    fn compile_and(
        &self,
        model: &ModelSchema,
        children: &[ConditionNode],
        path: &RelationPath,
    ) -> Result<Option<String>> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            if let Some(sql) = self.compile_node(model, child, path)? {
                parts.push(sql);
            }
        }
        Ok(join(parts, " AND "))
    }

    /// An unconditional child makes the group unconditional; an empty
    /// group matches nothing.
    fn compile_or(
        &self,
        model: &ModelSchema,
        children: &[ConditionNode],
        path: &RelationPath,
    ) -> Result<Option<String>> {
        if children.is_empty() {
            return Ok(Some(String::from(NEVER)));
        }
        let mut parts = Vec::with_capacity(children.len());
        let mut unconditional = false;
        for child in children {
            match self.compile_node(model, child, path)? {
                Some(sql) => parts.push(sql),
                None => unconditional = true,
            }
        }
        Ok(if unconditional { None } else { join(parts, " OR ") })
    }

    fn compile_relation(
        &self,
        model: &ModelSchema,
        name: &str,
        condition: &ConditionNode,
        path: &RelationPath,
    ) -> Result<String> {
        let Some(relation) = model.relation(name) else {
            if model.field(name).is_some()
                && matches!(condition, ConditionNode::And(children) if children.is_empty())
            {
                return Err(PredicateError::Malformed(format!(
                    "`{name}` has no operators"
                ))
                .into());
            }
            if model.field(name).is_some() {
                return Err(PredicateError::UnknownOperator {
                    field: name.to_string(),
                    operator: first_key(condition),
                }
                .into());
            }
            return Err(RelationGraphError::UnknownRelation {
                table: model.table().to_string(),
                relation: name.to_string(),
            }
            .into());
        };

        let remote = self.schema.get(&relation.remote_table)?;
        let next = path.descend(remote.table())?;

        let join = format!(
            "{remote}.{remote_field} = {local}.{local_field}",
            remote = remote.table(),
            remote_field = relation.remote_field,
            local = model.table(),
            local_field = relation.local_field,
        );

        Ok(match self.compile_node(remote, condition, &next)? {
            Some(inner) => format!(
                "EXISTS (SELECT 1 FROM {} WHERE {join} AND {inner})",
                remote.table()
            ),
            None => format!("EXISTS (SELECT 1 FROM {} WHERE {join})", remote.table()),
        })
    }

    fn compile_leaf(
        &self,
        model: &ModelSchema,
        field: &str,
        operator: Operator,
        value: &Value,
    ) -> Result<String> {
        let definition = model.field(field).ok_or_else(|| PredicateError::UnknownField {
            table: model.table().to_string(),
            field: field.to_string(),
        })?;

        let kind = &definition.kind;
        let disallowed = kind.is_structured()
            || (operator.is_pattern() && !kind.is_textual())
            || (operator.is_ordering() && *kind == FieldKind::Boolean);
        if disallowed {
            return Err(PredicateError::DisallowedFieldType {
                table: model.table().to_string(),
                field: field.to_string(),
                kind: kind.to_string(),
                operator: operator.to_string(),
            }
            .into());
        }

        let column = format!("{}.{field}", model.table());
        let invalid = |reason: &str| PredicateError::InvalidOperand {
            field: field.to_string(),
            operator: operator.to_string(),
            reason: reason.to_string(),
        };

        let sql = match operator {
            Operator::Equals if value.is_null() => format!("{column} IS NULL"),
            Operator::Not if value.is_null() => format!("{column} IS NOT NULL"),
            Operator::Equals => format!("{column} = {}", self.literal(value, &invalid)?),
            Operator::Not => format!("{column} <> {}", self.literal(value, &invalid)?),
            Operator::In | Operator::NotIn => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid("expected an array"))?;
                let negated = operator == Operator::NotIn;
                if items.is_empty() {
                    return Ok(String::from(if negated { "1 = 1" } else { NEVER }));
                }
                let literals = items
                    .iter()
                    .map(|item| self.literal(item, &invalid))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let keyword = if negated { "NOT IN" } else { "IN" };
                format!("{column} {keyword} ({})", literals.join(", "))
            }
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                let symbol = match operator {
                    Operator::Lt => "<",
                    Operator::Lte => "<=",
                    Operator::Gt => ">",
                    _ => ">=",
                };
                format!("{column} {symbol} {}", self.literal(value, &invalid)?)
            }
            Operator::Between => match value.as_array().map(Vec::as_slice) {
                Some([low, high]) => format!(
                    "{column} BETWEEN {} AND {}",
                    self.literal(low, &invalid)?,
                    self.literal(high, &invalid)?
                ),
                _ => return Err(invalid("expected an array of two values").into()),
            },
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
                let text = value.as_str().ok_or_else(|| invalid("expected a string"))?;
                self.like(&column, operator, text)
            }
            Operator::IsNull => match value.as_bool() {
                Some(true) => format!("{column} IS NULL"),
                Some(false) => format!("{column} IS NOT NULL"),
                None => return Err(invalid("expected a boolean").into()),
            },
        };

        Ok(sql)
    }

    fn literal(
        &self,
        value: &Value,
        invalid: &impl Fn(&str) -> PredicateError,
    ) -> std::result::Result<String, PredicateError> {
        match value {
            Value::Null => Err(invalid("null is only allowed with equals, not and isNull")),
            Value::Array(_) | Value::Object(_) => Err(invalid("expected a scalar value")),
            scalar => Ok(SqlValue::from_json(scalar).to_sql_inline(self.engine)),
        }
    }

    fn like(&self, column: &str, operator: Operator, text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        let mut needs_escape = false;
        for c in text.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
                needs_escape = true;
            }
            escaped.push(c);
        }

        let pattern = match operator {
            Operator::StartsWith => format!("{escaped}%"),
            Operator::EndsWith => format!("%{escaped}"),
            _ => format!("%{escaped}%"),
        };

        let mut sql = format!(
            "{column} LIKE {}",
            SqlValue::Text(pattern).to_sql_inline(self.engine)
        );
        if needs_escape {
            sql.push_str(" ESCAPE ");
            sql.push_str(&SqlValue::from("\\").to_sql_inline(self.engine));
        }
        sql
    }
}

/// Name of the first key under a node, for error messages.
fn join(mut parts: Vec<String>, joiner: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(joiner))),
    }
}

fn first_key(node: &ConditionNode) -> String {
    match node {
        ConditionNode::Leaf { field, .. } => field.clone(),
        ConditionNode::Relation { relation, .. } => relation.clone(),
        ConditionNode::And(children) | ConditionNode::Or(children) => {
            children.first().map(first_key).unwrap_or_default()
        }
        ConditionNode::Not(child) => first_key(child),
    }
}
