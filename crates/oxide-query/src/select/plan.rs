//! Resolution of select trees into query plans.

use oxide_core::{Engine, ModelSchema, Multiplicity, RelationGraphError, RelationPath, Schema, SqlValue};
use serde_json::Value;

use super::{RelationArgs, SelectEntry, SelectTree};
use crate::condition::{ConditionNode, PredicateCompiler};
use crate::config::ClientConfig;
use crate::error::{PredicateError, Result, SafetyError};
use crate::hooks::Action;
use crate::request::{FindArgs, Limit, OrderBy};

/// How a child query attaches to its parent's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Relation name; the key the child rows are stored under.
    pub relation: String,
    /// Column on the parent holding the join key.
    pub parent_key: String,
    /// Column on the child matched against the parent keys.
    pub child_key: String,
    /// Object or array.
    pub multiplicity: Multiplicity,
}

/// One query of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    /// Table queried.
    pub table: String,
    /// Columns fetched, including helper columns.
    pub columns: Vec<String>,
    /// Helper columns removed from the result.
    pub hidden: Vec<String>,
    /// Compiled filter.
    pub filter: Option<String>,
    /// Sort keys.
    pub order_by: Vec<OrderBy>,
    /// Window; applied in SQL on the root, per parent on children.
    pub limit: Option<Limit>,
    /// Attachment to the parent; `None` on the root.
    pub link: Option<Link>,
    /// Relations loaded from this node's rows.
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Renders the query. Children pass the parent keys to match.
    #[must_use]
    pub fn to_sql(&self, engine: Engine, keys: Option<&[Value]>) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}.{c}", self.table))
            .collect();
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table);

        let mut conditions = Vec::new();
        if let Some(filter) = &self.filter {
            conditions.push(filter.clone());
        }
        if let (Some(link), Some(keys)) = (&self.link, keys) {
            let literals: Vec<String> = keys
                .iter()
                .map(|k| SqlValue::from_json(k).to_sql_inline(engine))
                .collect();
            conditions.push(format!(
                "{}.{} IN ({})",
                self.table,
                link.child_key,
                literals.join(", ")
            ));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|o| {
                    let direction = if o.descending { "DESC" } else { "ASC" };
                    format!("{}.{} {direction}", self.table, o.field)
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if self.link.is_none() {
            if let Some(limit) = self.limit {
                if let Some(take) = limit.take {
                    sql.push_str(&format!(" LIMIT {take}"));
                }
                if limit.skip > 0 {
                    sql.push_str(&format!(" OFFSET {}", limit.skip));
                }
            }
        }

        sql
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// A base query plus one follow-up query per selected relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    root: PlanNode,
}

impl QueryPlan {
    /// The base query.
    #[must_use]
    pub const fn root(&self) -> &PlanNode {
        &self.root
    }

    /// Every query, parents before their children.
    #[must_use]
    pub fn queries(&self) -> Vec<&PlanNode> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    /// Whether any relation is loaded.
    #[must_use]
    pub fn has_relations(&self) -> bool {
        !self.root.children.is_empty()
    }
}

/// Resolves find arguments against the schema.
#[derive(Debug, Clone, Copy)]
pub struct SelectResolver<'s> {
    schema: &'s Schema,
    engine: Engine,
    config: &'s ClientConfig,
}

impl<'s> SelectResolver<'s> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(schema: &'s Schema, engine: Engine, config: &'s ClientConfig) -> Self {
        Self {
            schema,
            engine,
            config,
        }
    }

    /// Validates and compiles a find into a plan; nothing is executed.
    ///
    /// # Errors
    ///
    /// Unknown names, relation cycles, excessive depth, predicate errors
    /// and a `take` above the row cap.
    pub fn resolve(&self, table: &str, args: &FindArgs) -> Result<QueryPlan> {
        let model = self.schema.get(table)?;
        let limit = self.window(table, args.limit)?;

        let path = RelationPath::new(table, self.config.max_relation_depth);
        let root = self.resolve_node(
            model,
            args.select.as_ref(),
            args.condition.as_ref(),
            args.order_by.keys(),
            Some(limit),
            None,
            &path,
        )?;

        Ok(QueryPlan { root })
    }

    /// The requested window with `take` defaulted to the table's find cap.
    fn window(&self, table: &str, limit: Option<Limit>) -> Result<Limit> {
        let cap = self.config.cap(table, Action::Find);
        match limit {
            Some(Limit {
                take: Some(take), ..
            }) if take > cap => Err(SafetyError::LimitExceeded {
                table: table.to_string(),
                action: Action::Find,
                requested: take,
                max: cap,
            }
            .into()),
            Some(limit) => Ok(Limit {
                take: Some(limit.take.unwrap_or(cap)),
                skip: limit.skip,
            }),
            None => Ok(Limit::take(cap)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_node(
        &self,
        model: &ModelSchema,
        select: Option<&SelectTree>,
        condition: Option<&ConditionNode>,
        order_by: &[OrderBy],
        limit: Option<Limit>,
        link: Option<Link>,
        path: &RelationPath,
    ) -> Result<PlanNode> {
        let mut requested: Vec<String> = Vec::new();
        let mut children = Vec::new();

        if let Some(select) = select {
            for (name, entry) in select.entries() {
                match entry {
                    SelectEntry::Include if model.field(name).is_some() => {
                        requested.push(name.to_string());
                    }
                    SelectEntry::Include if model.relation(name).is_some() => {
                        children.push(self.resolve_child(model, name, &RelationArgs::default(), path)?);
                    }
                    SelectEntry::Include => {
                        return Err(PredicateError::UnknownField {
                            table: model.table().to_string(),
                            field: name.to_string(),
                        }
                        .into());
                    }
                    SelectEntry::Relation(args) => {
                        children.push(self.resolve_child(model, name, args, path)?);
                    }
                }
            }
        }

        if requested.is_empty() {
            requested = model.fields().map(|f| f.name.clone()).collect();
        }

        for order in order_by {
            if model.field(&order.field).is_none() {
                return Err(PredicateError::UnknownField {
                    table: model.table().to_string(),
                    field: order.field.clone(),
                }
                .into());
            }
        }

        let mut columns = requested.clone();
        let mut helpers = Vec::new();
        let mut need = |column: &str| {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
                helpers.push(column.to_string());
            }
        };
        if let Some(link) = &link {
            need(&link.child_key);
        }
        for child in &children {
            if let Some(child_link) = &child.link {
                need(&child_link.parent_key);
            }
        }

        // A forward relation replaces its key column in the result.
        let hidden = helpers
            .into_iter()
            .filter(|h| !children.iter().any(|c| c.link.as_ref().is_some_and(|l| &l.relation == h)))
            .collect();

        let filter = match condition {
            Some(condition) => PredicateCompiler::new(self.schema, self.engine)
                .with_max_depth(self.config.max_relation_depth)
                .compile(model.table(), condition)?,
            None => None,
        };

        Ok(PlanNode {
            table: model.table().to_string(),
            columns,
            hidden,
            filter,
            order_by: order_by.to_vec(),
            limit,
            link,
            children,
        })
    }

    fn resolve_child(
        &self,
        model: &ModelSchema,
        name: &str,
        args: &RelationArgs,
        path: &RelationPath,
    ) -> Result<PlanNode> {
        let relation = model
            .relation(name)
            .ok_or_else(|| RelationGraphError::UnknownRelation {
                table: model.table().to_string(),
                relation: name.to_string(),
            })?;
        let remote = self.schema.get(&relation.remote_table)?;
        let next = path.descend(remote.table())?;

        // Applied per parent.
        let limit = self.window(remote.table(), args.limit)?;

        let link = Link {
            relation: relation.name.clone(),
            parent_key: relation.local_field.clone(),
            child_key: relation.remote_field.clone(),
            multiplicity: relation.multiplicity,
        };

        self.resolve_node(
            remote,
            args.select.as_ref(),
            args.condition.as_ref(),
            args.order_by.keys(),
            Some(limit),
            Some(link),
            &next,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableLimits;
    use crate::error::QueryError;
    use oxide_core::schema::model;
    use oxide_core::{field, SchemaBuilder};
    use serde_json::json;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .model(
                model("users")
                    .field("id", field::id())
                    .field("username", field::string(64))
                    .field("email", field::email().unique()),
            )
            .model(
                model("posts")
                    .field("id", field::id())
                    .field("title", field::string(255))
                    .field("author", field::integer().references("users", "id")),
            )
            .build()
            .unwrap()
    }

    fn resolve(table: &str, args: serde_json::Value) -> Result<QueryPlan> {
        let schema = schema();
        let config = ClientConfig::default().max_rows(100);
        let args: FindArgs = serde_json::from_value(args).unwrap();
        SelectResolver::new(&schema, Engine::Sqlite, &config).resolve(table, &args)
    }

    #[test]
    fn test_root_defaults_to_cap() {
        let plan = resolve("users", json!({})).unwrap();
        assert_eq!(
            plan.root().to_sql(Engine::Sqlite, None),
            "SELECT users.id, users.username, users.email FROM users LIMIT 100"
        );
        assert_eq!(plan.queries().len(), 1);
        assert!(!plan.has_relations());
    }

    #[test]
    fn test_root_with_filter_order_and_window() {
        let plan = resolve(
            "posts",
            json!({
                "select": {"title": true},
                "where": {"title": {"contains": "rust"}},
                "orderBy": "-id",
                "limit": {"take": 10, "skip": 20}
            }),
        )
        .unwrap();
        assert_eq!(
            plan.root().to_sql(Engine::Sqlite, None),
            "SELECT posts.title FROM posts WHERE posts.title LIKE '%rust%' \
             ORDER BY posts.id DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_forward_relation_plan() {
        let plan = resolve(
            "posts",
            json!({"select": {"title": true, "author": {"select": {"username": true}}}}),
        )
        .unwrap();

        let queries = plan.queries();
        assert_eq!(queries.len(), 2);

        let root = queries[0];
        assert_eq!(root.columns, vec!["title", "author"]);
        assert!(root.hidden.is_empty(), "author is replaced by the relation");

        let child = queries[1];
        assert_eq!(child.columns, vec!["username", "id"]);
        assert_eq!(child.hidden, vec!["id"]);
        assert_eq!(
            child.to_sql(Engine::Sqlite, Some(&[json!(1), json!(2)])),
            "SELECT users.username, users.id FROM users WHERE users.id IN (1, 2)"
        );
        assert_eq!(
            child.link.as_ref().unwrap().multiplicity,
            Multiplicity::One
        );
    }

    #[test]
    fn test_reverse_relation_plan() {
        let plan = resolve(
            "users",
            json!({"select": {"username": true, "posts": {"where": {"title": {"startsWith": "a"}}, "limit": {"take": 2}}}}),
        )
        .unwrap();

        let root = plan.root();
        assert_eq!(root.columns, vec!["username", "id"]);
        assert_eq!(root.hidden, vec!["id"]);

        let child = &root.children[0];
        assert_eq!(
            child.to_sql(Engine::Sqlite, Some(&[json!(7)])),
            "SELECT posts.id, posts.title, posts.author FROM posts \
             WHERE posts.title LIKE 'a%' AND posts.author IN (7)"
        );
        assert_eq!(child.limit, Some(Limit::take(2)));
    }

    #[test]
    fn test_include_true_loads_relation() {
        let plan = resolve("users", json!({"select": {"posts": true}})).unwrap();
        assert_eq!(plan.root().columns, vec!["id", "username", "email"]);
        assert_eq!(plan.root().children.len(), 1);
    }

    #[test]
    fn test_child_window_defaults_to_cap() {
        let schema = schema();
        let config = ClientConfig::default().max_rows(100).table(
            "posts",
            TableLimits {
                find: Some(5),
                ..TableLimits::default()
            },
        );
        let resolver = SelectResolver::new(&schema, Engine::Sqlite, &config);

        let args: FindArgs = serde_json::from_value(json!({"select": {"posts": true}})).unwrap();
        let plan = resolver.resolve("users", &args).unwrap();
        assert_eq!(plan.root().children[0].limit, Some(Limit::take(5)));

        let args: FindArgs =
            serde_json::from_value(json!({"select": {"posts": {"limit": {"skip": 1}}}})).unwrap();
        let plan = resolver.resolve("users", &args).unwrap();
        assert_eq!(plan.root().children[0].limit, Some(Limit::take(5).skip(1)));

        let args: FindArgs =
            serde_json::from_value(json!({"select": {"posts": {"limit": {"take": 6}}}})).unwrap();
        assert!(matches!(
            resolver.resolve("users", &args).unwrap_err(),
            QueryError::Safety(SafetyError::LimitExceeded { requested: 6, max: 5, .. })
        ));
    }

    #[test]
    fn test_circular_select_is_rejected() {
        let err = resolve(
            "users",
            json!({"select": {"posts": {"select": {"author": {"select": {"id": true}}}}}}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Relation(RelationGraphError::CircularRelation { .. })
        ));
    }

    #[test]
    fn test_take_above_cap() {
        let err = resolve("users", json!({"limit": {"take": 101}})).unwrap_err();
        assert!(matches!(
            err,
            QueryError::Safety(SafetyError::LimitExceeded { requested: 101, max: 100, .. })
        ));
    }

    #[test]
    fn test_unknown_names() {
        assert!(matches!(
            resolve("users", json!({"select": {"nickname": true}})).unwrap_err(),
            QueryError::Predicate(PredicateError::UnknownField { .. })
        ));
        assert!(matches!(
            resolve("users", json!({"select": {"friends": {"select": {"id": true}}}})).unwrap_err(),
            QueryError::Relation(RelationGraphError::UnknownRelation { .. })
        ));
        assert!(matches!(
            resolve("users", json!({"orderBy": "-age"})).unwrap_err(),
            QueryError::Predicate(PredicateError::UnknownField { .. })
        ));
    }
}
