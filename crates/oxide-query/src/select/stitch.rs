//! Attaching child rows to parent rows after a plan's queries ran.

use std::collections::HashMap;

use oxide_core::{FieldKind, ModelSchema, Multiplicity, Row};
use serde_json::Value;

use super::PlanNode;

/// Key used to match parent and child values; `None` for NULL.
fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Distinct non-null values of `column`, in first-seen order.
pub(crate) fn parent_keys(rows: &[Row], column: &str) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| key_of(value).is_some_and(|k| seen.insert(k)))
        .cloned()
        .collect()
}

/// Stores each parent's matching child rows under the relation name.
///
/// Many-relations receive an array with the child window applied per
/// parent; one-relations receive the first match or `null`.
pub(crate) fn attach(parents: &mut [Row], children: Vec<Row>, child: &PlanNode) {
    let Some(link) = &child.link else {
        return;
    };

    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in children {
        if let Some(key) = row.get(&link.child_key).and_then(key_of) {
            groups.entry(key).or_default().push(row);
        }
    }

    let skip = child.limit.map_or(0, |l| l.skip);
    let take = child.limit.and_then(|l| l.take).unwrap_or(usize::MAX);

    for parent in parents {
        let group = parent
            .get(&link.parent_key)
            .and_then(key_of)
            .and_then(|key| groups.get(&key));

        let value = match link.multiplicity {
            Multiplicity::Many => Value::Array(
                group
                    .into_iter()
                    .flatten()
                    .skip(skip)
                    .take(take)
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            ),
            Multiplicity::One => group
                .and_then(|rows| rows.first())
                .cloned()
                .map_or(Value::Null, Value::Object),
        };

        parent.insert(link.relation.clone(), value);
    }
}

/// Removes helper columns.
pub(crate) fn strip(rows: &mut [Row], hidden: &[String]) {
    if hidden.is_empty() {
        return;
    }
    for row in rows {
        for column in hidden {
            row.shift_remove(column);
        }
    }
}

/// Converts stored representations back to field values.
///
/// Structured kinds are stored as JSON text and booleans may come back
/// as integers.
pub(crate) fn decode(model: &ModelSchema, row: &mut Row) {
    for (name, value) in row.iter_mut() {
        let Some(field) = model.field(name) else {
            continue;
        };
        let decoded = match (&field.kind, &*value) {
            (kind, Value::String(text)) if kind.is_structured() => serde_json::from_str(text).ok(),
            (FieldKind::Boolean, Value::Number(n)) => {
                Some(Value::Bool(n.as_i64().is_some_and(|n| n != 0)))
            }
            _ => None,
        };
        if let Some(decoded) = decoded {
            *value = decoded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Limit;
    use crate::select::Link;
    use oxide_core::schema::model;
    use oxide_core::{field, SchemaBuilder};
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn child(relation: &str, parent_key: &str, child_key: &str, multiplicity: Multiplicity) -> PlanNode {
        PlanNode {
            table: String::from("t"),
            columns: Vec::new(),
            hidden: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            link: Some(Link {
                relation: relation.to_string(),
                parent_key: parent_key.to_string(),
                child_key: child_key.to_string(),
                multiplicity,
            }),
            children: Vec::new(),
        }
    }

    #[test]
    fn test_parent_keys_are_distinct_and_skip_null() {
        let rows = vec![
            row(json!({"author": 1})),
            row(json!({"author": null})),
            row(json!({"author": 1})),
            row(json!({"author": 2})),
        ];
        assert_eq!(parent_keys(&rows, "author"), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_attach_many_with_window() {
        let mut parents = vec![row(json!({"id": 1})), row(json!({"id": 2}))];
        let children = vec![
            row(json!({"id": 10, "author": 1})),
            row(json!({"id": 11, "author": 1})),
            row(json!({"id": 12, "author": 1})),
        ];
        let mut node = child("posts", "id", "author", Multiplicity::Many);
        node.limit = Some(Limit::take(1).skip(1));

        attach(&mut parents, children, &node);

        assert_eq!(parents[0]["posts"], json!([{"id": 11, "author": 1}]));
        assert_eq!(parents[1]["posts"], json!([]));
    }

    #[test]
    fn test_attach_one_replaces_key() {
        let mut parents = vec![
            row(json!({"title": "a", "author": 1})),
            row(json!({"title": "b", "author": 1})),
            row(json!({"title": "c", "author": null})),
        ];
        let children = vec![row(json!({"id": 1, "username": "ann"}))];

        attach(
            &mut parents,
            children,
            &child("author", "author", "id", Multiplicity::One),
        );

        assert_eq!(parents[0]["author"], json!({"id": 1, "username": "ann"}));
        assert_eq!(parents[1]["author"], json!({"id": 1, "username": "ann"}));
        assert_eq!(parents[2]["author"], Value::Null);
    }

    #[test]
    fn test_strip() {
        let mut rows = vec![row(json!({"id": 1, "name": "x"}))];
        strip(&mut rows, &[String::from("id")]);
        assert_eq!(Value::Object(rows.remove(0)), json!({"name": "x"}));
    }

    #[test]
    fn test_decode() {
        let schema = SchemaBuilder::new()
            .model(
                model("t")
                    .field("id", field::id())
                    .field("flag", field::boolean())
                    .field("tags", field::array(oxide_core::FieldKind::Text)),
            )
            .build()
            .unwrap();
        let mut r = row(json!({"id": 1, "flag": 1, "tags": "[\"a\",\"b\"]"}));
        decode(schema.model("t").unwrap(), &mut r);
        assert_eq!(Value::Object(r), json!({"id": 1, "flag": true, "tags": ["a", "b"]}));
    }
}
