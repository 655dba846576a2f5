//! Statement builders for writes and aggregates.
//!
//! Everything here is pure: payloads are cleaned and SQL text is built,
//! nothing is executed.

use indexmap::IndexMap;
use oxide_core::{
    Engine, FieldDefinition, FieldKind, ModelSchema, Row, SqlValue, ValidationError,
};
use serde_json::{Map, Value};

use crate::error::{PredicateError, QueryError, Result};
use crate::request::AggregateSpec;

/// Field names that aggregate over rows instead of a column.
const ROW_COUNT: [&str; 2] = ["_all", "*"];

fn unknown_keys(model: &ModelSchema, row: &Row) -> Result<()> {
    match row.keys().find(|key| model.field(key).is_none()) {
        Some(key) => Err(PredicateError::UnknownField {
            table: model.table().to_string(),
            field: key.clone(),
        }
        .into()),
        None => Ok(()),
    }
}

const fn is_required(field: &FieldDefinition) -> bool {
    !field.nullable && field.default.is_none() && !field.is_auto_increment()
}

/// Cleans every row of a create payload.
///
/// Rows come back with their keys in declaration order. An omitted UUID
/// primary key is generated; every other omission is left to the column
/// default. All messages of all rows are collected before failing.
pub(crate) fn prepare_rows(model: &ModelSchema, data: Vec<Row>) -> Result<Vec<Row>> {
    for row in &data {
        unknown_keys(model, row)?;
    }

    let mut errors = ValidationError::new();
    let mut prepared = Vec::with_capacity(data.len());

    for (index, mut row) in data.into_iter().enumerate() {
        let mut clean = Map::new();
        for field in model.fields() {
            match row.remove(&field.name) {
                Some(value) => match field.clean(value) {
                    Ok(value) => {
                        clean.insert(field.name.clone(), value);
                    }
                    Err(messages) => {
                        for message in messages {
                            errors.add(Some(index), &field.name, message);
                        }
                    }
                },
                None if field.primary_key && field.kind == FieldKind::Uuid => {
                    clean.insert(
                        field.name.clone(),
                        Value::String(uuid::Uuid::new_v4().to_string()),
                    );
                }
                None if is_required(field) => {
                    errors.add(Some(index), &field.name, "this field is required");
                }
                None => {}
            }
        }
        prepared.push(clean);
    }

    errors.into_result()?;
    Ok(prepared)
}

/// Cleans the columns of an update payload.
pub(crate) fn prepare_update(model: &ModelSchema, data: Row) -> Result<Row> {
    unknown_keys(model, &data)?;

    let mut errors = ValidationError::new();
    let mut clean = Map::new();
    for (name, value) in data {
        let Some(field) = model.field(&name) else {
            continue;
        };
        match field.clean(value) {
            Ok(value) => {
                clean.insert(name, value);
            }
            Err(messages) => {
                for message in messages {
                    errors.add(None, &name, message);
                }
            }
        }
    }

    errors.into_result()?;
    Ok(clean)
}

/// Literal for a value written to `field`; structured kinds become JSON text.
fn literal(field: &FieldDefinition, value: &Value, engine: Engine) -> String {
    if field.kind.is_structured() && !value.is_null() {
        return SqlValue::Text(value.to_string()).to_sql_inline(engine);
    }
    SqlValue::from_json(value).to_sql_inline(engine)
}

/// Expression used for a column a row did not provide.
fn gap(field: &FieldDefinition, engine: Engine) -> String {
    match &field.default {
        Some(default) => default.to_sql(engine),
        None if field.is_auto_increment() && engine == Engine::Postgresql => {
            String::from("DEFAULT")
        }
        None => String::from("NULL"),
    }
}

/// One multi-row `INSERT`; columns are the union over all rows.
pub(crate) fn insert_sql(model: &ModelSchema, engine: Engine, rows: &[Row]) -> String {
    let mut fields: Vec<&FieldDefinition> = model
        .fields()
        .filter(|field| rows.iter().any(|row| row.contains_key(&field.name)))
        .collect();
    if fields.is_empty() {
        // Rows made only of defaults still need one column to list.
        fields.extend(model.field(model.primary_key()));
    }

    let columns: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = fields
                .iter()
                .map(|field| {
                    row.get(&field.name)
                        .map_or_else(|| gap(field, engine), |v| literal(field, v, engine))
                })
                .collect();
            format!("({})", values.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        model.table(),
        columns.join(", "),
        tuples.join(", ")
    )
}

/// `UPDATE` of the given columns.
pub(crate) fn update_sql(
    model: &ModelSchema,
    engine: Engine,
    data: &Row,
    filter: Option<&str>,
) -> Result<String> {
    if data.is_empty() {
        return Err(QueryError::InvalidRequest(format!(
            "update on `{}` sets no column",
            model.table()
        )));
    }

    let assignments: Vec<String> = model
        .fields()
        .filter_map(|field| {
            data.get(&field.name)
                .map(|value| format!("{} = {}", field.name, literal(field, value, engine)))
        })
        .collect();

    let mut sql = format!("UPDATE {} SET {}", model.table(), assignments.join(", "));
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    Ok(sql)
}

/// `DELETE`, optionally filtered.
pub(crate) fn delete_sql(table: &str, filter: Option<&str>) -> String {
    filter.map_or_else(
        || format!("DELETE FROM {table}"),
        |filter| format!("DELETE FROM {table} WHERE {filter}"),
    )
}

/// `SELECT EXISTS(..) AS result`.
pub(crate) fn exists_sql(table: &str, filter: Option<&str>) -> String {
    let inner = filter.map_or_else(
        || format!("SELECT 1 FROM {table}"),
        |filter| format!("SELECT 1 FROM {table} WHERE {filter}"),
    );
    format!("SELECT EXISTS({inner}) AS result")
}

/// One selected aggregate: the function and the field it reports under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AggregateColumn {
    function: &'static str,
    field: String,
    alias: String,
}

/// Builds one `SELECT` computing every requested aggregate.
pub(crate) fn aggregate_sql(
    model: &ModelSchema,
    aggregate: &IndexMap<String, AggregateSpec>,
    filter: Option<&str>,
) -> Result<(String, Vec<AggregateColumn>)> {
    let table = model.table();
    let mut columns = Vec::new();
    let mut expressions = Vec::new();

    for (name, spec) in aggregate {
        let requested = [
            ("count", spec.count),
            ("min", spec.min),
            ("max", spec.max),
            ("sum", spec.sum),
            ("avg", spec.avg),
        ];

        if ROW_COUNT.contains(&name.as_str()) {
            if let Some((function, _)) = requested.iter().find(|(f, on)| *on && *f != "count") {
                return Err(PredicateError::InvalidOperand {
                    field: name.clone(),
                    operator: (*function).to_string(),
                    reason: String::from("only count applies to every row"),
                }
                .into());
            }
            if spec.count {
                let alias = String::from("count__all");
                expressions.push(format!("COUNT(*) AS {alias}"));
                columns.push(AggregateColumn {
                    function: "count",
                    field: String::from("_all"),
                    alias,
                });
            }
            continue;
        }

        let field = model.field(name).ok_or_else(|| PredicateError::UnknownField {
            table: table.to_string(),
            field: name.clone(),
        })?;

        for (function, on) in requested {
            if !on {
                continue;
            }
            let numeric_only = matches!(function, "sum" | "avg");
            if field.kind.is_structured() || (numeric_only && !field.kind.is_numeric()) {
                return Err(PredicateError::DisallowedFieldType {
                    table: table.to_string(),
                    field: name.clone(),
                    kind: field.kind.to_string(),
                    operator: function.to_string(),
                }
                .into());
            }
            let alias = format!("{function}_{name}");
            expressions.push(format!(
                "{}({table}.{name}) AS {alias}",
                function.to_ascii_uppercase()
            ));
            columns.push(AggregateColumn {
                function,
                field: name.clone(),
                alias,
            });
        }
    }

    if expressions.is_empty() {
        return Err(QueryError::InvalidRequest(format!(
            "aggregate on `{table}` requests nothing"
        )));
    }

    let mut sql = format!("SELECT {} FROM {table}", expressions.join(", "));
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    Ok((sql, columns))
}

/// Regroups a flat aggregate row as `{ function: { field: value } }`.
pub(crate) fn shape_aggregate(columns: &[AggregateColumn], row: Option<&Row>) -> Row {
    let mut shaped = Map::new();
    for column in columns {
        let value = row
            .and_then(|row| row.get(&column.alias))
            .cloned()
            .unwrap_or(Value::Null);
        let entry = shaped
            .entry(column.function)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(group) = entry {
            group.insert(column.field.clone(), value);
        }
    }
    shaped
}

/// Reads the boolean produced by [`exists_sql`].
pub(crate) fn exists_result(row: Option<&Row>) -> bool {
    match row.and_then(|row| row.get("result")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}
