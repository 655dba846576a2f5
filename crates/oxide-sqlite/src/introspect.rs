//! Reads the live schema from the catalog.

use oxide_core::{ColumnSnapshot, LiveSchema};
use sqlx::SqliteConnection;

type TableInfo = (i64, String, String, i64, Option<String>, i64);
type IndexList = (i64, String, i64, String, i64);
type IndexInfo = (i64, i64, Option<String>);

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) async fn live_schema(conn: &mut SqliteConnection) -> Result<LiveSchema, sqlx::Error> {
    let tables: Vec<(String,)> = sqlx::query_as(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut live = LiveSchema::new();
    for (table,) in tables {
        let columns = table_columns(conn, &table).await?;
        live.insert_table(table, columns);
    }
    Ok(live)
}

async fn table_columns(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<ColumnSnapshot>, sqlx::Error> {
    let info: Vec<TableInfo> = sqlx::query_as(&format!("PRAGMA table_info({})", quote(table)))
        .fetch_all(&mut *conn)
        .await?;

    let mut columns: Vec<ColumnSnapshot> = info
        .into_iter()
        .map(|(_, name, sql_type, notnull, default_value, pk)| ColumnSnapshot {
            name,
            sql_type,
            notnull: notnull != 0,
            default_value,
            primary_key: pk != 0,
            indexed: false,
            unique: false,
        })
        .collect();

    let indexes: Vec<IndexList> = sqlx::query_as(&format!("PRAGMA index_list({})", quote(table)))
        .fetch_all(&mut *conn)
        .await?;

    for (_, index, unique, origin, _) in indexes {
        if origin == "pk" {
            continue;
        }
        let parts: Vec<IndexInfo> = sqlx::query_as(&format!("PRAGMA index_info({})", quote(&index)))
            .fetch_all(&mut *conn)
            .await?;
        // Composite indexes do not describe a single column.
        let [(_, _, Some(column))] = parts.as_slice() else {
            continue;
        };
        if let Some(snapshot) = columns.iter_mut().find(|c| &c.name == column) {
            if unique != 0 {
                snapshot.unique = true;
            } else {
                snapshot.indexed = true;
            }
        }
    }

    Ok(columns)
}
