//! End-to-end requests against an in-memory SQLite database.

mod common;

use common::{blog_schema, row, BLOG_DDL};
use oxide_core::Executor;
use oxide_query::{
    AggregateArgs, Client, ClientConfig, ConditionNode, CreateArgs, DeleteArgs, FindArgs, QueryError,
    UpdateArgs,
};
use oxide_sqlite::SqliteExecutor;
use serde_json::{json, Value};

async fn seeded() -> Client<SqliteExecutor> {
    let db = SqliteExecutor::in_memory().await.unwrap();
    for ddl in BLOG_DDL {
        db.execute(ddl).await.unwrap();
    }
    let client = Client::new(db, blog_schema());

    client
        .create(
            "users",
            CreateArgs::new(vec![
                row(json!({"username": " ann ", "password": "password1", "email": "ANN@example.com"})),
                row(json!({"username": "bob", "password": "password2", "email": "bob@example.com", "role": "admin"})),
            ]),
        )
        .await
        .unwrap();
    client
        .create(
            "posts",
            CreateArgs::new(vec![
                row(json!({"title": "rust tips", "views": 10, "published": true, "author": 1})),
                row(json!({"title": "async rust", "views": 5, "author": 1})),
                row(json!({"title": "admin notes", "views": 1, "author": 2})),
            ]),
        )
        .await
        .unwrap();
    client
        .create(
            "comments",
            CreateArgs::new(vec![
                row(json!({"body": "nice", "post": 1, "author": 2})),
                row(json!({"body": "thanks", "post": 1, "author": 1})),
            ]),
        )
        .await
        .unwrap();
    client
}

fn find(value: Value) -> FindArgs {
    serde_json::from_value(value).unwrap()
}

fn rows(result: &oxide_query::QueryResult) -> Value {
    serde_json::to_value(&result.results).unwrap()
}

#[tokio::test]
async fn create_applies_transforms_and_defaults() {
    let client = seeded().await;

    let result = client
        .find(
            "users",
            find(json!({"select": {"username": true, "email": true, "role": true}, "orderBy": "id"})),
        )
        .await
        .unwrap();

    assert_eq!(
        rows(&result),
        json!([
            {"username": "ann", "email": "ann@example.com", "role": "member"},
            {"username": "bob", "email": "bob@example.com", "role": "admin"}
        ])
    );
}

#[tokio::test]
async fn single_create_reports_generated_key() {
    let client = seeded().await;

    let result = client
        .create(
            "users",
            CreateArgs::new(vec![row(
                json!({"username": "cy", "password": "password3", "email": "cy@example.com"}),
            )]),
        )
        .await
        .unwrap();

    assert_eq!(result.insert_id, Some(3));
    assert_eq!(result.results[0]["id"], json!(3));
}

#[tokio::test]
async fn forward_relation_is_an_object() {
    let client = seeded().await;

    let result = client
        .find(
            "posts",
            find(json!({
                "select": {"title": true, "published": true, "author": {"select": {"username": true}}},
                "orderBy": "id"
            })),
        )
        .await
        .unwrap();

    assert_eq!(
        rows(&result),
        json!([
            {"title": "rust tips", "published": true, "author": {"username": "ann"}},
            {"title": "async rust", "published": false, "author": {"username": "ann"}},
            {"title": "admin notes", "published": false, "author": {"username": "bob"}}
        ])
    );
}

#[tokio::test]
async fn reverse_relation_window_is_per_parent() {
    let client = seeded().await;

    let result = client
        .find(
            "users",
            find(json!({
                "select": {
                    "username": true,
                    "posts": {"select": {"title": true}, "orderBy": "-views", "limit": {"take": 1}}
                },
                "orderBy": "id"
            })),
        )
        .await
        .unwrap();

    assert_eq!(
        rows(&result),
        json!([
            {"username": "ann", "posts": [{"title": "rust tips"}]},
            {"username": "bob", "posts": [{"title": "admin notes"}]}
        ])
    );
}

#[tokio::test]
async fn reverse_relation_without_take_stops_at_cap() {
    let client = seeded()
        .await
        .with_config(ClientConfig::default().max_rows(2))
        .unwrap();
    client
        .create(
            "posts",
            CreateArgs::new(vec![row(json!({"title": "more rust", "author": 1}))]),
        )
        .await
        .unwrap();

    let result = client
        .find(
            "users",
            find(json!({"select": {"username": true, "posts": {"select": {"title": true}, "orderBy": "id"}}, "orderBy": "id"})),
        )
        .await
        .unwrap();

    assert_eq!(
        rows(&result),
        json!([
            {"username": "ann", "posts": [{"title": "rust tips"}, {"title": "async rust"}]},
            {"username": "bob", "posts": [{"title": "admin notes"}]}
        ])
    );
}

#[tokio::test]
async fn empty_or_matches_nothing() {
    let client = seeded().await;

    let none = client
        .find("posts", find(json!({"where": {"OR": []}})))
        .await
        .unwrap();
    assert!(none.results.is_empty());

    let all = client
        .find("posts", find(json!({"where": {"AND": []}})))
        .await
        .unwrap();
    assert_eq!(all.results.len(), 3);

    let err = client
        .find("posts", find(json!({"where": {"title": {}}})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Predicate(_)), "{err}");
}

#[tokio::test]
async fn sibling_and_nested_relations() {
    let client = seeded().await;

    let result = client
        .find(
            "posts",
            find(json!({
                "select": {
                    "title": true,
                    "author": {"select": {"username": true}},
                    "comments": {"select": {"body": true, "author": {"select": {"role": true}}}, "orderBy": "id"}
                },
                "where": {"id": 1}
            })),
        )
        .await
        .unwrap();

    assert_eq!(
        rows(&result),
        json!([{
            "title": "rust tips",
            "author": {"username": "ann"},
            "comments": [
                {"body": "nice", "author": {"role": "admin"}},
                {"body": "thanks", "author": {"role": "member"}}
            ]
        }])
    );
}

#[tokio::test]
async fn relation_filters() {
    let client = seeded().await;

    let by_author = client
        .find(
            "posts",
            find(json!({
                "select": {"title": true},
                "where": {"author": {"role": "admin"}}
            })),
        )
        .await
        .unwrap();
    assert_eq!(rows(&by_author), json!([{"title": "admin notes"}]));

    let commented = client
        .find(
            "users",
            find(json!({
                "select": {"username": true},
                "where": {"comments": {"body": {"contains": "than"}}}
            })),
        )
        .await
        .unwrap();
    assert_eq!(rows(&commented), json!([{"username": "ann"}]));

    let either = client
        .find(
            "posts",
            find(json!({
                "select": {"title": true},
                "where": [{"views": {"gte": 10}}, {"title": {"endsWith": "notes"}}],
                "orderBy": "id"
            })),
        )
        .await
        .unwrap();
    assert_eq!(
        rows(&either),
        json!([{"title": "rust tips"}, {"title": "admin notes"}])
    );
}

#[tokio::test]
async fn aggregate_and_exists() {
    let client = seeded().await;

    let args: AggregateArgs = serde_json::from_value(json!({
        "aggregate": {"_all": {"count": true}, "views": {"sum": true, "max": true}},
        "where": {"author": 1}
    }))
    .unwrap();
    let result = client.aggregate("posts", args).await.unwrap();
    assert_eq!(
        rows(&result),
        json!([{"count": {"_all": 2}, "max": {"views": 10}, "sum": {"views": 15}}])
    );

    let admins = ConditionNode::equals("role", "admin");
    assert!(client.exists("users", Some(&admins)).await.unwrap());
    let ghosts = ConditionNode::equals("role", "ghost");
    assert!(!client.exists("users", Some(&ghosts)).await.unwrap());
}

#[tokio::test]
async fn update_and_delete() {
    let client = seeded().await;

    let updated = client
        .update(
            "posts",
            UpdateArgs {
                data: row(json!({"published": true})),
                condition: Some(ConditionNode::equals("author", 1)),
                all_rows: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.affected_rows, 2);

    let deleted = client
        .delete(
            "comments",
            serde_json::from_value::<DeleteArgs>(json!({"where": {"post": {"in": [1, 2]}}}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.affected_rows, 2);

    let published = client
        .find(
            "posts",
            find(json!({"select": {"title": true}, "where": {"published": true}, "orderBy": "id"})),
        )
        .await
        .unwrap();
    assert_eq!(
        rows(&published),
        json!([{"title": "rust tips"}, {"title": "async rust"}])
    );
}

#[tokio::test]
async fn rolled_back_transaction_leaves_no_rows() {
    let client = seeded().await;

    let tx = client.begin().await.unwrap();
    tx.create(
        "posts",
        CreateArgs::new(vec![row(json!({"title": "draft", "author": 2}))]),
    )
    .await
    .unwrap();
    let inside = tx
        .find("posts", find(json!({"where": {"title": "draft"}})))
        .await
        .unwrap();
    assert_eq!(inside.results.len(), 1);
    tx.rollback().await.unwrap();

    let after = client
        .find("posts", find(json!({"where": {"title": "draft"}})))
        .await
        .unwrap();
    assert!(after.results.is_empty());
}

#[tokio::test]
async fn constraint_violation_is_an_execution_error() {
    let client = seeded().await;

    let err = client
        .create(
            "users",
            CreateArgs::new(vec![row(
                json!({"username": "dup", "password": "password9", "email": "bob@example.com"}),
            )]),
        )
        .await
        .unwrap_err();

    let QueryError::Execution(failure) = err else {
        panic!("expected an execution error, got {err}");
    };
    assert!(failure.statement.starts_with("INSERT INTO users"));

    let count: AggregateArgs =
        serde_json::from_value(json!({"aggregate": {"*": {"count": true}}})).unwrap();
    let result = client.aggregate("users", count).await.unwrap();
    assert_eq!(rows(&result), json!([{"count": {"_all": 2}}]));
}

async fn post_count(client: &Client<SqliteExecutor>) -> Value {
    let count: AggregateArgs =
        serde_json::from_value(json!({"aggregate": {"*": {"count": true}}})).unwrap();
    let result = client.aggregate("posts", count).await.unwrap();
    result.results[0]["count"]["_all"].clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_use_separate_transactions() {
    let client = seeded().await;

    let creates = (0..20).map(|i| {
        client.create(
            "posts",
            CreateArgs::new(vec![row(json!({"title": format!("post {i}"), "author": 1}))]),
        )
    });
    let results = futures::future::join_all(creates).await;

    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().err().map(ToString::to_string))
        .collect();
    assert!(failures.is_empty(), "{failures:?}");
    assert_eq!(post_count(&client).await, json!(23));
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let client = seeded().await;

    {
        let tx = client.begin().await.unwrap();
        tx.create(
            "posts",
            CreateArgs::new(vec![row(json!({"title": "draft", "author": 2}))]),
        )
        .await
        .unwrap();
    }

    let after = client
        .find("posts", find(json!({"where": {"title": "draft"}})))
        .await
        .unwrap();
    assert!(after.results.is_empty());

    client
        .create(
            "posts",
            CreateArgs::new(vec![row(json!({"title": "final", "author": 2}))]),
        )
        .await
        .unwrap();
    assert_eq!(post_count(&client).await, json!(4));
}
