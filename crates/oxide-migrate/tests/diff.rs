//! Diff engine properties, checked against simulated live schemas.

mod common;

use common::{blog, posts, schema, users};
use oxide_core::schema::model;
use oxide_core::{field, LiveSchema};
use oxide_migrate::prelude::*;

#[test]
fn empty_database_creates_declared_table() {
    let dialect = SqliteDialect::new();
    let diff = Autodetector::new(&dialect).diff(&schema([users()]), &LiveSchema::new());

    assert_eq!(diff.operations.len(), 1);
    let MigrationOp::CreateTable { table, columns } = &diff.operations[0] else {
        panic!("expected CreateTable, got {}", diff.operations[0]);
    };
    assert_eq!(table, "users");
    assert_eq!(
        columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["id", "username", "email"]
    );
    assert!(columns[2].unique);
    assert!(diff.warnings.is_empty());
}

#[test]
fn declared_column_is_added() {
    let dialect = SqliteDialect::new();
    let detector = Autodetector::new(&dialect);
    let live = LiveSchema::new().apply_all(
        &detector
            .diff(&schema([users()]), &LiveSchema::new())
            .operations,
    );

    let declared = schema([users().field("role", field::string(16).default("member"))]);
    let diff = detector.diff(&declared, &live);

    assert_eq!(diff.operations.len(), 1);
    let MigrationOp::AddColumn { table, column } = &diff.operations[0] else {
        panic!("expected AddColumn, got {}", diff.operations[0]);
    };
    assert_eq!(table, "users");
    assert_eq!(column.name, "role");
    assert_eq!(
        diff.to_sql(&dialect),
        vec!["ALTER TABLE \"users\" ADD COLUMN \"role\" TEXT NOT NULL DEFAULT 'member'"]
    );
}

#[test]
fn applying_the_diff_converges() {
    let declared = blog();
    let mut seed = LiveSchema::new();
    seed.insert_table(
        "users",
        vec![
            ColumnDef::new("id", "INTEGER").auto_key().snapshot(),
            ColumnDef::new("username", "varchar(64)").snapshot(),
            ColumnDef::new("nickname", "TEXT").snapshot(),
        ],
    );

    let dialects: [&dyn MigrationDialect; 3] =
        [&SqliteDialect::new(), &PostgresDialect::new(), &MysqlDialect::new()];
    for dialect in dialects {
        let detector = Autodetector::new(dialect);
        let diff = detector.diff(&declared, &seed);
        assert!(!diff.is_empty(), "{}", dialect.name());

        let migrated = seed.clone().apply_all(&diff.operations);
        let again = detector.diff(&declared, &migrated);
        assert!(
            again.is_empty(),
            "{}: second diff was {:?}",
            dialect.name(),
            again.operations
        );
    }
}

#[test]
fn parents_are_created_first() {
    let dialect = SqliteDialect::new();
    let diff = Autodetector::new(&dialect).diff(&blog(), &LiveSchema::new());

    let tables: Vec<&str> = diff.operations.iter().map(MigrationOp::table).collect();
    assert_eq!(tables, vec!["users", "posts"]);
    assert!(diff.warnings.is_empty());

    let sql = diff.to_sql(&dialect);
    assert!(sql.contains(&String::from(
        "CREATE INDEX \"idx_posts_author\" ON \"posts\" (\"author\")"
    )));
    assert!(sql[2].ends_with("FOREIGN KEY (\"author\") REFERENCES \"users\" (\"id\"))"));
}

#[test]
fn undeclared_column_is_dropped() {
    let dialect = PostgresDialect::new();
    let detector = Autodetector::new(&dialect);
    let mut live = LiveSchema::new().apply_all(
        &detector
            .diff(&schema([users()]), &LiveSchema::new())
            .operations,
    );
    live.apply(&MigrationOp::AddColumn {
        table: "users".into(),
        column: ColumnDef::new("nickname", "TEXT"),
    });

    let diff = detector.diff(&schema([users()]), &live);
    assert_eq!(
        diff.operations,
        vec![MigrationOp::DropColumn {
            table: "users".into(),
            column: "nickname".into()
        }]
    );
}

#[test]
fn nullability_change_per_dialect() {
    let before = schema([users()]);
    let after = schema([model("users")
        .field("id", field::id())
        .field("username", field::string(64).nullable())
        .field("email", field::email().unique())]);

    let postgres = PostgresDialect::new();
    let detector = Autodetector::new(&postgres);
    let live = LiveSchema::new().apply_all(&detector.diff(&before, &LiveSchema::new()).operations);
    assert_eq!(
        detector.diff(&after, &live).to_sql(&postgres),
        vec!["ALTER TABLE \"users\" ALTER COLUMN \"username\" DROP NOT NULL"]
    );

    let sqlite = SqliteDialect::new();
    let detector = Autodetector::new(&sqlite);
    let live = LiveSchema::new().apply_all(&detector.diff(&before, &LiveSchema::new()).operations);
    let diff = detector.diff(&after, &live);
    assert!(matches!(
        diff.operations.as_slice(),
        [MigrationOp::RebuildTable { table, .. }] if table == "users"
    ));
}

#[test]
fn unique_change_stays_an_index_change_on_sqlite() {
    let before = schema([users()]);
    let after = schema([model("users")
        .field("id", field::id())
        .field("username", field::string(64))
        .field("email", field::email())]);

    let dialect = SqliteDialect::new();
    let detector = Autodetector::new(&dialect);
    let live = LiveSchema::new().apply_all(&detector.diff(&before, &LiveSchema::new()).operations);

    assert_eq!(
        detector.diff(&after, &live).to_sql(&dialect),
        vec!["DROP INDEX IF EXISTS \"uq_users_email\""]
    );
}

#[test]
fn force_recreates_everything() {
    let declared = blog();
    let dialect = MysqlDialect::new();
    let created = Autodetector::new(&dialect).diff(&declared, &LiveSchema::new());
    let live = LiveSchema::new().apply_all(&created.operations);

    let sql = Autodetector::new(&dialect)
        .force(true)
        .diff(&declared, &live)
        .to_sql(&dialect);

    assert_eq!(sql[0], "DROP TABLE IF EXISTS `posts`");
    assert_eq!(sql[1], "DROP TABLE IF EXISTS `users`");
    assert!(sql[2].starts_with("CREATE TABLE `users`"));
    assert!(sql.iter().any(|s| s.starts_with("CREATE TABLE `posts`")));
}

#[test]
fn self_reference_keeps_its_key() {
    let mentor = field::integer()
        .nullable()
        .references("users", "id")
        .reverse_name("mentees");
    let declared = schema([posts(), users().field("mentor", mentor)]);

    let dialect = SqliteDialect::new();
    let diff = Autodetector::new(&dialect).diff(&declared, &LiveSchema::new());

    assert!(diff.warnings.is_empty());
    let create_users = &diff.to_sql(&dialect)[0];
    assert!(create_users.contains("FOREIGN KEY (\"mentor\") REFERENCES \"users\" (\"id\")"));
}
