//! The query client: compiles requests, runs them on an [`Executor`] and
//! shapes the results.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{try_join_all, LocalBoxFuture};
use futures::FutureExt;
use oxide_core::{Engine, ExecResult, Executor, FieldDefinition, Row, Schema, Session};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::condition::{ConditionNode, PredicateCompiler};
use crate::config::ClientConfig;
use crate::error::{ConfigError, ExecutionError, QueryError, Result, SafetyError};
use crate::hooks::{Action, ActionEvent, HookContext, Hooks, Request};
use crate::request::{AggregateArgs, CreateArgs, DeleteArgs, FindArgs, UpdateArgs};
use crate::select::{stitch, PlanNode, SelectResolver};
use crate::statement;

const EVENT_CAPACITY: usize = 64;

/// Outcome of one client action.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Rows found or written; one shaped row for aggregates.
    pub results: Vec<Row>,
    /// Rows returned by a find, or affected by a write.
    pub affected_rows: u64,
    /// Key generated by the last insert.
    pub insert_id: Option<i64>,
    /// Every statement sent, in order, including transaction control.
    pub statements: Vec<String>,
}

/// Statements sent while serving one request.
#[derive(Debug, Default)]
struct StatementLog(Mutex<Vec<String>>);

impl StatementLog {
    fn push(&self, sql: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
    }

    fn into_inner(self) -> Vec<String> {
        self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session shared by the statements of one transaction.
type Held<'s, E> = AsyncMutex<<E as Executor>::Session<'s>>;

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Runs structured requests against one database.
///
/// Every write, and every find that follows relations, runs in its own
/// transaction on a session taken from the executor, so concurrent
/// requests never share one. Requests made through a [`Transaction`] use
/// its session instead.
///
/// ```ignore
/// let client = Client::new(executor, Arc::new(schema));
/// let posts = client
///     .find("posts", serde_json::from_value(json!({
///         "select": { "title": true, "author": { "select": { "username": true } } },
///         "where": { "author": { "username": { "startsWith": "a" } } }
///     }))?)
///     .await?;
/// ```
pub struct Client<E> {
    executor: E,
    schema: Arc<Schema>,
    config: ClientConfig,
    hooks: Hooks,
    events: broadcast::Sender<ActionEvent>,
}

impl<E> std::fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Client<E> {
    /// Creates a client with the default configuration.
    #[must_use]
    pub fn new(executor: E, schema: Arc<Schema>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            executor,
            schema,
            config: ClientConfig::default(),
            hooks: Hooks::default(),
            events,
        }
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// A configuration with a zero cap.
    pub fn with_config(mut self, config: ClientConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Registers a hook run before `action`; an `Err` rejects the request.
    pub fn before<F>(&mut self, action: Action, hook: F)
    where
        F: Fn(&HookContext<'_>, &mut Request) -> std::result::Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.before(action, hook);
    }

    /// Registers a hook run after `action` succeeded.
    pub fn after<F>(&mut self, action: Action, hook: F)
    where
        F: Fn(&HookContext<'_>, &mut QueryResult) + Send + Sync + 'static,
    {
        self.hooks.after(action, hook);
    }

    /// Receives an [`ActionEvent`] for every successful action.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.events.subscribe()
    }

    /// The schema requests are compiled against.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    fn engine(&self) -> Engine {
        self.executor.engine()
    }

    /// Finds rows and their selected relations.
    ///
    /// # Errors
    ///
    /// Compile errors before any SQL is sent, or the first failing
    /// statement.
    pub async fn find(&self, table: &str, args: FindArgs) -> Result<QueryResult> {
        self.dispatch(table, Request::Find(args), None).await
    }

    /// Inserts rows in one statement.
    ///
    /// # Errors
    ///
    /// Validation errors for the whole batch, a batch above the row cap,
    /// or the failing statement.
    pub async fn create(&self, table: &str, args: CreateArgs) -> Result<QueryResult> {
        self.dispatch(table, Request::Create(args), None).await
    }

    /// Updates the rows matching the condition.
    ///
    /// # Errors
    ///
    /// [`SafetyError::MissingWhereClause`] without a condition or the
    /// all-rows flag, validation errors, or the failing statement.
    pub async fn update(&self, table: &str, args: UpdateArgs) -> Result<QueryResult> {
        self.dispatch(table, Request::Update(args), None).await
    }

    /// Deletes the rows matching the condition.
    ///
    /// # Errors
    ///
    /// [`SafetyError::MissingWhereClause`] without a condition or the
    /// all-rows flag, or the failing statement.
    pub async fn delete(&self, table: &str, args: DeleteArgs) -> Result<QueryResult> {
        self.dispatch(table, Request::Delete(args), None).await
    }

    /// Computes aggregates in one statement.
    ///
    /// # Errors
    ///
    /// Unknown fields, aggregates the field kind does not support, or the
    /// failing statement.
    pub async fn aggregate(&self, table: &str, args: AggregateArgs) -> Result<QueryResult> {
        self.dispatch(table, Request::Aggregate(args), None).await
    }

    /// Whether any row matches the condition.
    ///
    /// # Errors
    ///
    /// Compile errors or the failing statement.
    pub async fn exists(&self, table: &str, condition: Option<&ConditionNode>) -> Result<bool> {
        let log = StatementLog::default();
        let filter = self.compile(table, condition)?;
        let sql = statement::exists_sql(table, filter.as_deref());
        let result = self.exec(&sql, None, &log).await?;
        Ok(statement::exists_result(result.results.first()))
    }

    /// Opens a transaction; requests made through it join it.
    ///
    /// The transaction holds the connection until it is committed, rolled
    /// back or dropped. Requests made on the client meanwhile wait for it.
    ///
    /// # Errors
    ///
    /// The driver rejected the begin statement.
    pub async fn begin(&self) -> Result<Transaction<'_, E>> {
        let session = self.open(&StatementLog::default()).await?;
        Ok(Transaction {
            client: self,
            session: Some(session),
        })
    }

    async fn dispatch(
        &self,
        table: &str,
        request: Request,
        tx: Option<&Held<'_, E>>,
    ) -> Result<QueryResult> {
        let request = self.hooks.run_before(table, request)?;
        let action = request.action();
        let log = StatementLog::default();

        let mut result = match request {
            Request::Find(args) => self.run_find(table, &args, tx, &log).await,
            Request::Create(args) => self.run_create(table, args, tx, &log).await,
            Request::Update(args) => self.run_update(table, args, tx, &log).await,
            Request::Delete(args) => self.run_delete(table, &args, tx, &log).await,
            Request::Aggregate(args) => self.run_aggregate(table, &args, tx, &log).await,
        }?;
        result.statements = log.into_inner();

        self.hooks.run_after(table, action, &mut result);

        // Nobody listening is fine.
        let _ = self.events.send(ActionEvent {
            action,
            table: table.to_string(),
            affected_rows: result.affected_rows,
        });
        Ok(result)
    }

    fn compile(&self, table: &str, condition: Option<&ConditionNode>) -> Result<Option<String>> {
        match condition {
            Some(condition) => PredicateCompiler::new(&self.schema, self.engine())
                .with_max_depth(self.config.max_relation_depth)
                .compile(table, condition),
            None => {
                self.schema.get(table)?;
                Ok(None)
            }
        }
    }

    /// Sends one statement through `tx`, or straight to the executor.
    async fn exec(
        &self,
        sql: &str,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<ExecResult> {
        debug!(sql = %sql, "executing statement");
        log.push(sql);
        let result = match tx {
            Some(session) => session.lock().await.execute(sql).await,
            None => self.executor.execute(sql).await,
        };
        result.map_err(|source| {
            QueryError::from(ExecutionError {
                statement: sql.to_string(),
                source,
            })
        })
    }

    /// Takes a session and begins a transaction on it.
    async fn open(&self, log: &StatementLog) -> Result<Held<'_, E>> {
        let begin = self.engine().begin_statement();
        let session = self.executor.session().await.map_err(|source| {
            QueryError::from(ExecutionError {
                statement: begin.to_string(),
                source,
            })
        })?;
        let session = AsyncMutex::new(session);
        self.exec(begin, Some(&session), log).await?;
        Ok(session)
    }

    /// Commits on success and rolls back on failure, then releases the
    /// session.
    async fn close<T>(
        &self,
        session: Held<'_, E>,
        outcome: Result<T>,
        log: &StatementLog,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.exec("COMMIT", Some(&session), log).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.exec("ROLLBACK", Some(&session), log).await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs one write statement, inside `tx` or in a transaction of its own.
    async fn write(
        &self,
        sql: &str,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<ExecResult> {
        if tx.is_some() {
            return self.exec(sql, tx, log).await;
        }
        let session = self.open(log).await?;
        let outcome = self.exec(sql, Some(&session), log).await;
        self.close(session, outcome, log).await
    }

    async fn run_find(
        &self,
        table: &str,
        args: &FindArgs,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<QueryResult> {
        let plan = SelectResolver::new(&self.schema, self.engine(), &self.config).resolve(table, args)?;
        let rows = if tx.is_none() && plan.has_relations() {
            let session = self.open(log).await?;
            let outcome = self.fetch(plan.root(), None, Some(&session), log).await;
            self.close(session, outcome, log).await?
        } else {
            self.fetch(plan.root(), None, tx, log).await?
        };

        Ok(QueryResult {
            affected_rows: count(rows.len()),
            results: rows,
            ..QueryResult::default()
        })
    }

    /// Runs one plan node, then its children concurrently.
    fn fetch<'a, 's: 'a>(
        &'a self,
        node: &'a PlanNode,
        keys: Option<Vec<Value>>,
        tx: Option<&'a Held<'s, E>>,
        log: &'a StatementLog,
    ) -> LocalBoxFuture<'a, Result<Vec<Row>>> {
        async move {
            if keys.as_ref().is_some_and(Vec::is_empty) {
                return Ok(Vec::new());
            }

            let sql = node.to_sql(self.engine(), keys.as_deref());
            let mut rows = self.exec(&sql, tx, log).await?.results;

            let model = self.schema.get(&node.table)?;
            for row in &mut rows {
                stitch::decode(model, row);
            }

            let pending = node.children.iter().map(|child| {
                let keys = child
                    .link
                    .as_ref()
                    .map_or_else(Vec::new, |link| stitch::parent_keys(&rows, &link.parent_key));
                self.fetch(child, Some(keys), tx, log)
            });
            let fetched = try_join_all(pending).await?;

            for (child, child_rows) in node.children.iter().zip(fetched) {
                stitch::attach(&mut rows, child_rows, child);
            }
            stitch::strip(&mut rows, &node.hidden);
            Ok(rows)
        }
        .boxed_local()
    }

    async fn run_create(
        &self,
        table: &str,
        args: CreateArgs,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<QueryResult> {
        let model = self.schema.get(table)?;

        let cap = self.config.cap(table, Action::Create);
        if args.data.len() > cap {
            return Err(SafetyError::LimitExceeded {
                table: table.to_string(),
                action: Action::Create,
                requested: args.data.len(),
                max: cap,
            }
            .into());
        }
        if args.data.is_empty() {
            return Err(QueryError::InvalidRequest(format!(
                "create on `{table}` has no rows"
            )));
        }

        let mut rows = statement::prepare_rows(model, args.data)?;
        let sql = statement::insert_sql(model, self.engine(), &rows);
        let result = self.write(&sql, tx, log).await?;

        if let ([row], Some(id)) = (rows.as_mut_slice(), result.insert_id) {
            let pk = model.primary_key();
            if !row.contains_key(pk) && model
                    .field(pk)
                    .is_some_and(FieldDefinition::is_auto_increment) {
                row.insert(pk.to_string(), Value::from(id));
            }
        }

        Ok(QueryResult {
            results: rows,
            affected_rows: result.affected_rows,
            insert_id: result.insert_id,
            statements: Vec::new(),
        })
    }

    async fn run_update(
        &self,
        table: &str,
        args: UpdateArgs,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<QueryResult> {
        let model = self.schema.get(table)?;
        let filter = self.compile(table, args.condition.as_ref())?;
        if filter.is_none() && !args.all_rows {
            return Err(SafetyError::MissingWhereClause {
                table: table.to_string(),
                action: Action::Update,
            }
            .into());
        }

        let data = statement::prepare_update(model, args.data)?;
        let sql = statement::update_sql(model, self.engine(), &data, filter.as_deref())?;
        let result = self.write(&sql, tx, log).await?;

        Ok(QueryResult {
            affected_rows: result.affected_rows,
            ..QueryResult::default()
        })
    }

    async fn run_delete(
        &self,
        table: &str,
        args: &DeleteArgs,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<QueryResult> {
        let filter = self.compile(table, args.condition.as_ref())?;
        if filter.is_none() && !args.all_rows {
            return Err(SafetyError::MissingWhereClause {
                table: table.to_string(),
                action: Action::Delete,
            }
            .into());
        }

        let sql = statement::delete_sql(table, filter.as_deref());
        let result = self.write(&sql, tx, log).await?;

        Ok(QueryResult {
            affected_rows: result.affected_rows,
            ..QueryResult::default()
        })
    }

    async fn run_aggregate(
        &self,
        table: &str,
        args: &AggregateArgs,
        tx: Option<&Held<'_, E>>,
        log: &StatementLog,
    ) -> Result<QueryResult> {
        let model = self.schema.get(table)?;
        let filter = self.compile(table, args.condition.as_ref())?;
        let (sql, columns) = statement::aggregate_sql(model, &args.aggregate, filter.as_deref())?;
        let result = self.exec(&sql, tx, log).await?;

        Ok(QueryResult {
            results: vec![statement::shape_aggregate(&columns, result.results.first())],
            affected_rows: 1,
            ..QueryResult::default()
        })
    }
}

/// An open transaction; requests made through it run inside it.
///
/// Finish with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping it unfinished rolls it back.
pub struct Transaction<'c, E: Executor + 'c> {
    client: &'c Client<E>,
    session: Option<Held<'c, E>>,
}

impl<E: Executor> std::fmt::Debug for Transaction<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("open", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Transaction<'_, E> {
    /// Finds rows inside the transaction.
    ///
    /// # Errors
    ///
    /// As [`Client::find`].
    pub async fn find(&self, table: &str, args: FindArgs) -> Result<QueryResult> {
        self.client
            .dispatch(table, Request::Find(args), self.session.as_ref())
            .await
    }

    /// Inserts rows inside the transaction.
    ///
    /// # Errors
    ///
    /// As [`Client::create`].
    pub async fn create(&self, table: &str, args: CreateArgs) -> Result<QueryResult> {
        self.client
            .dispatch(table, Request::Create(args), self.session.as_ref())
            .await
    }

    /// Updates rows inside the transaction.
    ///
    /// # Errors
    ///
    /// As [`Client::update`].
    pub async fn update(&self, table: &str, args: UpdateArgs) -> Result<QueryResult> {
        self.client
            .dispatch(table, Request::Update(args), self.session.as_ref())
            .await
    }

    /// Deletes rows inside the transaction.
    ///
    /// # Errors
    ///
    /// As [`Client::delete`].
    pub async fn delete(&self, table: &str, args: DeleteArgs) -> Result<QueryResult> {
        self.client
            .dispatch(table, Request::Delete(args), self.session.as_ref())
            .await
    }

    /// Aggregates inside the transaction.
    ///
    /// # Errors
    ///
    /// As [`Client::aggregate`].
    pub async fn aggregate(&self, table: &str, args: AggregateArgs) -> Result<QueryResult> {
        self.client
            .dispatch(table, Request::Aggregate(args), self.session.as_ref())
            .await
    }

    /// Commits.
    ///
    /// # Errors
    ///
    /// The driver rejected the commit; the transaction is then rolled back.
    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    /// Rolls back.
    ///
    /// # Errors
    ///
    /// The driver rejected the rollback.
    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, sql: &str) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.client
            .exec(sql, Some(&session), &StatementLog::default())
            .await
            .map(drop)
    }
}
