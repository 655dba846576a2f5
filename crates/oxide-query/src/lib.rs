//! # oxide-query
//!
//! Compiles structured requests into SQL and runs them through an
//! [`oxide_core::Executor`].
//!
//! A [`Client`] resolves select trees into a base query plus one follow-up
//! query per selected relation, compiles predicate trees (conditions on
//! related tables become `EXISTS` subqueries), validates write payloads
//! against the schema and enforces the configured row caps.
//!
//! ```ignore
//! use oxide_query::{Client, FindArgs};
//! use serde_json::json;
//!
//! let client = Client::new(executor, Arc::new(schema));
//! let args: FindArgs = serde_json::from_value(json!({
//!     "select": { "title": true, "comments": { "limit": { "take": 3 } } },
//!     "where": { "author": { "username": { "startsWith": "a" } } },
//!     "orderBy": "-id"
//! }))?;
//! let result = client.find("posts", args).await?;
//! ```
//!
//! Writes run inside a transaction unless they go through a
//! [`Transaction`] handle, in which case they join it.

pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod hooks;
pub mod request;
pub mod select;
mod statement;

pub use client::{Client, QueryResult, Transaction};
pub use condition::{ConditionNode, Operator, PredicateCompiler};
pub use config::{ClientConfig, TableLimits, DEFAULT_MAX_ROWS};
pub use error::{
    ConfigError, ExecutionError, PredicateError, QueryError, Result, SafetyError,
};
pub use hooks::{Action, ActionEvent, HookContext, HookStage, Hooks, Request};
pub use request::{
    AggregateArgs, AggregateSpec, CreateArgs, DeleteArgs, FindArgs, Limit, OrderBy, Ordering,
    UpdateArgs,
};
pub use select::{QueryPlan, RelationArgs, SelectEntry, SelectResolver, SelectTree};
