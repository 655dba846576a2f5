//! Lifecycle hooks and action events.
//!
//! Hooks run synchronously in registration order. A before-hook sees the
//! request and may rewrite or reject it; an after-hook sees the result and
//! may rewrite it. After every successful action an [`ActionEvent`] is
//! broadcast to subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::client::QueryResult;
use crate::error::{QueryError, Result};
use crate::request::{AggregateArgs, CreateArgs, DeleteArgs, FindArgs, UpdateArgs};

/// Client actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Find rows.
    Find,
    /// Insert rows.
    Create,
    /// Update rows.
    Update,
    /// Delete rows.
    Delete,
    /// Aggregate rows.
    Aggregate,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Find => "find",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Aggregate => "aggregate",
        })
    }
}

/// A request as seen by before-hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Find arguments.
    Find(FindArgs),
    /// Create arguments.
    Create(CreateArgs),
    /// Update arguments.
    Update(UpdateArgs),
    /// Delete arguments.
    Delete(DeleteArgs),
    /// Aggregate arguments.
    Aggregate(AggregateArgs),
}

impl Request {
    /// Action this request runs.
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Find(_) => Action::Find,
            Self::Create(_) => Action::Create,
            Self::Update(_) => Action::Update,
            Self::Delete(_) => Action::Delete,
            Self::Aggregate(_) => Action::Aggregate,
        }
    }
}

/// When a hook runs relative to its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before any SQL is compiled; may rewrite or reject the request.
    Before(Action),
    /// After the action succeeded; may rewrite the result.
    After(Action),
}

impl HookStage {
    /// Action the stage belongs to.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::Before(action) | Self::After(action) => action,
        }
    }
}

/// What a hook is running for.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Table name.
    pub table: &'a str,
    /// Stage being run.
    pub stage: HookStage,
}

type BeforeHook =
    Arc<dyn Fn(&HookContext<'_>, &mut Request) -> std::result::Result<(), String> + Send + Sync>;
type AfterHook = Arc<dyn Fn(&HookContext<'_>, &mut QueryResult) + Send + Sync>;

/// Registered hooks, per action.
#[derive(Clone, Default)]
pub struct Hooks {
    before: HashMap<Action, Vec<BeforeHook>>,
    after: HashMap<Action, Vec<AfterHook>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.values().map(Vec::len).sum::<usize>())
            .field("after", &self.after.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl Hooks {
    /// Registers a before-hook.
    pub fn before<F>(&mut self, action: Action, hook: F)
    where
        F: Fn(&HookContext<'_>, &mut Request) -> std::result::Result<(), String>
            + Send
            + Sync
            + 'static,
    {
        self.before.entry(action).or_default().push(Arc::new(hook));
    }

    /// Registers an after-hook.
    pub fn after<F>(&mut self, action: Action, hook: F)
    where
        F: Fn(&HookContext<'_>, &mut QueryResult) + Send + Sync + 'static,
    {
        self.after.entry(action).or_default().push(Arc::new(hook));
    }

    /// Runs before-hooks; the request must keep its action.
    pub(crate) fn run_before(&self, table: &str, mut request: Request) -> Result<Request> {
        let action = request.action();
        let ctx = HookContext {
            table,
            stage: HookStage::Before(action),
        };
        for hook in self.before.get(&action).into_iter().flatten() {
            hook(&ctx, &mut request).map_err(|reason| QueryError::Rejected { action, reason })?;
        }
        if request.action() != action {
            return Err(QueryError::InvalidRequest(format!(
                "a before-hook turned {action} into {}",
                request.action()
            )));
        }
        Ok(request)
    }

    /// Runs after-hooks.
    pub(crate) fn run_after(&self, table: &str, action: Action, result: &mut QueryResult) {
        let ctx = HookContext {
            table,
            stage: HookStage::After(action),
        };
        for hook in self.after.get(&action).into_iter().flatten() {
            hook(&ctx, result);
        }
    }
}

/// Broadcast after every successful action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionEvent {
    /// Action run.
    pub action: Action,
    /// Table name.
    pub table: String,
    /// Rows returned or affected.
    pub affected_rows: u64,
}
