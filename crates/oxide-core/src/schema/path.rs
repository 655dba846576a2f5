//! Guard for walks over a requested relation tree.

use crate::error::RelationGraphError;

/// Default number of relation hops a requested tree may nest.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Tables on the current walk from the root of a select or predicate tree.
///
/// The schema itself may contain cycles; a single walk may not revisit a
/// table that is already on its stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPath {
    stack: Vec<String>,
    max_depth: usize,
}

impl RelationPath {
    /// Starts a walk at `root`.
    #[must_use]
    pub fn new(root: impl Into<String>, max_depth: usize) -> Self {
        Self {
            stack: vec![root.into()],
            max_depth,
        }
    }

    /// Returns the path extended with `table`.
    ///
    /// # Errors
    ///
    /// [`RelationGraphError::CircularRelation`] if `table` is already on the
    /// path, [`RelationGraphError::RelationDepthExceeded`] past the maximum
    /// depth.
    pub fn descend(&self, table: &str) -> Result<Self, RelationGraphError> {
        if self.stack.iter().any(|t| t == table) {
            let mut path = self.stack.clone();
            path.push(table.to_string());
            return Err(RelationGraphError::CircularRelation { path });
        }
        if self.depth() >= self.max_depth {
            return Err(RelationGraphError::RelationDepthExceeded {
                max: self.max_depth,
            });
        }
        let mut next = self.clone();
        next.stack.push(table.to_string());
        Ok(next)
    }

    /// Number of relation hops taken so far.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Table at the end of the path.
    #[must_use]
    pub fn current(&self) -> &str {
        self.stack.last().map_or("", String::as_str)
    }
}
