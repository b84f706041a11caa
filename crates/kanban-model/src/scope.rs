//! Cache scopes
//!
//! A scope names one cached collection: "all boards", "columns of board X",
//! "tasks of column Y", "subtasks of task Z". `ScopeKey` is the untyped
//! composite key the cache stores by; the `Scope` trait ties each scope to
//! the type of value cached under it.

use crate::entity::{Board, Column, Subtask, Task};
use crate::ids::{BoardId, ColumnId, TaskId};
use std::fmt;

/// Entity type addressed by a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// The board list
    Boards,
    /// Columns of one board
    Columns,
    /// Tasks of one column
    Tasks,
    /// Subtasks of one task
    Subtasks,
}

/// Composite cache key: entity type plus parent scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// All boards
    Boards,
    /// Columns of a board
    Columns(BoardId),
    /// Tasks of a column
    Tasks(ColumnId),
    /// Subtasks of a task
    Subtasks(TaskId),
}

impl ScopeKey {
    /// Entity type of this scope
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Boards => ScopeKind::Boards,
            Self::Columns(_) => ScopeKind::Columns,
            Self::Tasks(_) => ScopeKind::Tasks,
            Self::Subtasks(_) => ScopeKind::Subtasks,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boards => write!(f, "boards"),
            Self::Columns(id) => write!(f, "columns/{}", id.get()),
            Self::Tasks(id) => write!(f, "tasks/{}", id.get()),
            Self::Subtasks(id) => write!(f, "subtasks/{}", id.get()),
        }
    }
}

/// A typed cache scope
pub trait Scope: fmt::Debug + Send + Sync {
    /// Value cached under this scope
    type Value: Clone + Send + Sync + 'static;

    /// Untyped key
    fn key(&self) -> ScopeKey;
}

/// The board list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AllBoards;

/// Columns of a board, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnsOf(pub BoardId);

/// Tasks of a column, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TasksOf(pub ColumnId);

/// Subtasks of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubtasksOf(pub TaskId);

impl Scope for AllBoards {
    type Value = Vec<Board>;

    fn key(&self) -> ScopeKey {
        ScopeKey::Boards
    }
}

impl Scope for ColumnsOf {
    type Value = Vec<Column>;

    fn key(&self) -> ScopeKey {
        ScopeKey::Columns(self.0)
    }
}

impl Scope for TasksOf {
    type Value = Vec<Task>;

    fn key(&self) -> ScopeKey {
        ScopeKey::Tasks(self.0)
    }
}

impl Scope for SubtasksOf {
    type Value = Vec<Subtask>;

    fn key(&self) -> ScopeKey {
        ScopeKey::Subtasks(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_scopes_map_to_keys() {
        assert_eq!(AllBoards.key(), ScopeKey::Boards);
        assert_eq!(ColumnsOf(BoardId(1)).key(), ScopeKey::Columns(BoardId(1)));
        assert_eq!(TasksOf(ColumnId(2)).key().kind(), ScopeKind::Tasks);
        assert_eq!(SubtasksOf(TaskId(3)).key().to_string(), "subtasks/3");
    }

    #[test]
    fn keys_of_different_kinds_never_collide() {
        assert_ne!(ScopeKey::Columns(BoardId(1)), ScopeKey::Tasks(ColumnId(1)));
    }
}
