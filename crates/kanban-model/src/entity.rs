//! Board hierarchy entities
//!
//! These mirror what the remote API returns. Collections are never embedded:
//! a column knows its board, a task its column, a subtask its task.

use crate::ids::{BoardId, ColumnId, SubtaskId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level container for one project's workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Board ID
    #[serde(rename = "board_id")]
    pub id: BoardId,
    /// Display name
    pub name: String,
}

impl Board {
    /// Create a board value
    #[inline]
    #[must_use]
    pub fn new(id: BoardId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A named workflow stage within a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column ID
    #[serde(rename = "column_id")]
    pub id: ColumnId,
    /// Display name; task statuses refer to it
    pub name: String,
    /// Owning board
    pub board_id: BoardId,
}

impl Column {
    /// Create a column value
    #[inline]
    #[must_use]
    pub fn new(id: ColumnId, board_id: BoardId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            board_id,
        }
    }
}

/// A unit of work sitting in exactly one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task ID
    #[serde(rename = "task_id")]
    pub id: TaskId,
    /// Title
    pub title: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Name of the current column
    pub status: String,
    /// Current column
    pub column_id: ColumnId,
    /// Number of subtasks
    #[serde(default)]
    pub total_subtasks: u32,
    /// Number of completed subtasks
    #[serde(default)]
    pub completed_subtasks: u32,
}

/// Result of adjusting a task's completed counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAdjustment {
    /// Counter moved by exactly one
    Applied,
    /// Counter would have left `0..=total` and was pinned to the bound
    Clamped,
}

impl Task {
    /// Current subtask progress
    #[inline]
    #[must_use]
    pub fn progress(&self) -> SubtaskProgress {
        SubtaskProgress::new(self.completed_subtasks, self.total_subtasks)
    }

    /// Move the completed counter by one in the given direction.
    ///
    /// The counter is kept within `0..=total_subtasks`; a move that would
    /// leave that range is pinned and reported as `Clamped`.
    pub fn adjust_completed(&mut self, became_completed: bool) -> CounterAdjustment {
        let step = if became_completed { 1 } else { -1 };
        let next = i64::from(self.completed_subtasks) + step;
        let bounded = next.clamp(0, i64::from(self.total_subtasks));
        self.completed_subtasks = u32::try_from(bounded).unwrap_or(self.total_subtasks);

        if bounded == next {
            CounterAdjustment::Applied
        } else {
            CounterAdjustment::Clamped
        }
    }
}

/// A checklist item belonging to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Subtask ID
    #[serde(rename = "subtask_id")]
    pub id: SubtaskId,
    /// Title
    pub title: String,
    /// Completion flag
    pub is_completed: bool,
    /// Owning task
    pub task_id: TaskId,
}

impl Subtask {
    /// Create a subtask value
    #[inline]
    #[must_use]
    pub fn new(id: SubtaskId, task_id: TaskId, title: impl Into<String>, is_completed: bool) -> Self {
        Self {
            id,
            title: title.into(),
            is_completed,
            task_id,
        }
    }
}

/// "completed of total" pair shown in task cards and the task modal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubtaskProgress {
    /// Completed subtasks
    pub completed: u32,
    /// All subtasks
    pub total: u32,
}

impl SubtaskProgress {
    /// Create progress value
    #[inline]
    #[must_use]
    pub fn new(completed: u32, total: u32) -> Self {
        Self { completed, total }
    }

    /// Count progress directly from a subtask list
    #[must_use]
    pub fn from_subtasks(subtasks: &[Subtask]) -> Self {
        let completed = subtasks.iter().filter(|s| s.is_completed).count();
        Self {
            completed: u32::try_from(completed).unwrap_or(u32::MAX),
            total: u32::try_from(subtasks.len()).unwrap_or(u32::MAX),
        }
    }

    /// Whether `completed <= total`
    #[inline]
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.completed <= self.total
    }
}

impl fmt::Display for SubtaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.completed, self.total)
    }
}
