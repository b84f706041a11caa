//! Write payloads sent to the remote API

use crate::ids::{BoardId, ColumnId};
use serde::{Deserialize, Serialize};

/// New board with its initial columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewBoard {
    /// Board name
    pub name: String,
    /// Initial columns, in display order
    #[serde(default)]
    pub columns: Vec<NewColumn>,
}

impl NewBoard {
    /// Create a board payload
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add an initial column
    #[inline]
    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(NewColumn::new(name));
        self
    }
}

/// Board edit: rename and/or append columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoardUpdate {
    /// New name, if changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Columns to append
    #[serde(default)]
    pub new_columns: Vec<NewColumn>,
}

/// New column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewColumn {
    /// Column name
    pub name: String,
}

impl NewColumn {
    /// Create a column payload
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// New subtask, created together with its task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubtask {
    /// Subtask title
    pub title: String,
    /// Initial completion flag
    #[serde(default)]
    pub is_completed: bool,
}

/// New task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Initial status (a column name)
    pub status: String,
    /// Board the status column belongs to
    pub board_id: BoardId,
    /// Column the task is created in
    pub column_id: ColumnId,
    /// Initial subtasks
    #[serde(default)]
    pub subtasks: Vec<NewSubtask>,
}

impl NewTask {
    /// Create a task payload placed in `column`
    #[must_use]
    pub fn new(
        board_id: BoardId,
        column_id: ColumnId,
        title: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: status.into(),
            board_id,
            column_id,
            subtasks: Vec::new(),
        }
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With an initial subtask
    #[inline]
    #[must_use]
    pub fn with_subtask(mut self, title: impl Into<String>, is_completed: bool) -> Self {
        self.subtasks.push(NewSubtask {
            title: title.into(),
            is_completed,
        });
        self
    }
}

/// Partial task update; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status and the column carrying that name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Destination column when the status changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
}

impl TaskUpdate {
    /// Move to another column
    #[must_use]
    pub fn move_to(column_id: ColumnId, status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            column_id: Some(column_id),
            ..Self::default()
        }
    }

    /// Whether this update moves the task
    #[inline]
    #[must_use]
    pub fn moves_column(&self) -> bool {
        self.column_id.is_some()
    }
}
