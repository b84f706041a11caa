//! Remote task API contract
//!
//! The server is the source of truth. Each operation returns the updated
//! entity or collection, or an `ApiError`. Implement this trait for the real
//! transport; `harness::MemoryTaskApi` is an in-process implementation.

use crate::error::ApiError;
use kanban_model::{
    Board, BoardId, BoardUpdate, Column, ColumnId, NewBoard, NewColumn, NewTask, Subtask,
    SubtaskId, Task, TaskId, TaskUpdate,
};

/// Remote task API
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TaskApi: Send + Sync {
    /// All boards
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError>;

    /// Create a board with its initial columns
    async fn create_board(&self, board: NewBoard) -> Result<Board, ApiError>;

    /// Rename a board and/or append columns
    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> Result<Board, ApiError>;

    /// Delete a board and everything under it
    async fn delete_board(&self, id: BoardId) -> Result<(), ApiError>;

    /// Columns of a board, in display order
    async fn list_columns(&self, board: BoardId) -> Result<Vec<Column>, ApiError>;

    /// Append columns to a board
    async fn create_columns(
        &self,
        board: BoardId,
        columns: Vec<NewColumn>,
    ) -> Result<Vec<Column>, ApiError>;

    /// Delete a column
    async fn delete_column(&self, id: ColumnId) -> Result<(), ApiError>;

    /// Tasks of a column, in display order
    async fn list_tasks(&self, column: ColumnId) -> Result<Vec<Task>, ApiError>;

    /// Create a task with its subtasks
    async fn create_task(&self, task: NewTask) -> Result<Task, ApiError>;

    /// Update task fields or move it to another column
    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, ApiError>;

    /// Delete a task and its subtasks
    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError>;

    /// Subtasks of a task
    async fn list_subtasks(&self, task: TaskId) -> Result<Vec<Subtask>, ApiError>;

    /// Set a subtask's completion flag
    async fn set_subtask_completion(
        &self,
        id: SubtaskId,
        is_completed: bool,
    ) -> Result<Subtask, ApiError>;
}
