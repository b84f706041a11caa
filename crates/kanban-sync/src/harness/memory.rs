//! In-memory task API
//!
//! Holds the board hierarchy in process, answers with configurable latency
//! and fails on demand. Task counters are derived from the stored subtasks on
//! every read, like the real server.

use crate::api::TaskApi;
use crate::error::ApiError;
use dashmap::DashMap;
use indexmap::IndexMap;
use kanban_model::{
    Board, BoardId, BoardUpdate, Column, ColumnId, NewBoard, NewColumn, NewTask, Subtask,
    SubtaskId, Task, TaskId, TaskUpdate,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Remote operations, for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    /// `list_boards`
    ListBoards,
    /// `create_board`
    CreateBoard,
    /// `update_board`
    UpdateBoard,
    /// `delete_board`
    DeleteBoard,
    /// `list_columns`
    ListColumns,
    /// `create_columns`
    CreateColumns,
    /// `delete_column`
    DeleteColumn,
    /// `list_tasks`
    ListTasks,
    /// `create_task`
    CreateTask,
    /// `update_task`
    UpdateTask,
    /// `delete_task`
    DeleteTask,
    /// `list_subtasks`
    ListSubtasks,
    /// `set_subtask_completion`
    SetSubtaskCompletion,
}

#[derive(Debug, Default)]
struct Store {
    boards: IndexMap<BoardId, Board>,
    columns: IndexMap<ColumnId, Column>,
    tasks: IndexMap<TaskId, Task>,
    subtasks: IndexMap<SubtaskId, Subtask>,
    next_board: i64,
    next_column: i64,
    next_task: i64,
    next_subtask: i64,
}

impl Store {
    fn add_board(&mut self, name: &str) -> BoardId {
        self.next_board += 1;
        let id = BoardId(self.next_board);
        self.boards.insert(id, Board::new(id, name));
        id
    }

    fn add_column(&mut self, board: BoardId, name: &str) -> ColumnId {
        self.next_column += 1;
        let id = ColumnId(self.next_column);
        self.columns.insert(id, Column::new(id, board, name));
        id
    }

    fn add_task(&mut self, column: ColumnId, title: &str, description: &str) -> TaskId {
        self.next_task += 1;
        let id = TaskId(self.next_task);
        let status = self
            .columns
            .get(&column)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        self.tasks.insert(
            id,
            Task {
                id,
                title: title.to_string(),
                description: description.to_string(),
                status,
                column_id: column,
                total_subtasks: 0,
                completed_subtasks: 0,
            },
        );
        id
    }

    fn add_subtask(&mut self, task: TaskId, title: &str, is_completed: bool) -> SubtaskId {
        self.next_subtask += 1;
        let id = SubtaskId(self.next_subtask);
        self.subtasks
            .insert(id, Subtask::new(id, task, title, is_completed));
        id
    }

    /// Task with counters derived from its subtasks
    fn task_view(&self, task: &Task) -> Task {
        let mut view = task.clone();
        let (mut total, mut completed) = (0u32, 0u32);
        for subtask in self.subtasks.values().filter(|s| s.task_id == task.id) {
            total += 1;
            if subtask.is_completed {
                completed += 1;
            }
        }
        view.total_subtasks = total;
        view.completed_subtasks = completed;
        view
    }

    fn remove_task(&mut self, task: TaskId) {
        self.tasks.shift_remove(&task);
        self.subtasks.retain(|_, s| s.task_id != task);
    }

    fn remove_column(&mut self, column: ColumnId) {
        self.columns.shift_remove(&column);
        let tasks: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.column_id == column)
            .map(|t| t.id)
            .collect();
        for task in tasks {
            self.remove_task(task);
        }
    }

    fn board_of(&self, column: ColumnId) -> Option<BoardId> {
        self.columns.get(&column).map(|c| c.board_id)
    }
}

/// In-process `TaskApi`
#[derive(Debug, Default)]
pub struct MemoryTaskApi {
    store: Mutex<Store>,
    latency: Duration,
    op_latency: HashMap<ApiOp, Duration>,
    faults: Mutex<HashMap<ApiOp, VecDeque<Option<ApiError>>>>,
    calls: DashMap<ApiOp, u64>,
}

impl MemoryTaskApi {
    /// Empty API with no latency
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded with two boards.
    ///
    /// "Platform Launch" (board 1) has columns Todo (1), Doing (2) and
    /// Done (3). Todo holds "Design logo" (task 1) with three subtasks, the
    /// first one complete (subtasks 1 to 3). Doing holds "Write launch
    /// post" (task 2). "Marketing Plan" (board 2) has columns Todo (4) and
    /// Done (5) and no tasks.
    #[must_use]
    pub fn platform_launch() -> Self {
        let api = Self::new();
        {
            let mut store = api.store.lock();
            let board = store.add_board("Platform Launch");
            let todo = store.add_column(board, "Todo");
            let doing = store.add_column(board, "Doing");
            store.add_column(board, "Done");

            let logo = store.add_task(todo, "Design logo", "Logo for the launch page");
            store.add_subtask(logo, "Sketch concepts", true);
            store.add_subtask(logo, "Pick palette", false);
            store.add_subtask(logo, "Export assets", false);

            let post = store.add_task(doing, "Write launch post", "");
            store.add_subtask(post, "Draft", false);

            let marketing = store.add_board("Marketing Plan");
            store.add_column(marketing, "Todo");
            store.add_column(marketing, "Done");
        }
        api
    }

    /// With per-call latency
    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the latency of one operation
    #[inline]
    #[must_use]
    pub fn with_op_latency(mut self, op: ApiOp, latency: Duration) -> Self {
        self.op_latency.insert(op, latency);
        self
    }

    /// Make the next call of `op` fail with `error`.
    ///
    /// Scripted outcomes queue per operation and are consumed in order.
    pub fn fail_next(&self, op: ApiOp, error: ApiError) {
        self.faults.lock().entry(op).or_default().push_back(Some(error));
    }

    /// Let the next scripted call of `op` through before later failures
    pub fn succeed_next(&self, op: ApiOp) {
        self.faults.lock().entry(op).or_default().push_back(None);
    }

    /// Number of calls made to `op`
    #[must_use]
    pub fn calls(&self, op: ApiOp) -> u64 {
        self.calls.get(&op).map_or(0, |c| *c)
    }

    /// Server-side copy of a task, with derived counters
    #[must_use]
    pub fn stored_task(&self, task: TaskId) -> Option<Task> {
        let store = self.store.lock();
        store.tasks.get(&task).map(|t| store.task_view(t))
    }

    /// Server-side copy of a subtask
    #[must_use]
    pub fn stored_subtask(&self, subtask: SubtaskId) -> Option<Subtask> {
        self.store.lock().subtasks.get(&subtask).cloned()
    }

    async fn enter(&self, op: ApiOp) -> Result<(), ApiError> {
        *self.calls.entry(op).or_insert(0) += 1;
        let latency = self.op_latency.get(&op).copied().unwrap_or(self.latency);
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }
        let fault = self
            .faults
            .lock()
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .flatten();
        match fault {
            Some(error) => {
                tracing::debug!(?op, %error, "injected failure");
                Err(error)
            }
            None => Ok(()),
        }
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::NotFound(format!("{what} not found"))
}

fn require_name(name: &str, what: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::ValidationRejected(format!("{what} is required")));
    }
    Ok(())
}

#[async_trait::async_trait]
impl TaskApi for MemoryTaskApi {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.enter(ApiOp::ListBoards).await?;
        Ok(self.store.lock().boards.values().cloned().collect())
    }

    async fn create_board(&self, board: NewBoard) -> Result<Board, ApiError> {
        self.enter(ApiOp::CreateBoard).await?;
        require_name(&board.name, "Board name")?;
        for column in &board.columns {
            require_name(&column.name, "Column name")?;
        }

        let mut store = self.store.lock();
        let id = store.add_board(&board.name);
        for column in &board.columns {
            store.add_column(id, &column.name);
        }
        Ok(Board::new(id, board.name))
    }

    async fn update_board(&self, id: BoardId, update: BoardUpdate) -> Result<Board, ApiError> {
        self.enter(ApiOp::UpdateBoard).await?;
        if let Some(name) = &update.name {
            require_name(name, "Board name")?;
        }
        for column in &update.new_columns {
            require_name(&column.name, "Column name")?;
        }

        let mut store = self.store.lock();
        let board = store.boards.get_mut(&id).ok_or_else(|| not_found("Board"))?;
        if let Some(name) = update.name {
            board.name = name;
        }
        let board = board.clone();
        for column in &update.new_columns {
            store.add_column(id, &column.name);
        }
        Ok(board)
    }

    async fn delete_board(&self, id: BoardId) -> Result<(), ApiError> {
        self.enter(ApiOp::DeleteBoard).await?;
        let mut store = self.store.lock();
        store.boards.shift_remove(&id).ok_or_else(|| not_found("Board"))?;
        let columns: Vec<ColumnId> = store
            .columns
            .values()
            .filter(|c| c.board_id == id)
            .map(|c| c.id)
            .collect();
        for column in columns {
            store.remove_column(column);
        }
        Ok(())
    }

    async fn list_columns(&self, board: BoardId) -> Result<Vec<Column>, ApiError> {
        self.enter(ApiOp::ListColumns).await?;
        let store = self.store.lock();
        if !store.boards.contains_key(&board) {
            return Err(not_found("Board"));
        }
        Ok(store
            .columns
            .values()
            .filter(|c| c.board_id == board)
            .cloned()
            .collect())
    }

    async fn create_columns(
        &self,
        board: BoardId,
        columns: Vec<NewColumn>,
    ) -> Result<Vec<Column>, ApiError> {
        self.enter(ApiOp::CreateColumns).await?;
        for column in &columns {
            require_name(&column.name, "Column name")?;
        }

        let mut store = self.store.lock();
        if !store.boards.contains_key(&board) {
            return Err(not_found("Board"));
        }
        let created = columns
            .iter()
            .map(|c| {
                let id = store.add_column(board, &c.name);
                Column::new(id, board, c.name.clone())
            })
            .collect();
        Ok(created)
    }

    async fn delete_column(&self, id: ColumnId) -> Result<(), ApiError> {
        self.enter(ApiOp::DeleteColumn).await?;
        let mut store = self.store.lock();
        if !store.columns.contains_key(&id) {
            return Err(not_found("Column"));
        }
        if store.tasks.values().any(|t| t.column_id == id) {
            return Err(ApiError::ValidationRejected(
                "Column still has tasks".to_string(),
            ));
        }
        store.remove_column(id);
        Ok(())
    }

    async fn list_tasks(&self, column: ColumnId) -> Result<Vec<Task>, ApiError> {
        self.enter(ApiOp::ListTasks).await?;
        let store = self.store.lock();
        if !store.columns.contains_key(&column) {
            return Err(not_found("Column"));
        }
        Ok(store
            .tasks
            .values()
            .filter(|t| t.column_id == column)
            .map(|t| store.task_view(t))
            .collect())
    }

    async fn create_task(&self, task: NewTask) -> Result<Task, ApiError> {
        self.enter(ApiOp::CreateTask).await?;
        require_name(&task.title, "Title")?;

        let mut store = self.store.lock();
        let column = store
            .columns
            .get(&task.column_id)
            .ok_or_else(|| not_found("Column"))?;
        if column.board_id != task.board_id || column.name != task.status {
            return Err(ApiError::ValidationRejected(format!(
                "Status '{}' does not match the column",
                task.status
            )));
        }

        let id = store.add_task(task.column_id, &task.title, &task.description);
        for subtask in &task.subtasks {
            store.add_subtask(id, &subtask.title, subtask.is_completed);
        }
        let created = store.tasks.get(&id).ok_or_else(|| not_found("Task"))?;
        Ok(store.task_view(created))
    }

    async fn update_task(&self, id: TaskId, update: TaskUpdate) -> Result<Task, ApiError> {
        self.enter(ApiOp::UpdateTask).await?;
        if let Some(title) = &update.title {
            require_name(title, "Title")?;
        }

        let mut store = self.store.lock();
        let current = store.tasks.get(&id).ok_or_else(|| not_found("Task"))?;
        let board = store.board_of(current.column_id);

        let destination = match update.column_id {
            Some(column_id) => {
                let column = store
                    .columns
                    .get(&column_id)
                    .ok_or_else(|| not_found("Column"))?;
                let status_matches = update.status.as_ref().map_or(true, |s| *s == column.name);
                if Some(column.board_id) != board || !status_matches {
                    return Err(ApiError::ValidationRejected(
                        "Status does not match the column".to_string(),
                    ));
                }
                Some((column.id, column.name.clone()))
            }
            None => None,
        };

        let task = store.tasks.get_mut(&id).ok_or_else(|| not_found("Task"))?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some((column_id, status)) = destination {
            task.column_id = column_id;
            task.status = status;
        }
        let task = task.clone();
        Ok(store.task_view(&task))
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        self.enter(ApiOp::DeleteTask).await?;
        let mut store = self.store.lock();
        if !store.tasks.contains_key(&id) {
            return Err(not_found("Task"));
        }
        store.remove_task(id);
        Ok(())
    }

    async fn list_subtasks(&self, task: TaskId) -> Result<Vec<Subtask>, ApiError> {
        self.enter(ApiOp::ListSubtasks).await?;
        let store = self.store.lock();
        if !store.tasks.contains_key(&task) {
            return Err(not_found("Task"));
        }
        Ok(store
            .subtasks
            .values()
            .filter(|s| s.task_id == task)
            .cloned()
            .collect())
    }

    async fn set_subtask_completion(
        &self,
        id: SubtaskId,
        is_completed: bool,
    ) -> Result<Subtask, ApiError> {
        self.enter(ApiOp::SetSubtaskCompletion).await?;
        let mut store = self.store.lock();
        let subtask = store
            .subtasks
            .get_mut(&id)
            .ok_or_else(|| not_found("Subtask"))?;
        subtask.is_completed = is_completed;
        Ok(subtask.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seed_has_design_logo_at_one_of_three() {
        let api = MemoryTaskApi::platform_launch();

        let tasks = api.list_tasks(ColumnId(1)).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Design logo");
        assert_eq!(tasks[0].progress().to_string(), "1 of 3");
        assert_eq!(api.list_boards().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn counters_follow_subtask_writes() {
        let api = MemoryTaskApi::platform_launch();
        api.set_subtask_completion(SubtaskId(2), true).await.unwrap();

        assert_eq!(api.stored_task(TaskId(1)).unwrap().completed_subtasks, 2);
    }

    #[tokio::test]
    async fn injected_faults_are_consumed_in_order() {
        let api = MemoryTaskApi::platform_launch();
        api.fail_next(ApiOp::ListBoards, ApiError::Network("offline".into()));

        api.succeed_next(ApiOp::ListBoards);
        api.fail_next(ApiOp::ListBoards, ApiError::Unauthorized);

        assert!(api.list_boards().await.is_err());
        assert!(api.list_boards().await.is_ok());
        assert_eq!(api.list_boards().await, Err(ApiError::Unauthorized));
        assert!(api.list_boards().await.is_ok());
        assert_eq!(api.calls(ApiOp::ListBoards), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn op_latency_overrides_default() {
        let api = MemoryTaskApi::platform_launch()
            .with_latency(Duration::from_millis(50))
            .with_op_latency(ApiOp::SetSubtaskCompletion, Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        api.list_tasks(ColumnId(1)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(50));

        api.set_subtask_completion(SubtaskId(2), true).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn column_with_tasks_cannot_be_deleted() {
        let api = MemoryTaskApi::platform_launch();

        let err = api.delete_column(ColumnId(1)).await.unwrap_err();
        assert!(matches!(err, ApiError::ValidationRejected(_)));

        api.delete_column(ColumnId(3)).await.unwrap();
        assert_eq!(api.list_columns(BoardId(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_board_cascades() {
        let api = MemoryTaskApi::platform_launch();
        api.delete_board(BoardId(1)).await.unwrap();

        assert!(api.stored_task(TaskId(1)).is_none());
        assert!(api.stored_subtask(SubtaskId(1)).is_none());
        assert!(matches!(
            api.list_tasks(ColumnId(1)).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn move_requires_matching_status() {
        let api = MemoryTaskApi::platform_launch();

        let err = api
            .update_task(TaskId(1), TaskUpdate::move_to(ColumnId(2), "Done"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationRejected(_)));

        let moved = api
            .update_task(TaskId(1), TaskUpdate::move_to(ColumnId(2), "Doing"))
            .await
            .unwrap();
        assert_eq!(moved.status, "Doing");
        assert_eq!(moved.total_subtasks, 3);
    }

    #[tokio::test]
    async fn cross_board_move_is_rejected() {
        let api = MemoryTaskApi::platform_launch();

        let err = api
            .update_task(TaskId(1), TaskUpdate::move_to(ColumnId(4), "Todo"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationRejected(_)));
    }

    #[tokio::test]
    async fn create_task_checks_status() {
        let api = MemoryTaskApi::platform_launch();
        let ok = NewTask::new(BoardId(1), ColumnId(1), "Plan QA", "Todo").with_subtask("Write plan", true);
        let created = api.create_task(ok).await.unwrap();
        assert_eq!(created.progress().to_string(), "1 of 1");

        let bad = NewTask::new(BoardId(1), ColumnId(1), "Plan QA", "Doing");
        assert!(api.create_task(bad).await.is_err());
    }
}
