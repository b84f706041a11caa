//! Session context
//!
//! A `Session` owns the cache, the notification queue, the selection store
//! and the executor for one signed-in user. Views read through it and every
//! user action becomes one of its mutation methods. There are no globals:
//! tear-down is `shutdown`.

use crate::api::TaskApi;
use crate::cache::ScopedCache;
use crate::config::SyncConfig;
use crate::error::{ApiError, MutationFailed, SyncError};
use crate::executor::{MutationExecutor, MutationPlan, Outcome};
use crate::guard::{Admission, InFlightGuard, Settlement};
use crate::notify::NotificationQueue;
use crate::selection::{Navigator, SelectionStore};
use kanban_model::{
    AllBoards, Board, BoardId, BoardUpdate, Column, ColumnId, ColumnsOf, CounterAdjustment,
    NewBoard, NewColumn, NewTask, Scope, ScopeKey, Subtask, SubtaskId, SubtaskProgress, SubtasksOf,
    Task, TaskId, TaskUpdate, TasksOf,
};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A column with the number of tasks it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSummary {
    /// Column
    pub column: Column,
    /// Tasks currently in the column
    pub task_count: usize,
}

/// Result of a subtask toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Server confirmed the final completion state
    Confirmed(Subtask),
    /// Folded into the toggle already in flight for this subtask
    Coalesced {
        /// Completion state now requested
        target: bool,
    },
    /// Write failed and the prediction was reverted
    Failed(MutationFailed),
}

impl ToggleOutcome {
    /// Whether the toggle failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Failure, if any
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&MutationFailed> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<Outcome<Subtask>> for ToggleOutcome {
    fn from(outcome: Outcome<Subtask>) -> Self {
        match outcome {
            Outcome::Confirmed(subtask) => Self::Confirmed(subtask),
            Outcome::Failed(failure) => Self::Failed(failure),
        }
    }
}

/// One user's synchronized view of the task board
pub struct Session {
    api: Arc<dyn TaskApi>,
    cache: Arc<ScopedCache>,
    notifications: Arc<NotificationQueue>,
    selection: Arc<SelectionStore>,
    executor: MutationExecutor,
    toggles: InFlightGuard<SubtaskId, bool>,
    config: SyncConfig,
}

impl Session {
    /// Create a session talking to `api`
    #[must_use]
    pub fn new(api: Arc<dyn TaskApi>, config: SyncConfig) -> Self {
        let cache = Arc::new(ScopedCache::new(config.event_capacity));
        let notifications = Arc::new(NotificationQueue::new(config.notification_ttl()));
        let selection = Arc::new(SelectionStore::new());
        let navigator: Arc<dyn Navigator> = selection.clone();
        let executor = MutationExecutor::new(cache.clone(), notifications.clone(), navigator)
            .with_success_notifications(config.success_notifications);

        tracing::info!(
            ttl_ms = config.notification_ttl_ms,
            event_capacity = config.event_capacity,
            "session started"
        );

        Self {
            api,
            cache,
            notifications,
            selection,
            executor,
            toggles: InFlightGuard::new(),
            config,
        }
    }

    /// Drop every cached scope, dismiss notifications and reset selection
    pub fn shutdown(&self) {
        self.notifications.clear();
        self.cache.clear();
        self.selection.reset();
        tracing::info!("session shut down");
    }

    // ---- reads ----

    /// All boards
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn boards(&self) -> Result<Vec<Board>, SyncError> {
        self.load(AllBoards, || self.api.list_boards()).await
    }

    /// Number of boards, for the board list header
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn board_count(&self) -> Result<usize, SyncError> {
        Ok(self.boards().await?.len())
    }

    /// Columns of a board
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn columns(&self, board: BoardId) -> Result<Vec<Column>, SyncError> {
        self.load(ColumnsOf(board), || self.api.list_columns(board))
            .await
    }

    /// Tasks of a column
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn tasks(&self, column: ColumnId) -> Result<Vec<Task>, SyncError> {
        self.load(TasksOf(column), || self.api.list_tasks(column)).await
    }

    /// Subtasks of a task
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn subtasks(&self, task: TaskId) -> Result<Vec<Subtask>, SyncError> {
        self.load(SubtasksOf(task), || self.api.list_subtasks(task))
            .await
    }

    /// One task of a column
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn task(&self, column: ColumnId, task: TaskId) -> Result<Option<Task>, SyncError> {
        Ok(self
            .tasks(column)
            .await?
            .into_iter()
            .find(|t| t.id == task))
    }

    /// Subtask progress of a task as shown on its card
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn task_progress(
        &self,
        column: ColumnId,
        task: TaskId,
    ) -> Result<Option<SubtaskProgress>, SyncError> {
        Ok(self.task(column, task).await?.map(|t| t.progress()))
    }

    /// Status choices for a task of `board`: its column names in order
    ///
    /// # Errors
    /// `SyncError::Fetch` when the refetch fails.
    pub async fn status_options(&self, board: BoardId) -> Result<Vec<String>, SyncError> {
        Ok(self
            .columns(board)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Every column of a board with its task count
    ///
    /// # Errors
    /// `SyncError::Fetch` when any refetch fails.
    pub async fn column_summary(&self, board: BoardId) -> Result<Vec<ColumnSummary>, SyncError> {
        let columns = self.columns(board).await?;
        let task_lists =
            futures::future::try_join_all(columns.iter().map(|c| self.tasks(c.id))).await?;

        Ok(columns
            .into_iter()
            .zip(task_lists)
            .map(|(column, tasks)| ColumnSummary {
                column,
                task_count: tasks.len(),
            })
            .collect())
    }

    // ---- subtask toggles ----

    /// Flip a subtask's completion flag.
    ///
    /// The flag and the task's completed counter change in the cache before
    /// the call goes out. While a call for the same subtask is in flight,
    /// further toggles update the cache and become the new target; the
    /// running toggle sends at most one follow-up write to reach it.
    ///
    /// # Errors
    /// `SyncError::Fetch` if the subtask list cannot be loaded, or
    /// `SyncError::UnknownSubtask` if the subtask is not in it. Remote write
    /// failures are reported as `ToggleOutcome::Failed`.
    pub async fn toggle_subtask(
        &self,
        column: ColumnId,
        task: TaskId,
        subtask: SubtaskId,
    ) -> Result<ToggleOutcome, SyncError> {
        let subtasks = self.subtasks(task).await?;
        let current = subtasks
            .iter()
            .find(|s| s.id == subtask)
            .ok_or(SyncError::UnknownSubtask(subtask))?;
        let desired = !current.is_completed;
        let plan = toggle_plan(column, task, subtask, desired);

        if self.toggles.begin(subtask, desired) == Admission::Coalesced {
            self.executor.apply_untracked(plan);
            return Ok(ToggleOutcome::Coalesced { target: desired });
        }

        let applied = self.executor.apply(plan);
        let mut sending = desired;
        let mut confirmed_once = false;

        loop {
            match self.api.set_subtask_completion(subtask, sending).await {
                Ok(server) => match self.toggles.settle(subtask, server.is_completed) {
                    Settlement::FollowUp(next) => {
                        tracing::debug!(%subtask, target = next, "sending follow-up toggle");
                        confirmed_once = true;
                        sending = next;
                    }
                    Settlement::Done => {
                        return Ok(self.executor.settle(applied, Ok(server)).into());
                    }
                },
                Err(error) => {
                    self.toggles.abandon(subtask);
                    let outcome = self.executor.settle(applied, Err::<Subtask, ApiError>(error));
                    if confirmed_once {
                        // An earlier write of this toggle landed; the snapshot predates it.
                        self.cache.invalidate(&ScopeKey::Subtasks(task));
                        self.cache.invalidate(&ScopeKey::Tasks(column));
                    }
                    return Ok(outcome.into());
                }
            }
        }
    }

    /// Whether a toggle for `subtask` is in flight
    #[must_use]
    pub fn toggle_pending(&self, subtask: SubtaskId) -> bool {
        self.toggles.is_pending(subtask)
    }

    // ---- boards ----

    /// Create a board and select it
    pub async fn create_board(&self, board: NewBoard) -> Outcome<Board> {
        let plan = MutationPlan::new("create board")
            .invalidate(ScopeKey::Boards)
            .notify_success("Board created");
        let outcome = self
            .executor
            .execute(plan, self.api.create_board(board))
            .await;

        if let Outcome::Confirmed(board) = &outcome {
            self.selection.select_board(board.id);
        }
        outcome
    }

    /// Rename a board and/or append columns
    pub async fn update_board(&self, board: BoardId, update: BoardUpdate) -> Outcome<Board> {
        let plan = MutationPlan::new("edit board")
            .invalidate(ScopeKey::Boards)
            .invalidate(ScopeKey::Columns(board))
            .notify_success("Board updated");
        self.executor
            .execute(plan, self.api.update_board(board, update))
            .await
    }

    /// Delete a board with its columns and tasks
    pub async fn delete_board(&self, board: BoardId) -> Outcome<()> {
        let mut plan = MutationPlan::new("delete board")
            .invalidate(ScopeKey::Boards)
            .invalidate(ScopeKey::Columns(board))
            .notify_success("Board deleted");
        for key in self.cached_descendants(board) {
            plan = plan.invalidate(key);
        }

        let outcome = self.executor.execute(plan, self.api.delete_board(board)).await;
        if outcome.is_confirmed() {
            self.selection.forget_board(board);
        }
        outcome
    }

    // ---- columns ----

    /// Append named columns to a board
    pub async fn add_columns(&self, board: BoardId, names: Vec<String>) -> Outcome<Vec<Column>> {
        if names.is_empty() {
            return Outcome::Confirmed(Vec::new());
        }
        let columns: Vec<NewColumn> = names.into_iter().map(NewColumn::new).collect();
        let plan = MutationPlan::new("add columns")
            .invalidate(ScopeKey::Columns(board))
            .notify_success("Columns added");
        self.executor
            .execute(plan, self.api.create_columns(board, columns))
            .await
    }

    /// Delete a column
    pub async fn delete_column(&self, board: BoardId, column: ColumnId) -> Outcome<()> {
        let plan = MutationPlan::new("delete column")
            .invalidate(ScopeKey::Columns(board))
            .invalidate(ScopeKey::Tasks(column))
            .notify_success("Column deleted");
        self.executor
            .execute(plan, self.api.delete_column(column))
            .await
    }

    // ---- tasks ----

    /// Create a task with its subtasks
    pub async fn create_task(&self, task: NewTask) -> Outcome<Task> {
        let plan = MutationPlan::new("create task")
            .invalidate(ScopeKey::Tasks(task.column_id))
            .notify_success("Task created");
        self.executor.execute(plan, self.api.create_task(task)).await
    }

    /// Edit a task; moving it invalidates both column task lists
    pub async fn edit_task(&self, task: &Task, update: TaskUpdate) -> Outcome<Task> {
        let mut plan = MutationPlan::new("edit task")
            .invalidate(ScopeKey::Tasks(task.column_id))
            .notify_success("Task updated");
        if let Some(destination) = update.column_id {
            plan = plan.invalidate(ScopeKey::Tasks(destination));
        }

        let outcome = self
            .executor
            .execute(plan, self.api.update_task(task.id, update))
            .await;
        if let Outcome::Confirmed(updated) = &outcome {
            if self.selection.snapshot().task_id() == Some(updated.id) {
                self.selection.select_task(updated.clone());
            }
        }
        outcome
    }

    /// Move a task to the column named `status`.
    ///
    /// # Errors
    /// `SyncError::UnknownStatus` if no column of `board` carries that
    /// name, or `SyncError::Fetch` if the columns cannot be loaded.
    pub async fn change_status(
        &self,
        board: BoardId,
        task: &Task,
        status: &str,
    ) -> Result<Outcome<Task>, SyncError> {
        let columns = self.columns(board).await?;
        let Some(target) = columns.iter().find(|c| c.name == status) else {
            return Err(SyncError::UnknownStatus {
                status: status.to_string(),
                board,
            });
        };

        if target.id == task.column_id {
            tracing::debug!(task = %task.id, status, "status unchanged");
            return Ok(Outcome::Confirmed(task.clone()));
        }
        Ok(self
            .edit_task(task, TaskUpdate::move_to(target.id, status))
            .await)
    }

    /// Delete a task and its subtasks
    pub async fn delete_task(&self, column: ColumnId, task: TaskId) -> Outcome<()> {
        let plan = MutationPlan::new("delete task")
            .invalidate(ScopeKey::Tasks(column))
            .invalidate(ScopeKey::Subtasks(task))
            .notify_success("Task deleted");

        let outcome = self.executor.execute(plan, self.api.delete_task(task)).await;
        if outcome.is_confirmed() {
            self.selection.forget_task(task);
        }
        outcome
    }

    // ---- accessors ----

    /// Shared cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ScopedCache> {
        &self.cache
    }

    /// Notification queue
    #[inline]
    #[must_use]
    pub fn notifications(&self) -> &Arc<NotificationQueue> {
        &self.notifications
    }

    /// Selection store
    #[inline]
    #[must_use]
    pub fn selection(&self) -> &Arc<SelectionStore> {
        &self.selection
    }

    /// Mutation executor
    #[inline]
    #[must_use]
    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn load<S, F, Fut>(&self, scope: S, fetch: F) -> Result<S::Value, SyncError>
    where
        S: Scope,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<S::Value, ApiError>>,
    {
        match self.cache.read_through(&scope, fetch).await {
            Ok(value) => Ok(value),
            Err(source) => {
                let key = scope.key();
                tracing::warn!(scope = %key, kind = %source.kind(), "refetch failed");
                self.executor.report_failure("load", &source);
                Err(SyncError::Fetch { scope: key, source })
            }
        }
    }

    /// Task and subtask scopes cached under a board
    fn cached_descendants(&self, board: BoardId) -> Vec<ScopeKey> {
        let mut keys = Vec::new();
        for column in self.cache.read(&ColumnsOf(board)).unwrap_or_default() {
            keys.push(ScopeKey::Tasks(column.id));
            for task in self.cache.read(&TasksOf(column.id)).unwrap_or_default() {
                keys.push(ScopeKey::Subtasks(task.id));
            }
        }
        keys
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cache", &self.cache.stats())
            .field("notifications", &self.notifications.len())
            .field("selection", &self.selection.snapshot())
            .field("pending_toggles", &self.toggles.pending_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Predicted flag flip plus counter step.
///
/// Confirmation recomputes the counter from the cached subtask list. A failure
/// that finds a sibling toggle's patch on top of this one undoes only this
/// subtask's flag and its counter step.
fn toggle_plan(
    column: ColumnId,
    task: TaskId,
    subtask: SubtaskId,
    desired: bool,
) -> MutationPlan<Subtask> {
    let initial = !desired;
    let flipped = Arc::new(AtomicBool::new(false));
    let flag_flipped = flipped.clone();

    MutationPlan::new("toggle subtask")
        .patch(SubtasksOf(task), move |subtasks: &mut Vec<Subtask>| {
            if let Some(s) = subtasks.iter_mut().find(|s| s.id == subtask) {
                if s.is_completed != desired {
                    s.is_completed = desired;
                    flag_flipped.store(true, Ordering::Relaxed);
                }
            }
        })
        .patch(TasksOf(column), move |tasks: &mut Vec<Task>| {
            if !flipped.load(Ordering::Relaxed) {
                return;
            }
            if let Some(t) = tasks.iter_mut().find(|t| t.id == task) {
                step_counter(t, desired);
            }
        })
        .reconcile(move |cache: &ScopedCache, confirmed: &Subtask| {
            let progress = cache.patch(&SubtasksOf(confirmed.task_id), |subtasks: &mut Vec<Subtask>| {
                if let Some(s) = subtasks.iter_mut().find(|s| s.id == confirmed.id) {
                    *s = confirmed.clone();
                }
                SubtaskProgress::from_subtasks(subtasks.as_slice())
            });

            match progress {
                Some(progress) => {
                    cache.patch(&TasksOf(column), |tasks: &mut Vec<Task>| {
                        if let Some(t) = tasks.iter_mut().find(|t| t.id == confirmed.task_id) {
                            t.completed_subtasks = progress.completed;
                            t.total_subtasks = progress.total;
                        }
                    });
                }
                None => {
                    cache.invalidate(&ScopeKey::Tasks(column));
                }
            }
        })
        .compensate(move |cache: &ScopedCache, contested: &[ScopeKey]| {
            if contested.contains(&ScopeKey::Tasks(column)) {
                let shown = cache.read(&SubtasksOf(task)).and_then(|subtasks| {
                    subtasks.iter().find(|s| s.id == subtask).map(|s| s.is_completed)
                });
                match shown {
                    Some(flag) if flag != initial => {
                        cache.patch(&TasksOf(column), |tasks: &mut Vec<Task>| {
                            if let Some(t) = tasks.iter_mut().find(|t| t.id == task) {
                                step_counter(t, initial);
                            }
                        });
                    }
                    Some(_) => {}
                    None => {
                        cache.invalidate(&ScopeKey::Tasks(column));
                    }
                }
            }
            if contested.contains(&ScopeKey::Subtasks(task)) {
                cache.patch(&SubtasksOf(task), |subtasks: &mut Vec<Subtask>| {
                    if let Some(s) = subtasks.iter_mut().find(|s| s.id == subtask) {
                        s.is_completed = initial;
                    }
                });
            }
        })
}

fn step_counter(task: &mut Task, became_completed: bool) {
    if task.adjust_completed(became_completed) == CounterAdjustment::Clamped {
        tracing::warn!(
            task = %task.id,
            completed = task.completed_subtasks,
            total = task.total_subtasks,
            "completed counter clamped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTaskApi;
    use crate::notify::Severity;
    use crate::selection::{ModalKind, Route};

    fn design_logo() -> Task {
        Task {
            id: TaskId(1),
            title: "Design logo".to_string(),
            description: String::new(),
            status: "Todo".to_string(),
            column_id: ColumnId(1),
            total_subtasks: 3,
            completed_subtasks: 1,
        }
    }

    fn subtasks() -> Vec<Subtask> {
        vec![
            Subtask::new(SubtaskId(1), TaskId(1), "Sketch concepts", true),
            Subtask::new(SubtaskId(2), TaskId(1), "Pick palette", false),
            Subtask::new(SubtaskId(3), TaskId(1), "Export assets", false),
        ]
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new(ColumnId(1), BoardId(1), "Todo"),
            Column::new(ColumnId(2), BoardId(1), "Doing"),
            Column::new(ColumnId(3), BoardId(1), "Done"),
        ]
    }

    fn session(api: MockTaskApi) -> Session {
        let session = Session::new(Arc::new(api), SyncConfig::default());
        session.cache().write(&TasksOf(ColumnId(1)), vec![design_logo()]);
        session.cache().write(&SubtasksOf(TaskId(1)), subtasks());
        session.cache().write(&ColumnsOf(BoardId(1)), columns());
        session
    }

    fn completed(session: &Session) -> u32 {
        session.cache().read(&TasksOf(ColumnId(1))).unwrap()[0].completed_subtasks
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_confirms_and_keeps_prediction() {
        let mut api = MockTaskApi::new();
        api.expect_set_subtask_completion()
            .withf(|id, done| *id == SubtaskId(2) && *done)
            .times(1)
            .returning(|id, done| Ok(Subtask::new(id, TaskId(1), "Pick palette", done)));
        let session = session(api);

        let outcome = session
            .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(2))
            .await
            .unwrap();

        assert!(matches!(outcome, ToggleOutcome::Confirmed(ref s) if s.is_completed));
        assert_eq!(completed(&session), 2);
        assert!(!session.toggle_pending(SubtaskId(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_failure_reverts_counter_and_flag() {
        let mut api = MockTaskApi::new();
        api.expect_set_subtask_completion()
            .returning(|_, _| Err(ApiError::Network("Network Error".into())));
        let session = session(api);

        let outcome = session
            .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(2))
            .await
            .unwrap();

        assert!(outcome.is_failed());
        assert_eq!(completed(&session), 1);
        let flags = session.cache().read(&SubtasksOf(TaskId(1))).unwrap();
        assert!(!flags[1].is_completed);
        assert_eq!(session.notifications().visible()[0].severity, Severity::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_recounts_from_subtask_list() {
        let mut api = MockTaskApi::new();
        api.expect_set_subtask_completion()
            .returning(|id, done| Ok(Subtask::new(id, TaskId(1), "Pick palette", done)));
        let session = session(api);
        // Task list refetched after the server already counted this toggle.
        let mut refetched = design_logo();
        refetched.completed_subtasks = 2;
        session.cache().write(&TasksOf(ColumnId(1)), vec![refetched]);

        let outcome = session
            .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(2))
            .await
            .unwrap();

        assert!(matches!(outcome, ToggleOutcome::Confirmed(_)));
        assert_eq!(completed(&session), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_of_unknown_subtask_is_rejected() {
        let session = session(MockTaskApi::new());

        let err = session
            .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(42))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::UnknownSubtask(SubtaskId(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn server_disagreement_is_reconciled() {
        let mut api = MockTaskApi::new();
        // Server keeps the subtask open.
        api.expect_set_subtask_completion()
            .returning(|id, _| Ok(Subtask::new(id, TaskId(1), "Pick palette", false)));
        let session = session(api);

        session
            .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(2))
            .await
            .unwrap();

        assert_eq!(completed(&session), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn change_status_rejects_unknown_column() {
        let session = session(MockTaskApi::new());

        let err = session
            .change_status(BoardId(1), &design_logo(), "Archived")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::UnknownStatus { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn change_status_to_current_column_is_noop() {
        let session = session(MockTaskApi::new());

        let outcome = session
            .change_status(BoardId(1), &design_logo(), "Todo")
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Confirmed(design_logo()));
    }

    #[tokio::test(start_paused = true)]
    async fn change_status_invalidates_both_columns() {
        let mut api = MockTaskApi::new();
        api.expect_update_task()
            .withf(|id, update| *id == TaskId(1) && update.column_id == Some(ColumnId(2)))
            .returning(|_, _| {
                let mut moved = design_logo();
                moved.status = "Doing".to_string();
                moved.column_id = ColumnId(2);
                Ok(moved)
            });
        let session = session(api);
        session.cache().write(&TasksOf(ColumnId(2)), Vec::new());
        session.selection().select_task(design_logo());

        let outcome = session
            .change_status(BoardId(1), &design_logo(), "Doing")
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert!(!session.cache().is_fresh(&ScopeKey::Tasks(ColumnId(1))));
        assert!(!session.cache().is_fresh(&ScopeKey::Tasks(ColumnId(2))));
        assert_eq!(session.selection().task().unwrap().status, "Doing");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_task_clears_selection() {
        let mut api = MockTaskApi::new();
        api.expect_delete_task().times(1).returning(|_| Ok(()));
        let session = session(api);
        session.selection().select_board(BoardId(1));
        session.selection().select_task(design_logo());
        session.selection().open_modal(ModalKind::DeleteTask).unwrap();

        let outcome = session.delete_task(ColumnId(1), TaskId(1)).await;

        assert!(outcome.is_confirmed());
        assert!(session.selection().task().is_none());
        assert!(!session.selection().is_open(ModalKind::DeleteTask));
        assert!(!session.cache().is_fresh(&ScopeKey::Tasks(ColumnId(1))));
        assert!(!session.cache().is_fresh(&ScopeKey::Subtasks(TaskId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_read_redirects_to_login() {
        let mut api = MockTaskApi::new();
        api.expect_list_boards().returning(|| Err(ApiError::Unauthorized));
        let session = session(api);

        let err = session.boards().await.unwrap_err();

        assert_eq!(err.api_error(), Some(&ApiError::Unauthorized));
        assert_eq!(session.selection().route(), Route::Login);
        assert_eq!(session.notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_board_invalidates_cached_descendants() {
        let mut api = MockTaskApi::new();
        api.expect_delete_board().returning(|_| Ok(()));
        let session = session(api);
        session.selection().select_board(BoardId(1));

        let outcome = session.delete_board(BoardId(1)).await;

        assert!(outcome.is_confirmed());
        for key in [
            ScopeKey::Columns(BoardId(1)),
            ScopeKey::Tasks(ColumnId(1)),
            ScopeKey::Subtasks(TaskId(1)),
        ] {
            assert!(!session.cache().is_fresh(&key), "{key} still fresh");
        }
        assert_eq!(session.selection().board(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn add_columns_with_no_names_skips_the_call() {
        let session = session(MockTaskApi::new());

        let outcome = session.add_columns(BoardId(1), Vec::new()).await;

        assert_eq!(outcome, Outcome::Confirmed(Vec::new()));
        assert!(session.cache().is_fresh(&ScopeKey::Columns(BoardId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_clears_everything() {
        let session = session(MockTaskApi::new());
        session.selection().select_board(BoardId(1));
        session.notifications().warning("pending");

        session.shutdown();

        assert_eq!(session.cache().stats().entry_count, 0);
        assert!(session.notifications().is_empty());
        assert_eq!(session.selection().board(), None);
    }
}
