//! Hierarchical selection state
//!
//! Tracks which board and task the user is looking at and which modals are
//! open. Updates go through a `tokio::sync::watch` channel, so they are
//! synchronous and every reader sees them immediately.
//!
//! Selecting a different board drops the selected task and closes every
//! task-scoped modal, so no view keeps rendering a task of the old board.

use crate::error::SelectionError;
use kanban_model::{BoardId, Task, TaskId};
use std::collections::BTreeSet;
use tokio::sync::watch;

/// Modal dialogs the client can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModalKind {
    /// Task details with subtasks and status
    TaskDetail,
    /// Edit task form
    EditTask,
    /// Delete task confirmation
    DeleteTask,
    /// New task form
    AddTask,
    /// New column form
    AddColumn,
    /// New board form
    AddBoard,
    /// Edit board form
    EditBoard,
    /// Delete board confirmation
    DeleteBoard,
}

impl ModalKind {
    /// Whether the modal shows a specific task
    #[inline]
    #[must_use]
    pub fn is_task_scoped(self) -> bool {
        matches!(self, Self::TaskDetail | Self::EditTask | Self::DeleteTask)
    }

    /// Whether the modal acts on the selected board
    #[inline]
    #[must_use]
    pub fn is_board_scoped(self) -> bool {
        matches!(
            self,
            Self::AddTask | Self::AddColumn | Self::EditBoard | Self::DeleteBoard
        )
    }
}

/// Top-level destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// Board view
    #[default]
    Board,
    /// Login page, after an authentication failure
    Login,
}

/// Current selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    /// Selected board
    pub board: Option<BoardId>,
    /// Selected task
    pub task: Option<Task>,
    /// Open modals
    pub open_modals: BTreeSet<ModalKind>,
    /// Current route
    pub route: Route,
}

impl Selection {
    /// Whether a modal is open
    #[inline]
    #[must_use]
    pub fn is_open(&self, kind: ModalKind) -> bool {
        self.open_modals.contains(&kind)
    }

    /// Selected task id
    #[inline]
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(|t| t.id)
    }

    fn drop_task(&mut self) {
        self.task = None;
        self.open_modals.retain(|m| !m.is_task_scoped());
    }
}

/// Receives navigation side effects of failures
pub trait Navigator: Send + Sync {
    /// Send the user to the login page
    fn redirect_to_login(&self);
}

/// Session-wide selection store
#[derive(Debug)]
pub struct SelectionStore {
    state: watch::Sender<Selection>,
}

impl SelectionStore {
    /// Create an empty selection
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(Selection::default());
        Self { state }
    }

    /// Select a board.
    ///
    /// Switching to a different board clears the task and closes task-scoped
    /// modals. Re-selecting the current board changes nothing.
    pub fn select_board(&self, board: BoardId) {
        self.state.send_if_modified(|s| {
            if s.board == Some(board) && s.route == Route::Board {
                return false;
            }
            if s.board != Some(board) {
                s.drop_task();
            }
            s.board = Some(board);
            s.route = Route::Board;
            true
        });
        tracing::debug!(%board, "board selected");
    }

    /// Select a task (replaces the stored copy if already selected)
    pub fn select_task(&self, task: Task) {
        tracing::debug!(task = %task.id, "task selected");
        self.state.send_modify(|s| s.task = Some(task));
    }

    /// Clear the task and close task-scoped modals
    pub fn clear_task(&self) {
        self.state.send_if_modified(|s| {
            let changed = s.task.is_some() || s.open_modals.iter().any(|m| m.is_task_scoped());
            s.drop_task();
            changed
        });
    }

    /// Clear the task if it is `task`
    pub fn forget_task(&self, task: TaskId) {
        if self.snapshot().task_id() == Some(task) {
            self.clear_task();
        }
    }

    /// Clear the board (and its task) if it is `board`
    pub fn forget_board(&self, board: BoardId) {
        self.state.send_if_modified(|s| {
            if s.board != Some(board) {
                return false;
            }
            s.board = None;
            s.drop_task();
            s.open_modals.retain(|m| !m.is_board_scoped());
            true
        });
    }

    /// Open a modal.
    ///
    /// # Errors
    /// Task-scoped modals need a selected task; board-scoped modals need a
    /// selected board.
    pub fn open_modal(&self, kind: ModalKind) -> Result<(), SelectionError> {
        let current = self.state.borrow();
        if kind.is_task_scoped() && current.task.is_none() {
            return Err(SelectionError::NoTaskSelected(kind));
        }
        if kind.is_board_scoped() && current.board.is_none() {
            return Err(SelectionError::NoBoardSelected(kind));
        }
        drop(current);

        self.state.send_if_modified(|s| s.open_modals.insert(kind));
        Ok(())
    }

    /// Close a modal; returns whether it was open
    pub fn close_modal(&self, kind: ModalKind) -> bool {
        self.state.send_if_modified(|s| s.open_modals.remove(&kind))
    }

    /// Whether a modal is open
    #[must_use]
    pub fn is_open(&self, kind: ModalKind) -> bool {
        self.state.borrow().is_open(kind)
    }

    /// Selected board
    #[must_use]
    pub fn board(&self) -> Option<BoardId> {
        self.state.borrow().board
    }

    /// Selected task
    #[must_use]
    pub fn task(&self) -> Option<Task> {
        self.state.borrow().task.clone()
    }

    /// Current route
    #[must_use]
    pub fn route(&self) -> Route {
        self.state.borrow().route
    }

    /// Copy of the whole selection
    #[must_use]
    pub fn snapshot(&self) -> Selection {
        self.state.borrow().clone()
    }

    /// Watch selection changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.state.subscribe()
    }

    /// Back to an empty selection
    pub fn reset(&self) {
        self.state.send_replace(Selection::default());
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for SelectionStore {
    fn redirect_to_login(&self) {
        tracing::warn!("authentication lost, redirecting to login");
        self.state.send_modify(|s| {
            s.drop_task();
            s.open_modals.clear();
            s.route = Route::Login;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanban_model::ColumnId;

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

    #[test]
    fn switching_board_clears_task_and_task_modals() {
        let store = SelectionStore::new();
        store.select_board(BoardId(1));
        store.select_task(design_logo());
        store.open_modal(ModalKind::TaskDetail).unwrap();
        store.open_modal(ModalKind::AddColumn).unwrap();

        store.select_board(BoardId(2));

        let s = store.snapshot();
        assert_eq!(s.board, Some(BoardId(2)));
        assert!(s.task.is_none());
        assert!(!s.is_open(ModalKind::TaskDetail));
        assert!(s.is_open(ModalKind::AddColumn));
    }

    #[test]
    fn reselecting_same_board_keeps_task() {
        let store = SelectionStore::new();
        store.select_board(BoardId(1));
        store.select_task(design_logo());
        store.open_modal(ModalKind::TaskDetail).unwrap();

        store.select_board(BoardId(1));

        assert_eq!(store.task().map(|t| t.id), Some(TaskId(1)));
        assert!(store.is_open(ModalKind::TaskDetail));
    }

    #[test]
    fn task_modal_requires_task() {
        let store = SelectionStore::new();
        let err = store.open_modal(ModalKind::EditTask).unwrap_err();
        assert_eq!(err, SelectionError::NoTaskSelected(ModalKind::EditTask));
    }

    #[test]
    fn board_modal_requires_board() {
        let store = SelectionStore::new();
        let err = store.open_modal(ModalKind::AddColumn).unwrap_err();
        assert_eq!(err, SelectionError::NoBoardSelected(ModalKind::AddColumn));
        assert!(store.open_modal(ModalKind::AddBoard).is_ok());
    }

    #[test]
    fn close_modal_reports_change() {
        let store = SelectionStore::new();
        store.open_modal(ModalKind::AddBoard).unwrap();
        assert!(store.close_modal(ModalKind::AddBoard));
        assert!(!store.close_modal(ModalKind::AddBoard));
    }

    #[test]
    fn watchers_see_changes_immediately() {
        let store = SelectionStore::new();
        let mut rx = store.subscribe();

        store.select_board(BoardId(3));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().board, Some(BoardId(3)));
    }

    #[test]
    fn forget_task_only_clears_matching_task() {
        let store = SelectionStore::new();
        store.select_task(design_logo());

        store.forget_task(TaskId(99));
        assert!(store.task().is_some());

        store.forget_task(TaskId(1));
        assert!(store.task().is_none());
    }

    #[test]
    fn forget_board_clears_board_and_task() {
        let store = SelectionStore::new();
        store.select_board(BoardId(1));
        store.select_task(design_logo());
        store.open_modal(ModalKind::DeleteBoard).unwrap();

        store.forget_board(BoardId(1));

        let s = store.snapshot();
        assert_eq!(s.board, None);
        assert!(s.task.is_none());
        assert!(s.open_modals.is_empty());
    }

    #[test]
    fn redirect_to_login_closes_everything() {
        let store = SelectionStore::new();
        store.select_board(BoardId(1));
        store.select_task(design_logo());
        store.open_modal(ModalKind::TaskDetail).unwrap();

        store.redirect_to_login();

        let s = store.snapshot();
        assert_eq!(s.route, Route::Login);
        assert!(s.open_modals.is_empty());
        assert!(s.task.is_none());

        store.select_board(BoardId(1));
        assert_eq!(store.route(), Route::Board);
    }
}
