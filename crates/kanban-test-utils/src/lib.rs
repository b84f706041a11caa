//! Testing utilities for the Kanban Sync workspace
//!
//! Shared fixtures built on the seeded "Platform Launch" board.

#![allow(missing_docs)]

use kanban_model::{BoardId, ColumnId, SubtaskId, Task, TaskId};
use kanban_sync::harness::{ApiOp, MemoryTaskApi};
use kanban_sync::{Session, SyncConfig};
use std::sync::Arc;
use std::time::Duration;

pub const PLATFORM_LAUNCH: BoardId = BoardId(1);
pub const MARKETING_PLAN: BoardId = BoardId(2);

pub const TODO: ColumnId = ColumnId(1);
pub const DOING: ColumnId = ColumnId(2);
pub const DONE: ColumnId = ColumnId(3);

pub const DESIGN_LOGO: TaskId = TaskId(1);
pub const WRITE_LAUNCH_POST: TaskId = TaskId(2);

pub const SKETCH_CONCEPTS: SubtaskId = SubtaskId(1);
pub const PICK_PALETTE: SubtaskId = SubtaskId(2);
pub const EXPORT_ASSETS: SubtaskId = SubtaskId(3);

/// Latency used by fixtures that need a call to stay in flight
pub const LATENCY: Duration = Duration::from_millis(50);

/// Subtask write latency of `slow_toggle_api`, long enough for reads and
/// other writes to land while a toggle is pending
pub const SLOW_TOGGLE: Duration = Duration::from_millis(200);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn platform_launch_api() -> Arc<MemoryTaskApi> {
    Arc::new(MemoryTaskApi::platform_launch().with_latency(LATENCY))
}

pub fn slow_toggle_api() -> Arc<MemoryTaskApi> {
    Arc::new(
        MemoryTaskApi::platform_launch()
            .with_latency(LATENCY)
            .with_op_latency(ApiOp::SetSubtaskCompletion, SLOW_TOGGLE),
    )
}

pub fn test_config() -> SyncConfig {
    SyncConfig::default()
}

pub fn session_with(api: Arc<MemoryTaskApi>) -> Session {
    Session::new(api, test_config())
}

pub fn setup_session() -> (Session, Arc<MemoryTaskApi>) {
    init_tracing();
    let api = platform_launch_api();
    (session_with(api.clone()), api)
}

/// Session with Design logo selected and its task list and subtasks cached
pub async fn session_with_design_logo_open() -> (Session, Arc<MemoryTaskApi>) {
    design_logo_open_on(platform_launch_api()).await
}

/// As `session_with_design_logo_open`, against a caller-built server
pub async fn design_logo_open_on(api: Arc<MemoryTaskApi>) -> (Session, Arc<MemoryTaskApi>) {
    init_tracing();
    let session = session_with(api.clone());
    session.selection().select_board(PLATFORM_LAUNCH);
    let task = design_logo(&session).await;
    session.selection().select_task(task);
    session
        .selection()
        .open_modal(kanban_sync::ModalKind::TaskDetail)
        .unwrap();
    session.subtasks(DESIGN_LOGO).await.unwrap();
    (session, api)
}

pub async fn design_logo(session: &Session) -> Task {
    session.task(TODO, DESIGN_LOGO).await.unwrap().unwrap()
}

/// "completed of total" of Design logo as the card shows it
pub async fn design_logo_progress(session: &Session) -> String {
    session
        .task_progress(TODO, DESIGN_LOGO)
        .await
        .unwrap()
        .unwrap()
        .to_string()
}
