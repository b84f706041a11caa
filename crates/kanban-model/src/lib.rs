//! Kanban Model
//!
//! Plain data types shared by the sync layer and its collaborators:
//! - Server-assigned identifiers (`BoardId`, `ColumnId`, `TaskId`, `SubtaskId`)
//! - Entities (`Board`, `Column`, `Task`, `Subtask`)
//! - Write payloads sent to the remote API
//! - Cache scopes (`ScopeKey` and the typed `Scope` trait)
//!
//! # Hierarchy
//!
//! ```text
//! Board ──< Column ──< Task ──< Subtask
//!   ↑          ↑         ↑
//!   board_id   column_id task_id   (back-references, never ownership)
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod entity;
pub mod ids;
pub mod payload;
pub mod scope;

pub use entity::{Board, Column, CounterAdjustment, Subtask, SubtaskProgress, Task};
pub use ids::{BoardId, ColumnId, SubtaskId, TaskId};
pub use payload::{BoardUpdate, NewBoard, NewColumn, NewSubtask, NewTask, TaskUpdate};
pub use scope::{AllBoards, ColumnsOf, Scope, ScopeKey, ScopeKind, SubtasksOf, TasksOf};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
