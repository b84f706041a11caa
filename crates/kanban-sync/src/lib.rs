//! Kanban Sync - client-side state synchronization for a task board
//!
//! Keeps a cached view of the board hierarchy correct and responsive while
//! mutations travel to the remote source of truth:
//! - A scoped cache keyed by board/column/task scope with explicit invalidation
//! - An optimistic mutation executor (apply prediction, confirm or revert)
//! - A per-subtask in-flight guard that serializes completion toggles
//! - A transient notification queue with independent expiry timers
//! - Hierarchical selection state (board, task, open modals, route)
//!
//! # Example
//!
//! ```rust,ignore
//! use kanban_sync::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(MemoryTaskApi::platform_launch());
//! let session = Session::new(api, SyncConfig::default());
//!
//! let outcome = session
//!     .toggle_subtask(ColumnId(1), TaskId(1), SubtaskId(2))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod harness;
pub mod notify;
pub mod selection;
pub mod session;

pub use api::TaskApi;
pub use cache::{CacheEvent, CacheStats, RestoreOutcome, ScopedCache, Snapshot};
pub use config::SyncConfig;
pub use error::{ApiError, ApiErrorKind, ConfigError, MutationFailed, SelectionError, SyncError};
pub use executor::{AppliedMutation, MutationExecutor, MutationId, MutationPlan, Outcome};
pub use guard::{Admission, GuardState, InFlightGuard, Settlement};
pub use notify::{Notification, NotificationId, NotificationQueue, NotificationState, Severity};
pub use selection::{ModalKind, Navigator, Route, Selection, SelectionStore};
pub use session::{ColumnSummary, Session, ToggleOutcome};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Kanban Sync
    pub use crate::harness::MemoryTaskApi;
    pub use crate::{
        ApiError, ModalKind, NotificationQueue, Outcome, ScopedCache, SelectionStore, Session,
        Severity, SyncConfig, SyncError, TaskApi, ToggleOutcome,
    };
    pub use kanban_model::{
        Board, BoardId, Column, ColumnId, NewBoard, NewTask, Subtask, SubtaskId, Task, TaskId,
        TaskUpdate,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
