//! Error types for Kanban Sync
//!
//! Provides error handling for:
//! - Remote API failures (network, validation, not-found, auth)
//! - The uniform mutation failure reported to the user
//! - Read-path and precondition failures
//! - Selection and configuration errors

use crate::selection::ModalKind;
use kanban_model::{BoardId, ScopeKey, SubtaskId};
use std::fmt;
use std::path::PathBuf;

/// Failure returned by the remote task API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request did not complete
    #[error("network failure: {0}")]
    Network(String),

    /// Server refused the payload
    #[error("validation rejected: {0}")]
    ValidationRejected(String),

    /// Target entity vanished
    #[error("not found: {0}")]
    NotFound(String),

    /// Session is no longer authenticated
    #[error("authentication required")]
    Unauthorized,
}

impl ApiError {
    /// Error classification, used for logging
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network(_) => ApiErrorKind::Network,
            Self::ValidationRejected(_) => ApiErrorKind::Validation,
            Self::NotFound(_) => ApiErrorKind::NotFound,
            Self::Unauthorized => ApiErrorKind::Unauthorized,
        }
    }

    /// Whether this failure requires a new login
    #[inline]
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Text shown to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(msg) | Self::ValidationRejected(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Unauthorized => "Your session has expired, please log in again".to_string(),
        }
    }
}

/// Classification of an `ApiError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Network failure
    Network,
    /// Validation rejected
    Validation,
    /// Not found
    NotFound,
    /// Authentication required
    Unauthorized,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
        };
        f.write_str(name)
    }
}

/// The single outcome every failed mutation is converted to
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct MutationFailed {
    /// Operation label, e.g. "delete task"
    pub operation: &'static str,
    /// Message shown in the error notification
    pub message: String,
    /// Underlying classification (logging only)
    pub kind: ApiErrorKind,
}

impl MutationFailed {
    /// Convert an API failure
    #[must_use]
    pub fn from_api(operation: &'static str, error: &ApiError) -> Self {
        Self {
            operation,
            message: error.user_message(),
            kind: error.kind(),
        }
    }
}

/// Read-path and precondition errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Refetch of a scope failed
    #[error("fetch of {scope} failed: {source}")]
    Fetch {
        /// Scope being fetched
        scope: ScopeKey,
        /// Underlying failure
        #[source]
        source: ApiError,
    },

    /// Status does not name a column of the board
    #[error("status '{status}' is not a column of {board}")]
    UnknownStatus {
        /// Requested status
        status: String,
        /// Board searched
        board: BoardId,
    },

    /// Subtask missing from its task's subtask list
    #[error("{0} is not part of the cached subtask list")]
    UnknownSubtask(SubtaskId),

    /// Selection precondition failed
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

impl SyncError {
    /// Underlying API failure, if any
    #[inline]
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Fetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Selection state errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// A task-scoped modal needs a selected task
    #[error("cannot open {0:?} without a selected task")]
    NoTaskSelected(ModalKind),

    /// A board-scoped modal needs a selected board
    #[error("cannot open {0:?} without a selected board")]
    NoBoardSelected(ModalKind),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Malformed TOML
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Value out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_kinds() {
        assert_eq!(ApiError::Network("x".into()).kind(), ApiErrorKind::Network);
        assert_eq!(ApiError::NotFound("x".into()).kind(), ApiErrorKind::NotFound);
        assert!(ApiError::Unauthorized.is_auth());
        assert!(!ApiError::ValidationRejected("x".into()).is_auth());
    }

    #[test]
    fn mutation_failed_carries_user_message() {
        let err = MutationFailed::from_api("toggle subtask", &ApiError::Network("offline".into()));
        assert_eq!(err.message, "offline");
        assert_eq!(err.kind, ApiErrorKind::Network);
        assert_eq!(err.to_string(), "toggle subtask failed: offline");
    }

    #[test]
    fn sync_error_exposes_api_error() {
        let err = SyncError::Fetch {
            scope: ScopeKey::Boards,
            source: ApiError::Unauthorized,
        };
        assert_eq!(err.api_error(), Some(&ApiError::Unauthorized));
        assert!(err.to_string().contains("boards"));
    }
}
