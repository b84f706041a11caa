//! Server-assigned identifiers
//!
//! Every entity id is an integer issued by the remote API. The newtypes keep
//! a `TaskId` from being passed where a `ColumnId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw numeric value
            #[inline]
            #[must_use]
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Board identifier
    BoardId,
    "board"
);
entity_id!(
    /// Column identifier
    ColumnId,
    "column"
);
entity_id!(
    /// Task identifier
    TaskId,
    "task"
);
entity_id!(
    /// Subtask identifier
    SubtaskId,
    "subtask"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(BoardId(1).to_string(), "board-1");
        assert_eq!(SubtaskId(42).to_string(), "subtask-42");
    }

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&TaskId(7)).unwrap();
        assert_eq!(json, "7");

        let back: TaskId = serde_json::from_str("7").unwrap();
        assert_eq!(back, TaskId(7));
    }
}
