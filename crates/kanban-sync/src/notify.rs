//! Transient notification queue
//!
//! Mutation outcomes are reported as short-lived messages. Each notification
//! runs its own expiry timer; a new push never resets the others, and
//! dismissing one never touches another's timer.
//!
//! ```text
//! push ──► Visible ──(timer armed)──► Expiring ──(elapsed | dismiss)──► Dismissed
//! ```

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Unique, monotonically increasing notification identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification-{}", self.0)
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Confirmed mutation
    Success,
    /// Something needs attention
    Warning,
    /// Failed mutation or read
    Error,
}

impl Severity {
    /// Heading shown above the message
    #[inline]
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Success => "Success!",
            Self::Warning => "Warning!",
            Self::Error => "Error!",
        }
    }
}

/// Lifecycle state of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
    /// Pushed, timer not yet armed
    Visible,
    /// Expiry timer running
    Expiring,
    /// Removed from the queue
    Dismissed,
}

/// One transient message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Identifier
    pub id: NotificationId,
    /// Severity
    pub severity: Severity,
    /// Human-readable text
    pub message: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Lifecycle state
    pub state: NotificationState,
}

#[derive(Debug)]
struct Slot {
    notification: Notification,
    timer: Option<AbortHandle>,
}

#[derive(Debug)]
struct Inner {
    slots: Mutex<IndexMap<NotificationId, Slot>>,
    next_id: AtomicU64,
    ttl: Duration,
}

impl Inner {
    fn expire(&self, id: NotificationId) {
        if self.slots.lock().shift_remove(&id).is_some() {
            tracing::debug!(notification = %id, "notification expired");
        }
    }
}

/// FIFO queue of transient notifications
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    inner: Arc<Inner>,
}

impl NotificationQueue {
    /// Create queue whose notifications live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(IndexMap::new()),
                next_id: AtomicU64::new(1),
                ttl,
            }),
        }
    }

    /// Display duration
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Push a notification and arm its expiry timer.
    ///
    /// Outside a tokio runtime no timer can be armed; the notification then
    /// stays `Visible` until dismissed.
    pub fn push(&self, severity: Severity, message: impl Into<String>) -> NotificationId {
        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification {
            id,
            severity,
            message: message.into(),
            created_at: Utc::now(),
            state: NotificationState::Visible,
        };

        tracing::debug!(notification = %id, ?severity, message = %notification.message, "notification pushed");
        self.inner.slots.lock().insert(
            id,
            Slot {
                notification,
                timer: None,
            },
        );
        self.arm(id);
        id
    }

    /// Push a success notification
    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.push(Severity::Success, message)
    }

    /// Push a warning notification
    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.push(Severity::Warning, message)
    }

    /// Push an error notification
    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.push(Severity::Error, message)
    }

    /// Remove a notification before its timer elapses.
    ///
    /// Returns `false` if it was already gone.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let removed = self.inner.slots.lock().shift_remove(&id);
        match removed {
            Some(slot) => {
                if let Some(timer) = slot.timer {
                    timer.abort();
                }
                tracing::debug!(notification = %id, "notification dismissed");
                true
            }
            None => false,
        }
    }

    /// Visible notifications, oldest first
    #[must_use]
    pub fn visible(&self) -> Vec<Notification> {
        self.inner
            .slots
            .lock()
            .values()
            .map(|slot| slot.notification.clone())
            .collect()
    }

    /// Look up one notification
    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.inner
            .slots
            .lock()
            .get(&id)
            .map(|slot| slot.notification.clone())
    }

    /// Lifecycle state; `Dismissed` once removed
    #[must_use]
    pub fn state(&self, id: NotificationId) -> NotificationState {
        self.get(id)
            .map_or(NotificationState::Dismissed, |n| n.state)
    }

    /// Number of visible notifications
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Whether no notification is visible
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dismiss everything and stop all timers
    pub fn clear(&self) {
        let drained: Vec<Slot> = self.inner.slots.lock().drain(..).map(|(_, slot)| slot).collect();
        for timer in drained.into_iter().filter_map(|slot| slot.timer) {
            timer.abort();
        }
    }

    fn arm(&self, id: NotificationId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(notification = %id, "no async runtime; notification will not auto-dismiss");
            return;
        };

        let queue: Weak<Inner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = queue.upgrade() {
                inner.expire(id);
            }
        });

        let mut slots = self.inner.slots.lock();
        match slots.get_mut(&id) {
            Some(slot) => {
                slot.notification.state = NotificationState::Expiring;
                slot.timer = Some(timer.abort_handle());
            }
            None => timer.abort(),
        }
    }
}

impl Default for NotificationQueue {
    /// Queue with the standard 4 second display duration
    fn default() -> Self {
        Self::new(Duration::from_secs(4))
    }
}
