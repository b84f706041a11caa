//! Optimistic mutation executor
//!
//! Two-phase protocol:
//! 1. `apply` snapshots every scope the plan patches and applies the
//!    predicted patches synchronously, before the remote call starts
//! 2. `settle` confirms (reconcile, invalidate, success notification) or
//!    reverts (restore snapshots, error notification, auth redirect)
//!
//! A revert only undoes what this mutation did. A scope rewritten with server
//! data while the call was in flight is invalidated instead of restored. A
//! scope that another mutation patched in the meantime is handed to the
//! plan's compensation, or invalidated when the plan has none.
//!
//! `execute` runs both phases around one remote future. Failures never
//! escape as `Err`: they become `Outcome::Failed(MutationFailed)`.

use crate::cache::{ScopedCache, Snapshot};
use crate::error::{ApiError, MutationFailed};
use crate::notify::NotificationQueue;
use crate::selection::Navigator;
use kanban_model::{Scope, ScopeKey};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

/// Identifier carried in the log fields of one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationId(Ulid);

impl MutationId {
    /// Generate a new id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type PatchFn = Box<dyn FnOnce(&ScopedCache) -> bool + Send>;
type ReconcileFn<T> = Box<dyn FnOnce(&ScopedCache, &T) + Send>;
type CompensateFn = Box<dyn FnOnce(&ScopedCache, &[ScopeKey]) + Send>;

struct PlannedPatch {
    key: ScopeKey,
    apply: PatchFn,
}

/// What a mutation predicts and what it invalidates once confirmed
pub struct MutationPlan<T> {
    operation: &'static str,
    patches: Vec<PlannedPatch>,
    invalidates: Vec<ScopeKey>,
    reconcile: Option<ReconcileFn<T>>,
    compensate: Option<CompensateFn>,
    success_message: Option<String>,
}

impl<T> MutationPlan<T> {
    /// Empty plan labelled `operation` (used in logs and failure text)
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            patches: Vec::new(),
            invalidates: Vec::new(),
            reconcile: None,
            compensate: None,
            success_message: None,
        }
    }

    /// Predicted in-place update of a scope.
    ///
    /// Skipped when the scope is missing or stale at apply time.
    #[must_use]
    pub fn patch<S, F>(mut self, scope: S, f: F) -> Self
    where
        S: Scope + 'static,
        F: FnOnce(&mut S::Value) + Send + 'static,
    {
        let key = scope.key();
        self.patches.push(PlannedPatch {
            key,
            apply: Box::new(move |cache: &ScopedCache| cache.patch(&scope, f).is_some()),
        });
        self
    }

    /// Scope to mark stale once the server confirms
    #[must_use]
    pub fn invalidate(mut self, key: ScopeKey) -> Self {
        if !self.invalidates.contains(&key) {
            self.invalidates.push(key);
        }
        self
    }

    /// Overwrite the prediction with the server's answer
    #[must_use]
    pub fn reconcile<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&ScopedCache, &T) + Send + 'static,
    {
        self.reconcile = Some(Box::new(f));
        self
    }

    /// Undo this plan's prediction inside scopes other writers touched.
    ///
    /// Runs on failure with the patched scopes whose value is no longer this
    /// plan's prediction, before the untouched scopes are restored.
    #[must_use]
    pub fn compensate<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&ScopedCache, &[ScopeKey]) + Send + 'static,
    {
        self.compensate = Some(Box::new(f));
        self
    }

    /// Success notification text
    #[must_use]
    pub fn notify_success(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Operation label
    #[inline]
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Scopes invalidated on confirmation
    #[inline]
    #[must_use]
    pub fn invalidated_scopes(&self) -> &[ScopeKey] {
        &self.invalidates
    }
}

impl<T> fmt::Debug for MutationPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patched: Vec<ScopeKey> = self.patches.iter().map(|p| p.key).collect();
        f.debug_struct("MutationPlan")
            .field("operation", &self.operation)
            .field("patches", &patched)
            .field("invalidates", &self.invalidates)
            .field("reconcile", &self.reconcile.is_some())
            .field("compensate", &self.compensate.is_some())
            .field("success_message", &self.success_message)
            .finish()
    }
}

/// Pre-patch snapshot plus the version our own patch produced
#[derive(Debug)]
struct Rollback {
    snapshot: Snapshot,
    patched: u64,
}

/// A plan whose prediction is in the cache and whose call has not settled
pub struct AppliedMutation<T> {
    id: MutationId,
    operation: &'static str,
    rollbacks: Vec<Rollback>,
    invalidates: Vec<ScopeKey>,
    reconcile: Option<ReconcileFn<T>>,
    compensate: Option<CompensateFn>,
    success_message: Option<String>,
    started: Instant,
}

impl<T> AppliedMutation<T> {
    /// Mutation id
    #[inline]
    #[must_use]
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Operation label
    #[inline]
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Add scopes to invalidate on confirmation
    pub fn invalidate_also(&mut self, keys: impl IntoIterator<Item = ScopeKey>) {
        for key in keys {
            if !self.invalidates.contains(&key) {
                self.invalidates.push(key);
            }
        }
    }
}

impl<T> fmt::Debug for AppliedMutation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patched: Vec<ScopeKey> = self.rollbacks.iter().map(|r| r.snapshot.key()).collect();
        f.debug_struct("AppliedMutation")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("patched", &patched)
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

/// Settled mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Server accepted the write
    Confirmed(T),
    /// Write failed; the prediction was reverted
    Failed(MutationFailed),
}

impl<T> Outcome<T> {
    /// Whether the server accepted the write
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    /// Confirmed value, if any
    #[inline]
    #[must_use]
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Confirmed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Failure, if any
    #[inline]
    #[must_use]
    pub fn failure(&self) -> Option<&MutationFailed> {
        match self {
            Self::Confirmed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    /// Convert into a `Result`
    ///
    /// # Errors
    /// The `MutationFailed` of a failed outcome.
    #[inline]
    pub fn into_result(self) -> Result<T, MutationFailed> {
        match self {
            Self::Confirmed(value) => Ok(value),
            Self::Failed(failure) => Err(failure),
        }
    }

    /// Map the confirmed value
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Confirmed(value) => Outcome::Confirmed(f(value)),
            Self::Failed(failure) => Outcome::Failed(failure),
        }
    }
}

/// Runs mutation plans against the shared cache
#[derive(Clone)]
pub struct MutationExecutor {
    cache: Arc<ScopedCache>,
    notifications: Arc<NotificationQueue>,
    navigator: Arc<dyn Navigator>,
    success_notifications: bool,
}

impl MutationExecutor {
    /// Create executor
    #[must_use]
    pub fn new(
        cache: Arc<ScopedCache>,
        notifications: Arc<NotificationQueue>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            cache,
            notifications,
            navigator,
            success_notifications: true,
        }
    }

    /// Enable or disable success notifications
    #[inline]
    #[must_use]
    pub fn with_success_notifications(mut self, enabled: bool) -> Self {
        self.success_notifications = enabled;
        self
    }

    /// Shared cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<ScopedCache> {
        &self.cache
    }

    /// Phase one: snapshot and apply the predicted patches
    pub fn apply<T>(&self, plan: MutationPlan<T>) -> AppliedMutation<T> {
        let id = MutationId::new();
        let mut rollbacks: Vec<Rollback> = Vec::with_capacity(plan.patches.len());
        for patch in plan.patches {
            let snapshot = self.cache.snapshot(&patch.key);
            if !(patch.apply)(&self.cache) {
                continue;
            }
            let Some(patched) = self.cache.version(&patch.key) else {
                continue;
            };
            // Several patches on one scope roll back to the first snapshot.
            match rollbacks.iter_mut().find(|r| r.snapshot.key() == patch.key) {
                Some(existing) => existing.patched = patched,
                None => rollbacks.push(Rollback { snapshot, patched }),
            }
        }

        tracing::debug!(
            mutation = %id,
            operation = plan.operation,
            patched = rollbacks.len(),
            "optimistic patch applied"
        );

        AppliedMutation {
            id,
            operation: plan.operation,
            rollbacks,
            invalidates: plan.invalidates,
            reconcile: plan.reconcile,
            compensate: plan.compensate,
            success_message: plan.success_message,
            started: Instant::now(),
        }
    }

    /// Apply predicted patches that ride on a mutation already in flight.
    ///
    /// No snapshots are kept: rollback of the in-flight mutation covers them.
    pub fn apply_untracked<T>(&self, plan: MutationPlan<T>) {
        for patch in plan.patches {
            let _ = (patch.apply)(&self.cache);
        }
        tracing::debug!(operation = plan.operation, "optimistic patch coalesced");
    }

    /// Phase two: confirm or revert
    pub fn settle<T>(&self, applied: AppliedMutation<T>, result: Result<T, ApiError>) -> Outcome<T> {
        let elapsed_ms = u64::try_from(applied.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(value) => {
                if let Some(reconcile) = applied.reconcile {
                    reconcile(&self.cache, &value);
                }
                for key in &applied.invalidates {
                    self.cache.invalidate(key);
                }
                if self.success_notifications {
                    if let Some(message) = applied.success_message {
                        self.notifications.success(message);
                    }
                }
                tracing::info!(
                    mutation = %applied.id,
                    operation = applied.operation,
                    invalidated = applied.invalidates.len(),
                    elapsed_ms,
                    "mutation confirmed"
                );
                Outcome::Confirmed(value)
            }
            Err(error) => {
                self.revert(applied.id, applied.rollbacks, applied.compensate);
                tracing::warn!(
                    mutation = %applied.id,
                    operation = applied.operation,
                    kind = %error.kind(),
                    elapsed_ms,
                    "mutation reverted"
                );
                Outcome::Failed(self.report_failure(applied.operation, &error))
            }
        }
    }

    fn revert(&self, id: MutationId, rollbacks: Vec<Rollback>, compensate: Option<CompensateFn>) {
        let overwritten = rollbacks.iter().any(|r| self.cache.written_since(&r.snapshot));
        let contested: Vec<ScopeKey> = rollbacks
            .iter()
            .filter(|r| {
                let key = r.snapshot.key();
                !self.cache.written_since(&r.snapshot) && self.cache.version(&key) != Some(r.patched)
            })
            .map(|r| r.snapshot.key())
            .collect();

        if !contested.is_empty() {
            match compensate {
                // Compensation reads sibling scopes, which only holds while none was refetched.
                Some(compensate) if !overwritten => {
                    tracing::debug!(mutation = %id, scopes = ?contested, "compensating contested scopes");
                    compensate(&self.cache, &contested);
                }
                _ => {
                    tracing::debug!(mutation = %id, scopes = ?contested, "invalidating contested scopes");
                    for key in &contested {
                        self.cache.invalidate(key);
                    }
                }
            }
        }

        for rollback in rollbacks.into_iter().rev() {
            if !contested.contains(&rollback.snapshot.key()) {
                self.cache.restore(rollback.snapshot);
            }
        }
    }

    /// Both phases around one remote call
    pub async fn execute<T, Fut>(&self, plan: MutationPlan<T>, remote: Fut) -> Outcome<T>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let applied = self.apply(plan);
        let result = remote.await;
        self.settle(applied, result)
    }

    /// Turn an API failure into the uniform user-facing failure.
    ///
    /// Pushes an error notification and redirects to login on auth failures.
    pub fn report_failure(&self, operation: &'static str, error: &ApiError) -> MutationFailed {
        let failure = MutationFailed::from_api(operation, error);
        self.notifications.error(failure.message.clone());
        if error.is_auth() {
            self.navigator.redirect_to_login();
        }
        failure
    }
}

impl fmt::Debug for MutationExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationExecutor")
            .field("cache", &self.cache.stats())
            .field("notifications", &self.notifications.len())
            .field("success_notifications", &self.success_notifications)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorKind;
    use crate::notify::Severity;
    use kanban_model::{ColumnId, Task, TaskId, TasksOf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct CountingNavigator {
        redirects: AtomicUsize,
    }

    impl Navigator for CountingNavigator {
        fn redirect_to_login(&self) {
            self.redirects.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        cache: Arc<ScopedCache>,
        notifications: Arc<NotificationQueue>,
        navigator: Arc<CountingNavigator>,
        executor: MutationExecutor,
    }

    fn fixture() -> Fixture {
        let cache = Arc::new(ScopedCache::default());
        let notifications = Arc::new(NotificationQueue::new(Duration::from_secs(4)));
        let navigator = Arc::new(CountingNavigator::default());
        let executor = MutationExecutor::new(cache.clone(), notifications.clone(), navigator.clone());
        cache.write(&TasksOf(ColumnId(1)), vec![design_logo()]);
        Fixture {
            cache,
            notifications,
            navigator,
            executor,
        }
    }

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

    fn bump_plan() -> MutationPlan<()> {
        MutationPlan::new("toggle subtask").patch(TasksOf(ColumnId(1)), |tasks: &mut Vec<Task>| {
            tasks[0].completed_subtasks += 1;
        })
    }

    fn completed(cache: &ScopedCache) -> u32 {
        cache.read(&TasksOf(ColumnId(1))).unwrap()[0].completed_subtasks
    }

    #[tokio::test(start_paused = true)]
    async fn prediction_is_visible_before_remote_settles() {
        let f = fixture();
        let cache = f.cache.clone();

        let outcome = f
            .executor
            .execute(bump_plan(), async move {
                assert_eq!(completed(&cache), 2);
                Ok(())
            })
            .await;

        assert!(outcome.is_confirmed());
        assert_eq!(completed(&f.cache), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_restores_snapshot_and_notifies() {
        let f = fixture();

        let outcome = f
            .executor
            .execute(bump_plan(), async { Err(ApiError::Network("offline".into())) })
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, ApiErrorKind::Network);
        assert_eq!(completed(&f.cache), 1);

        let shown = f.notifications.visible();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].severity, Severity::Error);
        assert_eq!(shown[0].message, "offline");
        assert_eq!(f.navigator.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_redirects_to_login() {
        let f = fixture();

        let outcome = f
            .executor
            .execute(bump_plan(), async { Err(ApiError::Unauthorized) })
            .await;

        assert!(!outcome.is_confirmed());
        assert_eq!(f.navigator.redirects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_invalidates_and_notifies_success() {
        let f = fixture();
        let plan = MutationPlan::<()>::new("delete task")
            .invalidate(ScopeKey::Tasks(ColumnId(1)))
            .invalidate(ScopeKey::Tasks(ColumnId(1)))
            .notify_success("Task deleted");
        assert_eq!(plan.invalidated_scopes().len(), 1);

        let outcome = f.executor.execute(plan, async { Ok(()) }).await;

        assert!(outcome.is_confirmed());
        assert!(!f.cache.is_fresh(&ScopeKey::Tasks(ColumnId(1))));
        assert_eq!(f.notifications.visible()[0].severity, Severity::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn success_notifications_can_be_disabled() {
        let f = fixture();
        let executor = f.executor.clone().with_success_notifications(false);

        executor
            .execute(MutationPlan::<()>::new("edit task").notify_success("Task updated"), async {
                Ok(())
            })
            .await;

        assert!(f.notifications.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_overwrites_prediction() {
        let f = fixture();
        let plan = bump_plan().reconcile(|cache: &ScopedCache, _: &()| {
            cache.patch(&TasksOf(ColumnId(1)), |tasks| tasks[0].completed_subtasks = 3);
        });

        f.executor.execute(plan, async { Ok(()) }).await;

        assert_eq!(completed(&f.cache), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn patches_on_missing_scope_are_skipped() {
        let f = fixture();
        let plan = MutationPlan::<()>::new("toggle subtask")
            .patch(TasksOf(ColumnId(9)), |tasks: &mut Vec<Task>| tasks.clear());

        let outcome = f
            .executor
            .execute(plan, async { Err(ApiError::NotFound("gone".into())) })
            .await;

        assert!(!outcome.is_confirmed());
        assert!(!f.cache.contains(&ScopeKey::Tasks(ColumnId(9))));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_refetch_keeps_server_data_out_of_rollback() {
        let f = fixture();
        let applied = f.executor.apply(bump_plan());

        let mut created = design_logo();
        created.id = TaskId(2);
        created.title = "Plan QA".to_string();
        f.cache.write(&TasksOf(ColumnId(1)), vec![design_logo(), created]);

        let outcome = f
            .executor
            .settle(applied, Err(ApiError::Network("offline".into())));

        assert!(!outcome.is_confirmed());
        assert!(!f.cache.is_fresh(&ScopeKey::Tasks(ColumnId(1))));
        assert_eq!(f.cache.read(&TasksOf(ColumnId(1))), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_compensates_scope_patched_by_another_mutation() {
        let f = fixture();
        let plan = bump_plan().compensate(|cache: &ScopedCache, contested: &[ScopeKey]| {
            assert_eq!(contested, &[ScopeKey::Tasks(ColumnId(1))]);
            cache.patch(&TasksOf(ColumnId(1)), |tasks| tasks[0].completed_subtasks -= 1);
        });
        let first = f.executor.apply(plan);
        let second = f.executor.apply(bump_plan());
        assert_eq!(completed(&f.cache), 3);

        f.executor
            .settle(first, Err(ApiError::Network("offline".into())));
        assert_eq!(completed(&f.cache), 2);
        assert!(f.cache.is_fresh(&ScopeKey::Tasks(ColumnId(1))));

        assert!(f.executor.settle(second, Ok(())).is_confirmed());
        assert_eq!(completed(&f.cache), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn contested_scope_without_compensation_is_invalidated() {
        let f = fixture();
        let first = f.executor.apply(bump_plan());
        let _second = f.executor.apply(bump_plan());

        f.executor
            .settle(first, Err(ApiError::Network("offline".into())));

        assert!(!f.cache.is_fresh(&ScopeKey::Tasks(ColumnId(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_patches_roll_back_to_first_snapshot() {
        let f = fixture();
        let plan = bump_plan().patch(TasksOf(ColumnId(1)), |tasks: &mut Vec<Task>| {
            tasks[0].completed_subtasks += 1;
        });

        let outcome = f
            .executor
            .execute(plan, async { Err(ApiError::Network("offline".into())) })
            .await;

        assert!(!outcome.is_confirmed());
        assert_eq!(completed(&f.cache), 1);
        assert!(f.cache.is_fresh(&ScopeKey::Tasks(ColumnId(1))));
    }

    #[test]
    fn outcome_conversions() {
        let ok: Outcome<u8> = Outcome::Confirmed(1);
        assert_eq!(ok.clone().map(|v| v + 1).ok(), Some(2));
        assert_eq!(ok.into_result(), Ok(1));

        let failed: Outcome<u8> = Outcome::Failed(MutationFailed::from_api(
            "delete task",
            &ApiError::NotFound("gone".into()),
        ));
        assert!(failed.clone().ok().is_none());
        assert!(failed.into_result().is_err());
    }
}
