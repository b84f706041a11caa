//! Scenario runner
//!
//! Replays the reference user flows against a `Session` backed by
//! `MemoryTaskApi` and checks what the views would observe at each step.

use super::memory::{ApiOp, MemoryTaskApi};
use crate::config::SyncConfig;
use crate::error::ApiError;
use crate::selection::ModalKind;
use crate::session::{Session, ToggleOutcome};
use kanban_model::{BoardId, ColumnId, ScopeKey, SubtaskId, TaskId};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const PLATFORM_LAUNCH: BoardId = BoardId(1);
const MARKETING_PLAN: BoardId = BoardId(2);
const TODO: ColumnId = ColumnId(1);
const DESIGN_LOGO: TaskId = TaskId(1);
const PICK_PALETTE: SubtaskId = SubtaskId(2);

/// Scenario runner configuration
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Latency of every remote call
    pub latency: Duration,
    /// Toggles fired at one subtask in the rapid-toggle scenario
    pub rapid_toggles: u32,
    /// Session configuration
    pub sync: SyncConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(50),
            rapid_toggles: 5,
            sync: SyncConfig::default(),
        }
    }
}

/// Reference flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// Toggle shows "2 of 3" before the server answers
    OptimisticToggle,
    /// Failed toggle reverts to "1 of 3" and the error expires
    FailedToggle,
    /// Deleting a task invalidates its column and the next read refetches
    DeleteInvalidates,
    /// Switching boards closes the open task modal
    BoardSwitch,
    /// Rapid toggles on one subtask end at initial + net transitions
    RapidToggles,
}

impl ScenarioKind {
    /// Every scenario, in run order
    pub const ALL: [Self; 5] = [
        Self::OptimisticToggle,
        Self::FailedToggle,
        Self::DeleteInvalidates,
        Self::BoardSwitch,
        Self::RapidToggles,
    ];
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OptimisticToggle => "A: optimistic toggle",
            Self::FailedToggle => "B: failed toggle",
            Self::DeleteInvalidates => "C: delete invalidates",
            Self::BoardSwitch => "D: board switch",
            Self::RapidToggles => "rapid toggles",
        };
        f.write_str(name)
    }
}

/// Result of one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario
    pub kind: ScenarioKind,
    /// What was observed, or the first violated expectation
    pub outcome: Result<String, String>,
}

impl ScenarioResult {
    /// Whether every expectation held
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Final report
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Configuration used
    pub config: ScenarioConfig,
    /// Per-scenario results
    pub results: Vec<ScenarioResult>,
}

impl ScenarioReport {
    /// Whether every scenario passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Kanban Sync Scenario Report ===\n\n");
        report.push_str(&format!("Latency: {} ms\n", self.config.latency.as_millis()));
        report.push_str(&format!(
            "Notification TTL: {} ms\n",
            self.config.sync.notification_ttl_ms
        ));
        report.push_str(&format!("Rapid Toggles: {}\n\n", self.config.rapid_toggles));

        for result in &self.results {
            match &result.outcome {
                Ok(detail) => report.push_str(&format!("[PASS] {}: {detail}\n", result.kind)),
                Err(violation) => {
                    report.push_str(&format!("[FAIL] {}: {violation}\n", result.kind));
                }
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Run the given scenarios, each against a freshly seeded API
pub async fn run_scenarios(config: ScenarioConfig, kinds: &[ScenarioKind]) -> ScenarioReport {
    let mut results = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        let api = Arc::new(MemoryTaskApi::platform_launch().with_latency(config.latency));
        let session = Session::new(api.clone(), config.sync.clone());

        tracing::info!(scenario = %kind, "running scenario");
        let outcome = match kind {
            ScenarioKind::OptimisticToggle => optimistic_toggle(&session).await,
            ScenarioKind::FailedToggle => failed_toggle(&session, &api).await,
            ScenarioKind::DeleteInvalidates => delete_invalidates(&session, &api).await,
            ScenarioKind::BoardSwitch => board_switch(&session).await,
            ScenarioKind::RapidToggles => rapid_toggles(&session, &api, config.rapid_toggles).await,
        };
        if let Err(violation) = &outcome {
            tracing::warn!(scenario = %kind, %violation, "scenario failed");
        }

        session.shutdown();
        results.push(ScenarioResult { kind, outcome });
    }

    ScenarioReport { config, results }
}

/// Run every scenario
pub async fn run_all(config: ScenarioConfig) -> ScenarioReport {
    run_scenarios(config, &ScenarioKind::ALL).await
}

fn expect(condition: bool, violation: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(violation())
    }
}

async fn progress(session: &Session) -> Result<String, String> {
    session
        .task_progress(TODO, DESIGN_LOGO)
        .await
        .map_err(|e| e.to_string())?
        .map(|p| p.to_string())
        .ok_or_else(|| "Design logo missing from Todo".to_string())
}

async fn open_design_logo(session: &Session) -> Result<(), String> {
    session
        .boards()
        .await
        .map_err(|e| e.to_string())?;
    session.selection().select_board(PLATFORM_LAUNCH);
    let task = session
        .task(TODO, DESIGN_LOGO)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Design logo missing from Todo".to_string())?;
    session.selection().select_task(task);
    session
        .selection()
        .open_modal(ModalKind::TaskDetail)
        .map_err(|e| e.to_string())?;
    session
        .subtasks(DESIGN_LOGO)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}

async fn optimistic_toggle(session: &Session) -> Result<String, String> {
    open_design_logo(session).await?;
    let before = progress(session).await?;
    expect(before == "1 of 3", || format!("expected 1 of 3 before, saw {before}"))?;

    let toggle = session.toggle_subtask(TODO, DESIGN_LOGO, PICK_PALETTE);
    tokio::pin!(toggle);

    // First poll applies the prediction and parks on the remote call.
    let early = futures::poll!(toggle.as_mut());
    expect(early.is_pending(), || "toggle settled without waiting for the server".to_string())?;
    let during = progress(session).await?;
    expect(during == "2 of 3", || format!("expected 2 of 3 in flight, saw {during}"))?;

    let outcome = toggle.await.map_err(|e| e.to_string())?;
    expect(
        matches!(outcome, ToggleOutcome::Confirmed(_)),
        || format!("toggle not confirmed: {outcome:?}"),
    )?;
    let after = progress(session).await?;
    expect(after == "2 of 3", || format!("expected 2 of 3 after, saw {after}"))?;

    Ok(format!("{before} -> {during} (in flight) -> {after}"))
}

async fn failed_toggle(session: &Session, api: &MemoryTaskApi) -> Result<String, String> {
    open_design_logo(session).await?;
    api.fail_next(
        ApiOp::SetSubtaskCompletion,
        ApiError::Network("Network Error".to_string()),
    );

    let outcome = session
        .toggle_subtask(TODO, DESIGN_LOGO, PICK_PALETTE)
        .await
        .map_err(|e| e.to_string())?;
    expect(outcome.is_failed(), || format!("toggle did not fail: {outcome:?}"))?;

    let reverted = progress(session).await?;
    expect(reverted == "1 of 3", || format!("expected revert to 1 of 3, saw {reverted}"))?;

    let shown = session.notifications().visible();
    expect(shown.len() == 1, || format!("expected one notification, saw {}", shown.len()))?;
    let message = shown[0].message.clone();

    let ttl = session.notifications().ttl();
    tokio::time::sleep(ttl + Duration::from_millis(10)).await;
    expect(session.notifications().is_empty(), || {
        "error notification still visible after its display time".to_string()
    })?;

    Ok(format!("reverted to {reverted}; '{message}' expired after {} ms", ttl.as_millis()))
}

async fn delete_invalidates(session: &Session, api: &MemoryTaskApi) -> Result<String, String> {
    open_design_logo(session).await?;
    let fetches_before = api.calls(ApiOp::ListTasks);

    let outcome = session.delete_task(TODO, DESIGN_LOGO).await;
    expect(outcome.is_confirmed(), || format!("delete failed: {outcome:?}"))?;
    expect(!session.cache().is_fresh(&ScopeKey::Tasks(TODO)), || {
        "Todo task list still fresh after delete".to_string()
    })?;
    expect(session.selection().task().is_none(), || {
        "deleted task still selected".to_string()
    })?;

    let tasks = session.tasks(TODO).await.map_err(|e| e.to_string())?;
    session.tasks(TODO).await.map_err(|e| e.to_string())?;
    let refetches = api.calls(ApiOp::ListTasks) - fetches_before;
    expect(refetches == 1, || format!("expected one refetch, saw {refetches}"))?;
    expect(tasks.is_empty(), || format!("Todo still lists {} tasks", tasks.len()))?;

    Ok(format!("Todo refetched once, {} tasks left", tasks.len()))
}

async fn board_switch(session: &Session) -> Result<String, String> {
    open_design_logo(session).await?;
    expect(session.selection().is_open(ModalKind::TaskDetail), || {
        "task modal not open".to_string()
    })?;

    session.selection().select_board(MARKETING_PLAN);

    let selection = session.selection().snapshot();
    expect(selection.task.is_none(), || "task still selected".to_string())?;
    expect(!selection.is_open(ModalKind::TaskDetail), || {
        "task modal still open".to_string()
    })?;

    Ok("task modal closed and selection cleared".to_string())
}

async fn rapid_toggles(session: &Session, api: &MemoryTaskApi, count: u32) -> Result<String, String> {
    open_design_logo(session).await?;
    let initial = session
        .task(TODO, DESIGN_LOGO)
        .await
        .map_err(|e| e.to_string())?
        .map_or(0, |t| t.completed_subtasks);

    let toggles = (0..count).map(|_| session.toggle_subtask(TODO, DESIGN_LOGO, PICK_PALETTE));
    let outcomes = futures::future::join_all(toggles).await;
    if let Some(failed) = outcomes.iter().find(|o| !matches!(o, Ok(o) if !o.is_failed())) {
        return Err(format!("toggle failed: {failed:?}"));
    }

    let expected = initial + count % 2;
    let cached = session
        .task(TODO, DESIGN_LOGO)
        .await
        .map_err(|e| e.to_string())?
        .map_or(0, |t| t.completed_subtasks);
    expect(cached == expected, || format!("cache shows {cached}, expected {expected}"))?;

    let stored = api.stored_task(DESIGN_LOGO).map_or(0, |t| t.completed_subtasks);
    expect(stored == expected, || format!("server holds {stored}, expected {expected}"))?;

    let writes = api.calls(ApiOp::SetSubtaskCompletion);
    expect(writes <= 2, || format!("expected at most two writes, saw {writes}"))?;

    Ok(format!("{count} toggles: {initial} -> {cached} with {writes} writes"))
}
