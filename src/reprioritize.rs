use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::FeatureFlags;
use crate::log_warn;
use crate::store::{ActivityLog, TaskStore};
use crate::threshold::classify;
use crate::types::{
    priority_rank, ActivityAction, ActivityEntry, Task, TaskColumn, TaskPriority, ThresholdState,
};

pub const REASON_OVERDUE: &str = "Overdue task requires immediate attention";
pub const REASON_DUE_TOMORROW: &str = "Due within 24 hours";
pub const REASON_DUE_SOON: &str = "Due within 3 days";

/// A proposed priority upgrade for a single task. Ephemeral — produced by
/// [`recommend_upgrades`], consumed by the auto-apply loop, never persisted.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReprioritizationRecommendation {
    pub task_id: String,
    pub current_priority: Option<TaskPriority>,
    pub recommended_priority: TaskPriority,
    pub reason: String,
    pub threshold_state: ThresholdState,
}

/// Per-task result row from one auto-reprioritization run.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReprioritizationOutcome {
    pub task_id: String,
    pub success: bool,
    pub from_priority: Option<TaskPriority>,
    pub to_priority: TaskPriority,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Propose priority upgrades for every task not yet done, based on its
/// threshold tier. Upgrades only — a recommendation always ranks strictly
/// more urgent than the current priority. Input order is preserved.
///
/// Rules:
/// - `overdue`, priority below `urgent` -> `urgent`
/// - `critical`, priority below `high` -> `high`
/// - `warning`, priority `low` (or unset) -> `medium`
///
/// A missing priority ranks as `low` throughout, via the same total order
/// the pickup selector uses.
pub fn recommend_upgrades(
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Vec<ReprioritizationRecommendation> {
    tasks
        .iter()
        .filter(|t| t.column != TaskColumn::Done)
        .filter_map(|task| {
            let state = classify(task.due_date, now);
            let proposal = match state {
                ThresholdState::Overdue => Some((TaskPriority::Urgent, REASON_OVERDUE)),
                ThresholdState::Critical => Some((TaskPriority::High, REASON_DUE_TOMORROW)),
                ThresholdState::Warning => Some((TaskPriority::Medium, REASON_DUE_SOON)),
                ThresholdState::Watch | ThresholdState::Normal => None,
            };

            let (recommended, reason) = proposal?;
            // Upgrade only: skip unless strictly more urgent than current
            if recommended.rank() >= priority_rank(task.priority) {
                return None;
            }

            Some(ReprioritizationRecommendation {
                task_id: task.id.clone(),
                current_priority: task.priority,
                recommended_priority: recommended,
                reason: reason.to_string(),
                threshold_state: state,
            })
        })
        .collect()
}

/// Tiers applied without human confirmation. `warning` recommendations are
/// surfaced for manual action only.
pub fn is_auto_apply(state: ThresholdState) -> bool {
    matches!(state, ThresholdState::Critical | ThresholdState::Overdue)
}

/// Applies `critical`/`overdue` recommendations to the task store.
///
/// Owned by the service instance, not shared module state: the processed
/// set lives for this instance's lifetime and resets with it, so the
/// at-most-once guarantee is per process lifetime, not durable.
pub struct AutoReprioritizer {
    running: AtomicBool,
    processed: Mutex<HashSet<String>>,
}

/// Clears the running flag when a run exits, on every return path.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for AutoReprioritizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoReprioritizer {
    pub fn new() -> Self {
        AutoReprioritizer {
            running: AtomicBool::new(false),
            processed: Mutex::new(HashSet::new()),
        }
    }

    /// Run one auto-apply pass over the current task list.
    ///
    /// Never returns an error:
    /// - disabled by feature flags -> empty result, recommendations are not
    ///   even computed
    /// - a run already in flight -> empty result immediately (no queueing,
    ///   no blocking)
    /// - task list unreadable -> empty result, logged
    /// - a write failure for one task -> unsuccessful result row, remaining
    ///   tasks still processed
    ///
    /// A task id is marked processed once its priority write and audit
    /// entry both land, and is skipped by later runs of this instance.
    pub fn run(
        &self,
        tasks: &dyn TaskStore,
        activity: &dyn ActivityLog,
        actor: &str,
        flags: &FeatureFlags,
        now: DateTime<Utc>,
    ) -> Vec<ReprioritizationOutcome> {
        if !flags.auto_reprioritise_active() {
            return Vec::new();
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // A prior run is still in flight
            return Vec::new();
        }
        let _guard = RunGuard(&self.running);

        let all = match tasks.list_tasks() {
            Ok(all) => all,
            Err(e) => {
                log_warn!("Auto-reprioritization skipped: failed to list tasks: {}", e);
                return Vec::new();
            }
        };

        let mut outcomes = Vec::new();
        for rec in recommend_upgrades(&all, now) {
            if !is_auto_apply(rec.threshold_state) {
                continue;
            }
            if self.already_processed(&rec.task_id) {
                continue;
            }

            let task = all.iter().find(|t| t.id == rec.task_id);
            let result = task.map_or_else(
                || Err(format!("task {} disappeared from the list", rec.task_id)),
                |task| apply_recommendation(tasks, activity, actor, task, &rec, now),
            );

            match result {
                Ok(()) => {
                    self.mark_processed(&rec.task_id);
                    outcomes.push(ReprioritizationOutcome {
                        task_id: rec.task_id,
                        success: true,
                        from_priority: rec.current_priority,
                        to_priority: rec.recommended_priority,
                        reason: rec.reason,
                        error: None,
                    });
                }
                Err(e) => {
                    log_warn!("Failed to reprioritise {}: {}", rec.task_id, e);
                    outcomes.push(ReprioritizationOutcome {
                        task_id: rec.task_id,
                        success: false,
                        from_priority: rec.current_priority,
                        to_priority: rec.recommended_priority,
                        reason: rec.reason,
                        error: Some(e),
                    });
                }
            }
        }

        outcomes
    }

    fn already_processed(&self, task_id: &str) -> bool {
        match self.processed.lock() {
            Ok(processed) => processed.contains(task_id),
            Err(_) => false,
        }
    }

    fn mark_processed(&self, task_id: &str) {
        if let Ok(mut processed) = self.processed.lock() {
            processed.insert(task_id.to_string());
        }
    }
}

/// Write the upgraded priority and its audit entry for a single task.
fn apply_recommendation(
    tasks: &dyn TaskStore,
    activity: &dyn ActivityLog,
    actor: &str,
    task: &Task,
    rec: &ReprioritizationRecommendation,
    now: DateTime<Utc>,
) -> Result<(), String> {
    let mut updated = task.clone();
    updated.priority = Some(rec.recommended_priority);
    updated.updated_at = now;

    tasks
        .update_task(&updated)
        .map_err(|e| format!("priority write failed: {}", e))?;

    let mut entry = ActivityEntry::new(actor, ActivityAction::TaskReprioritised, &task.id);
    entry.changes = json!({
        "priority": {
            "old": task.priority,
            "new": rec.recommended_priority,
        }
    });
    entry.metadata = json!({
        "reason": rec.reason,
        "threshold_state": rec.threshold_state,
        "auto_reprioritised": true,
    });
    entry.created_at = now;

    activity
        .append(&entry)
        .map_err(|e| format!("activity append failed: {}", e))?;

    Ok(())
}
