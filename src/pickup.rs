use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::{priority_rank, AgentState, Task, TaskColumn};

/// Why the selector returned no task.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PickupSkipReason {
    AutoPickupDisabled,
    MaxConcurrentReached,
    NoEligibleTasks,
}

/// Result of a pickup call: at most one task, or a reason code.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PickupOutcome {
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PickupSkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress: Option<u32>,
}

impl PickupOutcome {
    fn task(task: Task) -> Self {
        PickupOutcome {
            task: Some(task),
            reason: None,
            in_progress: None,
        }
    }

    fn skipped(reason: PickupSkipReason) -> Self {
        PickupOutcome {
            task: None,
            reason: Some(reason),
            in_progress: None,
        }
    }
}

/// Select at most one task for the agent to work on next.
///
/// This is a pure function — no I/O, no mutation, trivially testable.
///
/// Gate order:
/// 1. `auto_pickup_enabled` must be set
/// 2. in-progress tasks assigned to the agent must be under
///    `max_concurrent_tasks`
/// 3. the eligible set (`todo`, unassigned or assigned to the agent) must be
///    non-empty
///
/// The eligible set is then ordered by the tie-break chain in
/// [`compare_candidates`] and the first task wins.
pub fn select_next_task(agent: &AgentState, tasks: &[Task], now: DateTime<Utc>) -> PickupOutcome {
    if !agent.auto_pickup_enabled {
        return PickupOutcome::skipped(PickupSkipReason::AutoPickupDisabled);
    }

    let in_progress = count_in_progress(tasks, &agent.agent_id);
    if in_progress >= agent.max_concurrent_tasks {
        let mut outcome = PickupOutcome::skipped(PickupSkipReason::MaxConcurrentReached);
        outcome.in_progress = Some(in_progress);
        return outcome;
    }

    let mut eligible = eligible_tasks(tasks, &agent.agent_id);
    if eligible.is_empty() {
        return PickupOutcome::skipped(PickupSkipReason::NoEligibleTasks);
    }

    eligible.sort_by(|a, b| compare_candidates(a, b, now, agent.due_date_urgency_hours));

    PickupOutcome::task(eligible[0].clone())
}

/// Count tasks currently in-progress and assigned to the agent.
pub fn count_in_progress(tasks: &[Task], agent_id: &str) -> u32 {
    tasks
        .iter()
        .filter(|t| t.column == TaskColumn::InProgress && t.is_assigned_to(agent_id))
        .count() as u32
}

/// Tasks the agent may pick up: `todo` column, unassigned or already
/// assigned to the agent.
pub fn eligible_tasks<'a>(tasks: &'a [Task], agent_id: &str) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.column == TaskColumn::Todo)
        .filter(|t| t.is_unassigned() || t.is_assigned_to(agent_id))
        .collect()
}

/// A task is urgent when it has a due date that falls within the urgency
/// window. An overdue task has a negative distance to its due date and so
/// always falls within the (non-negative) window.
fn is_urgent(task: &Task, now: DateTime<Utc>, urgency_hours: i64) -> bool {
    task.due_date
        .map_or(false, |due| due - now <= Duration::hours(urgency_hours))
}

/// Tie-break chain for pickup ordering:
/// 1. urgent (due within the urgency window) before non-urgent
/// 2. among two urgent tasks, earlier due date first
/// 3. priority rank, missing priority ranked as `low`
/// 4. `created_at` ascending (oldest first)
///
/// The chain is total: ties fall through to `created_at`, which is assumed
/// unique enough in practice, so the same eligible set always yields the
/// same selection.
pub fn compare_candidates(
    a: &Task,
    b: &Task,
    now: DateTime<Utc>,
    urgency_hours: i64,
) -> Ordering {
    let a_urgent = is_urgent(a, now, urgency_hours);
    let b_urgent = is_urgent(b, now, urgency_hours);

    match (a_urgent, b_urgent) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .due_date
            .cmp(&b.due_date)
            .then_with(|| priority_rank(a.priority).cmp(&priority_rank(b.priority)))
            .then_with(|| a.created_at.cmp(&b.created_at)),
        (false, false) => priority_rank(a.priority)
            .cmp(&priority_rank(b.priority))
            .then_with(|| a.created_at.cmp(&b.created_at)),
    }
}
