mod common;

use std::sync::Arc;

use chrono::Duration;

use common::{
    activity_count, flags_on, make_agent_state, make_task, make_todo, ts, FailingAgentStateStore,
};
use taskpilot::engine::Engine;
use taskpilot::error::EngineError;
use taskpilot::pickup::PickupSkipReason;
use taskpilot::store::{AgentStateStore, MemoryStore, TaskStore};
use taskpilot::types::{ActivityAction, AgentStatus, TaskColumn, TaskPriority};

fn memory_engine(
    tasks: Vec<taskpilot::types::Task>,
) -> (Engine, Arc<MemoryStore>) {
    common::memory_engine(make_agent_state(), tasks)
}

// --- Assign ---

#[test]
fn assign_moves_the_task_in_progress_and_activates_the_agent() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", Some(TaskPriority::High))]);

    let before = ts("2026-02-01T00:00:00Z");
    let task = engine.assign("task-1").expect("assign");

    assert_eq!(task.column, TaskColumn::InProgress);
    assert_eq!(task.assignee.as_deref(), Some("agent"));
    assert!(task.updated_at > before);

    let stored = store.get_task("task-1").unwrap().unwrap();
    assert_eq!(stored.column, TaskColumn::InProgress);
    assert_eq!(stored.assignee.as_deref(), Some("agent"));

    let agent = store.get_agent_state().unwrap();
    assert_eq!(agent.status, AgentStatus::Active);
}

#[test]
fn assign_writes_one_audit_entry_with_the_column_and_assignee_change() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", None)]);

    engine.assign("task-1").expect("assign");

    let entries = store.activity_entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, ActivityAction::TaskAssigned);
    assert_eq!(entry.actor, "agent");
    assert_eq!(entry.entity_type, "task");
    assert_eq!(entry.entity_id, "task-1");
    assert_eq!(entry.changes["column"]["old"], "todo");
    assert_eq!(entry.changes["column"]["new"], "in-progress");
    assert!(entry.changes["assignee"]["old"].is_null());
    assert_eq!(entry.changes["assignee"]["new"], "agent");
}

#[test]
fn assign_rejects_a_blank_task_id_as_bad_request() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", None)]);

    let err = engine.assign("   ").expect_err("blank id");
    assert_eq!(err.code(), "bad_request");
    assert!(matches!(err, EngineError::BadRequest(_)));
    assert!(store.activity_entries().is_empty());
}

#[test]
fn assign_surfaces_not_found_for_an_unknown_task() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", None)]);

    let err = engine.assign("task-99").expect_err("unknown id");
    assert_eq!(err.code(), "not_found");
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(store.activity_entries().is_empty());
    // The agent was never activated
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Idle);
}

#[test]
fn assign_trims_surrounding_whitespace_from_the_task_id() {
    let (engine, _) = memory_engine(vec![make_todo("task-1", None)]);

    let task = engine.assign("  task-1  ").expect("assign");
    assert_eq!(task.id, "task-1");
}

#[test]
fn assign_tolerates_a_failing_agent_state_write() {
    let inner = Arc::new(MemoryStore::new(make_agent_state()));
    inner.insert_task(&make_todo("task-1", None)).unwrap();

    let engine = Engine::new(
        inner.clone(),
        Arc::new(FailingAgentStateStore::new(inner.clone())),
        inner.clone(),
        "agent",
        flags_on(),
    );

    // The advisory half fails, the task write stands, the call succeeds
    let task = engine.assign("task-1").expect("assign despite mirror failure");
    assert_eq!(task.column, TaskColumn::InProgress);

    let stored = inner.get_task("task-1").unwrap().unwrap();
    assert_eq!(stored.column, TaskColumn::InProgress);
    assert_eq!(stored.assignee.as_deref(), Some("agent"));
    assert_eq!(inner.activity_entries().len(), 1);

    // The mirror never landed
    assert_eq!(inner.get_agent_state().unwrap().status, AgentStatus::Idle);
}

// --- Complete ---

#[test]
fn complete_moves_the_task_done_and_idles_the_agent() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", None)]);

    engine.assign("task-1").expect("assign");
    let task = engine.complete("task-1").expect("complete");

    assert_eq!(task.column, TaskColumn::Done);
    let agent = store.get_agent_state().unwrap();
    assert_eq!(agent.status, AgentStatus::Idle);

    assert_eq!(activity_count(&store, ActivityAction::TaskAssigned), 1);
    assert_eq!(activity_count(&store, ActivityAction::TaskCompleted), 1);
}

#[test]
fn complete_keeps_the_agent_active_while_other_work_remains() {
    let mut agent = make_agent_state();
    agent.max_concurrent_tasks = 2;
    let (engine, store) = common::memory_engine(
        agent,
        vec![make_todo("task-1", None), make_todo("task-2", None)],
    );

    engine.assign("task-1").expect("assign first");
    engine.assign("task-2").expect("assign second");
    engine.complete("task-1").expect("complete first");

    // task-2 is still in progress, so the agent is not idle yet
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Active);

    engine.complete("task-2").expect("complete second");
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Idle);
}

#[test]
fn complete_records_the_column_transition_in_the_audit_entry() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", None)]);

    engine.assign("task-1").expect("assign");
    engine.complete("task-1").expect("complete");

    let entries = store.activity_entries();
    let entry = entries
        .iter()
        .find(|e| e.action == ActivityAction::TaskCompleted)
        .expect("completion entry");
    assert_eq!(entry.entity_id, "task-1");
    assert_eq!(entry.changes["column"]["old"], "in-progress");
    assert_eq!(entry.changes["column"]["new"], "done");
}

#[test]
fn complete_accepts_any_task_id_without_prior_assignment() {
    // Manual override: completion does not require the task to have gone
    // through pickup or assign first.
    let (engine, store) = memory_engine(vec![make_task("task-1", TaskColumn::Review)]);

    let task = engine.complete("task-1").expect("complete from review");
    assert_eq!(task.column, TaskColumn::Done);
    assert_eq!(activity_count(&store, ActivityAction::TaskCompleted), 1);
}

#[test]
fn complete_surfaces_not_found_and_bad_request() {
    let (engine, _) = memory_engine(vec![]);

    assert_eq!(engine.complete("").expect_err("blank").code(), "bad_request");
    assert_eq!(
        engine.complete("task-9").expect_err("unknown").code(),
        "not_found"
    );
}

// --- Pickup through the engine ---

#[test]
fn pickup_is_read_only() {
    let (engine, store) = memory_engine(vec![make_todo("task-1", Some(TaskPriority::High))]);

    let outcome = engine.pickup().expect("pickup");
    assert_eq!(outcome.task.as_ref().map(|t| t.id.as_str()), Some("task-1"));

    // Nothing moved, nothing was assigned, nothing was audited
    let stored = store.get_task("task-1").unwrap().unwrap();
    assert_eq!(stored.column, TaskColumn::Todo);
    assert!(stored.assignee.is_none());
    assert!(store.activity_entries().is_empty());
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Idle);
}

#[test]
fn assigned_task_counts_toward_the_concurrency_cap_on_the_next_pickup() {
    let (engine, _) = memory_engine(vec![
        make_todo("task-1", Some(TaskPriority::High)),
        make_todo("task-2", None),
    ]);

    engine.assign("task-1").expect("assign");

    let outcome = engine.pickup().expect("pickup");
    assert!(outcome.task.is_none());
    assert_eq!(outcome.reason, Some(PickupSkipReason::MaxConcurrentReached));
    assert_eq!(outcome.in_progress, Some(1));
}

// --- End to end ---

#[test]
fn pickup_assign_complete_cycle_drains_the_board() {
    let mut task1 = make_todo("task-1", Some(TaskPriority::High));
    task1.created_at = ts("2026-02-01T00:00:00Z");
    let mut task2 = make_todo("task-2", Some(TaskPriority::Medium));
    task2.created_at = ts("2026-02-02T00:00:00Z");

    let (engine, store) = memory_engine(vec![task1, task2]);

    // First cycle picks the high-priority task
    let picked = engine.pickup().expect("first pickup").task.expect("a task");
    assert_eq!(picked.id, "task-1");

    engine.assign(&picked.id).expect("assign task-1");
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Active);

    engine.complete(&picked.id).expect("complete task-1");
    assert_eq!(store.get_agent_state().unwrap().status, AgentStatus::Idle);

    // Second cycle: task-1 is done, so task-2 is next
    let picked = engine.pickup().expect("second pickup").task.expect("a task");
    assert_eq!(picked.id, "task-2");

    engine.assign(&picked.id).expect("assign task-2");
    engine.complete(&picked.id).expect("complete task-2");

    // Board drained
    let outcome = engine.pickup().expect("final pickup");
    assert!(outcome.task.is_none());
    assert_eq!(outcome.reason, Some(PickupSkipReason::NoEligibleTasks));

    assert_eq!(activity_count(&store, ActivityAction::TaskAssigned), 2);
    assert_eq!(activity_count(&store, ActivityAction::TaskCompleted), 2);
}

// --- Reprioritization surfaces on the engine ---

#[test]
fn engine_recommendations_include_the_manual_warning_tier() {
    let now = chrono::Utc::now();
    let mut warning = make_todo("task-1", Some(TaskPriority::Low));
    warning.due_date = Some(now + Duration::days(3));

    let (engine, _) = memory_engine(vec![warning]);

    let recs = engine.recommendations().expect("recommendations");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].recommended_priority, TaskPriority::Medium);
}

#[test]
fn engine_auto_reprioritization_applies_and_audits() {
    let now = chrono::Utc::now();
    let mut overdue = make_todo("task-1", Some(TaskPriority::Low));
    overdue.due_date = Some(now - Duration::days(2));

    let (engine, store) = memory_engine(vec![overdue]);

    let outcomes = engine.run_auto_reprioritization();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].to_priority, TaskPriority::Urgent);

    let task = store.get_task("task-1").unwrap().unwrap();
    assert_eq!(task.priority, Some(TaskPriority::Urgent));
    assert_eq!(activity_count(&store, ActivityAction::TaskReprioritised), 1);

    // The same engine instance does not repeat the action
    assert!(engine.run_auto_reprioritization().is_empty());
}

// --- Agent settings ---

#[test]
fn agent_settings_round_trip_through_the_engine() {
    let (engine, store) = memory_engine(vec![]);

    let mut agent = engine.agent_state().expect("read");
    agent.auto_pickup_enabled = false;
    agent.max_concurrent_tasks = 3;
    engine.update_agent_settings(&agent).expect("update");

    let stored = store.get_agent_state().unwrap();
    assert!(!stored.auto_pickup_enabled);
    assert_eq!(stored.max_concurrent_tasks, 3);

    let outcome = engine.pickup().expect("pickup");
    assert_eq!(outcome.reason, Some(PickupSkipReason::AutoPickupDisabled));
}
