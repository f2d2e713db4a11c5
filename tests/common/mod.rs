#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use taskpilot::config::FeatureFlags;
use taskpilot::engine::Engine;
use taskpilot::store::{AgentStateStore, MemoryStore, StoreError, TaskStore};
use taskpilot::types::{AgentState, Task, TaskColumn, TaskPriority};

/// Parse an RFC 3339 timestamp for fixture data.
pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("valid RFC 3339 timestamp")
}

/// Creates a `Task` with minimal defaults: no priority, no assignee, no due
/// date, timestamps pinned to 2026-02-01. The title is auto-generated.
pub fn make_task(id: &str, column: TaskColumn) -> Task {
    Task {
        id: id.to_string(),
        title: format!("Test task {}", id),
        description: None,
        column,
        priority: None,
        assignee: None,
        due_date: None,
        labels: Vec::new(),
        created_at: ts("2026-02-01T00:00:00Z"),
        updated_at: ts("2026-02-01T00:00:00Z"),
    }
}

/// A todo task with the given priority.
pub fn make_todo(id: &str, priority: Option<TaskPriority>) -> Task {
    let mut task = make_task(id, TaskColumn::Todo);
    task.priority = priority;
    task
}

/// The bootstrap agent singleton used across tests: auto-pickup on,
/// one concurrent task, 24h urgency window.
pub fn make_agent_state() -> AgentState {
    AgentState::bootstrap("agent")
}

pub fn flags_on() -> FeatureFlags {
    FeatureFlags {
        calendar_v2_enabled: true,
        calendar_auto_reprioritise_enabled: true,
    }
}

pub fn flags_off() -> FeatureFlags {
    FeatureFlags {
        calendar_v2_enabled: true,
        calendar_auto_reprioritise_enabled: false,
    }
}

/// Engine wired to a fresh in-memory store seeded with the given tasks.
pub fn memory_engine(agent: AgentState, tasks: Vec<Task>) -> (Engine, Arc<MemoryStore>) {
    memory_engine_with_flags(agent, tasks, flags_on())
}

pub fn memory_engine_with_flags(
    agent: AgentState,
    tasks: Vec<Task>,
    flags: FeatureFlags,
) -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(agent));
    for task in &tasks {
        store.insert_task(task).expect("seed task");
    }
    let engine = Engine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        "agent",
        flags,
    );
    (engine, store)
}

// --- Failure-injecting doubles ---

/// Task store that fails `update_task` for a configurable set of ids,
/// delegating everything else to the wrapped store.
pub struct FailingTaskStore {
    inner: Arc<MemoryStore>,
    fail_ids: Mutex<HashSet<String>>,
}

impl FailingTaskStore {
    pub fn new(inner: Arc<MemoryStore>, fail_ids: &[&str]) -> Self {
        FailingTaskStore {
            inner,
            fail_ids: Mutex::new(fail_ids.iter().map(|id| id.to_string()).collect()),
        }
    }

    /// Stop failing writes for the given id.
    pub fn heal(&self, id: &str) {
        self.fail_ids.lock().expect("fail_ids lock").remove(id);
    }

    fn should_fail(&self, id: &str) -> bool {
        self.fail_ids.lock().expect("fail_ids lock").contains(id)
    }
}

impl TaskStore for FailingTaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.inner.list_tasks()
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.inner.get_task(id)
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        if self.should_fail(&task.id) {
            return Err(StoreError::Unavailable(format!(
                "injected write failure for {}",
                task.id
            )));
        }
        self.inner.update_task(task)
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.insert_task(task)
    }
}

/// Agent-state store whose writes always fail, for exercising the
/// advisory half of the dual write.
pub struct FailingAgentStateStore {
    inner: Arc<MemoryStore>,
}

impl FailingAgentStateStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        FailingAgentStateStore { inner }
    }
}

impl AgentStateStore for FailingAgentStateStore {
    fn get_agent_state(&self) -> Result<AgentState, StoreError> {
        self.inner.get_agent_state()
    }

    fn update_agent_state(&self, _state: &AgentState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable(
            "injected agent-state write failure".to_string(),
        ))
    }
}

/// Task store whose `list_tasks` blocks until released, for exercising
/// the in-flight guard on the reprioritization loop.
pub struct GatedTaskStore {
    inner: Arc<MemoryStore>,
    entered: std::sync::mpsc::Sender<()>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl GatedTaskStore {
    pub fn new(
        inner: Arc<MemoryStore>,
    ) -> (
        Self,
        std::sync::mpsc::Receiver<()>,
        std::sync::mpsc::Sender<()>,
    ) {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        (
            GatedTaskStore {
                inner,
                entered: entered_tx,
                release: Mutex::new(release_rx),
            },
            entered_rx,
            release_tx,
        )
    }
}

impl TaskStore for GatedTaskStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let _ = self.entered.send(());
        if let Ok(release) = self.release.lock() {
            let _ = release.recv();
        }
        self.inner.list_tasks()
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.inner.get_task(id)
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.update_task(task)
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        self.inner.insert_task(task)
    }
}

/// Count activity entries for a given action.
pub fn activity_count(store: &MemoryStore, action: taskpilot::types::ActivityAction) -> usize {
    store
        .activity_entries()
        .iter()
        .filter(|e| e.action == action)
        .count()
}
