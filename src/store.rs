use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{ActivityEntry, AgentState, Task};

/// Errors surfaced by the storage collaborators.
///
/// Categories:
/// - NotFound: the referenced record id does not resolve
/// - Io / Serde: the backing medium failed; callers map these to
///   `internal_error`
/// - Unavailable: the store cannot serve requests at all (lock poisoned,
///   connection gone)
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Duplicate id: {0}")]
    Duplicate(String),

    #[error("Store corrupted: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the task table. The engine reads all rows and
/// conditionally writes `column`, `assignee`, `priority`, `updated_at`;
/// task creation and deletion belong to the external CRUD surfaces.
pub trait TaskStore: Send + Sync {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Replace the row whose id matches `task.id`.
    /// Fails with `NotFound` if no such row exists.
    fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    fn insert_task(&self, task: &Task) -> Result<(), StoreError>;
}

/// Read/update access to the AgentState singleton.
pub trait AgentStateStore: Send + Sync {
    fn get_agent_state(&self) -> Result<AgentState, StoreError>;

    fn update_agent_state(&self, state: &AgentState) -> Result<(), StoreError>;
}

/// Append-only audit sink. Entries are immutable once written.
pub trait ActivityLog: Send + Sync {
    fn append(&self, entry: &ActivityEntry) -> Result<(), StoreError>;
}

// --- In-memory implementation ---

/// In-memory store implementing all three collaborator traits. Used by
/// tests and by embedders that bring their own persistence.
pub struct MemoryStore {
    tasks: Mutex<HashMap<String, Task>>,
    agent: Mutex<Option<AgentState>>,
    activity: Mutex<Vec<ActivityEntry>>,
}

impl MemoryStore {
    pub fn new(agent: AgentState) -> Self {
        MemoryStore {
            tasks: Mutex::new(HashMap::new()),
            agent: Mutex::new(Some(agent)),
            activity: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the activity log, oldest first.
    pub fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn locked<'a, T>(
        mutex: &'a Mutex<T>,
        what: &str,
    ) -> Result<std::sync::MutexGuard<'a, T>, StoreError> {
        mutex
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("{} lock poisoned", what)))
    }
}

impl TaskStore for MemoryStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let tasks = Self::locked(&self.tasks, "tasks")?;
        let mut all: Vec<Task> = tasks.values().cloned().collect();
        // HashMap order is arbitrary; present rows in creation order
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let tasks = Self::locked(&self.tasks, "tasks")?;
        Ok(tasks.get(id).cloned())
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = Self::locked(&self.tasks, "tasks")?;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(task.id.clone())),
        }
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = Self::locked(&self.tasks, "tasks")?;
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }
}

impl AgentStateStore for MemoryStore {
    fn get_agent_state(&self) -> Result<AgentState, StoreError> {
        let agent = Self::locked(&self.agent, "agent")?;
        agent
            .clone()
            .ok_or_else(|| StoreError::NotFound("agent state".to_string()))
    }

    fn update_agent_state(&self, state: &AgentState) -> Result<(), StoreError> {
        let mut agent = Self::locked(&self.agent, "agent")?;
        *agent = Some(state.clone());
        Ok(())
    }
}

impl ActivityLog for MemoryStore {
    fn append(&self, entry: &ActivityEntry) -> Result<(), StoreError> {
        let mut activity = Self::locked(&self.activity, "activity")?;
        activity.push(entry.clone());
        Ok(())
    }
}
