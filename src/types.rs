use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Enums ---

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskColumn {
    Backlog,
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl std::fmt::Display for TaskColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskColumn::Backlog => write!(f, "backlog"),
            TaskColumn::Todo => write!(f, "todo"),
            TaskColumn::InProgress => write!(f, "in-progress"),
            TaskColumn::Review => write!(f, "review"),
            TaskColumn::Done => write!(f, "done"),
        }
    }
}

pub fn parse_task_column(s: &str) -> Result<TaskColumn, String> {
    match s.to_lowercase().as_str() {
        "backlog" => Ok(TaskColumn::Backlog),
        "todo" => Ok(TaskColumn::Todo),
        "in-progress" | "in_progress" => Ok(TaskColumn::InProgress),
        "review" => Ok(TaskColumn::Review),
        "done" => Ok(TaskColumn::Done),
        _ => Err(format!(
            "Invalid column '{}': expected backlog, todo, in-progress, review, or done",
            s
        )),
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    #[default]
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Sort rank: lower is more urgent. `urgent(0) < high(1) < medium(2) < low(3)`.
    pub fn rank(self) -> u8 {
        match self {
            TaskPriority::Urgent => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

pub fn parse_task_priority(s: &str) -> Result<TaskPriority, String> {
    match s.to_lowercase().as_str() {
        "low" | "l" => Ok(TaskPriority::Low),
        "medium" | "m" => Ok(TaskPriority::Medium),
        "high" | "h" => Ok(TaskPriority::High),
        "urgent" | "u" => Ok(TaskPriority::Urgent),
        _ => Err(format!(
            "Invalid priority '{}': expected low, medium, high, or urgent",
            s
        )),
    }
}

/// Total-order rank for an optional priority. A task without a priority
/// ranks as `Low` — this is the single place that default is applied.
pub fn priority_rank(priority: Option<TaskPriority>) -> u8 {
    priority.unwrap_or_default().rank()
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Idle,
    Active,
    /// UI-only transient state; never written by the engine.
    Thinking,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Thinking => write!(f, "thinking"),
        }
    }
}

/// Due-date urgency tier, derived from whole calendar days until due.
/// Declaration order is escalation order, so `Ord` compares severity.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdState {
    Normal,
    Watch,
    Warning,
    Critical,
    Overdue,
}

impl std::fmt::Display for ThresholdState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdState::Normal => write!(f, "normal"),
            ThresholdState::Watch => write!(f, "watch"),
            ThresholdState::Warning => write!(f, "warning"),
            ThresholdState::Critical => write!(f, "critical"),
            ThresholdState::Overdue => write!(f, "overdue"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    TaskAssigned,
    TaskCompleted,
    TaskReprioritised,
}

// --- Structs ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub column: TaskColumn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Construct a task in the default `todo` column with current timestamps.
    pub fn new(id: &str, title: &str) -> Self {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            column: TaskColumn::Todo,
            priority: None,
            assignee: None,
            due_date: None,
            labels: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// An empty or whitespace-only assignee counts as unassigned.
    pub fn is_unassigned(&self) -> bool {
        self.assignee
            .as_deref()
            .map_or(true, |a| a.trim().is_empty())
    }

    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assignee.as_deref() == Some(agent_id)
    }
}

/// Singleton agent record: exactly one row per agent id. The engine writes
/// `status` on assign/complete; the remaining fields are operator settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgentState {
    pub agent_id: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_model: Option<String>,
    pub auto_pickup_enabled: bool,
    pub max_concurrent_tasks: u32,
    pub due_date_urgency_hours: i64,
    /// Consumed by the external scheduling cadence only.
    pub nightly_start_hour: u32,
    /// Consumed by the external scheduling cadence only.
    pub repick_window_minutes: u32,
}

impl AgentState {
    /// Initial singleton written at bootstrap: idle, pickup enabled, one
    /// task at a time, 24h urgency window.
    pub fn bootstrap(agent_id: &str) -> Self {
        AgentState {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Idle,
            current_model: None,
            auto_pickup_enabled: true,
            max_concurrent_tasks: 1,
            due_date_urgency_hours: 24,
            nightly_start_hour: 22,
            repick_window_minutes: 30,
        }
    }
}

/// Append-only audit record written as a side effect of every mutating
/// operation. Never updated or deleted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActivityEntry {
    pub actor: String,
    pub action: ActivityAction,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub changes: serde_json::Value,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(actor: &str, action: ActivityAction, entity_id: &str) -> Self {
        ActivityEntry {
            actor: actor.to_string(),
            action,
            entity_type: "task".to_string(),
            entity_id: entity_id.to_string(),
            changes: serde_json::Value::Null,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }
}
