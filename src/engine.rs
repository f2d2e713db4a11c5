use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::config::FeatureFlags;
use crate::error::EngineError;
use crate::log_warn;
use crate::pickup::{self, PickupOutcome};
use crate::reprioritize::{
    recommend_upgrades, AutoReprioritizer, ReprioritizationOutcome, ReprioritizationRecommendation,
};
use crate::store::{ActivityLog, AgentStateStore, TaskStore};
use crate::types::{
    ActivityAction, ActivityEntry, AgentState, AgentStatus, Task, TaskColumn,
};

/// Operation façade over the task-pickup engine: pickup, assign, complete,
/// and the reprioritization surfaces, wired to the storage collaborators.
///
/// All operations are synchronous request/response calls. The engine holds
/// no task state of its own — only the per-instance reprioritization
/// dedup/run-flag state.
pub struct Engine {
    tasks: Arc<dyn TaskStore>,
    agent_state: Arc<dyn AgentStateStore>,
    activity: Arc<dyn ActivityLog>,
    agent_id: String,
    flags: FeatureFlags,
    reprioritizer: AutoReprioritizer,
}

impl Engine {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        agent_state: Arc<dyn AgentStateStore>,
        activity: Arc<dyn ActivityLog>,
        agent_id: &str,
        flags: FeatureFlags,
    ) -> Self {
        Engine {
            tasks,
            agent_state,
            activity,
            agent_id: agent_id.to_string(),
            flags,
            reprioritizer: AutoReprioritizer::new(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Choose at most one task for the agent to work on next. Read-only —
    /// never mutates task or agent state.
    pub fn pickup(&self) -> Result<PickupOutcome, EngineError> {
        let agent = self.agent_state.get_agent_state()?;
        let tasks = self.tasks.list_tasks()?;
        Ok(pickup::select_next_task(&agent, &tasks, Utc::now()))
    }

    /// Move a task to `in-progress`, assign it to the agent, and mirror
    /// the agent status to `active`.
    ///
    /// The task write is authoritative; the agent-state write is advisory
    /// and a failure there is logged, not surfaced, and never rolls back
    /// the task change.
    pub fn assign(&self, task_id: &str) -> Result<Task, EngineError> {
        let task_id = validate_task_id(task_id)?;
        let mut task = self.fetch_task(task_id)?;

        let old_column = task.column;
        let old_assignee = task.assignee.clone();

        task.column = TaskColumn::InProgress;
        task.assignee = Some(self.agent_id.clone());
        task.updated_at = Utc::now();
        self.tasks.update_task(&task)?;

        let mut entry = ActivityEntry::new(&self.agent_id, ActivityAction::TaskAssigned, &task.id);
        entry.changes = json!({
            "column": { "old": old_column, "new": task.column },
            "assignee": { "old": old_assignee, "new": task.assignee },
        });
        self.activity.append(&entry)?;

        self.mirror_agent_status(AgentStatus::Active);

        Ok(task)
    }

    /// Move a task to `done` and mirror the agent status: `idle` once the
    /// agent no longer owns any in-progress task, `active` otherwise.
    ///
    /// Same advisory semantics for the agent-state half as `assign`.
    pub fn complete(&self, task_id: &str) -> Result<Task, EngineError> {
        let task_id = validate_task_id(task_id)?;
        let mut task = self.fetch_task(task_id)?;

        let old_column = task.column;

        task.column = TaskColumn::Done;
        task.updated_at = Utc::now();
        self.tasks.update_task(&task)?;

        let mut entry = ActivityEntry::new(&self.agent_id, ActivityAction::TaskCompleted, &task.id);
        entry.changes = json!({
            "column": { "old": old_column, "new": task.column },
        });
        self.activity.append(&entry)?;

        self.mirror_agent_status(self.status_after_completion());

        Ok(task)
    }

    /// Full recommendation list for the current task list, including the
    /// `warning` tier that is only ever applied manually.
    pub fn recommendations(&self) -> Result<Vec<ReprioritizationRecommendation>, EngineError> {
        let tasks = self.tasks.list_tasks()?;
        Ok(recommend_upgrades(&tasks, Utc::now()))
    }

    /// Run the auto-reprioritization loop once. Never fails; per-task
    /// failures are embedded in the result rows.
    pub fn run_auto_reprioritization(&self) -> Vec<ReprioritizationOutcome> {
        self.reprioritizer.run(
            self.tasks.as_ref(),
            self.activity.as_ref(),
            &self.agent_id,
            &self.flags,
            Utc::now(),
        )
    }

    pub fn agent_state(&self) -> Result<AgentState, EngineError> {
        Ok(self.agent_state.get_agent_state()?)
    }

    /// Update the operator-facing agent settings. Status is owned by
    /// assign/complete and passes through unchanged.
    pub fn update_agent_settings(&self, state: &AgentState) -> Result<(), EngineError> {
        Ok(self.agent_state.update_agent_state(state)?)
    }

    // --- Private helpers ---

    fn fetch_task(&self, task_id: &str) -> Result<Task, EngineError> {
        self.tasks
            .get_task(task_id)?
            .ok_or_else(|| EngineError::NotFound(task_id.to_string()))
    }

    /// `idle` only when the agent holds no in-progress task after the
    /// completion write; with a concurrency cap above one the agent may
    /// still be working something else.
    fn status_after_completion(&self) -> AgentStatus {
        match self.tasks.list_tasks() {
            Ok(tasks) => {
                if pickup::count_in_progress(&tasks, &self.agent_id) == 0 {
                    AgentStatus::Idle
                } else {
                    AgentStatus::Active
                }
            }
            Err(e) => {
                log_warn!(
                    "Could not recount in-progress tasks after completion: {}; assuming idle",
                    e
                );
                AgentStatus::Idle
            }
        }
    }

    /// Advisory half of the dual write: failures are logged and tolerated.
    fn mirror_agent_status(&self, status: AgentStatus) {
        let result = self
            .agent_state
            .get_agent_state()
            .and_then(|mut agent| {
                agent.status = status;
                self.agent_state.update_agent_state(&agent)
            });

        if let Err(e) = result {
            log_warn!(
                "Task update succeeded but agent status mirror to '{}' failed: {}",
                status,
                e
            );
        }
    }
}

fn validate_task_id(task_id: &str) -> Result<&str, EngineError> {
    let trimmed = task_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::BadRequest("task_id is required".to_string()));
    }
    Ok(trimmed)
}
