use std::path::Path;

use serde::Deserialize;

#[derive(Default, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TaskPilotConfig {
    pub agent: AgentConfig,
    pub features: FeatureFlags,
    pub board: BoardConfig,
    pub pickup: PickupDefaults,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// The fixed agent identity used for assignment and audit entries.
    pub id: String,
    pub default_model: String,
}

/// Feature flags gating the calendar engine. Read by the caller and passed
/// into the engine as explicit input, never consulted from inside business
/// logic.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct FeatureFlags {
    pub calendar_v2_enabled: bool,
    pub calendar_auto_reprioritise_enabled: bool,
}

impl FeatureFlags {
    /// Auto-reprioritization requires the v2 calendar and its own flag.
    pub fn auto_reprioritise_active(&self) -> bool {
        self.calendar_v2_enabled && self.calendar_auto_reprioritise_enabled
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    pub board_path: String,
    pub activity_log_path: String,
}

/// Bootstrap values for the AgentState singleton, applied once by `init`.
/// After bootstrap the stored row is authoritative.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PickupDefaults {
    pub auto_pickup_enabled: bool,
    pub max_concurrent_tasks: u32,
    pub due_date_urgency_hours: i64,
    pub nightly_start_hour: u32,
    pub repick_window_minutes: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: "agent".to_string(),
            default_model: "claude-sonnet".to_string(),
        }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            calendar_v2_enabled: true,
            calendar_auto_reprioritise_enabled: true,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_path: "board.json".to_string(),
            activity_log_path: "activity.jsonl".to_string(),
        }
    }
}

impl Default for PickupDefaults {
    fn default() -> Self {
        Self {
            auto_pickup_enabled: true,
            max_concurrent_tasks: 1,
            due_date_urgency_hours: 24,
            nightly_start_hour: 22,
            repick_window_minutes: 30,
        }
    }
}

pub fn validate(config: &TaskPilotConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.agent.id.trim().is_empty() {
        errors.push("agent.id must not be empty".to_string());
    }

    if config.pickup.max_concurrent_tasks < 1 {
        errors.push("pickup.max_concurrent_tasks must be >= 1".to_string());
    }

    if config.pickup.due_date_urgency_hours < 0 {
        errors.push("pickup.due_date_urgency_hours must be >= 0".to_string());
    }

    if config.pickup.nightly_start_hour > 23 {
        errors.push("pickup.nightly_start_hour must be between 0 and 23".to_string());
    }

    if config.board.board_path.trim().is_empty() {
        errors.push("board.board_path must not be empty".to_string());
    }

    if config.board.activity_log_path.trim().is_empty() {
        errors.push("board.activity_log_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Load config from `{project_root}/taskpilot.toml`. A missing file yields
/// defaults; a present file must parse and validate.
pub fn load_config(project_root: &Path) -> Result<TaskPilotConfig, String> {
    let config_path = project_root.join("taskpilot.toml");
    load_config_file(&config_path)
}

/// Load config from an explicit path. A missing file yields defaults.
pub fn load_config_file(config_path: &Path) -> Result<TaskPilotConfig, String> {
    if !config_path.exists() {
        return Ok(TaskPilotConfig::default());
    }

    let contents = std::fs::read_to_string(config_path)
        .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;

    let config: TaskPilotConfig = toml::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))?;

    validate(&config).map_err(|errors| {
        format!(
            "Config validation failed:\n{}",
            errors
                .iter()
                .map(|e| format!("  - {}", e))
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;

    Ok(config)
}
