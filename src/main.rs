use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};

use taskpilot::board::{self, BoardFile, JsonBoardStore};
use taskpilot::config::{self, TaskPilotConfig};
use taskpilot::engine::Engine;
use taskpilot::error::EngineError;
use taskpilot::lock::BoardLock;
use taskpilot::log::LogLevel;
use taskpilot::store::TaskStore;
use taskpilot::types::{parse_task_priority, AgentState, Task, TaskColumn};
use taskpilot::{log_info, log_warn};

#[derive(Parser)]
#[command(name = "taskpilot", about = "Task pickup and prioritization engine")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (defaults to {root}/taskpilot.toml).
    /// When specified, board paths resolve from the config file's parent
    /// directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize taskpilot config and board
    Init,
    /// Add a task to the board
    Add {
        /// Task title
        title: String,
        /// Priority (low, medium, high, urgent)
        #[arg(short, long)]
        priority: Option<String>,
        /// Due date (RFC 3339, or YYYY-MM-DD for midnight UTC)
        #[arg(short, long)]
        due: Option<String>,
        /// Label (can be specified multiple times)
        #[arg(short, long, action = clap::ArgAction::Append)]
        label: Vec<String>,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },
    /// Show board and agent status
    Status,
    /// Select the next task for the agent (read-only)
    Pickup,
    /// Assign a task to the agent and move it to in-progress
    Assign {
        /// Task id to assign
        task_id: String,
    },
    /// Mark a task done
    Complete {
        /// Task id to complete
        task_id: String,
    },
    /// List priority upgrade recommendations without applying them
    Recommend,
    /// Run the auto-reprioritization loop once
    Reprioritise,
    /// Show or update agent settings
    Agent {
        /// Enable or disable automatic pickup (on/off)
        #[arg(long)]
        auto_pickup: Option<String>,
        /// Maximum number of concurrently assigned tasks
        #[arg(long)]
        max_concurrent: Option<u32>,
        /// Due-date urgency window in hours
        #[arg(long)]
        urgency_hours: Option<i64>,
        /// Model identifier shown in the dashboard
        #[arg(long)]
        model: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    taskpilot::log::set_log_level(cli.log_level);

    let root = &cli.root;

    let (config_path, config_base) = match &cli.config {
        Some(p) => (
            Some(p.clone()),
            p.parent().unwrap_or(Path::new(".")).to_path_buf(),
        ),
        None => (None, root.to_path_buf()),
    };

    let result = match cli.command {
        Commands::Init => handle_init(root, config_path.as_deref(), &config_base),
        Commands::Add {
            title,
            priority,
            due,
            label,
            description,
        } => handle_add(
            root,
            config_path.as_deref(),
            &config_base,
            &title,
            priority,
            due,
            label,
            description,
        ),
        Commands::Status => handle_status(config_path.as_deref(), &config_base),
        Commands::Pickup => handle_pickup(config_path.as_deref(), &config_base),
        Commands::Assign { task_id } => {
            handle_assign(root, config_path.as_deref(), &config_base, &task_id)
        }
        Commands::Complete { task_id } => {
            handle_complete(root, config_path.as_deref(), &config_base, &task_id)
        }
        Commands::Recommend => handle_recommend(config_path.as_deref(), &config_base),
        Commands::Reprioritise => handle_reprioritise(root, config_path.as_deref(), &config_base),
        Commands::Agent {
            auto_pickup,
            max_concurrent,
            urgency_hours,
            model,
        } => handle_agent(
            root,
            config_path.as_deref(),
            &config_base,
            auto_pickup,
            max_concurrent,
            urgency_hours,
            model,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// --- Wiring helpers ---

fn load_config(config_path: Option<&Path>, config_base: &Path) -> Result<TaskPilotConfig, String> {
    match config_path {
        Some(p) => config::load_config_file(p),
        None => config::load_config(config_base),
    }
}

fn board_paths(config_base: &Path, cfg: &TaskPilotConfig) -> (PathBuf, PathBuf) {
    (
        config_base.join(&cfg.board.board_path),
        config_base.join(&cfg.board.activity_log_path),
    )
}

fn build_engine(cfg: &TaskPilotConfig, config_base: &Path) -> (Engine, Arc<JsonBoardStore>) {
    let (board_path, activity_path) = board_paths(config_base, cfg);
    let store = Arc::new(JsonBoardStore::new(&board_path, &activity_path));
    let engine = Engine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        &cfg.agent.id,
        cfg.features,
    );
    (engine, store)
}

fn runtime_dir(root: &Path) -> PathBuf {
    root.join(".taskpilot")
}

fn engine_error(err: EngineError) -> String {
    format!("[{}] {}", err.code(), err)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn parse_on_off(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => Err(format!("Invalid flag value '{}': expected on or off", s)),
    }
}

fn parse_due_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("Invalid due date '{}': expected RFC 3339 or YYYY-MM-DD", s))
}

// --- Command handlers ---

fn handle_init(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
) -> Result<(), String> {
    let _lock = BoardLock::acquire(&runtime_dir(root))?;

    let cfg_file = root.join("taskpilot.toml");
    if config_path.is_none() && !cfg_file.exists() {
        let contents = default_config_toml();
        std::fs::write(&cfg_file, contents)
            .map_err(|e| format!("Failed to write {}: {}", cfg_file.display(), e))?;
        log_info!("Created {}", cfg_file.display());
    }

    let cfg = load_config(config_path, config_base)?;
    let (board_path, _) = board_paths(config_base, &cfg);

    if board_path.exists() {
        log_info!("Board already exists at {}", board_path.display());
        return Ok(());
    }

    let mut agent = AgentState::bootstrap(&cfg.agent.id);
    agent.current_model = Some(cfg.agent.default_model.clone());
    agent.auto_pickup_enabled = cfg.pickup.auto_pickup_enabled;
    agent.max_concurrent_tasks = cfg.pickup.max_concurrent_tasks;
    agent.due_date_urgency_hours = cfg.pickup.due_date_urgency_hours;
    agent.nightly_start_hour = cfg.pickup.nightly_start_hour;
    agent.repick_window_minutes = cfg.pickup.repick_window_minutes;

    let board = BoardFile::bootstrap(agent);
    board::save(&board_path, &board).map_err(|e| e.to_string())?;
    log_info!("Created board at {}", board_path.display());

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn handle_add(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
    title: &str,
    priority: Option<String>,
    due: Option<String>,
    labels: Vec<String>,
    description: Option<String>,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Task title must not be empty".to_string());
    }

    let priority = priority.as_deref().map(parse_task_priority).transpose()?;
    let due_date = due.as_deref().map(parse_due_date).transpose()?;

    let cfg = load_config(config_path, config_base)?;
    let _lock = BoardLock::acquire(&runtime_dir(root))?;
    let (_, store) = build_engine(&cfg, config_base);

    let board_doc = board::load(store.board_path()).map_err(|e| e.to_string())?;
    let id = board::generate_next_id(&board_doc.tasks);

    let mut task = Task::new(&id, title.trim());
    task.priority = priority;
    task.due_date = due_date;
    task.labels = labels;
    task.description = description.filter(|d| !d.trim().is_empty());

    store.insert_task(&task).map_err(|e| e.to_string())?;

    log_info!("Added {} ({})", task.id, task.title);
    print_json(&task)
}

fn handle_status(config_path: Option<&Path>, config_base: &Path) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let (board_path, _) = board_paths(config_base, &cfg);
    let board_doc = board::load(&board_path).map_err(|e| e.to_string())?;

    println!(
        "Agent {} — status: {}, auto-pickup: {}, max concurrent: {}, urgency window: {}h",
        board_doc.agent.agent_id,
        board_doc.agent.status,
        if board_doc.agent.auto_pickup_enabled {
            "on"
        } else {
            "off"
        },
        board_doc.agent.max_concurrent_tasks,
        board_doc.agent.due_date_urgency_hours,
    );

    for column in [
        TaskColumn::Backlog,
        TaskColumn::Todo,
        TaskColumn::InProgress,
        TaskColumn::Review,
        TaskColumn::Done,
    ] {
        let in_column: Vec<&Task> = board_doc
            .tasks
            .iter()
            .filter(|t| t.column == column)
            .collect();
        println!("{} ({})", column, in_column.len());
        for task in in_column {
            let priority = task
                .priority
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            let due = task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}  {}  priority: {}  due: {}",
                task.id, task.title, priority, due
            );
        }
    }

    Ok(())
}

fn handle_pickup(config_path: Option<&Path>, config_base: &Path) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let (engine, _) = build_engine(&cfg, config_base);

    let outcome = engine.pickup().map_err(engine_error)?;
    print_json(&outcome)
}

fn handle_assign(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
    task_id: &str,
) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let _lock = BoardLock::acquire(&runtime_dir(root))?;
    let (engine, _) = build_engine(&cfg, config_base);

    let task = engine.assign(task_id).map_err(engine_error)?;
    log_info!("Assigned {} to {}", task.id, engine.agent_id());
    print_json(&serde_json::json!({ "ok": true, "task": task }))
}

fn handle_complete(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
    task_id: &str,
) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let _lock = BoardLock::acquire(&runtime_dir(root))?;
    let (engine, _) = build_engine(&cfg, config_base);

    let task = engine.complete(task_id).map_err(engine_error)?;
    log_info!("Completed {}", task.id);
    print_json(&serde_json::json!({ "ok": true, "task": task }))
}

fn handle_recommend(config_path: Option<&Path>, config_base: &Path) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let (engine, _) = build_engine(&cfg, config_base);

    let recommendations = engine.recommendations().map_err(engine_error)?;
    if recommendations.is_empty() {
        log_info!("No priority upgrades recommended");
    }
    print_json(&recommendations)
}

fn handle_reprioritise(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    if !cfg.features.auto_reprioritise_active() {
        log_warn!("Auto-reprioritization is disabled by feature flags");
    }

    let _lock = BoardLock::acquire(&runtime_dir(root))?;
    let (engine, _) = build_engine(&cfg, config_base);

    let outcomes = engine.run_auto_reprioritization();
    let applied = outcomes.iter().filter(|o| o.success).count();
    log_info!(
        "Auto-reprioritization applied {} of {} change(s)",
        applied,
        outcomes.len()
    );
    print_json(&outcomes)
}

fn handle_agent(
    root: &Path,
    config_path: Option<&Path>,
    config_base: &Path,
    auto_pickup: Option<String>,
    max_concurrent: Option<u32>,
    urgency_hours: Option<i64>,
    model: Option<String>,
) -> Result<(), String> {
    let cfg = load_config(config_path, config_base)?;
    let (engine, _) = build_engine(&cfg, config_base);

    let no_changes = auto_pickup.is_none()
        && max_concurrent.is_none()
        && urgency_hours.is_none()
        && model.is_none();
    if no_changes {
        let agent = engine.agent_state().map_err(engine_error)?;
        return print_json(&agent);
    }

    let _lock = BoardLock::acquire(&runtime_dir(root))?;
    let mut agent = engine.agent_state().map_err(engine_error)?;

    if let Some(flag) = auto_pickup {
        agent.auto_pickup_enabled = parse_on_off(&flag)?;
    }
    if let Some(max) = max_concurrent {
        if max < 1 {
            return Err("max-concurrent must be >= 1".to_string());
        }
        agent.max_concurrent_tasks = max;
    }
    if let Some(hours) = urgency_hours {
        if hours < 0 {
            return Err("urgency-hours must be >= 0".to_string());
        }
        agent.due_date_urgency_hours = hours;
    }
    if let Some(model) = model {
        agent.current_model = Some(model);
    }

    engine.update_agent_settings(&agent).map_err(engine_error)?;
    print_json(&agent)
}

fn default_config_toml() -> String {
    r#"[agent]
id = "agent"
default_model = "claude-sonnet"

[features]
calendar_v2_enabled = true
calendar_auto_reprioritise_enabled = true

[board]
board_path = "board.json"
activity_log_path = "activity.jsonl"

[pickup]
auto_pickup_enabled = true
max_concurrent_tasks = 1
due_date_urgency_hours = 24
nightly_start_hour = 22
repick_window_minutes = 30
"#
    .to_string()
}
