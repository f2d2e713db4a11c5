use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::store::{ActivityLog, AgentStateStore, StoreError, TaskStore};
use crate::types::{ActivityEntry, AgentState, Task};

pub const BOARD_SCHEMA_VERSION: u32 = 1;

/// On-disk board document: the AgentState singleton plus the task table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BoardFile {
    pub schema_version: u32,
    pub agent: AgentState,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl BoardFile {
    /// Fresh board holding only the bootstrapped agent singleton.
    pub fn bootstrap(agent: AgentState) -> Self {
        BoardFile {
            schema_version: BOARD_SCHEMA_VERSION,
            agent,
            tasks: Vec::new(),
        }
    }
}

/// Load a board document from a JSON file at the given path.
///
/// Validates the schema version. Unknown fields are silently ignored
/// (forward compatibility).
pub fn load(path: &Path) -> Result<BoardFile, StoreError> {
    let contents = fs::read_to_string(path)?;

    let board: BoardFile = serde_json::from_str(&contents)?;

    if board.schema_version != BOARD_SCHEMA_VERSION {
        return Err(StoreError::Corrupt(format!(
            "unsupported schema_version {} in {} (expected {})",
            board.schema_version,
            path.display(),
            BOARD_SCHEMA_VERSION
        )));
    }

    Ok(board)
}

/// Save a board document using atomic write.
///
/// Write-temp-rename: serializes to a temporary file in the same directory,
/// syncs to disk, then renames onto the target path, so the file on disk is
/// always either the old version or the new version, never partial.
pub fn save(path: &Path, board: &BoardFile) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Unavailable(format!(
            "cannot determine parent directory of {}",
            path.display()
        ))
    })?;

    fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(board)?;

    let temp_file = NamedTempFile::new_in(parent)?;
    fs::write(temp_file.path(), &json)?;

    // sync to disk before rename
    let file = fs::File::open(temp_file.path())?;
    file.sync_all()?;

    temp_file
        .persist(path)
        .map_err(|e| StoreError::Io(e.error))?;

    Ok(())
}

/// Generate the next sequential task id (`task-1`, `task-2`, …).
///
/// Scans existing ids for the highest numeric suffix and increments, so ids
/// stay unique even after tasks are deleted out from under the board.
pub fn generate_next_id(tasks: &[Task]) -> String {
    let max_num = tasks
        .iter()
        .filter_map(|task| {
            task.id
                .strip_prefix("task-")
                .and_then(|suffix| suffix.parse::<u64>().ok())
        })
        .max()
        .unwrap_or(0);

    format!("task-{}", max_num + 1)
}

// --- JsonBoardStore ---

/// File-backed store implementing the three collaborator traits.
///
/// Every call re-reads the board file, so concurrent readers always see a
/// complete document (saves are atomic). Cross-process write serialization
/// is the caller's job via the process lock — the store itself does not
/// lock.
pub struct JsonBoardStore {
    board_path: PathBuf,
    activity_path: PathBuf,
}

impl JsonBoardStore {
    pub fn new(board_path: &Path, activity_path: &Path) -> Self {
        JsonBoardStore {
            board_path: board_path.to_path_buf(),
            activity_path: activity_path.to_path_buf(),
        }
    }

    pub fn board_path(&self) -> &Path {
        &self.board_path
    }

    fn load_board(&self) -> Result<BoardFile, StoreError> {
        load(&self.board_path)
    }

    fn save_board(&self, board: &BoardFile) -> Result<(), StoreError> {
        save(&self.board_path, board)
    }
}

impl TaskStore for JsonBoardStore {
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.load_board()?.tasks)
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let board = self.load_board()?;
        Ok(board.tasks.into_iter().find(|t| t.id == id))
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut board = self.load_board()?;
        let existing = board
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| StoreError::NotFound(task.id.clone()))?;
        *existing = task.clone();
        self.save_board(&board)
    }

    fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut board = self.load_board()?;
        if board.tasks.iter().any(|t| t.id == task.id) {
            return Err(StoreError::Duplicate(task.id.clone()));
        }
        board.tasks.push(task.clone());
        self.save_board(&board)
    }
}

impl AgentStateStore for JsonBoardStore {
    fn get_agent_state(&self) -> Result<AgentState, StoreError> {
        Ok(self.load_board()?.agent)
    }

    fn update_agent_state(&self, state: &AgentState) -> Result<(), StoreError> {
        let mut board = self.load_board()?;
        board.agent = state.clone();
        self.save_board(&board)
    }
}

impl ActivityLog for JsonBoardStore {
    /// Append one JSON line per entry. Creates the file and parent
    /// directories if missing.
    fn append(&self, entry: &ActivityEntry) -> Result<(), StoreError> {
        if let Some(parent) = self.activity_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(entry)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.activity_path)?;

        writeln!(file, "{}", line)?;

        Ok(())
    }
}

/// Read the full activity log, oldest first. Blank lines are skipped.
pub fn read_activity_log(path: &Path) -> Result<Vec<ActivityEntry>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::Io(e)),
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(StoreError::Serde))
        .collect()
}
