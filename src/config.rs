//! Store configuration
//!
//! Reads from .taskmaster/store.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory that marks a TaskHero project root (like `.git`)
pub const TASKMASTER_DIR: &str = ".taskmaster";

/// Configuration file name inside the `.taskmaster` directory
pub const CONFIG_FILE: &str = "store.toml";

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct StoreConfig {
    /// Database file settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Backup directory and retention
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Database-related configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// File name of the store inside `.taskmaster/`
    /// Default: "taskhero.db"
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Explicit database path, overriding `file_name` (set from TASKHERO_DB_PATH)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// How long a caller waits on a locked database before failing
    /// Default: 5000
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// SQLite journal mode
    /// Default: "WAL"
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
}

/// Backup-related configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BackupConfig {
    /// Backup directory, relative to `.taskmaster/`
    /// Default: "backups"
    #[serde(default = "default_backup_directory")]
    pub directory: String,

    /// Number of snapshots kept by `cleanup`
    /// Default: 10
    #[serde(default = "default_max_kept")]
    pub max_kept: usize,
}

fn default_file_name() -> String {
    "taskhero.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_backup_directory() -> String {
    "backups".to_string()
}

fn default_max_kept() -> usize {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: default_backup_directory(),
            max_kept: default_max_kept(),
        }
    }
}

impl StoreConfig {
    /// Load config from `<root>/.taskmaster/store.toml`
    /// Returns default config if the file doesn't exist or doesn't parse
    pub fn load(project_root: &Path) -> Self {
        let path = taskmaster_dir(project_root).join(CONFIG_FILE);
        if let Ok(contents) = std::fs::read_to_string(&path) {
            match toml::from_str(&contents) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring malformed {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Database file for a project root
    pub fn db_path(&self, project_root: &Path) -> PathBuf {
        match &self.database.path {
            Some(path) => path.clone(),
            None => taskmaster_dir(project_root).join(&self.database.file_name),
        }
    }

    /// Backup directory for a database file (sibling of the file)
    pub fn backup_dir(&self, db_path: &Path) -> PathBuf {
        db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&self.backup.directory)
    }

    /// Journal mode to apply, falling back to WAL for unknown values
    pub fn journal_mode(&self) -> &str {
        let mode = self.database.journal_mode.as_str();
        if JOURNAL_MODES.iter().any(|m| m.eq_ignore_ascii_case(mode)) {
            mode
        } else {
            tracing::warn!("Unknown journal_mode '{}', using WAL", mode);
            "WAL"
        }
    }
}

/// `<root>/.taskmaster`
pub fn taskmaster_dir(project_root: &Path) -> PathBuf {
    project_root.join(TASKMASTER_DIR)
}

/// Walk up directory tree to find the folder holding `.taskmaster`
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(TASKMASTER_DIR).is_dir() {
            return Some(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return None,
        }
    }
}
