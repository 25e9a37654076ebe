//! TaskHero store - SQLite persistence for projects, PRDs, tasks and settings
//!
//! One database file per project root, under `.taskmaster/`. The store keeps
//! the task dependency graph acyclic, imports the legacy JSON files once, and
//! takes file-level snapshots.
//!
//! # Entities
//!
//! | Entity | Purpose |
//! |--------|---------|
//! | `Project` | Root owner; one per workspace |
//! | `Prd` | Requirement document with a lifecycle |
//! | `Task` | Work item; dotted identifiers ("3", "3.2") for subtasks |
//! | `TaskDependency` | "task depends on task" edge (`blocks`, `requires`, `related`) |
//! | `ConfigEntry` | Key/value setting, global or per project |
//!
//! # Quick Start
//!
//! ```no_run
//! use taskhero::{Database, Migrator, NewTask, NextTaskCriteria, StoreConfig};
//!
//! let root = std::path::Path::new("/path/to/project");
//! let db = Database::initialize(root, &StoreConfig::load(root)).unwrap();
//!
//! // Import legacy JSON, or create the project row on a fresh store
//! let report = Migrator::new(&db).run().unwrap();
//!
//! let task = db.tasks().create(&NewTask::new(report.project_id, "Write docs")).unwrap();
//! let next = db
//!     .tasks()
//!     .find_next_task(report.project_id, &NextTaskCriteria::default())
//!     .unwrap();
//! println!("created {}, next up: {:?}", task.identifier, next.map(|t| t.title));
//! ```
//!
//! The API is synchronous. Async callers should run it on a blocking pool.

pub mod backup;
pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod graph;
pub mod migrate;
pub mod models;
pub mod schema;

pub use backup::{BackupInfo, BackupManager, BackupType};
pub use config::{find_project_root, StoreConfig};
pub use dao::{
    ConfigDao, ConfigEntry, NewPrd, NewProject, NewTask, NextTaskCriteria, Prd, PrdDao, PrdFilter,
    PrdPatch, PrdTaskStats, Project, ProjectDao, ProjectPatch, Task, TaskDao, TaskDependency,
    TaskFilter, TaskPatch,
};
pub use db::{now_timestamp, Database, RunResult, SqlParam, Statement, TableCounts};
pub use error::{DbError, Result};
pub use migrate::{MigrationCounts, MigrationReport, MigrationState, Migrator};
pub use models::{
    ComplexityLevel, DependencyType, Metadata, Priority, PrdStatus, ProjectStatus, TaskStatus,
};
pub use schema::CURRENT_SCHEMA;
