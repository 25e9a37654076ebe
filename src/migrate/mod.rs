//! One-shot import of the legacy `.taskmaster/*.json` files.
//!
//! The migrator decides between three outcomes for a project root:
//!
//! - **AlreadyMigrated**: a project row for the root exists; nothing happens.
//! - **FreshInit**: no legacy files; the project row and default settings
//!   are created.
//! - **Migrated**: legacy files are parsed up front, copied aside into
//!   `backups/legacy-json-<timestamp>/`, and imported in a single
//!   transaction. Any failure rolls the whole import back; the JSON files
//!   are only ever read.

pub mod legacy;
pub mod mapping;

use crate::backup::{BackupManager, BackupType};
use crate::config::taskmaster_dir;
use crate::dao::{config, prd, project, task, NewProject, Task};
use crate::db::Database;
use crate::error::{DbError, Result};
use crate::models::DependencyType;
use chrono::Utc;
use diesel::sqlite::SqliteConnection;
use legacy::{LegacyFiles, LegacyTask};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    Migrated,
    AlreadyMigrated,
    FreshInit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCounts {
    pub defaults_seeded: usize,
    pub configurations: usize,
    pub prds: usize,
    pub tasks: usize,
    pub subtasks: usize,
    pub dependencies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub state: MigrationState,
    pub project_id: i32,
    pub counts: MigrationCounts,
    /// Copy of the legacy JSON files taken before importing
    pub legacy_backup: Option<PathBuf>,
    /// Store snapshot taken before importing into a non-empty store
    pub store_backup: Option<String>,
}

/// A task row waiting for its dependency edges.
struct PendingEdges {
    task_id: i32,
    identifier: String,
    parent_identifier: Option<String>,
    references: Vec<Value>,
}

pub struct Migrator<'a> {
    db: &'a Database,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn root_path(&self) -> String {
        self.db.project_root().to_string_lossy().into_owned()
    }

    fn project_name(&self, files: Option<&LegacyFiles>) -> String {
        let configured = files
            .and_then(|f| f.config.get(config::GLOBAL_SETTINGS))
            .and_then(|s| s.get("projectName").or_else(|| s.get("project_name")))
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty());
        match configured {
            Some(name) => name.trim().to_string(),
            None => self
                .db
                .project_root()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string()),
        }
    }

    pub fn run(&self) -> Result<MigrationReport> {
        let root_path = self.root_path();
        if let Some(existing) = self.db.projects().find_by_root_path(&root_path)? {
            tracing::info!("Project {} already in the store, nothing to migrate", root_path);
            return Ok(MigrationReport {
                state: MigrationState::AlreadyMigrated,
                project_id: existing.id,
                counts: MigrationCounts::default(),
                legacy_backup: None,
                store_backup: None,
            });
        }

        let legacy_dir = taskmaster_dir(self.db.project_root());
        match LegacyFiles::load(&legacy_dir)? {
            None => self.fresh_init(&root_path),
            Some(files) => self.migrate(&root_path, files),
        }
    }

    fn fresh_init(&self, root_path: &str) -> Result<MigrationReport> {
        let name = self.project_name(None);
        let (project_id, seeded) = self.db.with_transaction(|conn| {
            let project = project::insert(conn, &NewProject::new(name, root_path))?;
            let seeded = config::seed(conn, None)?;
            Ok((project.id, seeded))
        })?;
        tracing::info!("Initialized new store for {}", root_path);

        Ok(MigrationReport {
            state: MigrationState::FreshInit,
            project_id,
            counts: MigrationCounts {
                defaults_seeded: seeded,
                ..Default::default()
            },
            legacy_backup: None,
            store_backup: None,
        })
    }

    fn migrate(&self, root_path: &str, files: LegacyFiles) -> Result<MigrationReport> {
        tracing::info!(
            "Migrating {} legacy file(s): {} task(s), {} PRD(s), {} config section(s)",
            files.sources.len(),
            files.tasks.len(),
            files.prds.len(),
            files.config.len()
        );

        let counts = self.db.table_counts()?;
        let store_backup = if counts.projects + counts.tasks + counts.prds > 0 {
            Some(BackupManager::new(self.db).create_backup(BackupType::PreMigration)?.filename)
        } else {
            None
        };
        let legacy_backup = self.copy_legacy_files(&files)?;

        let name = self.project_name(Some(&files));
        let result = self.db.with_transaction(|conn| {
            let mut counts = MigrationCounts::default();
            let project = project::insert(conn, &NewProject::new(name, root_path))?;
            counts.defaults_seeded = config::seed(conn, None)?;

            for (section, entries) in &files.config {
                for (key, value) in entries {
                    config::write(conn, None, section, key, value, false, true)?;
                    counts.configurations += 1;
                }
            }

            let prd_ids = self.import_prds(conn, project.id, &files, &mut counts)?;

            let mut pending = Vec::new();
            for (position, legacy) in files.tasks.iter().enumerate() {
                let raw_id = if legacy.id.is_null() {
                    Value::from(position + 1)
                } else {
                    legacy.id.clone()
                };
                let identifier = mapping::normalize_identifier(&raw_id)?;
                import_task(
                    conn,
                    project.id,
                    legacy,
                    &identifier,
                    None,
                    &prd_ids,
                    &mut pending,
                    &mut counts,
                )?;
            }

            link_dependencies(conn, project.id, &pending, &mut counts)?;
            Ok((project.id, counts))
        });

        match result {
            Ok((project_id, counts)) => {
                tracing::info!(
                    "Migration complete: {} task(s), {} subtask(s), {} PRD(s), {} dependency edge(s)",
                    counts.tasks,
                    counts.subtasks,
                    counts.prds,
                    counts.dependencies
                );
                Ok(MigrationReport {
                    state: MigrationState::Migrated,
                    project_id,
                    counts,
                    legacy_backup: Some(legacy_backup),
                    store_backup,
                })
            }
            Err(e) => {
                tracing::error!("Migration rolled back: {}", e);
                Err(e)
            }
        }
    }

    fn copy_legacy_files(&self, files: &LegacyFiles) -> Result<PathBuf> {
        let dir = self
            .db
            .store_config()
            .backup_dir(self.db.db_path())
            .join(format!("legacy-json-{}", Utc::now().format("%Y%m%d-%H%M%S-%3f")));
        fs::create_dir_all(&dir)
            .map_err(|e| DbError::Migration(format!("Cannot create {}: {}", dir.display(), e)))?;

        for source in &files.sources {
            let Some(name) = source.file_name() else {
                continue;
            };
            fs::copy(source, dir.join(name)).map_err(|e| {
                DbError::Migration(format!("Cannot back up {}: {}", source.display(), e))
            })?;
        }
        tracing::debug!("Legacy files copied to {}", dir.display());
        Ok(dir)
    }

    /// Insert PRDs, returning legacy key -> row id for task linking.
    fn import_prds(
        &self,
        conn: &mut SqliteConnection,
        project_id: i32,
        files: &LegacyFiles,
        counts: &mut MigrationCounts,
    ) -> Result<HashMap<String, i32>> {
        let mut ids = HashMap::new();
        for (position, legacy) in files.prds.iter().enumerate() {
            let mut new = mapping::prd_to_new(legacy, project_id, position)?;
            if let Some(path) = self.prd_document(legacy.file_path.as_deref(), &new.file_name) {
                let bytes = fs::read(&path)?;
                new.file_hash = Some(content_hash(&bytes));
                new.file_size = Some(bytes.len() as i64);
                new.file_path.get_or_insert_with(|| path.to_string_lossy().into_owned());
            }
            let row = prd::insert(conn, &new)?;
            ids.insert(row.identifier.clone(), row.id);
            counts.prds += 1;
        }
        Ok(ids)
    }

    /// The PRD document on disk, if it can be found.
    fn prd_document(&self, file_path: Option<&str>, file_name: &str) -> Option<PathBuf> {
        let root = self.db.project_root();
        let candidates = [
            file_path.map(|p| resolve(root, p)),
            Some(taskmaster_dir(root).join("prds").join(file_name)),
            Some(taskmaster_dir(root).join("docs").join(file_name)),
        ];
        candidates.into_iter().flatten().find(|p| p.is_file())
    }
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Hex SHA-256 of a document body.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Insert a task and, recursively, its subtasks.
fn import_task(
    conn: &mut SqliteConnection,
    project_id: i32,
    legacy: &LegacyTask,
    identifier: &str,
    parent: Option<&Task>,
    prd_ids: &HashMap<String, i32>,
    pending: &mut Vec<PendingEdges>,
    counts: &mut MigrationCounts,
) -> Result<()> {
    let prd_id = match legacy.prd_id.as_ref().and_then(mapping::prd_key) {
        Some(key) => {
            let found = prd_ids.get(&key).copied();
            if found.is_none() {
                tracing::warn!("Task {} references unknown PRD '{}'", identifier, key);
            }
            found
        }
        None => parent.and_then(|p| p.prd_id),
    };

    let new = mapping::task_to_new(legacy, project_id, identifier, parent.map(|p| p.id), prd_id)?;
    let row = task::insert(conn, &new)?;
    if parent.is_some() {
        counts.subtasks += 1;
    } else {
        counts.tasks += 1;
    }

    if !legacy.dependencies.is_empty() {
        pending.push(PendingEdges {
            task_id: row.id,
            identifier: row.identifier.clone(),
            parent_identifier: parent.map(|p| p.identifier.clone()),
            references: legacy.dependencies.clone(),
        });
    }

    for (position, sub) in legacy.subtasks.iter().enumerate() {
        let raw_id = if sub.id.is_null() {
            Value::from(position + 1)
        } else {
            sub.id.clone()
        };
        let sub_identifier = mapping::resolve_dependency(&raw_id, Some(&row.identifier))?;
        import_task(
            conn,
            project_id,
            sub,
            &sub_identifier,
            Some(&row),
            prd_ids,
            pending,
            counts,
        )?;
    }
    Ok(())
}

/// Turn collected references into `blocks` edges once every task exists.
/// A dangling, self-referencing or cycle-closing reference fails the import.
fn link_dependencies(
    conn: &mut SqliteConnection,
    project_id: i32,
    pending: &[PendingEdges],
    counts: &mut MigrationCounts,
) -> Result<()> {
    let mut seen: HashSet<(i32, i32)> = HashSet::new();
    for entry in pending {
        for reference in &entry.references {
            let identifier = mapping::resolve_dependency(reference, entry.parent_identifier.as_deref())
                .map_err(|e| {
                    DbError::Migration(format!(
                        "Task {} has an unreadable dependency {}: {}",
                        entry.identifier, reference, e
                    ))
                })?;
            let target = task::find_by_identifier(conn, project_id, &identifier)?.ok_or_else(|| {
                DbError::Migration(format!(
                    "Task {} depends on missing task {}",
                    entry.identifier, identifier
                ))
            })?;
            if !seen.insert((entry.task_id, target.id)) {
                continue;
            }
            match task::add_dependency_on(conn, entry.task_id, target.id, DependencyType::Blocks) {
                Ok(_) => counts.dependencies += 1,
                Err(DbError::DependencyCycle { .. }) => {
                    return Err(DbError::Migration(format!(
                        "Dependency of task {} on task {} would create a cycle",
                        entry.identifier, identifier
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::TaskStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_legacy(root: &Path, name: &str, value: &Value) {
        let dir = taskmaster_dir(root);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn sample_tasks() -> Value {
        json!({"tasks": [
            {"id": 1, "title": "Set up repo", "status": "done", "priority": "high"},
            {"id": 2, "title": "Build API", "status": "in_progress", "dependencies": [1],
             "prdId": "prd_001",
             "subtasks": [
                {"id": 1, "title": "Routes", "completed": true},
                {"id": 2, "title": "Handlers", "dependencies": [1]}
             ]},
            {"id": "task_003", "title": "Ship", "dependencies": ["2", 1]}
        ]})
    }

    #[test]
    fn test_fresh_init() {
        let tmp = TempDir::new().unwrap();
        let db = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();
        let report = Migrator::new(&db).run().unwrap();

        assert_eq!(report.state, MigrationState::FreshInit);
        assert!(report.counts.defaults_seeded > 0);
        let counts = db.table_counts().unwrap();
        assert_eq!(counts.projects, 1);
        assert_eq!(counts.tasks, 0);
        assert!(counts.configurations > 0);
    }

    #[test]
    fn test_migrates_legacy_files() {
        let tmp = TempDir::new().unwrap();
        write_legacy(tmp.path(), legacy::TASKS_FILE, &sample_tasks());
        write_legacy(
            tmp.path(),
            legacy::PRDS_FILE,
            &json!({"prds": [{"id": "prd_001", "title": "API", "fileName": "api.md"}]}),
        );
        write_legacy(
            tmp.path(),
            legacy::CONFIG_FILE,
            &json!({"models": {"main": {"provider": "openai"}}, "global": {"projectName": "Demo"}}),
        );
        fs::create_dir_all(taskmaster_dir(tmp.path()).join("prds")).unwrap();
        fs::write(taskmaster_dir(tmp.path()).join("prds").join("api.md"), "# API").unwrap();

        let db = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();
        let report = Migrator::new(&db).run().unwrap();

        assert_eq!(report.state, MigrationState::Migrated);
        assert_eq!(report.counts.tasks, 3);
        assert_eq!(report.counts.subtasks, 2);
        assert_eq!(report.counts.prds, 1);
        assert_eq!(report.counts.dependencies, 4);
        assert!(report.legacy_backup.unwrap().join(legacy::TASKS_FILE).exists());

        let project = db.projects().get(report.project_id).unwrap().unwrap();
        assert_eq!(project.name, "Demo");

        let p = report.project_id;
        let api = db.tasks().get_by_identifier(p, "2").unwrap().unwrap();
        assert_eq!(api.status, TaskStatus::InProgress);
        let routes = db.tasks().get_by_identifier(p, "2.1").unwrap().unwrap();
        assert_eq!(routes.status, TaskStatus::Done);
        assert_eq!(routes.parent_task_id, Some(api.id));
        assert_eq!(routes.prd_id, api.prd_id);

        let handlers = db.tasks().get_by_identifier(p, "2.2").unwrap().unwrap();
        let deps = db.tasks().dependencies_of(handlers.id).unwrap();
        assert_eq!(deps[0].depends_on_task_id, routes.id);

        let prd = db.prds().get_by_identifier(p, "prd_001").unwrap().unwrap();
        assert_eq!(prd.file_hash.as_deref(), Some(content_hash(b"# API").as_str()));
        assert_eq!(db.prds().linked_tasks(prd.id).unwrap().len(), 3);

        let main: Value = db.config().get_value("ai_models", "main").unwrap().unwrap();
        assert_eq!(main["provider"], "openai");
    }

    #[test]
    fn test_second_run_is_already_migrated() {
        let tmp = TempDir::new().unwrap();
        write_legacy(tmp.path(), legacy::TASKS_FILE, &sample_tasks());
        let db = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();

        let first = Migrator::new(&db).run().unwrap();
        let before = db.table_counts().unwrap();
        let second = Migrator::new(&db).run().unwrap();

        assert_eq!(second.state, MigrationState::AlreadyMigrated);
        assert_eq!(second.project_id, first.project_id);
        assert_eq!(db.table_counts().unwrap(), before);
    }

    #[test]
    fn test_relative_and_absolute_roots_match() {
        let tmp = TempDir::new().unwrap();
        write_legacy(tmp.path(), legacy::TASKS_FILE, &sample_tasks());
        let config = StoreConfig::default();
        let first = {
            let db = Database::initialize(tmp.path(), &config).unwrap();
            Migrator::new(&db).run().unwrap()
        };

        let dotted = tmp.path().join(".").join(crate::config::TASKMASTER_DIR).join("..");
        let db = Database::initialize(&dotted, &config).unwrap();
        let second = Migrator::new(&db).run().unwrap();
        assert_eq!(second.state, MigrationState::AlreadyMigrated);
        assert_eq!(second.project_id, first.project_id);
        assert_eq!(db.table_counts().unwrap().projects, 1);
    }

    #[test]
    fn test_failure_rolls_back_everything() {
        let tmp = TempDir::new().unwrap();
        let broken = json!({"tasks": [
            {"id": 1, "title": "fine"},
            {"id": 2, "title": "parent", "subtasks": [{"id": 1, "title": "   "}]}
        ]});
        write_legacy(tmp.path(), legacy::TASKS_FILE, &broken);
        let tasks_path = taskmaster_dir(tmp.path()).join(legacy::TASKS_FILE);
        let original = fs::read_to_string(&tasks_path).unwrap();

        let db = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();
        let err = Migrator::new(&db).run().unwrap_err();
        assert!(matches!(err, DbError::Migration(_)));

        let counts = db.table_counts().unwrap();
        assert_eq!(counts.projects, 0);
        assert_eq!(counts.tasks, 0);
        assert_eq!(counts.configurations, 0);
        assert_eq!(fs::read_to_string(&tasks_path).unwrap(), original);
    }

    fn assert_rolled_back(root: &Path, tasks: Value, needle: &str) {
        write_legacy(root, legacy::TASKS_FILE, &tasks);
        let db = Database::initialize(root, &StoreConfig::default()).unwrap();
        match Migrator::new(&db).run().unwrap_err() {
            DbError::Migration(message) => {
                assert!(message.contains(needle), "unexpected message: {message}")
            }
            other => panic!("expected migration error, got {other:?}"),
        }
        let counts = db.table_counts().unwrap();
        assert_eq!(counts.projects, 0);
        assert_eq!(counts.tasks, 0);
        assert_eq!(counts.task_dependencies, 0);
    }

    #[test]
    fn test_cyclic_legacy_dependencies_roll_back() {
        let tmp = TempDir::new().unwrap();
        assert_rolled_back(
            tmp.path(),
            json!([
                {"id": 1, "title": "a", "dependencies": [2]},
                {"id": 2, "title": "b", "dependencies": [1]},
                {"id": 3, "title": "c"}
            ]),
            "cycle",
        );
    }

    #[test]
    fn test_self_dependency_rolls_back() {
        let tmp = TempDir::new().unwrap();
        assert_rolled_back(
            tmp.path(),
            json!([{"id": 1, "title": "a", "dependencies": [1]}]),
            "cycle",
        );
    }

    #[test]
    fn test_dangling_dependency_rolls_back() {
        let tmp = TempDir::new().unwrap();
        assert_rolled_back(
            tmp.path(),
            json!([
                {"id": 1, "title": "a"},
                {"id": 3, "title": "c", "dependencies": [1, 42]}
            ]),
            "missing task 42",
        );
    }
}
