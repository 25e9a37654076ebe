//! File-level snapshots of the store.
//!
//! A snapshot is a copy of the database file taken after a WAL checkpoint,
//! named `taskhero-<type>-<YYYYmmdd-HHMMSS-mmm>.db`, with a `.meta.json`
//! sidecar describing it. Restore swaps the live file under a closed
//! connection and reopens.

use crate::db::{Database, TableCounts};
use crate::error::{DbError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const PREFIX: &str = "taskhero-";
const EXTENSION: &str = "db";
const SIDECAR_EXTENSION: &str = "meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupType {
    Manual,
    Scheduled,
    PreMigration,
    PreRestore,
}

impl BackupType {
    pub const ALL: &'static [BackupType] = &[
        BackupType::Manual,
        BackupType::Scheduled,
        BackupType::PreMigration,
        BackupType::PreRestore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Manual => "manual",
            BackupType::Scheduled => "scheduled",
            BackupType::PreMigration => "pre-migration",
            BackupType::PreRestore => "pre-restore",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        BackupType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DbError::Backup(format!("Unknown backup type '{}'", s)))
    }
}

/// One snapshot on disk; this is also the sidecar's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub backup_type: BackupType,
    pub created_at: String,
    pub size_bytes: u64,
    /// Absent when rebuilt from a snapshot without a sidecar
    #[serde(default)]
    pub row_counts: Option<TableCounts>,
}

pub struct BackupManager<'a> {
    db: &'a Database,
    dir: PathBuf,
}

impl<'a> BackupManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        let dir = db.store_config().backup_dir(db.db_path());
        Self { db, dir }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the live database into a new snapshot.
    pub fn create_backup(&self, backup_type: BackupType) -> Result<BackupInfo> {
        self.create_backup_inner(backup_type).map_err(|e| {
            tracing::error!("Backup ({}) failed: {}", backup_type, e);
            e
        })
    }

    fn create_backup_inner(&self, backup_type: BackupType) -> Result<BackupInfo> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| DbError::Backup(format!("Cannot create {}: {}", self.dir.display(), e)))?;

        self.db.checkpoint()?;
        let row_counts = self.db.table_counts()?;

        let (filename, created) = self.unused_name(backup_type);
        let target = self.dir.join(&filename);
        let size_bytes = fs::copy(self.db.db_path(), &target).map_err(|e| {
            DbError::Backup(format!(
                "Cannot copy {} to {}: {}",
                self.db.db_path().display(),
                target.display(),
                e
            ))
        })?;

        let info = BackupInfo {
            filename,
            backup_type,
            created_at: created.to_rfc3339_opts(SecondsFormat::Millis, true),
            size_bytes,
            row_counts: Some(row_counts),
        };
        fs::write(sidecar_path(&target), serde_json::to_string_pretty(&info)?)?;

        tracing::info!("Created {} backup {}", backup_type, info.filename);
        Ok(info)
    }

    /// A filename no existing snapshot uses; waits out a millisecond collision.
    fn unused_name(&self, backup_type: BackupType) -> (String, DateTime<Utc>) {
        loop {
            let now = Utc::now();
            let filename = format!(
                "{}{}-{}.{}",
                PREFIX,
                backup_type,
                now.format("%Y%m%d-%H%M%S-%3f"),
                EXTENSION
            );
            if !self.dir.join(&filename).exists() {
                return (filename, now);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Every snapshot in the backup directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_snapshot_name(name) {
                continue;
            }
            match read_info(&path, name) {
                Ok(info) => backups.push(info),
                Err(e) => tracing::warn!("Skipping unreadable backup {}: {}", name, e),
            }
        }
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(backups)
    }

    /// Replace the live database with a snapshot. A `pre-restore` snapshot is
    /// taken first and put back if the swap fails. Returns that safety snapshot.
    pub fn restore_backup(&self, filename: &str) -> Result<BackupInfo> {
        if Path::new(filename).file_name().and_then(|n| n.to_str()) != Some(filename) {
            return Err(DbError::Restore(format!("Invalid backup name '{}'", filename)));
        }
        let source = self.dir.join(filename);
        if !source.is_file() {
            tracing::error!("Restore failed: {} does not exist", source.display());
            return Err(DbError::Restore(format!("Backup '{}' not found", filename)));
        }

        let safety = self.create_backup(BackupType::PreRestore)?;
        let live = self.db.db_path().to_path_buf();

        self.db.close();
        remove_journal_files(&live);

        let swapped = fs::copy(&source, &live)
            .map_err(|e| DbError::Restore(format!("Cannot copy {}: {}", filename, e)))
            .and_then(|_| self.db.reopen());

        if let Err(e) = swapped {
            tracing::error!("Restore of {} failed, rolling back: {}", filename, e);
            self.db.close();
            remove_journal_files(&live);
            fs::copy(self.dir.join(&safety.filename), &live).map_err(|copy_err| {
                DbError::Restore(format!(
                    "Restore failed ({}) and rollback failed: {}",
                    e, copy_err
                ))
            })?;
            self.db.reopen()?;
            return Err(DbError::Restore(format!("Restore of '{}' failed: {}", filename, e)));
        }

        tracing::info!("Restored {} (previous state saved as {})", filename, safety.filename);
        Ok(safety)
    }

    /// Delete all but the newest `max_kept` snapshots. Returns the removed names.
    pub fn cleanup_old_backups(&self, max_kept: usize) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for info in self.list_backups()?.into_iter().skip(max_kept) {
            let path = self.dir.join(&info.filename);
            fs::remove_file(&path).map_err(|e| {
                tracing::error!("Cannot remove {}: {}", path.display(), e);
                DbError::Backup(format!("Cannot remove {}: {}", info.filename, e))
            })?;
            let sidecar = sidecar_path(&path);
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
            removed.push(info.filename);
        }
        if !removed.is_empty() {
            tracing::info!("Removed {} old backup(s)", removed.len());
        }
        Ok(removed)
    }
}

fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(PREFIX) && name.ends_with(".db")
}

fn sidecar_path(snapshot: &Path) -> PathBuf {
    snapshot.with_extension(SIDECAR_EXTENSION)
}

fn remove_journal_files(db_path: &Path) {
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        let path = PathBuf::from(name);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("Cannot remove {}: {}", path.display(), e);
            }
        }
    }
}

/// Sidecar contents, or whatever the file itself tells us when there is none.
fn read_info(path: &Path, name: &str) -> Result<BackupInfo> {
    let sidecar = sidecar_path(path);
    if sidecar.is_file() {
        let raw = fs::read_to_string(&sidecar)?;
        match serde_json::from_str::<BackupInfo>(&raw) {
            Ok(info) => return Ok(info),
            Err(e) => tracing::warn!("Ignoring malformed {}: {}", sidecar.display(), e),
        }
    }

    let meta = fs::metadata(path)?;
    let modified: DateTime<Utc> = meta.modified()?.into();
    Ok(BackupInfo {
        filename: name.to_string(),
        backup_type: type_from_name(name).unwrap_or(BackupType::Manual),
        created_at: modified.to_rfc3339_opts(SecondsFormat::Millis, true),
        size_bytes: meta.len(),
        row_counts: None,
    })
}

fn type_from_name(name: &str) -> Option<BackupType> {
    let rest = name.strip_prefix(PREFIX)?;
    // longest first so "pre-restore" never matches a shorter type
    let mut types = BackupType::ALL.to_vec();
    types.sort_by_key(|t| std::cmp::Reverse(t.as_str().len()));
    types
        .into_iter()
        .find(|t| rest.starts_with(&format!("{}-", t.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::NewProject;
    use crate::db::tests::test_db;

    #[test]
    fn test_create_writes_snapshot_and_sidecar() {
        let (_tmp, db) = test_db();
        db.projects().create(&NewProject::new("p", "/p")).unwrap();
        let manager = BackupManager::new(&db);

        let info = manager.create_backup(BackupType::Manual).unwrap();
        assert!(info.filename.starts_with("taskhero-manual-"));
        assert!(info.size_bytes > 0);
        assert_eq!(info.row_counts.unwrap().projects, 1);

        let snapshot = manager.backup_dir().join(&info.filename);
        assert!(snapshot.exists());
        assert!(sidecar_path(&snapshot).exists());
        assert_eq!(manager.list_backups().unwrap(), vec![info]);
    }

    #[test]
    fn test_restore_round_trip() {
        let (_tmp, db) = test_db();
        db.projects().create(&NewProject::new("before", "/before")).unwrap();
        let manager = BackupManager::new(&db);
        let snapshot = manager.create_backup(BackupType::Manual).unwrap();

        db.projects().create(&NewProject::new("after", "/after")).unwrap();
        assert_eq!(db.table_counts().unwrap().projects, 2);

        let safety = manager.restore_backup(&snapshot.filename).unwrap();
        assert_eq!(safety.backup_type, BackupType::PreRestore);
        assert_eq!(safety.row_counts.unwrap().projects, 2);
        assert!(db.is_open());
        assert_eq!(db.table_counts().unwrap().projects, 1);
        assert!(db.projects().find_by_root_path("/after").unwrap().is_none());
    }

    #[test]
    fn test_restore_missing_or_bad_snapshot() {
        let (_tmp, db) = test_db();
        let manager = BackupManager::new(&db);
        assert!(matches!(
            manager.restore_backup("taskhero-manual-nope.db"),
            Err(DbError::Restore(_))
        ));
        assert!(matches!(
            manager.restore_backup("../taskhero.db"),
            Err(DbError::Restore(_))
        ));

        db.projects().create(&NewProject::new("keep", "/keep")).unwrap();
        fs::create_dir_all(manager.backup_dir()).unwrap();
        fs::write(
            manager.backup_dir().join("taskhero-manual-garbage.db"),
            "definitely not sqlite",
        )
        .unwrap();
        assert!(matches!(
            manager.restore_backup("taskhero-manual-garbage.db"),
            Err(DbError::Restore(_))
        ));
        assert!(db.is_open());
        assert_eq!(db.table_counts().unwrap().projects, 1);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let (_tmp, db) = test_db();
        let manager = BackupManager::new(&db);
        let created: Vec<BackupInfo> = (0..4)
            .map(|_| manager.create_backup(BackupType::Scheduled).unwrap())
            .collect();

        let removed = manager.cleanup_old_backups(2).unwrap();
        assert_eq!(removed, vec![created[1].filename.clone(), created[0].filename.clone()]);

        let kept: Vec<String> = manager
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.filename)
            .collect();
        assert_eq!(kept, vec![created[3].filename.clone(), created[2].filename.clone()]);
        assert!(manager.cleanup_old_backups(5).unwrap().is_empty());
    }

    #[test]
    fn test_listing_without_sidecar_falls_back_to_file() {
        let (_tmp, db) = test_db();
        let manager = BackupManager::new(&db);
        let info = manager.create_backup(BackupType::PreMigration).unwrap();
        fs::remove_file(sidecar_path(&manager.backup_dir().join(&info.filename))).unwrap();

        let listed = manager.list_backups().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].backup_type, BackupType::PreMigration);
        assert_eq!(listed[0].size_bytes, info.size_bytes);
        assert!(listed[0].row_counts.is_none());
    }

    #[test]
    fn test_backup_type_text() {
        assert_eq!("pre-restore".parse::<BackupType>().unwrap(), BackupType::PreRestore);
        assert_eq!(type_from_name("taskhero-pre-migration-20260101-000000-000.db"), Some(BackupType::PreMigration));
        assert!("weekly".parse::<BackupType>().is_err());
    }
}
