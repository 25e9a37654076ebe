//! Entity access objects.
//!
//! Each DAO is a cheap borrowed handle over [`Database`]; get one with
//! `db.projects()`, `db.tasks()`, `db.prds()` or `db.config()`. The
//! connection-level functions behind them are crate-visible so the migration
//! engine can compose several entity writes inside one transaction.

pub mod config;
pub mod prd;
pub mod project;
pub mod task;

pub use config::{ConfigDao, ConfigEntry};
pub use prd::{NewPrd, Prd, PrdDao, PrdFilter, PrdPatch, PrdTaskStats};
pub use project::{NewProject, Project, ProjectDao, ProjectPatch};
pub use task::{
    NewTask, NextTaskCriteria, Task, TaskDao, TaskDependency, TaskFilter, TaskPatch,
};

use crate::db::Database;

impl Database {
    pub fn projects(&self) -> ProjectDao<'_> {
        ProjectDao::new(self)
    }

    pub fn tasks(&self) -> TaskDao<'_> {
        TaskDao::new(self)
    }

    pub fn prds(&self) -> PrdDao<'_> {
        PrdDao::new(self)
    }

    /// Global configuration (rows with no project).
    pub fn config(&self) -> ConfigDao<'_> {
        ConfigDao::global(self)
    }

    /// Configuration scoped to one project; removed with the project.
    pub fn project_config(&self, project_id: i32) -> ConfigDao<'_> {
        ConfigDao::for_project(self, project_id)
    }
}

/// Clamp user-supplied paging to sane bounds.
pub(crate) fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    const MAX_LIMIT: i64 = 10_000;
    let limit = limit.unwrap_or(MAX_LIMIT).clamp(0, MAX_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// `%term%` for LIKE, with the LIKE wildcards in the term escaped by `\`.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (10_000, 0));
        assert_eq!(page_bounds(Some(5), Some(10)), (5, 10));
        assert_eq!(page_bounds(Some(-1), Some(-3)), (0, 0));
        assert_eq!(page_bounds(Some(1_000_000), None), (10_000, 0));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("auth"), "%auth%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
