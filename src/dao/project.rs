//! Projects: the root owner of every PRD, task and scoped configuration row.

use crate::db::{now_timestamp, Database};
use crate::error::{DbError, Result};
use crate::models::{decode_metadata, encode_json, Metadata, ProjectStatus};
use crate::schema::projects;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

/// Queryable project row
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = projects)]
struct ProjectRow {
    id: i32,
    name: String,
    description: Option<String>,
    root_path: String,
    status: ProjectStatus,
    metadata: String,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub root_path: String,
    pub status: ProjectStatus,
    pub metadata: Metadata,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DbError;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let metadata = decode_metadata(&row.metadata, &format!("project {}", row.id))?;
        Ok(Project {
            id: row.id,
            name: row.name,
            description: row.description,
            root_path: row.root_path,
            status: row.status,
            metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub root_path: String,
    pub metadata: Metadata,
}

impl NewProject {
    pub fn new(name: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root_path: root_path.into(),
            ..Default::default()
        }
    }
}

/// Insertable project
#[derive(Insertable)]
#[diesel(table_name = projects)]
struct ProjectInsert<'a> {
    name: &'a str,
    description: Option<&'a str>,
    root_path: &'a str,
    status: ProjectStatus,
    metadata: &'a str,
    created_at: &'a str,
    updated_at: &'a str,
}

/// Fields to change; `None` leaves a column alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    pub metadata: Option<Metadata>,
}

#[derive(AsChangeset)]
#[diesel(table_name = projects)]
struct ProjectChanges {
    name: Option<String>,
    description: Option<Option<String>>,
    status: Option<ProjectStatus>,
    metadata: Option<String>,
    updated_at: String,
}

// ============================================================================
// Connection-level operations
// ============================================================================

pub(crate) fn insert(conn: &mut SqliteConnection, new: &NewProject) -> Result<Project> {
    if new.name.trim().is_empty() {
        return Err(DbError::Validation("Project name must not be empty".to_string()));
    }
    let now = now_timestamp();
    let metadata = encode_json(&new.metadata)?;

    diesel::insert_into(projects::table)
        .values(&ProjectInsert {
            name: &new.name,
            description: new.description.as_deref(),
            root_path: &new.root_path,
            status: ProjectStatus::Active,
            metadata: &metadata,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)
        .map_err(|e| DbError::query("insert projects", e))?;

    let id = crate::db::inserted_key(conn)?;
    find(conn, id)?.ok_or_else(|| DbError::not_found("Project", id))
}

pub(crate) fn find(conn: &mut SqliteConnection, id: i32) -> Result<Option<Project>> {
    projects::table
        .find(id)
        .select(ProjectRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select projects by id", e))?
        .map(Project::try_from)
        .transpose()
}

pub(crate) fn find_by_root(conn: &mut SqliteConnection, root_path: &str) -> Result<Option<Project>> {
    projects::table
        .filter(projects::root_path.eq(root_path))
        .select(ProjectRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select projects by root_path", e))?
        .map(Project::try_from)
        .transpose()
}

pub(crate) fn apply_patch(conn: &mut SqliteConnection, id: i32, patch: &ProjectPatch) -> Result<Project> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(DbError::Validation("Project name must not be empty".to_string()));
        }
    }
    let changes = ProjectChanges {
        name: patch.name.clone(),
        description: patch.description.clone(),
        status: patch.status,
        metadata: patch.metadata.as_ref().map(encode_json).transpose()?,
        updated_at: now_timestamp(),
    };

    let updated = diesel::update(projects::table.find(id))
        .set(&changes)
        .execute(conn)
        .map_err(|e| DbError::query("update projects", e))?;
    if updated == 0 {
        return Err(DbError::not_found("Project", id));
    }
    find(conn, id)?.ok_or_else(|| DbError::not_found("Project", id))
}

// ============================================================================
// DAO
// ============================================================================

pub struct ProjectDao<'a> {
    db: &'a Database,
}

impl<'a> ProjectDao<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, new: &NewProject) -> Result<Project> {
        self.db.with_transaction(|conn| insert(conn, new))
    }

    pub fn get(&self, id: i32) -> Result<Option<Project>> {
        self.db.with_conn(|conn| find(conn, id))
    }

    /// Used to tell whether a project root is already initialized.
    pub fn find_by_root_path(&self, root_path: &str) -> Result<Option<Project>> {
        self.db.with_conn(|conn| find_by_root(conn, root_path))
    }

    pub fn list(&self, include_deleted: bool) -> Result<Vec<Project>> {
        self.db.with_conn(|conn| {
            let mut query = projects::table
                .select(ProjectRow::as_select())
                .order(projects::id.asc())
                .into_boxed();
            if !include_deleted {
                query = query.filter(projects::status.ne(ProjectStatus::Deleted));
            }
            query
                .load::<ProjectRow>(conn)
                .map_err(|e| DbError::query("select projects", e))?
                .into_iter()
                .map(Project::try_from)
                .collect()
        })
    }

    pub fn update(&self, id: i32, patch: &ProjectPatch) -> Result<Project> {
        self.db.with_transaction(|conn| apply_patch(conn, id, patch))
    }

    /// Soft lifecycle transition; `Deleted` keeps the row and its children.
    pub fn set_status(&self, id: i32, status: ProjectStatus) -> Result<Project> {
        self.update(
            id,
            &ProjectPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Hard delete. Tasks, PRDs, dependencies and project-scoped configuration
    /// go with it through ON DELETE CASCADE.
    pub fn purge(&self, id: i32) -> Result<()> {
        let deleted = self.db.with_transaction(|conn| {
            diesel::delete(projects::table.find(id))
                .execute(conn)
                .map_err(|e| DbError::query("delete projects", e))
        })?;
        if deleted == 0 {
            return Err(DbError::not_found("Project", id));
        }
        tracing::info!("Purged project {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_db;

    #[test]
    fn test_create_and_find_by_root() {
        let (_tmp, db) = test_db();
        let mut new = NewProject::new("TaskHero", "/work/taskhero");
        new.metadata.insert("origin".into(), serde_json::json!("cli"));
        let project = db.projects().create(&new).unwrap();

        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.metadata["origin"], "cli");

        let found = db.projects().find_by_root_path("/work/taskhero").unwrap().unwrap();
        assert_eq!(found, project);
        assert!(db.projects().find_by_root_path("/elsewhere").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_root_path_is_constraint_violation() {
        let (_tmp, db) = test_db();
        db.projects().create(&NewProject::new("a", "/same")).unwrap();
        let err = db.projects().create(&NewProject::new("b", "/same")).unwrap_err();
        match err {
            DbError::ConstraintViolation { constraint, .. } => {
                assert!(constraint.contains("projects.root_path"))
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_update_and_soft_delete() {
        let (_tmp, db) = test_db();
        let project = db.projects().create(&NewProject::new("a", "/a")).unwrap();

        let renamed = db
            .projects()
            .update(
                project.id,
                &ProjectPatch {
                    name: Some("renamed".into()),
                    description: Some(Some("desc".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.name, "renamed");
        assert_eq!(renamed.description.as_deref(), Some("desc"));

        db.projects().set_status(project.id, ProjectStatus::Deleted).unwrap();
        assert!(db.projects().list(false).unwrap().is_empty());
        assert_eq!(db.projects().list(true).unwrap().len(), 1);
        assert!(db.projects().get(project.id).unwrap().is_some());
    }

    #[test]
    fn test_update_missing_project_is_not_found() {
        let (_tmp, db) = test_db();
        let err = db
            .projects()
            .update(7, &ProjectPatch { name: Some("x".into()), ..Default::default() })
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(db.projects().purge(7).unwrap_err().is_not_found());
    }
}
