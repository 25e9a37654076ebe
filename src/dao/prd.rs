//! PRDs: requirement documents, their lifecycle and live task statistics.

use crate::dao::{like_pattern, page_bounds};
use crate::db::{inserted_key, now_timestamp, Database};
use crate::error::{DbError, Result};
use crate::models::{
    decode_metadata, decode_tags, encode_json, ComplexityLevel, Metadata, Priority, PrdStatus,
    TaskStatus,
};
use crate::dao::task::{self, Task, TaskFilter};
use crate::schema::{prds, tasks};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};

/// Queryable PRD row
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = prds)]
struct PrdRow {
    id: i32,
    project_id: i32,
    identifier: String,
    title: String,
    file_name: String,
    file_path: Option<String>,
    file_hash: Option<String>,
    file_size: Option<i64>,
    status: PrdStatus,
    complexity: ComplexityLevel,
    priority: Priority,
    description: Option<String>,
    tags: String,
    estimated_effort: Option<String>,
    created_at: String,
    updated_at: String,
    last_parsed_at: Option<String>,
    metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prd {
    pub id: i32,
    pub project_id: i32,
    pub identifier: String,
    pub title: String,
    pub file_name: String,
    pub file_path: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<i64>,
    pub status: PrdStatus,
    pub complexity: ComplexityLevel,
    pub priority: Priority,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub estimated_effort: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub last_parsed_at: Option<String>,
    pub metadata: Metadata,
}

impl TryFrom<PrdRow> for Prd {
    type Error = DbError;

    fn try_from(row: PrdRow) -> Result<Self> {
        let owner = format!("PRD {}", row.id);
        Ok(Prd {
            tags: decode_tags(&row.tags, &owner)?,
            metadata: decode_metadata(&row.metadata, &owner)?,
            id: row.id,
            project_id: row.project_id,
            identifier: row.identifier,
            title: row.title,
            file_name: row.file_name,
            file_path: row.file_path,
            file_hash: row.file_hash,
            file_size: row.file_size,
            status: row.status,
            complexity: row.complexity,
            priority: row.priority,
            description: row.description,
            estimated_effort: row.estimated_effort,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_parsed_at: row.last_parsed_at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPrd {
    pub project_id: i32,
    /// Defaults to the next free `prd_NNN`.
    pub identifier: Option<String>,
    pub title: String,
    pub file_name: String,
    pub file_path: Option<String>,
    pub file_hash: Option<String>,
    pub file_size: Option<i64>,
    pub status: PrdStatus,
    pub complexity: ComplexityLevel,
    pub priority: Priority,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub estimated_effort: Option<String>,
    pub last_parsed_at: Option<String>,
    pub metadata: Metadata,
}

impl NewPrd {
    pub fn new(project_id: i32, title: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = prds)]
struct PrdInsert<'a> {
    project_id: i32,
    identifier: &'a str,
    title: &'a str,
    file_name: &'a str,
    file_path: Option<&'a str>,
    file_hash: Option<&'a str>,
    file_size: Option<i64>,
    status: PrdStatus,
    complexity: ComplexityLevel,
    priority: Priority,
    description: Option<&'a str>,
    tags: &'a str,
    estimated_effort: Option<&'a str>,
    created_at: &'a str,
    updated_at: &'a str,
    last_parsed_at: Option<&'a str>,
    metadata: &'a str,
}

/// Fields to change; `None` leaves a column alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrdPatch {
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<Option<String>>,
    pub file_hash: Option<Option<String>>,
    pub file_size: Option<Option<i64>>,
    pub status: Option<PrdStatus>,
    pub complexity: Option<ComplexityLevel>,
    pub priority: Option<Priority>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub estimated_effort: Option<Option<String>>,
    pub last_parsed_at: Option<Option<String>>,
    pub metadata: Option<Metadata>,
}

#[derive(AsChangeset)]
#[diesel(table_name = prds)]
struct PrdChanges {
    title: Option<String>,
    file_name: Option<String>,
    file_path: Option<Option<String>>,
    file_hash: Option<Option<String>>,
    file_size: Option<Option<i64>>,
    status: Option<PrdStatus>,
    complexity: Option<ComplexityLevel>,
    priority: Option<Priority>,
    description: Option<Option<String>>,
    tags: Option<String>,
    estimated_effort: Option<Option<String>>,
    last_parsed_at: Option<Option<String>>,
    metadata: Option<String>,
    updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrdFilter {
    pub project_id: Option<i32>,
    pub status: Option<PrdStatus>,
    pub priority: Option<Priority>,
    pub complexity: Option<ComplexityLevel>,
    /// Exact tag match
    pub tag: Option<String>,
    /// Case-insensitive match on title, description or file name
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Task progress of one PRD, aggregated from `tasks` at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrdTaskStats {
    pub prd_id: i32,
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub done: i64,
    pub review: i64,
    pub blocked: i64,
    pub deferred: i64,
    pub cancelled: i64,
    /// 0.0 when the PRD has no tasks
    pub completion_percentage: f64,
}

impl PrdTaskStats {
    fn from_counts(prd_id: i32, counts: &[(TaskStatus, i64)]) -> Self {
        let mut stats = PrdTaskStats {
            prd_id,
            ..Default::default()
        };
        for &(status, n) in counts {
            stats.total += n;
            let slot = match status {
                TaskStatus::Pending => &mut stats.pending,
                TaskStatus::InProgress => &mut stats.in_progress,
                TaskStatus::Done => &mut stats.done,
                TaskStatus::Review => &mut stats.review,
                TaskStatus::Blocked => &mut stats.blocked,
                TaskStatus::Deferred => &mut stats.deferred,
                TaskStatus::Cancelled => &mut stats.cancelled,
            };
            *slot += n;
        }
        if stats.total > 0 {
            stats.completion_percentage = stats.done as f64 * 100.0 / stats.total as f64;
        }
        stats
    }

    pub fn incomplete(&self) -> i64 {
        self.total - self.done
    }
}

// ============================================================================
// Connection-level operations
// ============================================================================

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DbError::Validation("PRD title must not be empty".to_string()));
    }
    Ok(())
}

/// Next `prd_NNN` not yet used in the project.
fn next_identifier(conn: &mut SqliteConnection, project_id: i32) -> Result<String> {
    let existing: Vec<String> = prds::table
        .filter(prds::project_id.eq(project_id))
        .select(prds::identifier)
        .load(conn)
        .map_err(|e| DbError::query("select prd identifiers", e))?;
    let highest = existing
        .iter()
        .filter_map(|ident| ident.strip_prefix("prd_"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    Ok(format!("prd_{:03}", highest + 1))
}

pub(crate) fn insert(conn: &mut SqliteConnection, new: &NewPrd) -> Result<Prd> {
    validate_title(&new.title)?;
    let identifier = match &new.identifier {
        Some(ident) if !ident.trim().is_empty() => ident.trim().to_string(),
        _ => next_identifier(conn, new.project_id)?,
    };
    let now = now_timestamp();
    let tags = encode_json(&new.tags)?;
    let metadata = encode_json(&new.metadata)?;

    diesel::insert_into(prds::table)
        .values(&PrdInsert {
            project_id: new.project_id,
            identifier: &identifier,
            title: new.title.trim(),
            file_name: &new.file_name,
            file_path: new.file_path.as_deref(),
            file_hash: new.file_hash.as_deref(),
            file_size: new.file_size,
            status: new.status,
            complexity: new.complexity,
            priority: new.priority,
            description: new.description.as_deref(),
            tags: &tags,
            estimated_effort: new.estimated_effort.as_deref(),
            created_at: &now,
            updated_at: &now,
            last_parsed_at: new.last_parsed_at.as_deref(),
            metadata: &metadata,
        })
        .execute(conn)
        .map_err(|e| DbError::query("insert prds", e))?;

    let id = inserted_key(conn)?;
    find(conn, id)?.ok_or_else(|| DbError::not_found("PRD", id))
}

pub(crate) fn find(conn: &mut SqliteConnection, id: i32) -> Result<Option<Prd>> {
    prds::table
        .find(id)
        .select(PrdRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select prds by id", e))?
        .map(Prd::try_from)
        .transpose()
}

pub(crate) fn find_by_identifier(
    conn: &mut SqliteConnection,
    project_id: i32,
    identifier: &str,
) -> Result<Option<Prd>> {
    prds::table
        .filter(prds::project_id.eq(project_id))
        .filter(prds::identifier.eq(identifier))
        .select(PrdRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select prds by identifier", e))?
        .map(Prd::try_from)
        .transpose()
}

fn filtered<'f>(filter: &'f PrdFilter) -> prds::BoxedQuery<'f, Sqlite> {
    let mut query = prds::table.into_boxed();
    if let Some(project_id) = filter.project_id {
        query = query.filter(prds::project_id.eq(project_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(prds::status.eq(status));
    }
    if let Some(priority) = filter.priority {
        query = query.filter(prds::priority.eq(priority));
    }
    if let Some(complexity) = filter.complexity {
        query = query.filter(prds::complexity.eq(complexity));
    }
    if let Some(tag) = &filter.tag {
        // tags is a JSON array of strings, so a quoted element is an exact match
        let quoted = serde_json::Value::String(tag.clone()).to_string();
        query = query.filter(prds::tags.like(like_pattern(&quoted)).escape('\\'));
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term.trim());
        query = query.filter(
            prds::title
                .like(pattern.clone())
                .escape('\\')
                .or(prds::file_name.like(pattern.clone()).escape('\\'))
                .or(prds::description.like(pattern).escape('\\')),
        );
    }
    query
}

fn stats_on(conn: &mut SqliteConnection, prd_id: i32) -> Result<PrdTaskStats> {
    let counts: Vec<(TaskStatus, i64)> = tasks::table
        .filter(tasks::prd_id.eq(prd_id))
        .group_by(tasks::status)
        .select((tasks::status, count_star()))
        .load(conn)
        .map_err(|e| DbError::query("select task counts by status", e))?;
    Ok(PrdTaskStats::from_counts(prd_id, &counts))
}

/// Refuse to archive while linked tasks are not all done, unless `force`.
fn check_archivable(conn: &mut SqliteConnection, id: i32, force: bool) -> Result<()> {
    let incomplete = stats_on(conn, id)?.incomplete();
    if incomplete > 0 {
        if !force {
            return Err(DbError::ArchiveBlocked {
                prd_id: id,
                incomplete: incomplete as usize,
            });
        }
        tracing::warn!("Archiving PRD {} with {} incomplete task(s)", id, incomplete);
    }
    Ok(())
}

pub(crate) fn apply_patch(conn: &mut SqliteConnection, id: i32, patch: &PrdPatch) -> Result<Prd> {
    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    let changes = PrdChanges {
        title: patch.title.as_ref().map(|t| t.trim().to_string()),
        file_name: patch.file_name.clone(),
        file_path: patch.file_path.clone(),
        file_hash: patch.file_hash.clone(),
        file_size: patch.file_size,
        status: patch.status,
        complexity: patch.complexity,
        priority: patch.priority,
        description: patch.description.clone(),
        tags: patch.tags.as_ref().map(encode_json).transpose()?,
        estimated_effort: patch.estimated_effort.clone(),
        last_parsed_at: patch.last_parsed_at.clone(),
        metadata: patch.metadata.as_ref().map(encode_json).transpose()?,
        updated_at: now_timestamp(),
    };

    let updated = diesel::update(prds::table.find(id))
        .set(&changes)
        .execute(conn)
        .map_err(|e| DbError::query("update prds", e))?;
    if updated == 0 {
        return Err(DbError::not_found("PRD", id));
    }
    find(conn, id)?.ok_or_else(|| DbError::not_found("PRD", id))
}

// ============================================================================
// DAO
// ============================================================================

pub struct PrdDao<'a> {
    db: &'a Database,
}

impl<'a> PrdDao<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, new: &NewPrd) -> Result<Prd> {
        self.db.with_transaction(|conn| insert(conn, new))
    }

    pub fn get(&self, id: i32) -> Result<Option<Prd>> {
        self.db.with_conn(|conn| find(conn, id))
    }

    pub fn get_by_identifier(&self, project_id: i32, identifier: &str) -> Result<Option<Prd>> {
        self.db
            .with_conn(|conn| find_by_identifier(conn, project_id, identifier))
    }

    pub fn get_prds(&self, filter: &PrdFilter) -> Result<Vec<Prd>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);
        self.db.with_conn(|conn| {
            filtered(filter)
                .select(PrdRow::as_select())
                .order(prds::id.asc())
                .limit(limit)
                .offset(offset)
                .load::<PrdRow>(conn)
                .map_err(|e| DbError::query("select prds", e))?
                .into_iter()
                .map(Prd::try_from)
                .collect()
        })
    }

    /// Moving to `Archived` here is held to the unforced archive rule.
    pub fn update(&self, id: i32, patch: &PrdPatch) -> Result<Prd> {
        self.db.with_transaction(|conn| {
            if patch.status == Some(PrdStatus::Archived) {
                let current = find(conn, id)?.ok_or_else(|| DbError::not_found("PRD", id))?;
                if current.status != PrdStatus::Archived {
                    check_archivable(conn, id, false)?;
                }
            }
            apply_patch(conn, id, patch)
        })
    }

    /// Lifecycle move. `Archived` goes through [`PrdDao::archive`] without force.
    pub fn update_status(&self, id: i32, status: PrdStatus) -> Result<Prd> {
        if status == PrdStatus::Archived {
            return self.archive(id, false);
        }
        self.update(
            id,
            &PrdPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Archive a PRD. Refused while linked tasks are not all done, unless `force`.
    pub fn archive(&self, id: i32, force: bool) -> Result<Prd> {
        self.db.with_transaction(|conn| {
            if find(conn, id)?.is_none() {
                return Err(DbError::not_found("PRD", id));
            }
            check_archivable(conn, id, force)?;
            apply_patch(
                conn,
                id,
                &PrdPatch {
                    status: Some(PrdStatus::Archived),
                    ..Default::default()
                },
            )
        })
    }

    /// Remove a PRD. Linked tasks stay, with `prd_id` cleared.
    pub fn delete(&self, id: i32) -> Result<()> {
        let deleted = self.db.with_transaction(|conn| {
            diesel::delete(prds::table.find(id))
                .execute(conn)
                .map_err(|e| DbError::query("delete prds", e))
        })?;
        if deleted == 0 {
            return Err(DbError::not_found("PRD", id));
        }
        Ok(())
    }

    pub fn task_stats(&self, id: i32) -> Result<PrdTaskStats> {
        self.db.with_conn(|conn| {
            if find(conn, id)?.is_none() {
                return Err(DbError::not_found("PRD", id));
            }
            stats_on(conn, id)
        })
    }

    pub fn linked_tasks(&self, id: i32) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| {
            task::list(
                conn,
                &TaskFilter {
                    prd_id: Some(Some(id)),
                    ..Default::default()
                },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{NewProject, NewTask};
    use crate::db::tests::test_db;

    fn setup() -> (tempfile::TempDir, Database, i32) {
        let (tmp, db) = test_db();
        let p = db
            .projects()
            .create(&NewProject::new("p", "/p"))
            .unwrap()
            .id;
        (tmp, db, p)
    }

    fn linked_task(db: &Database, project_id: i32, prd_id: i32, status: TaskStatus) -> Task {
        db.tasks()
            .create(&NewTask {
                prd_id: Some(prd_id),
                status,
                ..NewTask::new(project_id, "work")
            })
            .unwrap()
    }

    #[test]
    fn test_create_defaults_identifier() {
        let (_tmp, db, p) = setup();
        let first = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        let second = db.prds().create(&NewPrd::new(p, "Billing", "billing.md")).unwrap();
        assert_eq!(first.identifier, "prd_001");
        assert_eq!(second.identifier, "prd_002");
        assert_eq!(first.status, PrdStatus::Pending);
        assert_eq!(
            db.prds().get_by_identifier(p, "prd_002").unwrap().unwrap().id,
            second.id
        );
    }

    #[test]
    fn test_filters_by_tag_and_search() {
        let (_tmp, db, p) = setup();
        db.prds()
            .create(&NewPrd {
                tags: vec!["backend".into(), "security".into()],
                description: Some("OAuth flows".into()),
                ..NewPrd::new(p, "Auth", "auth.md")
            })
            .unwrap();
        db.prds()
            .create(&NewPrd {
                tags: vec!["backend-ops".into()],
                priority: Priority::High,
                ..NewPrd::new(p, "Deploy", "deploy.md")
            })
            .unwrap();

        let tagged = db
            .prds()
            .get_prds(&PrdFilter {
                tag: Some("backend".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].tags, vec!["backend", "security"]);

        let searched = db
            .prds()
            .get_prds(&PrdFilter {
                search: Some("oauth".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(searched[0].title, "Auth");

        let high = db
            .prds()
            .get_prds(&PrdFilter {
                priority: Some(Priority::High),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].title, "Deploy");
    }

    #[test]
    fn test_task_stats_are_live() {
        let (_tmp, db, p) = setup();
        let prd = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        assert_eq!(db.prds().task_stats(prd.id).unwrap().completion_percentage, 0.0);

        let a = linked_task(&db, p, prd.id, TaskStatus::Done);
        linked_task(&db, p, prd.id, TaskStatus::Pending);
        linked_task(&db, p, prd.id, TaskStatus::InProgress);
        linked_task(&db, p, prd.id, TaskStatus::Done);

        let stats = db.prds().task_stats(prd.id).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.done, 2);
        assert_eq!(stats.completion_percentage, 50.0);

        db.tasks().delete(a.id).unwrap();
        let stats = db.prds().task_stats(prd.id).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.done, 1);
    }

    #[test]
    fn test_archive_blocked_by_incomplete_tasks() {
        let (_tmp, db, p) = setup();
        let prd = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        let t = linked_task(&db, p, prd.id, TaskStatus::Pending);

        match db.prds().archive(prd.id, false).unwrap_err() {
            DbError::ArchiveBlocked { prd_id, incomplete } => {
                assert_eq!(prd_id, prd.id);
                assert_eq!(incomplete, 1);
            }
            other => panic!("expected ArchiveBlocked, got {other:?}"),
        }
        assert!(matches!(
            db.prds().update_status(prd.id, PrdStatus::Archived),
            Err(DbError::ArchiveBlocked { .. })
        ));
        assert_eq!(db.prds().get(prd.id).unwrap().unwrap().status, PrdStatus::Pending);

        db.tasks().update_status(t.id, TaskStatus::Done).unwrap();
        let archived = db.prds().archive(prd.id, false).unwrap();
        assert_eq!(archived.status, PrdStatus::Archived);
    }

    #[test]
    fn test_patch_to_archived_is_guarded() {
        let (_tmp, db, p) = setup();
        let prd = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        let t = linked_task(&db, p, prd.id, TaskStatus::Pending);
        let to_archived = PrdPatch {
            status: Some(PrdStatus::Archived),
            ..Default::default()
        };

        assert!(matches!(
            db.prds().update(prd.id, &to_archived),
            Err(DbError::ArchiveBlocked { incomplete: 1, .. })
        ));
        assert_eq!(db.prds().get(prd.id).unwrap().unwrap().status, PrdStatus::Pending);

        db.tasks().update_status(t.id, TaskStatus::Done).unwrap();
        let archived = db.prds().update(prd.id, &to_archived).unwrap();
        assert_eq!(archived.status, PrdStatus::Archived);
    }

    #[test]
    fn test_duplicate_prd_identifier_is_constraint_violation() {
        let (_tmp, db, p) = setup();
        let new = NewPrd {
            identifier: Some("prd_x".into()),
            ..NewPrd::new(p, "Auth", "auth.md")
        };
        db.prds().create(&new).unwrap();
        match db.prds().create(&new).unwrap_err() {
            DbError::ConstraintViolation { constraint, .. } => {
                assert!(constraint.contains("prds.identifier"))
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_forced_archive() {
        let (_tmp, db, p) = setup();
        let prd = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        linked_task(&db, p, prd.id, TaskStatus::Blocked);
        assert_eq!(
            db.prds().archive(prd.id, true).unwrap().status,
            PrdStatus::Archived
        );
    }

    #[test]
    fn test_delete_orphans_tasks() {
        let (_tmp, db, p) = setup();
        let prd = db.prds().create(&NewPrd::new(p, "Auth", "auth.md")).unwrap();
        let t = linked_task(&db, p, prd.id, TaskStatus::Pending);
        assert_eq!(db.prds().linked_tasks(prd.id).unwrap().len(), 1);

        db.prds().delete(prd.id).unwrap();
        let orphan = db.tasks().get_task(t.id).unwrap().unwrap();
        assert_eq!(orphan.prd_id, None);
        assert!(db.prds().get(prd.id).unwrap().is_none());
        assert!(db.prds().delete(prd.id).unwrap_err().is_not_found());
        assert!(db.prds().task_stats(prd.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_task_prd_must_share_project() {
        let (_tmp, db, p) = setup();
        let other = db.projects().create(&NewProject::new("o", "/o")).unwrap().id;
        let prd = db.prds().create(&NewPrd::new(other, "Else", "else.md")).unwrap();
        assert!(matches!(
            db.tasks().create(&NewTask {
                prd_id: Some(prd.id),
                ..NewTask::new(p, "x")
            }),
            Err(DbError::Validation(_))
        ));
    }
}
