//! Tasks, subtasks and the task dependency graph.

use crate::dao::{like_pattern, page_bounds};
use crate::db::{inserted_key, now_timestamp, Database};
use crate::error::{DbError, Result};
use crate::graph;
use crate::models::{
    compare_identifiers, decode_metadata, encode_json, ComplexityLevel, DependencyType, Metadata,
    Priority, TaskStatus,
};
use crate::schema::{prds, task_dependencies, tasks};
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};

// ============================================================================
// Models
// ============================================================================

/// Queryable task row
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tasks)]
struct TaskRow {
    id: i32,
    project_id: i32,
    prd_id: Option<i32>,
    parent_task_id: Option<i32>,
    identifier: String,
    title: String,
    description: Option<String>,
    details: Option<String>,
    test_strategy: Option<String>,
    status: TaskStatus,
    priority: Priority,
    complexity_score: Option<i32>,
    complexity_level: Option<ComplexityLevel>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
    assignee: Option<String>,
    due_date: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
    updated_at: String,
    metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    pub project_id: i32,
    pub prd_id: Option<i32>,
    pub parent_task_id: Option<i32>,
    pub identifier: String,
    pub title: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub test_strategy: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub complexity_score: Option<i32>,
    pub complexity_level: Option<ComplexityLevel>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub metadata: Metadata,
}

impl TryFrom<TaskRow> for Task {
    type Error = DbError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let metadata = decode_metadata(&row.metadata, &format!("task {}", row.id))?;
        Ok(Task {
            id: row.id,
            project_id: row.project_id,
            prd_id: row.prd_id,
            parent_task_id: row.parent_task_id,
            identifier: row.identifier,
            title: row.title,
            description: row.description,
            details: row.details,
            test_strategy: row.test_strategy,
            status: row.status,
            priority: row.priority,
            complexity_score: row.complexity_score,
            complexity_level: row.complexity_level,
            estimated_hours: row.estimated_hours,
            actual_hours: row.actual_hours,
            assignee: row.assignee,
            due_date: row.due_date,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            metadata,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub project_id: i32,
    pub prd_id: Option<i32>,
    pub parent_task_id: Option<i32>,
    /// Derived from siblings when absent ("4", or "3.2" under parent "3").
    pub identifier: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub details: Option<String>,
    pub test_strategy: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub complexity_score: Option<i32>,
    pub complexity_level: Option<ComplexityLevel>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub metadata: Metadata,
}

impl NewTask {
    pub fn new(project_id: i32, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Insertable task
#[derive(Insertable)]
#[diesel(table_name = tasks)]
struct TaskInsert<'a> {
    project_id: i32,
    prd_id: Option<i32>,
    parent_task_id: Option<i32>,
    identifier: &'a str,
    title: &'a str,
    description: Option<&'a str>,
    details: Option<&'a str>,
    test_strategy: Option<&'a str>,
    status: TaskStatus,
    priority: Priority,
    complexity_score: Option<i32>,
    complexity_level: Option<ComplexityLevel>,
    estimated_hours: Option<f64>,
    actual_hours: Option<f64>,
    assignee: Option<&'a str>,
    due_date: Option<&'a str>,
    started_at: Option<&'a str>,
    completed_at: Option<&'a str>,
    created_at: &'a str,
    updated_at: &'a str,
    metadata: &'a str,
}

/// Fields to change; `None` leaves a column alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub details: Option<Option<String>>,
    pub test_strategy: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub prd_id: Option<Option<i32>>,
    pub complexity_score: Option<Option<i32>>,
    pub complexity_level: Option<Option<ComplexityLevel>>,
    pub estimated_hours: Option<Option<f64>>,
    pub actual_hours: Option<Option<f64>>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
    pub metadata: Option<Metadata>,
}

#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
struct TaskChanges {
    title: Option<String>,
    description: Option<Option<String>>,
    details: Option<Option<String>>,
    test_strategy: Option<Option<String>>,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    prd_id: Option<Option<i32>>,
    complexity_score: Option<Option<i32>>,
    complexity_level: Option<Option<ComplexityLevel>>,
    estimated_hours: Option<Option<f64>>,
    actual_hours: Option<Option<f64>>,
    assignee: Option<Option<String>>,
    due_date: Option<Option<String>>,
    started_at: Option<Option<String>>,
    completed_at: Option<Option<String>>,
    metadata: Option<String>,
    updated_at: String,
}

/// Query filters for [`TaskDao::get_tasks`]; unset fields don't filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub project_id: Option<i32>,
    /// Any of these statuses (empty = all)
    pub statuses: Vec<TaskStatus>,
    pub priority: Option<Priority>,
    /// `Some(None)` selects tasks linked to no PRD
    pub prd_id: Option<Option<i32>>,
    /// `Some(None)` selects top-level tasks only
    pub parent_task_id: Option<Option<i32>>,
    /// Case-insensitive match on title, description or details
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Selection knobs for [`TaskDao::find_next_task`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextTaskCriteria {
    pub prd_id: Option<i32>,
    pub exclude_subtasks: bool,
}

/// Queryable dependency edge: `task_id` depends on `depends_on_task_id`
#[derive(Queryable, Selectable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = task_dependencies)]
pub struct TaskDependency {
    pub id: i32,
    pub task_id: i32,
    pub depends_on_task_id: i32,
    pub dependency_type: DependencyType,
    pub created_at: String,
}

/// Insertable dependency edge
#[derive(Insertable)]
#[diesel(table_name = task_dependencies)]
struct NewTaskDependency<'a> {
    task_id: i32,
    depends_on_task_id: i32,
    dependency_type: DependencyType,
    created_at: &'a str,
}

// ============================================================================
// Connection-level operations
// ============================================================================

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(DbError::Validation("Task title must not be empty".to_string()));
    }
    Ok(())
}

fn validate_complexity(score: Option<i32>) -> Result<()> {
    match score {
        Some(s) if !(1..=10).contains(&s) => Err(DbError::Validation(format!(
            "Complexity score {} is outside 1..=10",
            s
        ))),
        _ => Ok(()),
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
        return Err(DbError::Validation(format!(
            "Task identifier '{}' must be non-empty and contain no whitespace",
            identifier
        )));
    }
    Ok(())
}

fn ensure_prd_in_project(conn: &mut SqliteConnection, prd_id: i32, project_id: i32) -> Result<()> {
    let owner: Option<i32> = prds::table
        .find(prd_id)
        .select(prds::project_id)
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select prds.project_id", e))?;
    match owner {
        None => Err(DbError::not_found("PRD", prd_id)),
        Some(p) if p != project_id => Err(DbError::Validation(format!(
            "PRD {} belongs to project {}, not {}",
            prd_id, p, project_id
        ))),
        Some(_) => Ok(()),
    }
}

/// Next free identifier among the siblings under `parent` (or top level).
pub(crate) fn next_identifier(
    conn: &mut SqliteConnection,
    project_id: i32,
    parent: Option<&Task>,
) -> Result<String> {
    let mut query = tasks::table
        .filter(tasks::project_id.eq(project_id))
        .select(tasks::identifier)
        .into_boxed();
    query = match parent {
        Some(p) => query.filter(tasks::parent_task_id.eq(p.id)),
        None => query.filter(tasks::parent_task_id.is_null()),
    };
    let siblings: Vec<String> = query
        .load(conn)
        .map_err(|e| DbError::query("select sibling identifiers", e))?;

    let highest = siblings
        .iter()
        .filter_map(|ident| ident.rsplit('.').next())
        .filter_map(|last| last.parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    // explicit identifiers may already occupy a derived slot, e.g. "2.1" at top level
    let mut next = highest + 1;
    loop {
        let candidate = match parent {
            Some(p) => format!("{}.{}", p.identifier, next),
            None => next.to_string(),
        };
        let taken: i64 = tasks::table
            .filter(tasks::project_id.eq(project_id))
            .filter(tasks::identifier.eq(&candidate))
            .count()
            .get_result(conn)
            .map_err(|e| DbError::query("select identifier in use", e))?;
        if taken == 0 {
            return Ok(candidate);
        }
        next += 1;
    }
}

pub(crate) fn insert(conn: &mut SqliteConnection, new: &NewTask) -> Result<Task> {
    validate_title(&new.title)?;
    validate_complexity(new.complexity_score)?;

    let parent = match new.parent_task_id {
        Some(parent_id) => {
            let parent = find(conn, parent_id)?.ok_or_else(|| DbError::not_found("Task", parent_id))?;
            if parent.project_id != new.project_id {
                return Err(DbError::Validation(format!(
                    "Parent task {} belongs to project {}, not {}",
                    parent_id, parent.project_id, new.project_id
                )));
            }
            Some(parent)
        }
        None => None,
    };
    if let Some(prd_id) = new.prd_id {
        ensure_prd_in_project(conn, prd_id, new.project_id)?;
    }

    let identifier = match &new.identifier {
        Some(ident) => {
            validate_identifier(ident)?;
            ident.clone()
        }
        None => next_identifier(conn, new.project_id, parent.as_ref())?,
    };

    let now = now_timestamp();
    let metadata = encode_json(&new.metadata)?;
    let started_at = (new.status == TaskStatus::InProgress).then_some(now.as_str());
    let completed_at = new.status.is_done().then_some(now.as_str());

    diesel::insert_into(tasks::table)
        .values(&TaskInsert {
            project_id: new.project_id,
            prd_id: new.prd_id,
            parent_task_id: new.parent_task_id,
            identifier: &identifier,
            title: new.title.trim(),
            description: new.description.as_deref(),
            details: new.details.as_deref(),
            test_strategy: new.test_strategy.as_deref(),
            status: new.status,
            priority: new.priority,
            complexity_score: new.complexity_score,
            complexity_level: new.complexity_level,
            estimated_hours: new.estimated_hours,
            actual_hours: new.actual_hours,
            assignee: new.assignee.as_deref(),
            due_date: new.due_date.as_deref(),
            started_at,
            completed_at,
            created_at: &now,
            updated_at: &now,
            metadata: &metadata,
        })
        .execute(conn)
        .map_err(|e| DbError::query("insert tasks", e))?;

    let id = inserted_key(conn)?;
    find(conn, id)?.ok_or_else(|| DbError::not_found("Task", id))
}

pub(crate) fn find(conn: &mut SqliteConnection, id: i32) -> Result<Option<Task>> {
    tasks::table
        .find(id)
        .select(TaskRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select tasks by id", e))?
        .map(Task::try_from)
        .transpose()
}

pub(crate) fn find_by_identifier(
    conn: &mut SqliteConnection,
    project_id: i32,
    identifier: &str,
) -> Result<Option<Task>> {
    tasks::table
        .filter(tasks::project_id.eq(project_id))
        .filter(tasks::identifier.eq(identifier))
        .select(TaskRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select tasks by identifier", e))?
        .map(Task::try_from)
        .transpose()
}

fn filtered<'f>(filter: &'f TaskFilter) -> tasks::BoxedQuery<'f, Sqlite> {
    let mut query = tasks::table.into_boxed();
    if let Some(project_id) = filter.project_id {
        query = query.filter(tasks::project_id.eq(project_id));
    }
    if !filter.statuses.is_empty() {
        query = query.filter(tasks::status.eq_any(filter.statuses.clone()));
    }
    if let Some(priority) = filter.priority {
        query = query.filter(tasks::priority.eq(priority));
    }
    match filter.prd_id {
        Some(Some(prd_id)) => query = query.filter(tasks::prd_id.eq(prd_id)),
        Some(None) => query = query.filter(tasks::prd_id.is_null()),
        None => {}
    }
    match filter.parent_task_id {
        Some(Some(parent)) => query = query.filter(tasks::parent_task_id.eq(parent)),
        Some(None) => query = query.filter(tasks::parent_task_id.is_null()),
        None => {}
    }
    if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let pattern = like_pattern(term.trim());
        query = query.filter(
            tasks::title
                .like(pattern.clone())
                .escape('\\')
                .or(tasks::description.like(pattern.clone()).escape('\\'))
                .or(tasks::details.like(pattern).escape('\\')),
        );
    }
    query
}

fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| compare_identifiers(&a.identifier, &b.identifier));
}

pub(crate) fn list(conn: &mut SqliteConnection, filter: &TaskFilter) -> Result<Vec<Task>> {
    let rows: Vec<TaskRow> = filtered(filter)
        .select(TaskRow::as_select())
        .load(conn)
        .map_err(|e| DbError::query("select tasks", e))?;
    let mut tasks = rows
        .into_iter()
        .map(Task::try_from)
        .collect::<Result<Vec<_>>>()?;

    // identifiers sort numerically, which SQL can't express for dotted values
    sort_tasks(&mut tasks);
    let (limit, offset) = page_bounds(filter.limit, filter.offset);
    Ok(tasks
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect())
}

/// `started_at` / `completed_at` changes implied by moving `task` to `status`.
fn status_stamps(task: &Task, status: TaskStatus, now: &str) -> (Option<Option<String>>, Option<Option<String>>) {
    let started = (status == TaskStatus::InProgress && task.started_at.is_none())
        .then(|| Some(now.to_string()));
    let completed = match (task.status.is_done(), status.is_done()) {
        (false, true) => Some(Some(now.to_string())),
        (true, false) => Some(None),
        _ => None,
    };
    (started, completed)
}

pub(crate) fn apply_patch(conn: &mut SqliteConnection, id: i32, patch: &TaskPatch) -> Result<Task> {
    let current = find(conn, id)?.ok_or_else(|| DbError::not_found("Task", id))?;

    if let Some(title) = &patch.title {
        validate_title(title)?;
    }
    if let Some(score) = patch.complexity_score {
        validate_complexity(score)?;
    }
    if let Some(Some(prd_id)) = patch.prd_id {
        ensure_prd_in_project(conn, prd_id, current.project_id)?;
    }

    let now = now_timestamp();
    let (started_at, completed_at) = match patch.status {
        Some(status) => status_stamps(&current, status, &now),
        None => (None, None),
    };

    let changes = TaskChanges {
        title: patch.title.as_ref().map(|t| t.trim().to_string()),
        description: patch.description.clone(),
        details: patch.details.clone(),
        test_strategy: patch.test_strategy.clone(),
        status: patch.status,
        priority: patch.priority,
        prd_id: patch.prd_id,
        complexity_score: patch.complexity_score,
        complexity_level: patch.complexity_level,
        estimated_hours: patch.estimated_hours,
        actual_hours: patch.actual_hours,
        assignee: patch.assignee.clone(),
        due_date: patch.due_date.clone(),
        started_at,
        completed_at,
        metadata: patch.metadata.as_ref().map(encode_json).transpose()?,
        updated_at: now,
    };

    diesel::update(tasks::table.find(id))
        .set(&changes)
        .execute(conn)
        .map_err(|e| DbError::query("update tasks", e))?;
    find(conn, id)?.ok_or_else(|| DbError::not_found("Task", id))
}

/// Tasks `task_id` directly waits on through blocking edges.
fn blocking_targets(conn: &mut SqliteConnection, task_id: i32) -> Result<Vec<i32>> {
    task_dependencies::table
        .filter(task_dependencies::task_id.eq(task_id))
        .filter(task_dependencies::dependency_type.eq_any(DependencyType::BLOCKING.to_vec()))
        .select(task_dependencies::depends_on_task_id)
        .load(conn)
        .map_err(|e| DbError::query("select blocking dependencies", e))
}

/// Insert an edge after the endpoint, project and cycle checks.
pub(crate) fn add_dependency_on(
    conn: &mut SqliteConnection,
    task_id: i32,
    depends_on: i32,
    dependency_type: DependencyType,
) -> Result<TaskDependency> {
    if task_id == depends_on {
        return Err(DbError::DependencyCycle { task_id, depends_on });
    }
    let task = find(conn, task_id)?.ok_or_else(|| DbError::not_found("Task", task_id))?;
    let target = find(conn, depends_on)?.ok_or_else(|| DbError::not_found("Task", depends_on))?;
    if task.project_id != target.project_id {
        return Err(DbError::Validation(format!(
            "Tasks {} and {} belong to different projects",
            task_id, depends_on
        )));
    }

    if dependency_type.is_blocking()
        && graph::would_create_cycle(task_id, depends_on, |node| blocking_targets(conn, node))?
    {
        tracing::debug!("Rejected dependency {} -> {}: cycle", task_id, depends_on);
        return Err(DbError::DependencyCycle { task_id, depends_on });
    }

    let now = now_timestamp();
    diesel::insert_into(task_dependencies::table)
        .values(&NewTaskDependency {
            task_id,
            depends_on_task_id: depends_on,
            dependency_type,
            created_at: &now,
        })
        .execute(conn)
        .map_err(|e| DbError::query("insert task_dependencies", e))?;

    let id = inserted_key(conn)?;
    task_dependencies::table
        .find(id)
        .select(TaskDependency::as_select())
        .first(conn)
        .map_err(|e| DbError::query("select task_dependencies by id", e))
}

// ============================================================================
// DAO
// ============================================================================

pub struct TaskDao<'a> {
    db: &'a Database,
}

impl<'a> TaskDao<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, new: &NewTask) -> Result<Task> {
        self.db.with_transaction(|conn| insert(conn, new))
    }

    pub fn get_task(&self, id: i32) -> Result<Option<Task>> {
        self.db.with_conn(|conn| find(conn, id))
    }

    pub fn get_by_identifier(&self, project_id: i32, identifier: &str) -> Result<Option<Task>> {
        self.db
            .with_conn(|conn| find_by_identifier(conn, project_id, identifier))
    }

    /// Filtered, identifier-ordered, paginated listing.
    pub fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.db.with_conn(|conn| list(conn, filter))
    }

    /// Number of tasks matching the filter, ignoring pagination.
    pub fn count_tasks(&self, filter: &TaskFilter) -> Result<i64> {
        self.db.with_conn(|conn| {
            filtered(filter)
                .count()
                .get_result(conn)
                .map_err(|e| DbError::query("count tasks", e))
        })
    }

    pub fn subtasks(&self, parent_id: i32) -> Result<Vec<Task>> {
        self.get_tasks(&TaskFilter {
            parent_task_id: Some(Some(parent_id)),
            ..Default::default()
        })
    }

    pub fn update(&self, id: i32, patch: &TaskPatch) -> Result<Task> {
        self.db.with_transaction(|conn| apply_patch(conn, id, patch))
    }

    /// Move a task to `status`, stamping `started_at` / `completed_at`.
    pub fn update_status(&self, id: i32, status: TaskStatus) -> Result<Task> {
        self.update(
            id,
            &TaskPatch {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Remove a task; subtasks and every edge touching it go too.
    pub fn delete(&self, id: i32) -> Result<()> {
        let deleted = self.db.with_transaction(|conn| {
            diesel::delete(tasks::table.find(id))
                .execute(conn)
                .map_err(|e| DbError::query("delete tasks", e))
        })?;
        if deleted == 0 {
            return Err(DbError::not_found("Task", id));
        }
        Ok(())
    }

    /// Highest-priority `pending` task whose blocking dependencies are all
    /// `done`; ties go to the lowest identifier.
    pub fn find_next_task(&self, project_id: i32, criteria: &NextTaskCriteria) -> Result<Option<Task>> {
        self.db.with_conn(|conn| {
            let mut candidates = list(
                conn,
                &TaskFilter {
                    project_id: Some(project_id),
                    statuses: vec![TaskStatus::Pending],
                    prd_id: criteria.prd_id.map(Some),
                    parent_task_id: criteria.exclude_subtasks.then_some(None),
                    ..Default::default()
                },
            )?;

            let unfinished = tasks::table
                .filter(tasks::status.ne(TaskStatus::Done))
                .select(tasks::id);
            let waiting: Vec<i32> = task_dependencies::table
                .filter(task_dependencies::dependency_type.eq_any(DependencyType::BLOCKING.to_vec()))
                .filter(task_dependencies::depends_on_task_id.eq_any(unfinished))
                .select(task_dependencies::task_id)
                .distinct()
                .load(conn)
                .map_err(|e| DbError::query("select waiting tasks", e))?;

            candidates.retain(|t| !waiting.contains(&t.id));
            candidates.sort_by(|a, b| {
                b.priority
                    .rank()
                    .cmp(&a.priority.rank())
                    .then_with(|| compare_identifiers(&a.identifier, &b.identifier))
            });
            Ok(candidates.into_iter().next())
        })
    }

    /// Record that `task_id` depends on `depends_on`. Blocking edges that would
    /// close a cycle are rejected with `DependencyCycle`.
    pub fn add_dependency(
        &self,
        task_id: i32,
        depends_on: i32,
        dependency_type: DependencyType,
    ) -> Result<TaskDependency> {
        self.db
            .with_transaction(|conn| add_dependency_on(conn, task_id, depends_on, dependency_type))
    }

    pub fn remove_dependency(&self, task_id: i32, depends_on: i32) -> Result<()> {
        let deleted = self.db.with_transaction(|conn| {
            diesel::delete(
                task_dependencies::table
                    .filter(task_dependencies::task_id.eq(task_id))
                    .filter(task_dependencies::depends_on_task_id.eq(depends_on)),
            )
            .execute(conn)
            .map_err(|e| DbError::query("delete task_dependencies", e))
        })?;
        if deleted == 0 {
            return Err(DbError::not_found(
                "Dependency",
                format!("{} -> {}", task_id, depends_on),
            ));
        }
        Ok(())
    }

    /// Edges leaving `task_id` (what it waits on).
    pub fn dependencies_of(&self, task_id: i32) -> Result<Vec<TaskDependency>> {
        self.db.with_conn(|conn| {
            task_dependencies::table
                .filter(task_dependencies::task_id.eq(task_id))
                .select(TaskDependency::as_select())
                .order(task_dependencies::id.asc())
                .load(conn)
                .map_err(|e| DbError::query("select task_dependencies by task", e))
        })
    }

    /// Edges entering `task_id` (who waits on it).
    pub fn dependents_of(&self, task_id: i32) -> Result<Vec<TaskDependency>> {
        self.db.with_conn(|conn| {
            task_dependencies::table
                .filter(task_dependencies::depends_on_task_id.eq(task_id))
                .select(TaskDependency::as_select())
                .order(task_dependencies::id.asc())
                .load(conn)
                .map_err(|e| DbError::query("select task_dependencies by target", e))
        })
    }

    /// Every edge whose source task belongs to `project_id`.
    pub fn dependency_edges(&self, project_id: i32) -> Result<Vec<TaskDependency>> {
        self.db.with_conn(|conn| {
            task_dependencies::table
                .inner_join(tasks::table.on(tasks::id.eq(task_dependencies::task_id)))
                .filter(tasks::project_id.eq(project_id))
                .select(TaskDependency::as_select())
                .order(task_dependencies::id.asc())
                .load(conn)
                .map_err(|e| DbError::query("select task_dependencies by project", e))
        })
    }

    /// Whether the project's blocking edges currently form a DAG.
    pub fn is_dependency_graph_acyclic(&self, project_id: i32) -> Result<bool> {
        let edges: Vec<(i32, i32)> = self
            .dependency_edges(project_id)?
            .into_iter()
            .filter(|d| d.dependency_type.is_blocking())
            .map(|d| (d.task_id, d.depends_on_task_id))
            .collect();
        Ok(graph::is_acyclic(&edges))
    }
}
