//! SQLite connection manager with Diesel ORM
//!
//! One [`Database`] owns the single live connection to a project's store. It
//! applies pragmas on connect, creates the schema on first use and hands out
//! the raw `run` / `get` / `get_all` / `transaction` primitives the DAOs and
//! the migration engine build on.

use crate::config::StoreConfig;
use crate::error::{DbError, Result};
use crate::schema::{self, schema_versions, CURRENT_SCHEMA};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Current time as stored in every timestamp column (RFC 3339, UTC, millis).
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ============================================================================
// Raw statement plumbing
// ============================================================================

/// A positional parameter for [`Database::run`] and friends.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        SqlParam::Integer(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        SqlParam::Integer(v.into())
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        SqlParam::Integer(v.into())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        SqlParam::Real(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        SqlParam::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        SqlParam::Text(v)
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlParam::Null)
    }
}

/// One statement of a [`Database::transaction`] batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Outcome of a mutating statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub last_insert_id: i64,
    pub changes: usize,
}

/// Helper for sqlite_master table queries
#[derive(QueryableByName, Debug)]
struct TableInfo {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Row counts of the domain tables, used by status output and backup sidecars.
#[derive(QueryableByName, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    #[diesel(sql_type = BigInt)]
    pub projects: i64,
    #[diesel(sql_type = BigInt)]
    pub configurations: i64,
    #[diesel(sql_type = BigInt)]
    pub prds: i64,
    #[diesel(sql_type = BigInt)]
    pub tasks: i64,
    #[diesel(sql_type = BigInt)]
    pub task_dependencies: i64,
}

/// Queryable schema version
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = schema_versions)]
pub struct StoredSchema {
    pub id: i32,
    pub version: String,
    pub name: String,
    pub features: String,
    pub introduced_at: String,
}

/// Insertable schema version
#[derive(Insertable)]
#[diesel(table_name = schema_versions)]
struct NewSchemaVersion<'a> {
    version: &'a str,
    name: &'a str,
    features: &'a str,
    introduced_at: &'a str,
}

fn bind_params(sql: &str, params: &[SqlParam]) -> BoxedSqlQuery<'static, Sqlite, SqlQuery> {
    let mut query = diesel::sql_query(sql).into_boxed::<Sqlite>();
    for param in params {
        query = match param {
            SqlParam::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            SqlParam::Integer(v) => query.bind::<BigInt, _>(*v),
            SqlParam::Real(v) => query.bind::<Double, _>(*v),
            SqlParam::Text(v) => query.bind::<Text, _>(v.clone()),
        };
    }
    query
}

/// `last_insert_rowid()` of this connection
pub(crate) fn last_insert_id(conn: &mut SqliteConnection) -> Result<i64> {
    diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()"))
        .get_result(conn)
        .map_err(|e| DbError::query("SELECT last_insert_rowid()", e))
}

/// Row id of the last insert, as the `i32` key the DAOs use.
pub(crate) fn inserted_key(conn: &mut SqliteConnection) -> Result<i32> {
    let rowid = last_insert_id(conn)?;
    i32::try_from(rowid)
        .map_err(|_| DbError::Validation(format!("Row id {} does not fit a 32-bit key", rowid)))
}

/// Execute one mutating statement on an already-acquired connection.
pub(crate) fn run_statement(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlParam],
) -> Result<RunResult> {
    let changes = bind_params(sql, params)
        .execute(conn)
        .map_err(|e| DbError::query(sql, e))?;
    let last_insert_id = last_insert_id(conn)?;
    Ok(RunResult {
        last_insert_id,
        changes,
    })
}

pub(crate) fn query_all<T>(conn: &mut SqliteConnection, sql: &str, params: &[SqlParam]) -> Result<Vec<T>>
where
    T: QueryableByName<Sqlite> + 'static,
{
    bind_params(sql, params)
        .load::<T>(conn)
        .map_err(|e| DbError::query(sql, e))
}

pub(crate) fn table_counts_on(conn: &mut SqliteConnection) -> Result<TableCounts> {
    let sql = "SELECT \
        (SELECT COUNT(*) FROM projects) AS projects, \
        (SELECT COUNT(*) FROM configurations) AS configurations, \
        (SELECT COUNT(*) FROM prds) AS prds, \
        (SELECT COUNT(*) FROM tasks) AS tasks, \
        (SELECT COUNT(*) FROM task_dependencies) AS task_dependencies";
    let mut rows: Vec<TableCounts> = query_all(conn, sql, &[])?;
    Ok(rows.pop().unwrap_or_default())
}

// ============================================================================
// Connection setup
// ============================================================================

/// Pragmas applied to every connection the pool establishes
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
    journal_mode: String,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        // busy_timeout first so the journal switch itself waits on a locked file
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON; PRAGMA journal_mode = {};",
            self.busy_timeout_ms, self.journal_mode
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

// ============================================================================
// Database Connection
// ============================================================================

/// Connection manager for one project's store.
///
/// Holds a pool capped at a single connection; `close` drops it and `reopen`
/// builds a fresh one, which is how restore swaps the file underneath.
pub struct Database {
    db_path: PathBuf,
    project_root: PathBuf,
    config: StoreConfig,
    pool: Mutex<Option<DbPool>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("db_path", &self.db_path)
            .field("project_root", &self.project_root)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the store for a project root.
    pub fn initialize(project_root: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let db_path = config.db_path(&project_root);
        Self::open_at(db_path, project_root, config)
    }

    /// Open the store at an explicit file, attributing it to `project_root`.
    ///
    /// The root is canonicalized when it exists, so `./proj` and its absolute
    /// path name the same project row.
    pub fn open_at(
        db_path: impl AsRef<Path>,
        project_root: impl AsRef<Path>,
        config: &StoreConfig,
    ) -> Result<Self> {
        let project_root = project_root.as_ref();
        let db = Self {
            db_path: db_path.as_ref().to_path_buf(),
            project_root: project_root
                .canonicalize()
                .unwrap_or_else(|_| project_root.to_path_buf()),
            config: config.clone(),
            pool: Mutex::new(None),
        };
        db.reopen()?;
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn store_config(&self) -> &StoreConfig {
        &self.config
    }

    /// Directory holding the store file and the legacy JSON files.
    pub fn data_dir(&self) -> &Path {
        self.db_path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn is_open(&self) -> bool {
        self.pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Build the connection (if closed) and make sure the schema exists.
    pub fn reopen(&self) -> Result<()> {
        let mut guard = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }

        let connection_error = |message: String| DbError::Connection {
            path: self.db_path.clone(),
            message,
        };

        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| connection_error(e.to_string()))?;
            }
        }

        let options = ConnectionOptions {
            busy_timeout_ms: self.config.database.busy_timeout_ms,
            journal_mode: self.config.journal_mode().to_string(),
        };
        let manager = ConnectionManager::<SqliteConnection>::new(self.db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_millis(self.config.database.busy_timeout_ms.max(1000)))
            .connection_customizer(Box::new(options))
            .build(manager)
            .map_err(|e| connection_error(e.to_string()))?;

        {
            let mut conn = pool.get().map_err(|e| connection_error(e.to_string()))?;
            init_schema(&mut conn)?;
        }

        tracing::debug!("Opened store at {}", self.db_path.display());
        *guard = Some(pool);
        Ok(())
    }

    /// Release the connection. Calls made before `reopen` fail with `NotInitialized`.
    pub fn close(&self) {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if pool.is_some() {
            tracing::debug!("Closed store at {}", self.db_path.display());
        }
    }

    fn get_conn(&self) -> Result<DbConn> {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DbError::NotInitialized)?;
        Ok(pool.get()?)
    }

    /// Run a closure against the live connection.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        let mut conn = self.get_conn()?;
        f(&mut conn)
    }

    /// Run a closure inside an IMMEDIATE transaction; any `Err` rolls back.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T>,
    {
        let mut pooled = self.get_conn()?;
        let conn: &mut SqliteConnection = &mut pooled;
        conn.immediate_transaction(f)
    }

    // ========================================================================
    // Raw primitives
    // ========================================================================

    /// Execute a mutating statement.
    pub fn run(&self, sql: &str, params: &[SqlParam]) -> Result<RunResult> {
        self.with_conn(|conn| run_statement(conn, sql, params))
    }

    /// Read at most one row.
    pub fn get<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Option<T>>
    where
        T: QueryableByName<Sqlite> + 'static,
    {
        Ok(self.get_all(sql, params)?.into_iter().next())
    }

    /// Read every row.
    pub fn get_all<T>(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<T>>
    where
        T: QueryableByName<Sqlite> + 'static,
    {
        self.with_conn(|conn| query_all(conn, sql, params))
    }

    /// Execute statements atomically. The first failure rolls back the batch.
    pub fn transaction(&self, statements: &[Statement]) -> Result<Vec<RunResult>> {
        self.with_transaction(|conn| {
            statements
                .iter()
                .map(|s| run_statement(conn, &s.sql, &s.params))
                .collect()
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn table_counts(&self) -> Result<TableCounts> {
        self.with_conn(table_counts_on)
    }

    /// Domain tables that exist in the file, per the schema validation query.
    pub fn existing_tables(&self) -> Result<Vec<String>> {
        self.with_conn(existing_tables)
    }

    pub fn schema_version(&self) -> Result<Option<StoredSchema>> {
        self.with_conn(|conn| {
            schema_versions::table
                .order(schema_versions::id.desc())
                .select(StoredSchema::as_select())
                .first(conn)
                .optional()
                .map_err(|e| DbError::query("select schema_versions", e))
        })
    }

    /// Fold the WAL into the main file so a plain file copy is complete.
    pub fn checkpoint(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.batch_execute("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(|e| DbError::query("PRAGMA wal_checkpoint(TRUNCATE)", e))
        })
    }
}

fn existing_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    let rows: Vec<TableInfo> = query_all(conn, &schema::existing_tables_query(), &[])?;
    Ok(rows.into_iter().map(|t| t.name).collect())
}

/// Create the schema unless every domain table is already present.
fn init_schema(conn: &mut SqliteConnection) -> Result<bool> {
    let existing = existing_tables(conn)?;
    if existing.len() == schema::TABLE_CREATION_ORDER.len() {
        return Ok(false);
    }

    tracing::info!(
        "Creating schema {} ({} of {} tables present)",
        CURRENT_SCHEMA,
        existing.len(),
        schema::TABLE_CREATION_ORDER.len()
    );

    conn.immediate_transaction(|conn| {
        conn.batch_execute(&schema::full_ddl())
            .map_err(|e| DbError::query("schema DDL", e))?;
        register_schema(conn)
    })?;
    Ok(true)
}

fn register_schema(conn: &mut SqliteConnection) -> Result<()> {
    let now = now_timestamp();
    let features_json = serde_json::to_string(&CURRENT_SCHEMA.features)?;
    let version = CURRENT_SCHEMA.version_string();

    let new_schema = NewSchemaVersion {
        version: &version,
        name: CURRENT_SCHEMA.name,
        features: &features_json,
        introduced_at: &now,
    };

    diesel::insert_or_ignore_into(schema_versions::table)
        .values(&new_schema)
        .execute(conn)
        .map_err(|e| DbError::query("insert schema_versions", e))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Fresh store in a throwaway project root.
    pub(crate) fn test_db() -> (TempDir, Database) {
        let tmp = TempDir::new().unwrap();
        let db = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();
        (tmp, db)
    }

    #[derive(QueryableByName, Debug)]
    struct NameRow {
        #[diesel(sql_type = Text)]
        name: String,
    }

    #[test]
    fn test_initialize_creates_file_and_schema() {
        let (tmp, db) = test_db();
        assert!(tmp.path().join(".taskmaster").join("taskhero.db").exists());
        assert_eq!(db.existing_tables().unwrap().len(), 5);
        let version = db.schema_version().unwrap().unwrap();
        assert_eq!(version.version, "1.0.0");
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (tmp, db) = test_db();
        db.run(
            "INSERT INTO projects (name, root_path, created_at, updated_at) VALUES (?, ?, ?, ?)",
            &["p".into(), "/p".into(), now_timestamp().into(), now_timestamp().into()],
        )
        .unwrap();
        db.close();

        let again = Database::initialize(tmp.path(), &StoreConfig::default()).unwrap();
        assert_eq!(again.table_counts().unwrap().projects, 1);
    }

    #[test]
    fn test_unwritable_location_is_connection_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let err = Database::open_at(blocker.join("sub").join("x.db"), tmp.path(), &StoreConfig::default())
            .unwrap_err();
        assert!(matches!(err, DbError::Connection { .. }));
    }

    #[test]
    fn test_run_reports_insert_id_and_changes() {
        let (_tmp, db) = test_db();
        let now = now_timestamp();
        let first = db
            .run(
                "INSERT INTO projects (name, root_path, created_at, updated_at) VALUES (?, ?, ?, ?)",
                &["a".into(), "/a".into(), now.clone().into(), now.clone().into()],
            )
            .unwrap();
        assert_eq!(first.changes, 1);
        assert_eq!(first.last_insert_id, 1);

        let updated = db
            .run("UPDATE projects SET name = ? WHERE id = ?", &["b".into(), 1.into()])
            .unwrap();
        assert_eq!(updated.changes, 1);

        let row: Option<NameRow> = db
            .get("SELECT name FROM projects WHERE id = ?", &[1.into()])
            .unwrap();
        assert_eq!(row.unwrap().name, "b");

        let miss: Option<NameRow> = db
            .get("SELECT name FROM projects WHERE id = ?", &[99.into()])
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_row_id_past_key_range_is_rejected() {
        let (_tmp, db) = test_db();
        let now = now_timestamp();
        db.run(
            "INSERT INTO projects (id, name, root_path, created_at, updated_at) \
             VALUES (2147483647, ?, ?, ?, ?)",
            &["last".into(), "/last".into(), now.clone().into(), now.into()],
        )
        .unwrap();

        let err = db
            .projects()
            .create(&crate::dao::NewProject::new("over", "/over"))
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(db.table_counts().unwrap().projects, 1);
    }

    #[test]
    fn test_malformed_sql_is_query_error_with_statement() {
        let (_tmp, db) = test_db();
        let err = db.run("UPDATE nowhere SET x = 1", &[]).unwrap_err();
        match err {
            DbError::Query { statement, .. } => assert!(statement.contains("nowhere")),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn test_transaction_rolls_back_on_failure() {
        let (_tmp, db) = test_db();
        let now = now_timestamp();
        let insert = |name: &str, root: &str| {
            Statement::new(
                "INSERT INTO projects (name, root_path, created_at, updated_at) VALUES (?, ?, ?, ?)",
                vec![name.into(), root.into(), now.clone().into(), now.clone().into()],
            )
        };

        let err = db
            .transaction(&[insert("a", "/a"), insert("dup", "/a")])
            .unwrap_err();
        assert!(err.is_constraint_violation());
        assert_eq!(db.table_counts().unwrap().projects, 0);

        let results = db.transaction(&[insert("a", "/a"), insert("b", "/b")]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(db.table_counts().unwrap().projects, 2);
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let (_tmp, db) = test_db();
        let now = now_timestamp();
        let err = db
            .run(
                "INSERT INTO tasks (project_id, identifier, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                &[42.into(), "1".into(), "orphan".into(), now.clone().into(), now.into()],
            )
            .unwrap_err();
        match err {
            DbError::ConstraintViolation { constraint, .. } => assert_eq!(constraint, "FOREIGN KEY"),
            other => panic!("expected constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_closed_database_rejects_calls() {
        let (_tmp, db) = test_db();
        db.close();
        assert!(!db.is_open());
        assert!(matches!(db.table_counts(), Err(DbError::NotInitialized)));
        db.reopen().unwrap();
        assert_eq!(db.table_counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn test_update_trigger_refreshes_timestamp() {
        let (_tmp, db) = test_db();
        let stale = "2000-01-01T00:00:00.000Z";
        db.run(
            "INSERT INTO projects (name, root_path, created_at, updated_at) VALUES (?, ?, ?, ?)",
            &["a".into(), "/a".into(), stale.into(), stale.into()],
        )
        .unwrap();
        db.run("UPDATE projects SET name = 'b' WHERE id = 1", &[]).unwrap();

        #[derive(QueryableByName)]
        struct Stamp {
            #[diesel(sql_type = Text)]
            updated_at: String,
        }
        let row: Stamp = db
            .get("SELECT updated_at FROM projects WHERE id = 1", &[])
            .unwrap()
            .unwrap();
        assert_ne!(row.updated_at, stale);
    }
}
