//! Error taxonomy for the store.
//!
//! Every DAO, the migration engine and the backup manager return [`DbError`].
//! Diesel errors are classified on the way in: constraint failures become
//! [`DbError::ConstraintViolation`], everything else keeps the statement text
//! it came from.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Cannot open store at {}: {message}", path.display())]
    Connection { path: PathBuf, message: String },

    #[error("Store is not initialized (closed or never opened)")]
    NotInitialized,

    #[error("Query failed [{statement}]: {source}")]
    Query {
        statement: String,
        #[source]
        source: DieselError,
    },

    #[error("Constraint violated ({constraint}): {message}")]
    ConstraintViolation { constraint: String, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Dependency {task_id} -> {depends_on} would create a cycle")]
    DependencyCycle { task_id: i32, depends_on: i32 },

    #[error("PRD {prd_id} has {incomplete} linked task(s) that are not done; pass force to archive anyway")]
    ArchiveBlocked { prd_id: i32, incomplete: usize },

    #[error("{0}")]
    Validation(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Wrap a diesel error with the statement (or operation label) that raised it.
    pub fn query(statement: impl Into<String>, err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(kind, info) if is_constraint(&kind, info.message()) => {
                let message = info.message().to_string();
                DbError::ConstraintViolation {
                    constraint: constraint_name(&message),
                    message,
                }
            }
            source => DbError::Query {
                statement: statement.into(),
                source,
            },
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DbError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ConstraintViolation { .. })
    }
}

// Lets `?` work inside diesel transaction closures.
impl From<DieselError> for DbError {
    fn from(e: DieselError) -> Self {
        DbError::query("transaction", e)
    }
}

fn is_constraint(kind: &DatabaseErrorKind, message: &str) -> bool {
    matches!(
        kind,
        DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation
    ) || message.contains("constraint failed")
}

/// Pull the constraint identity out of SQLite's message.
///
/// `UNIQUE constraint failed: tasks.project_id, tasks.identifier` becomes
/// `UNIQUE(tasks.project_id, tasks.identifier)`; `FOREIGN KEY constraint failed`
/// becomes `FOREIGN KEY`.
fn constraint_name(message: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(UNIQUE|CHECK|NOT NULL|FOREIGN KEY|PRIMARY KEY) constraint failed(?::\s*(.+))?")
            .expect("constraint pattern is valid")
    });

    match pattern.captures(message) {
        Some(caps) => {
            let kind = caps.get(1).map(|m| m.as_str()).unwrap_or("CONSTRAINT");
            match caps.get(2) {
                Some(detail) => format!("{}({})", kind, detail.as_str().trim()),
                None => kind.to_string(),
            }
        }
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_constraint_name() {
        let name = constraint_name("UNIQUE constraint failed: tasks.project_id, tasks.identifier");
        assert_eq!(name, "UNIQUE(tasks.project_id, tasks.identifier)");
    }

    #[test]
    fn test_foreign_key_constraint_name() {
        assert_eq!(constraint_name("FOREIGN KEY constraint failed"), "FOREIGN KEY");
    }

    #[test]
    fn test_check_constraint_name() {
        let name = constraint_name("CHECK constraint failed: complexity_score BETWEEN 1 AND 10");
        assert!(name.starts_with("CHECK("));
    }

    #[test]
    fn test_unrecognized_message_passes_through() {
        assert_eq!(constraint_name("something else"), "something else");
    }
}
