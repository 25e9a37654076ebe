//! Shared column types: status/priority enums stored as TEXT and the
//! JSON-backed metadata and tag columns.

use crate::error::{DbError, Result};
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sqlite::{Sqlite, SqliteValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Free-form metadata attached to projects, PRDs and tasks.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A stored value didn't match any variant of a TEXT enum column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum persisted as one of a fixed set of TEXT values, with
/// `as_str`, `FromStr`, `Display`, serde and diesel glue all agreeing on the text.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
            diesel::AsExpression, diesel::FromSqlRow,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql<diesel::sql_types::Text, Sqlite> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<diesel::sql_types::Text, Sqlite> for $name {
            fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<diesel::sql_types::Text, Sqlite>>::from_sql(bytes)?;
                Ok(raw.parse::<$name>()?)
            }
        }
    };
}

text_enum! {
    /// Project lifecycle; projects are never hard-deleted by normal flows.
    ProjectStatus {
        Active => "active",
        Archived => "archived",
        Deleted => "deleted",
    }
}

text_enum! {
    PrdStatus {
        Pending => "pending",
        InProgress => "in-progress",
        Done => "done",
        Archived => "archived",
    }
}

text_enum! {
    TaskStatus {
        Pending => "pending",
        InProgress => "in-progress",
        Done => "done",
        Review => "review",
        Blocked => "blocked",
        Deferred => "deferred",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Shared by tasks and PRDs.
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

text_enum! {
    /// Shared by tasks (`complexity_level`) and PRDs (`complexity`).
    ComplexityLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        VeryHigh => "very-high",
    }
}

text_enum! {
    /// Edge kind in the task dependency graph. `blocks` and `requires` gate
    /// readiness and must stay acyclic; `related` is informational.
    DependencyType {
        Blocks => "blocks",
        Requires => "requires",
        Related => "related",
    }
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

impl Default for PrdStatus {
    fn default() -> Self {
        PrdStatus::Pending
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for ComplexityLevel {
    fn default() -> Self {
        ComplexityLevel::Medium
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        DependencyType::Blocks
    }
}

impl Priority {
    /// Higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl TaskStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl DependencyType {
    /// Edges that take part in readiness and cycle checks.
    pub fn is_blocking(&self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::Requires)
    }

    pub const BLOCKING: &'static [DependencyType] =
        &[DependencyType::Blocks, DependencyType::Requires];
}

// ============================================================================
// JSON columns
// ============================================================================

pub(crate) fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn decode_metadata(raw: &str, owner: &str) -> Result<Metadata> {
    if raw.trim().is_empty() {
        return Ok(Metadata::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| DbError::Validation(format!("{} has malformed metadata: {}", owner, e)))
}

pub(crate) fn decode_tags(raw: &str, owner: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| DbError::Validation(format!("{} has malformed tags: {}", owner, e)))
}

/// Compare dotted identifiers segment by segment as numbers ("2" < "10" < "10.1").
/// Non-numeric segments sort after numeric ones, lexically.
pub fn compare_identifiers(a: &str, b: &str) -> std::cmp::Ordering {
    identifier_key(a).cmp(&identifier_key(b))
}

fn identifier_key(identifier: &str) -> Vec<(u8, u64, String)> {
    identifier
        .split('.')
        .map(|segment| match segment.parse::<u64>() {
            Ok(n) => (0, n, String::new()),
            Err(_) => (1, 0, segment.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_enum_text_round_trips_through_from_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), *status);
        }
        assert_eq!(TaskStatus::InProgress.as_str(), "in-progress");
        assert_eq!(ComplexityLevel::VeryHigh.to_string(), "very-high");
    }

    #[test]
    fn test_unknown_enum_value() {
        let err = "finished".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err.kind, "TaskStatus");
        assert_eq!(err.value, "finished");
    }

    #[test]
    fn test_serde_uses_column_text() {
        let json = serde_json::to_string(&PrdStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let back: DependencyType = serde_json::from_str("\"requires\"").unwrap();
        assert_eq!(back, DependencyType::Requires);
    }

    #[test]
    fn test_priority_rank() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_blocking_types() {
        assert!(DependencyType::Blocks.is_blocking());
        assert!(DependencyType::Requires.is_blocking());
        assert!(!DependencyType::Related.is_blocking());
    }

    #[test]
    fn test_compare_identifiers_numeric() {
        assert_eq!(compare_identifiers("2", "10"), Ordering::Less);
        assert_eq!(compare_identifiers("10", "10.1"), Ordering::Less);
        assert_eq!(compare_identifiers("3.2", "3.10"), Ordering::Less);
        assert_eq!(compare_identifiers("4", "4"), Ordering::Equal);
        assert_eq!(compare_identifiers("9", "x"), Ordering::Less);
    }

    #[test]
    fn test_decode_json_columns() {
        let meta = decode_metadata(r#"{"source":"legacy"}"#, "task 1").unwrap();
        assert_eq!(meta["source"], "legacy");
        assert!(decode_metadata("", "task 1").unwrap().is_empty());
        assert!(decode_metadata("[1,2]", "task 1").is_err());
        assert_eq!(decode_tags(r#"["a","b"]"#, "prd 1").unwrap(), vec!["a", "b"]);
    }
}
