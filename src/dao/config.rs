//! Key/value settings grouped by `config_type`, global or scoped to a project.

use crate::db::{now_timestamp, Database};
use crate::error::{DbError, Result};
use crate::schema::configurations;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const AI_MODELS: &str = "ai_models";
pub const GLOBAL_SETTINGS: &str = "global_settings";

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = configurations)]
struct ConfigRow {
    id: i32,
    project_id: Option<i32>,
    config_type: String,
    key: String,
    value: String,
    is_default: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: i32,
    /// `None` for global settings
    pub project_id: Option<i32>,
    pub config_type: String,
    pub key: String,
    pub value: Value,
    /// Seeded default, not yet overridden
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<ConfigRow> for ConfigEntry {
    type Error = DbError;

    fn try_from(row: ConfigRow) -> Result<Self> {
        let value = serde_json::from_str(&row.value).map_err(|e| {
            DbError::Validation(format!(
                "Configuration {}.{} holds malformed JSON: {}",
                row.config_type, row.key, e
            ))
        })?;
        Ok(ConfigEntry {
            id: row.id,
            project_id: row.project_id,
            config_type: row.config_type,
            key: row.key,
            value,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = configurations)]
struct ConfigInsert<'a> {
    project_id: Option<i32>,
    config_type: &'a str,
    key: &'a str,
    value: &'a str,
    is_default: bool,
    created_at: &'a str,
    updated_at: &'a str,
}

/// Built-in settings written by `seed_defaults`.
pub fn default_entries() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            AI_MODELS,
            "main",
            json!({"provider": "anthropic", "model_id": "claude-3-7-sonnet-20250219", "max_tokens": 64000, "temperature": 0.2}),
        ),
        (
            AI_MODELS,
            "research",
            json!({"provider": "perplexity", "model_id": "sonar-pro", "max_tokens": 8700, "temperature": 0.1}),
        ),
        (
            AI_MODELS,
            "fallback",
            json!({"provider": "anthropic", "model_id": "claude-3-5-sonnet-20240620", "max_tokens": 8192, "temperature": 0.1}),
        ),
        (GLOBAL_SETTINGS, "log_level", json!("info")),
        (GLOBAL_SETTINGS, "debug", json!(false)),
        (GLOBAL_SETTINGS, "default_subtasks", json!(5)),
        (GLOBAL_SETTINGS, "default_priority", json!("medium")),
        (GLOBAL_SETTINGS, "project_name", json!("TaskHero")),
    ]
}

// ============================================================================
// Connection-level operations
// ============================================================================

fn scoped(project_id: Option<i32>) -> configurations::BoxedQuery<'static, Sqlite> {
    let query = configurations::table.into_boxed();
    match project_id {
        Some(id) => query.filter(configurations::project_id.eq(id)),
        None => query.filter(configurations::project_id.is_null()),
    }
}

pub(crate) fn find(
    conn: &mut SqliteConnection,
    project_id: Option<i32>,
    config_type: &str,
    key: &str,
) -> Result<Option<ConfigEntry>> {
    scoped(project_id)
        .filter(configurations::config_type.eq(config_type.to_string()))
        .filter(configurations::key.eq(key.to_string()))
        .select(ConfigRow::as_select())
        .first(conn)
        .optional()
        .map_err(|e| DbError::query("select configurations by key", e))?
        .map(ConfigEntry::try_from)
        .transpose()
}

/// Write one setting. Existing keys are replaced only when `overwrite` is set.
/// Returns whether a row was written.
pub(crate) fn write(
    conn: &mut SqliteConnection,
    project_id: Option<i32>,
    config_type: &str,
    key: &str,
    value: &Value,
    is_default: bool,
    overwrite: bool,
) -> Result<bool> {
    if config_type.trim().is_empty() || key.trim().is_empty() || key.trim() != key {
        return Err(DbError::Validation(format!(
            "Invalid configuration key '{}.{}'",
            config_type, key
        )));
    }
    let encoded = serde_json::to_string(value)?;
    let now = now_timestamp();

    match find(conn, project_id, config_type, key)? {
        Some(existing) if overwrite => {
            diesel::update(configurations::table.find(existing.id))
                .set((
                    configurations::value.eq(&encoded),
                    configurations::is_default.eq(is_default),
                    configurations::updated_at.eq(&now),
                ))
                .execute(conn)
                .map_err(|e| DbError::query("update configurations", e))?;
            Ok(true)
        }
        Some(_) => Ok(false),
        None => {
            diesel::insert_into(configurations::table)
                .values(&ConfigInsert {
                    project_id,
                    config_type,
                    key,
                    value: &encoded,
                    is_default,
                    created_at: &now,
                    updated_at: &now,
                })
                .execute(conn)
                .map_err(|e| DbError::query("insert configurations", e))?;
            Ok(true)
        }
    }
}

/// Insert the built-in defaults that are missing. Returns how many were added.
pub(crate) fn seed(conn: &mut SqliteConnection, project_id: Option<i32>) -> Result<usize> {
    let mut added = 0;
    for (config_type, key, value) in default_entries() {
        if write(conn, project_id, config_type, key, &value, true, false)? {
            added += 1;
        }
    }
    Ok(added)
}

// ============================================================================
// DAO
// ============================================================================

pub struct ConfigDao<'a> {
    db: &'a Database,
    project_id: Option<i32>,
}

impl<'a> ConfigDao<'a> {
    pub fn global(db: &'a Database) -> Self {
        Self { db, project_id: None }
    }

    pub fn for_project(db: &'a Database, project_id: i32) -> Self {
        Self {
            db,
            project_id: Some(project_id),
        }
    }

    pub fn get(&self, config_type: &str, key: &str) -> Result<Option<ConfigEntry>> {
        self.db
            .with_conn(|conn| find(conn, self.project_id, config_type, key))
    }

    /// Read a setting and deserialize its value.
    pub fn get_value<T: DeserializeOwned>(&self, config_type: &str, key: &str) -> Result<Option<T>> {
        match self.get(config_type, key)? {
            Some(entry) => Ok(Some(serde_json::from_value(entry.value)?)),
            None => Ok(None),
        }
    }

    /// Every setting of one type, keyed by name.
    pub fn get_all(&self, config_type: &str) -> Result<BTreeMap<String, Value>> {
        self.entries(config_type).map(|entries| {
            entries
                .into_iter()
                .map(|e| (e.key, e.value))
                .collect()
        })
    }

    pub fn entries(&self, config_type: &str) -> Result<Vec<ConfigEntry>> {
        self.db.with_conn(|conn| {
            scoped(self.project_id)
                .filter(configurations::config_type.eq(config_type.to_string()))
                .select(ConfigRow::as_select())
                .order(configurations::key.asc())
                .load::<ConfigRow>(conn)
                .map_err(|e| DbError::query("select configurations by type", e))?
                .into_iter()
                .map(ConfigEntry::try_from)
                .collect()
        })
    }

    /// Set a value; the last write wins and the row stops counting as a default.
    pub fn upsert<V: Serialize>(&self, config_type: &str, key: &str, value: &V) -> Result<ConfigEntry> {
        let value = serde_json::to_value(value)?;
        self.db.with_transaction(|conn| {
            write(conn, self.project_id, config_type, key, &value, false, true)?;
            find(conn, self.project_id, config_type, key)?.ok_or_else(|| {
                DbError::not_found("Configuration", format!("{}.{}", config_type, key))
            })
        })
    }

    /// Upsert every entry of `values` in one transaction.
    pub fn bulk_set(&self, config_type: &str, values: &BTreeMap<String, Value>) -> Result<usize> {
        self.db.with_transaction(|conn| {
            for (key, value) in values {
                write(conn, self.project_id, config_type, key, value, false, true)?;
            }
            Ok(values.len())
        })
    }

    /// Insert missing built-in defaults without touching existing keys.
    pub fn seed_defaults(&self) -> Result<usize> {
        let added = self.db.with_transaction(|conn| seed(conn, self.project_id))?;
        tracing::debug!("Seeded {} default configuration entries", added);
        Ok(added)
    }

    pub fn delete(&self, config_type: &str, key: &str) -> Result<()> {
        let deleted = self.db.with_transaction(|conn| {
            let entry = find(conn, self.project_id, config_type, key)?;
            match entry {
                Some(entry) => diesel::delete(configurations::table.find(entry.id))
                    .execute(conn)
                    .map_err(|e| DbError::query("delete configurations", e)),
                None => Ok(0),
            }
        })?;
        if deleted == 0 {
            return Err(DbError::not_found(
                "Configuration",
                format!("{}.{}", config_type, key),
            ));
        }
        Ok(())
    }
}
