//! Serde models for the pre-database `.taskmaster/*.json` files.
//!
//! Field names accept both the snake_case and camelCase spellings that
//! older tool versions wrote. Ids stay as raw JSON values until mapping.

use crate::error::{DbError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TASKS_FILE: &str = "tasks.json";
pub const PRDS_FILE: &str = "prds.json";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyTask {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default, alias = "testStrategy")]
    pub test_strategy: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Subtask-era flag, used when there is no status
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Either a 1-10 score or a level name
    #[serde(default, alias = "complexityScore")]
    pub complexity: Option<Value>,
    #[serde(default, alias = "estimatedHours")]
    pub estimated_hours: Option<f64>,
    #[serde(default, alias = "actualHours")]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, alias = "dueDate")]
    pub due_date: Option<String>,
    /// Legacy id of the PRD the task came from
    #[serde(default, alias = "prdId", alias = "prd")]
    pub prd_id: Option<Value>,
    #[serde(default)]
    pub dependencies: Vec<Value>,
    #[serde(default)]
    pub subtasks: Vec<LegacyTask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPrd {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "fileName")]
    pub file_name: Option<String>,
    #[serde(default, alias = "filePath")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "estimatedEffort")]
    pub estimated_effort: Option<String>,
    #[serde(default, alias = "lastParsed", alias = "lastParsedAt")]
    pub last_parsed_at: Option<String>,
}

/// Settings of one `config_type`.
pub type ConfigSection = BTreeMap<String, Value>;

/// Everything found in a `.taskmaster` directory, parsed.
#[derive(Debug, Clone, Default)]
pub struct LegacyFiles {
    pub tasks: Vec<LegacyTask>,
    pub prds: Vec<LegacyPrd>,
    pub config: BTreeMap<String, ConfigSection>,
    /// Files that were present and parsed
    pub sources: Vec<PathBuf>,
}

impl LegacyFiles {
    /// Parse whichever legacy files exist in `dir`. `None` when there are none.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let mut files = LegacyFiles::default();

        if let Some((path, value)) = read_json(dir, TASKS_FILE)? {
            files.tasks = parse_tasks(value)
                .map_err(|e| DbError::Migration(format!("{}: {}", path.display(), e)))?;
            files.sources.push(path);
        }
        if let Some((path, value)) = read_json(dir, PRDS_FILE)? {
            files.prds = parse_prds(value)
                .map_err(|e| DbError::Migration(format!("{}: {}", path.display(), e)))?;
            files.sources.push(path);
        }
        if let Some((path, value)) = read_json(dir, CONFIG_FILE)? {
            files.config = parse_config(value)
                .map_err(|e| DbError::Migration(format!("{}: {}", path.display(), e)))?;
            files.sources.push(path);
        }

        Ok((!files.sources.is_empty()).then_some(files))
    }
}

fn read_json(dir: &Path, name: &str) -> Result<Option<(PathBuf, Value)>> {
    let path = dir.join(name);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| DbError::Migration(format!("{} is not valid JSON: {}", path.display(), e)))?;
    Ok(Some((path, value)))
}

/// `{"tasks": [...]}`, a bare array, or `{"<tag>": {"tasks": [...]}}`.
pub fn parse_tasks(value: Value) -> std::result::Result<Vec<LegacyTask>, String> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove("tasks") {
            Some(tasks) => tasks,
            None => first_tagged(map).ok_or("no task list found")?,
        },
        _ => return Err("expected an object or an array".to_string()),
    };
    serde_json::from_value(list).map_err(|e| e.to_string())
}

fn first_tagged(map: Map<String, Value>) -> Option<Value> {
    map.into_iter().find_map(|(_, tagged)| match tagged {
        Value::Object(mut inner) => inner.remove("tasks").filter(Value::is_array),
        _ => None,
    })
}

/// `{"prds": [...]}` or a bare array.
pub fn parse_prds(value: Value) -> std::result::Result<Vec<LegacyPrd>, String> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map.remove("prds").ok_or("no prds list found")?,
        _ => return Err("expected an object or an array".to_string()),
    };
    serde_json::from_value(list).map_err(|e| e.to_string())
}

/// Object-valued top-level keys become sections: `models` is `ai_models`,
/// `global` is `global_settings`, anything else keeps its name. Scalars at
/// the top level land in `global_settings`.
pub fn parse_config(value: Value) -> std::result::Result<BTreeMap<String, ConfigSection>, String> {
    let Value::Object(map) = value else {
        return Err("expected an object".to_string());
    };
    let mut sections: BTreeMap<String, ConfigSection> = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => {
                let section = match key.as_str() {
                    "models" => "ai_models".to_string(),
                    "global" => "global_settings".to_string(),
                    _ => key,
                };
                sections.entry(section).or_default().extend(inner);
            }
            scalar => {
                sections
                    .entry("global_settings".to_string())
                    .or_default()
                    .insert(key, scalar);
            }
        }
    }
    Ok(sections)
}
