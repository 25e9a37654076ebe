//! Pure conversions from legacy records to store inputs. No I/O here.

use super::legacy::{LegacyPrd, LegacyTask};
use crate::dao::{NewPrd, NewTask};
use crate::error::{DbError, Result};
use crate::models::{ComplexityLevel, PrdStatus, Priority, TaskStatus};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Turn a legacy id (`3`, `"3"`, `"task_003"`, `"3.2"`) into a dotted identifier.
pub fn normalize_identifier(raw: &Value) -> Result<String> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| {
        Regex::new(r"^[A-Za-z_\-#]*?(\d+(?:\.\d+)*)$").expect("identifier pattern is valid")
    });

    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(DbError::Migration(format!(
                "Unsupported task id {}",
                other
            )))
        }
    };

    let caps = digits
        .captures(&text)
        .ok_or_else(|| DbError::Migration(format!("Unsupported task id '{}'", text)))?;
    let dotted = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    // "task_003" and "3" are the same task
    let segments: Vec<String> = dotted
        .split('.')
        .map(|segment| {
            segment
                .parse::<u64>()
                .map(|n| n.to_string())
                .unwrap_or_else(|_| segment.to_string())
        })
        .collect();
    Ok(segments.join("."))
}

fn canonical(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}

/// Map a legacy status string; unknown values fall back to `pending`.
pub fn map_task_status(raw: Option<&str>) -> TaskStatus {
    let Some(raw) = raw else {
        return TaskStatus::Pending;
    };
    match canonical(raw).as_str() {
        "" | "pending" | "todo" | "to-do" | "open" | "new" | "not-started" => TaskStatus::Pending,
        "in-progress" | "inprogress" | "active" | "doing" | "started" | "wip" => TaskStatus::InProgress,
        "done" | "completed" | "complete" | "finished" | "closed" | "resolved" => TaskStatus::Done,
        "review" | "in-review" | "needs-review" => TaskStatus::Review,
        "blocked" => TaskStatus::Blocked,
        "deferred" | "postponed" | "on-hold" => TaskStatus::Deferred,
        "cancelled" | "canceled" | "wontfix" | "wont-fix" => TaskStatus::Cancelled,
        other => {
            tracing::warn!("Unknown legacy status '{}', importing as pending", other);
            TaskStatus::Pending
        }
    }
}

/// Subtasks may carry only a `completed` flag; an explicit status wins, except
/// that `completed: true` always means done.
pub fn map_subtask_status(status: Option<&str>, completed: Option<bool>) -> TaskStatus {
    match (status, completed) {
        (_, Some(true)) => TaskStatus::Done,
        (Some(status), _) => map_task_status(Some(status)),
        (None, Some(false)) | (None, None) => TaskStatus::Pending,
    }
}

pub fn map_priority(raw: Option<&str>) -> Priority {
    match raw.map(canonical).as_deref() {
        Some("high") | Some("critical") | Some("urgent") | Some("p0") | Some("p1") => Priority::High,
        Some("low") | Some("minor") | Some("p3") => Priority::Low,
        _ => Priority::Medium,
    }
}

pub fn map_complexity_level(raw: &str) -> Option<ComplexityLevel> {
    match canonical(raw).as_str() {
        "low" | "simple" | "easy" => Some(ComplexityLevel::Low),
        "medium" | "moderate" => Some(ComplexityLevel::Medium),
        "high" | "complex" | "hard" => Some(ComplexityLevel::High),
        "very-high" | "veryhigh" | "critical" | "extreme" => Some(ComplexityLevel::VeryHigh),
        _ => None,
    }
}

fn level_for_score(score: i32) -> ComplexityLevel {
    match score {
        i32::MIN..=3 => ComplexityLevel::Low,
        4..=6 => ComplexityLevel::Medium,
        7..=8 => ComplexityLevel::High,
        _ => ComplexityLevel::VeryHigh,
    }
}

/// A numeric complexity becomes a clamped 1-10 score plus its level; a named
/// one becomes a level only.
pub fn map_complexity(raw: Option<&Value>) -> (Option<i32>, Option<ComplexityLevel>) {
    match raw {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) => {
                let score = (v.round() as i64).clamp(1, 10) as i32;
                (Some(score), Some(level_for_score(score)))
            }
            None => (None, None),
        },
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) => map_complexity(Some(&Value::from(v))),
            Err(_) => (None, map_complexity_level(s)),
        },
        _ => (None, None),
    }
}

pub fn map_prd_status(raw: Option<&str>) -> PrdStatus {
    match raw.map(canonical).as_deref() {
        Some("in-progress") | Some("active") | Some("parsed") => PrdStatus::InProgress,
        Some("done") | Some("completed") | Some("complete") => PrdStatus::Done,
        Some("archived") => PrdStatus::Archived,
        _ => PrdStatus::Pending,
    }
}

/// Resolve a dependency reference to an absolute identifier. Inside a subtask
/// (`parent` set) a bare number names a sibling; dotted ids are absolute.
pub fn resolve_dependency(raw: &Value, parent: Option<&str>) -> Result<String> {
    let identifier = normalize_identifier(raw)?;
    match parent {
        Some(parent) if !identifier.contains('.') => Ok(format!("{}.{}", parent, identifier)),
        _ => Ok(identifier),
    }
}

/// Non-empty title, or a migration error naming the record.
pub fn require_title(title: Option<&str>, context: &str) -> Result<String> {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(DbError::Migration(format!("{} has no title", context))),
    }
}

/// Legacy PRD key used to link tasks, normalized to a plain string.
pub fn prd_key(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `position` is the record's index in the file, for the fallback identifier.
pub fn prd_to_new(prd: &LegacyPrd, project_id: i32, position: usize) -> Result<NewPrd> {
    let context = format!("PRD #{}", position + 1);
    let title = require_title(prd.title.as_deref(), &context)?;
    let identifier = prd
        .id
        .as_ref()
        .and_then(prd_key)
        .unwrap_or_else(|| format!("prd_{:03}", position + 1));
    let file_name = prd
        .file_name
        .clone()
        .or_else(|| {
            prd.file_path.as_deref().and_then(|p| {
                std::path::Path::new(p)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
        })
        .unwrap_or_else(|| format!("{}.md", identifier));

    Ok(NewPrd {
        project_id,
        identifier: Some(identifier),
        title,
        file_name,
        file_path: prd.file_path.clone(),
        status: map_prd_status(prd.status.as_deref()),
        complexity: prd
            .complexity
            .as_deref()
            .and_then(map_complexity_level)
            .unwrap_or_default(),
        priority: map_priority(prd.priority.as_deref()),
        description: prd.description.clone(),
        tags: prd.tags.clone(),
        estimated_effort: prd.estimated_effort.clone(),
        last_parsed_at: prd.last_parsed_at.clone(),
        ..Default::default()
    })
}

/// Build the insert for a task or subtask. `identifier` is already absolute.
pub fn task_to_new(
    task: &LegacyTask,
    project_id: i32,
    identifier: &str,
    parent_task_id: Option<i32>,
    prd_id: Option<i32>,
) -> Result<NewTask> {
    let title = require_title(task.title.as_deref(), &format!("Task {}", identifier))?;
    let status = if parent_task_id.is_some() {
        map_subtask_status(task.status.as_deref(), task.completed)
    } else {
        map_task_status(task.status.as_deref())
    };
    let (complexity_score, complexity_level) = map_complexity(task.complexity.as_ref());

    Ok(NewTask {
        project_id,
        prd_id,
        parent_task_id,
        identifier: Some(identifier.to_string()),
        title,
        description: task.description.clone(),
        details: task.details.clone(),
        test_strategy: task.test_strategy.clone(),
        status,
        priority: map_priority(task.priority.as_deref()),
        complexity_score,
        complexity_level,
        estimated_hours: task.estimated_hours,
        actual_hours: task.actual_hours,
        assignee: task.assignee.clone(),
        due_date: task.due_date.clone(),
        ..Default::default()
    })
}
