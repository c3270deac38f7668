//! 任务模型与输入校验

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tasker_common::UserId;
use tasker_errors::{AppError, AppResult};
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 1000;

/// 任务优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// 排序权重，low < medium < high
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(AppError::validation(format!(
                "Priority must be one of low, medium, high (got '{other}')"
            ))),
        }
    }
}

/// 任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: UserId, input: ValidNewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            title: input.title,
            description: input.description,
            priority: input.priority,
            completed: false,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        self.updated_at = Utc::now();
    }
}

/// 创建任务请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// 校验通过的创建请求
#[derive(Debug, Clone)]
pub struct ValidNewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    pub fn validate(self) -> AppResult<ValidNewTask> {
        Ok(ValidNewTask {
            title: validate_title(&self.title)?,
            description: self.description.map(validate_description).transpose()?,
            priority: self
                .priority
                .as_deref()
                .map(Priority::from_str)
                .transpose()?
                .unwrap_or_default(),
            due_date: self.due_date,
        })
    }
}

/// 更新任务请求体，缺省字段保持不变
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

/// 校验通过的更新
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateTask {
    pub fn validate(self) -> AppResult<TaskPatch> {
        Ok(TaskPatch {
            title: self.title.as_deref().map(validate_title).transpose()?,
            description: self.description.map(validate_description).transpose()?,
            priority: self
                .priority
                .as_deref()
                .map(Priority::from_str)
                .transpose()?,
            completed: self.completed,
            due_date: self.due_date,
        })
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title is required"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Title must be at most {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: String) -> AppResult<String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(AppError::validation(format!(
            "Description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(description)
}

/// 任务统计
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    /// 百分比，保留两位小数
    pub completion_rate: String,
}

impl TaskStats {
    pub fn new(total: u64, completed: u64) -> Self {
        let rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            total,
            completed,
            pending: total - completed,
            completion_rate: format!("{rate:.2}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str, priority: Option<&str>) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            priority: priority.map(str::to_string),
            due_date: None,
        }
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(Priority::Low.rank() < Priority::High.rank());
    }

    #[test]
    fn test_new_task_defaults_to_medium() {
        let valid = new_task("  Buy milk ", None).validate().unwrap();
        assert_eq!(valid.title, "Buy milk");
        assert_eq!(valid.priority, Priority::Medium);
    }

    #[test]
    fn test_title_bounds() {
        assert!(new_task("", None).validate().is_err());
        assert!(new_task("   ", None).validate().is_err());
        assert!(new_task(&"a".repeat(200), None).validate().is_ok());
        assert!(new_task(&"a".repeat(201), None).validate().is_err());
    }

    #[test]
    fn test_invalid_priority_rejected() {
        let err = new_task("x", Some("urgent")).validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_patch_keeps_missing_fields() {
        let valid = new_task("Write report", Some("high")).validate().unwrap();
        let mut task = Task::new(UserId::new("u"), valid);

        let patch = UpdateTask {
            completed: Some(true),
            ..Default::default()
        }
        .validate()
        .unwrap();
        task.apply(patch);

        assert!(task.completed);
        assert_eq!(task.title, "Write report");
        assert_eq!(task.priority, Priority::High);
    }

    #[test]
    fn test_stats_rate() {
        assert_eq!(TaskStats::new(0, 0).completion_rate, "0.00");
        let stats = TaskStats::new(3, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completion_rate, "33.33");
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let valid = new_task("x", None).validate().unwrap();
        let json = serde_json::to_value(Task::new(UserId::new("u"), valid)).unwrap();
        assert_eq!(json["userId"], "u");
        assert_eq!(json["priority"], "medium");
        assert!(json.get("createdAt").is_some());
    }
}
