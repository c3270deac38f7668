//! 列表查询参数
//!
//! `priority` 既可以是逗号分隔列表也可以重复出现，所以直接解析原始查询串

use crate::tasks::model::{Priority, Task};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tasker_common::Pagination;
use tasker_errors::{AppError, AppResult};
use url::form_urlencoded;

const MAX_PAGE_SIZE: u32 = 100;

/// 列表接口识别的查询参数，其余参数被忽略
pub const LIST_QUERY_PARAMS: [&str; 9] = [
    "completed",
    "priority",
    "search",
    "startDate",
    "endDate",
    "sortBy",
    "sortOrder",
    "page",
    "limit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortField {
    #[default]
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "priority")]
    Priority,
    #[serde(rename = "completed")]
    Completed,
}

impl SortField {
    /// 未知字段回退到 `createdAt`
    fn parse(value: &str) -> Self {
        match value {
            "title" => Self::Title,
            "priority" => Self::Priority,
            "completed" => Self::Completed,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// 列表查询
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub completed: Option<bool>,
    pub priorities: Vec<Priority>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl TaskQuery {
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        let mut query = Self::default();
        let mut page = None;
        let mut limit = None;

        for (name, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            match name.as_ref() {
                "completed" => query.completed = Some(value == "true"),
                "priority" => {
                    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
                        let priority: Priority = part.parse()?;
                        if !query.priorities.contains(&priority) {
                            query.priorities.push(priority);
                        }
                    }
                }
                "search" => {
                    let term = value.trim();
                    query.search = (!term.is_empty()).then(|| term.to_lowercase());
                }
                "startDate" => query.start_date = Some(parse_date("startDate", &value)?),
                "endDate" => query.end_date = Some(parse_date("endDate", &value)?),
                "sortBy" => query.sort_by = SortField::parse(&value),
                "sortOrder" => query.sort_order = SortOrder::parse(&value),
                "page" => page = value.trim().parse::<u32>().ok(),
                "limit" => limit = value.trim().parse::<u32>().ok(),
                _ => {}
            }
        }

        query.pagination = Pagination::new(page, limit.map(|l| l.min(MAX_PAGE_SIZE)));
        Ok(query)
    }

    pub fn matches(&self, task: &Task) -> bool {
        if self.completed.is_some_and(|c| c != task.completed) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        if let Some(term) = &self.search {
            let in_title = task.title.to_lowercase().contains(term);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(term));
            if !in_title && !in_description {
                return false;
            }
        }

        let created = task.created_at.date_naive();
        if self.start_date.is_some_and(|start| created < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| created > end) {
            return false;
        }
        true
    }

    /// 按排序字段比较；标题相同按创建时间倒序
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let primary = match self.sort_by {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::Completed => a.completed.cmp(&b.completed),
        };
        let primary = match self.sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };

        primary.then_with(|| b.created_at.cmp(&a.created_at))
    }

    /// 响应中回显的已生效过滤条件
    pub fn applied(&self) -> AppliedFilters {
        AppliedFilters {
            completed: self.completed,
            priority: (!self.priorities.is_empty()).then(|| self.priorities.clone()),
            search: self.search.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

fn parse_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{field} must be a YYYY-MM-DD date")))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    pub completed: Option<bool>,
    pub priority: Option<Vec<Priority>>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}
