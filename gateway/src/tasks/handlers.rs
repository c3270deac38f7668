//! 任务接口处理函数

use crate::identity::AuthUser;
use crate::state::AppState;
use crate::tasks::model::{NewTask, Task, TaskStats, UpdateTask};
use crate::tasks::query::{AppliedFilters, TaskQuery};
use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::StatusCode,
};
use serde::Serialize;
use tasker_common::{PageInfo, UserId};
use tasker_errors::{AppError, AppResult};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> DataResponse<T> {
    fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    fn with_message(message: &'static str, data: Option<T>) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub data: Vec<Task>,
    pub pagination: PageInfo,
    pub filters: FiltersEcho,
}

#[derive(Debug, Serialize)]
pub struct FiltersEcho {
    pub applied: AppliedFilters,
}

fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(format!("Task {raw} not found")))
}

/// 写操作后按配置清除该用户的列表缓存
fn after_write(state: &AppState, user_id: &UserId) {
    if state.config.cache.invalidate_on_write {
        let removed = state.cache.invalidate_user(user_id);
        debug!(user_id = %user_id, removed, "Invalidated cached task lists");
    }
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    RawQuery(raw): RawQuery,
) -> AppResult<Json<ListResponse>> {
    let query = TaskQuery::parse(raw.as_deref())?;
    let (tasks, total) = state.tasks.list(&user_id, &query).await?;

    info!(
        user_id = %user_id,
        returned = tasks.len(),
        total,
        "Listed tasks"
    );

    Ok(Json(ListResponse {
        success: true,
        data: tasks,
        pagination: PageInfo::new(&query.pagination, total),
        filters: FiltersEcho {
            applied: query.applied(),
        },
    }))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(input): Json<NewTask>,
) -> AppResult<(StatusCode, Json<DataResponse<Task>>)> {
    let input = input.validate()?;
    let task = state
        .tasks
        .insert(Task::new(user_id.clone(), input))
        .await?;
    after_write(&state, &user_id);

    info!(user_id = %user_id, task_id = %task.id, "Task created");
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::with_message("Task created", Some(task))),
    ))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task_id = parse_id(&id)?;
    let task = state
        .tasks
        .find(&user_id, task_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {id} not found")))?;
    Ok(Json(DataResponse::data(task)))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateTask>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task_id = parse_id(&id)?;
    let patch = input.validate()?;
    let task = state
        .tasks
        .update(&user_id, task_id, patch)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {id} not found")))?;
    after_write(&state, &user_id);

    info!(user_id = %user_id, task_id = %task.id, "Task updated");
    Ok(Json(DataResponse::with_message("Task updated", Some(task))))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<()>>> {
    let task_id = parse_id(&id)?;
    if !state.tasks.delete(&user_id, task_id).await? {
        return Err(AppError::not_found(format!("Task {id} not found")));
    }
    after_write(&state, &user_id);

    info!(user_id = %user_id, task_id = %task_id, "Task deleted");
    Ok(Json(DataResponse::with_message("Task deleted", None)))
}

/// GET /api/tasks/stats/summary
pub async fn task_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<DataResponse<TaskStats>>> {
    let stats = state.tasks.stats(&user_id).await?;
    debug!(user_id = %user_id, total = stats.total, "Computed task stats");
    Ok(Json(DataResponse::data(stats)))
}
