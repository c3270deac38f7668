//! API 路由
//!
//! 中间件由外到内：trace → CORS → 请求体上限 → 安全头 → 身份解析 → 限流 → 路由

use crate::auth::auth_routes;
use crate::cache::response_cache_middleware;
use crate::identity::identity_middleware;
use crate::rate_limit::{RateLimitMiddleware, rate_limit_middleware};
use crate::security_headers::security_headers_middleware;
use crate::state::AppState;
use crate::tasks::handlers::{
    create_task, delete_task, get_task, list_tasks, task_stats, update_task,
};
use axum::{
    Json, Router,
    extract::State,
    http::{Method, Uri, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tasker_errors::AppError;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// 构建完整的应用路由
pub fn build_router(state: AppState) -> Router {
    let rate_limit = Arc::new(RateLimitMiddleware::new(
        state.engine.clone(),
        state.config.rate_limit.headers,
    ));

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route("/api-docs", get(api_docs))
        .merge(auth_routes())
        .merge(task_routes(&state))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.resolver.clone(),
            identity_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(RequestBodyLimitLayer::new(
            state.config.server.body_limit_bytes,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 任务路由；只有列表查询经过响应缓存
fn task_routes(state: &AppState) -> Router<AppState> {
    let cached_list = get(list_tasks).layer(middleware::from_fn_with_state(
        state.cache.clone(),
        response_cache_middleware,
    ));

    Router::new()
        .route("/api/tasks", cached_list.post(create_task))
        .route("/api/tasks/stats/summary", get(task_stats))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Task management API with tiered rate limiting",
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "docs": "/api-docs",
            "auth": "/api/auth",
            "tasks": "/api/tasks"
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// 进程运行秒数
    pub uptime: f64,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => AppError::not_found("Metrics recorder is not installed").into_response(),
    }
}

async fn api_docs() -> Json<Value> {
    Json(json!({
        "title": "Tasker API",
        "version": env!("CARGO_PKG_VERSION"),
        "authentication": "Requests are authenticated upstream; the user id arrives in a trusted header",
        "endpoints": [
            { "method": "GET", "path": "/health", "description": "Liveness probe, never rate limited" },
            { "method": "GET", "path": "/metrics", "description": "Prometheus metrics" },
            { "method": "POST", "path": "/api/auth/login", "description": "Handled by the identity service" },
            { "method": "POST", "path": "/api/auth/register", "description": "Handled by the identity service" },
            { "method": "GET", "path": "/api/tasks", "description": "List tasks with filters, sorting and pagination (cached per user)" },
            { "method": "POST", "path": "/api/tasks", "description": "Create a task" },
            { "method": "GET", "path": "/api/tasks/stats/summary", "description": "Task counts and completion rate" },
            { "method": "GET", "path": "/api/tasks/{id}", "description": "Fetch a task" },
            { "method": "PUT", "path": "/api/tasks/{id}", "description": "Update a task" },
            { "method": "DELETE", "path": "/api/tasks/{id}", "description": "Delete a task" }
        ]
    }))
}

async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::not_found(format!("Route {} {} not found", method, uri.path()))
}
