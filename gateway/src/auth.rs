//! 认证路由
//!
//! 凭证校验和令牌签发由外部身份服务负责；这两个接口只保留路由，
//! 以便按认证接口层级限流

use crate::state::AppState;
use axum::{Router, routing::post};
use tasker_errors::{AppError, AppResult};
use tracing::info;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
}

async fn login() -> AppResult<()> {
    info!("Login attempt rejected, handled by identity service");
    Err(AppError::not_implemented(
        "Login is handled by the identity service",
    ))
}

async fn register() -> AppResult<()> {
    info!("Registration attempt rejected, handled by identity service");
    Err(AppError::not_implemented(
        "Registration is handled by the identity service",
    ))
}
