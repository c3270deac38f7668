//! Tasker API Gateway
//!
//! - `identity`: 调用方身份解析
//! - `rate_limit`: 分级固定窗口限流
//! - `cache`: 按用户隔离的列表响应缓存
//! - `tasks`: 任务接口

pub mod auth;
pub mod cache;
pub mod identity;
pub mod rate_limit;
pub mod routing;
pub mod security_headers;
pub mod shutdown;
pub mod state;
pub mod tasks;
