//! 分级限流
//!
//! 基于调用方身份和接口敏感度的固定窗口限流

pub mod classifier;
pub mod config;
pub mod engine;
pub mod middleware;
pub mod store;
pub mod sweeper;
pub mod tier;
pub mod types;

pub use classifier::EndpointClassifier;
pub use config::{QuotaPolicy, QuotaPolicyTable};
pub use engine::AdmissionEngine;
pub use middleware::{RateLimitMiddleware, rate_limit_middleware};
pub use sweeper::spawn_sweeper;
pub use types::{Decision, QuotaTier, RateLimitResult};
