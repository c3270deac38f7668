//! 应用共享状态

use crate::cache::ResponseCache;
use crate::identity::{IdentityResolver, TrustedHeaderResolver};
use crate::rate_limit::AdmissionEngine;
use crate::tasks::{InMemoryTaskRepository, TaskRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Instant;
use tasker_common::Clock;
use tasker_config::{AppConfig, ConfigError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<AdmissionEngine>,
    pub cache: Arc<ResponseCache>,
    pub tasks: Arc<dyn TaskRepository>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub metrics: Option<PrometheusHandle>,
    pub started_at: Instant,
}

impl AppState {
    /// 从配置构建全部组件；限流配置错误直接返回
    pub fn build(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let engine = AdmissionEngine::new(&config.rate_limit, clock.clone())?;
        let cache = ResponseCache::new(config.cache.ttl(), clock);
        let resolver = TrustedHeaderResolver::from_settings(&config.identity);

        Ok(Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            cache: Arc::new(cache),
            tasks: Arc::new(InMemoryTaskRepository::new()),
            resolver: Arc::new(resolver),
            metrics: None,
            started_at: Instant::now(),
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
