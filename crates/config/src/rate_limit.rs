//! 限流配置

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认时间窗口：15 分钟
const DEFAULT_WINDOW_MS: u64 = 15 * 60 * 1000;

/// 单个层级的配额
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRule {
    /// 时间窗口（毫秒）
    pub window_ms: u64,
    /// 窗口内允许的最大请求数
    pub max: u64,
    /// 超限时返回给调用方的提示
    pub message: String,
}

impl QuotaRule {
    pub fn new(window_ms: u64, max: u64, message: impl Into<String>) -> Self {
        Self {
            window_ms,
            max,
            message: message.into(),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn validate(&self, tier: &str) -> Result<(), ConfigError> {
        if self.window_ms == 0 {
            return Err(ConfigError::invalid(format!(
                "rate_limit.{}.window_ms must be positive",
                tier
            )));
        }
        if self.max == 0 {
            return Err(ConfigError::invalid(format!(
                "rate_limit.{}.max must be positive",
                tier
            )));
        }
        Ok(())
    }
}

/// 限流响应头开关
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderSettings {
    /// `X-RateLimit-*` 头
    pub standard: bool,
    /// `X-Rate-Limit-*` 旧式头（重置时间为 Unix 时间戳）
    pub legacy: bool,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            standard: true,
            legacy: false,
        }
    }
}

/// 计数器清理配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// 清理间隔（秒）
    pub interval_secs: u64,
    /// 窗口结束后再保留多少个窗口长度
    pub idle_windows: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            idle_windows: 1,
        }
    }
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// 限流配置
///
/// 层级表名固定，未知的层级名在加载时直接报错
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// 总开关；关闭时启动日志会明确提示
    pub enabled: bool,
    /// 跳过限流的路径（精确匹配，或以 `/*` 结尾的前缀匹配）
    pub skip_paths: Vec<String>,
    /// 认证敏感接口（登录、注册），始终使用 `anonymous_auth` 层级
    pub auth_paths: Vec<String>,
    pub headers: HeaderSettings,
    pub anonymous_general: QuotaRule,
    pub anonymous_auth: QuotaRule,
    pub authenticated: QuotaRule,
    pub sweep: SweepSettings,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_paths: vec![
                "/health".to_string(),
                "/metrics".to_string(),
                "/api-docs".to_string(),
                "/api-docs/*".to_string(),
            ],
            auth_paths: vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
            ],
            headers: HeaderSettings::default(),
            anonymous_general: QuotaRule::new(
                DEFAULT_WINDOW_MS,
                100,
                "Rate limit exceeded for unauthenticated clients",
            ),
            anonymous_auth: QuotaRule::new(
                DEFAULT_WINDOW_MS,
                5,
                "Too many authentication attempts. Please try again in a few minutes.",
            ),
            authenticated: QuotaRule::new(
                DEFAULT_WINDOW_MS,
                500,
                "Rate limit exceeded for this user",
            ),
            sweep: SweepSettings::default(),
        }
    }
}

impl RateLimitSettings {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.anonymous_general.validate("anonymous_general")?;
        self.anonymous_auth.validate("anonymous_auth")?;
        self.authenticated.validate("authenticated")?;

        for pattern in self.skip_paths.iter().chain(self.auth_paths.iter()) {
            validate_path_pattern(pattern)?;
        }

        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.sweep.interval_secs must be positive",
            ));
        }
        Ok(())
    }
}

fn validate_path_pattern(pattern: &str) -> Result<(), ConfigError> {
    if !pattern.starts_with('/') {
        return Err(ConfigError::invalid(format!(
            "path pattern `{}` must start with `/`",
            pattern
        )));
    }
    let body = pattern.strip_suffix("/*").unwrap_or(pattern);
    if body.contains('*') {
        return Err(ConfigError::invalid(format!(
            "path pattern `{}` may only use `/*` as a trailing wildcard",
            pattern
        )));
    }
    Ok(())
}
