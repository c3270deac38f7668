//! tasker-config - 配置加载库
//!
//! 加载顺序：内置默认值 → `{dir}/default.toml` → `{dir}/{APP_ENV}.toml` → `TASKER_` 环境变量

mod rate_limit;

pub use rate_limit::{HeaderSettings, QuotaRule, RateLimitSettings, SweepSettings};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// 环境变量前缀，层级之间用 `__` 分隔
const ENV_PREFIX: &str = "TASKER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] Box<figment::Error>),

    /// 配置错误在启动时是致命的，绝不能静默退化为“不限流”
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// 输出 JSON 格式日志（生产环境）
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// 响应缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    /// 写操作后是否清除该用户的缓存
    ///
    /// 默认关闭：列表缓存在 TTL 内可能落后于写操作
    pub invalidate_on_write: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            invalidate_on_write: false,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// 身份解析配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// 上游认证代理写入的用户 ID 头
    pub user_header: String,
    /// 是否信任 `X-Forwarded-For` / `X-Real-IP`，只应在受信任的反向代理之后开启
    pub trust_forwarded: bool,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            user_header: "x-user-id".to_string(),
            trust_forwarded: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub identity: IdentitySettings,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_env: default_app_env(),
            server: ServerConfig::default(),
            telemetry: TelemetryConfig::default(),
            rate_limit: RateLimitSettings::default(),
            cache: CacheSettings::default(),
            identity: IdentitySettings::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置，并做启动期校验
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let mut config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.app_env = env;

        config.validate()?;
        Ok(config)
    }

    /// 启动期校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::invalid("cache.ttl_secs must be positive"));
        }
        if self.identity.user_header.trim().is_empty() {
            return Err(ConfigError::invalid("identity.user_header must not be empty"));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
