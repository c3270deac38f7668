//! 接口分类器
//!
//! 根据请求路径判断是否跳过限流、是否为认证敏感接口

use crate::rate_limit::types::EndpointClass;
use tasker_config::RateLimitSettings;

/// 路径模式
///
/// - `/health`: 精确匹配
/// - `/api-docs/*`: 匹配 `/api-docs` 本身及其下所有子路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/*") {
            Some(prefix) => Self::Prefix(prefix.to_string()),
            None => Self::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
                None => false,
            },
        }
    }
}

/// 接口分类器
#[derive(Debug, Clone, Default)]
pub struct EndpointClassifier {
    skip: Vec<PathPattern>,
    auth: Vec<PathPattern>,
}

impl EndpointClassifier {
    pub fn new<S: AsRef<str>>(skip_paths: &[S], auth_paths: &[S]) -> Self {
        Self {
            skip: skip_paths.iter().map(|p| PathPattern::parse(p.as_ref())).collect(),
            auth: auth_paths.iter().map(|p| PathPattern::parse(p.as_ref())).collect(),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(&settings.skip_paths, &settings.auth_paths)
    }

    /// 对请求路径进行分类
    ///
    /// # 分类规则
    /// 1. Bypass: 命中跳过列表
    /// 2. AuthSensitive: 命中认证接口列表
    /// 3. General: 其他
    pub fn classify(&self, path: &str) -> EndpointClass {
        if self.skip.iter().any(|p| p.matches(path)) {
            return EndpointClass::Bypass;
        }
        if self.auth.iter().any(|p| p.matches(path)) {
            return EndpointClass::AuthSensitive;
        }
        EndpointClass::General
    }
}
