//! 数据结构定义

use std::fmt;
use std::time::{Duration, Instant};
use tasker_common::CallerIdentity;

/// 配额层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaTier {
    /// 匿名调用方的普通请求
    AnonymousGeneral,
    /// 认证敏感接口（登录、注册），不论身份
    AnonymousAuthEndpoint,
    /// 已认证用户
    AuthenticatedUser,
}

impl QuotaTier {
    pub const ALL: [QuotaTier; 3] = [
        Self::AnonymousGeneral,
        Self::AnonymousAuthEndpoint,
        Self::AuthenticatedUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnonymousGeneral => "anonymous_general",
            Self::AnonymousAuthEndpoint => "anonymous_auth",
            Self::AuthenticatedUser => "authenticated",
        }
    }
}

impl fmt::Display for QuotaTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 接口类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// 跳过限流（健康检查、文档）
    Bypass,
    /// 认证敏感接口
    AuthSensitive,
    /// 其他接口
    General,
}

/// 计数器键：`(层级, 身份判别符)`
///
/// 已认证调用方的判别符为 `userId:origin`，把凭证绑定到网络来源；
/// 匿名调用方只用 `origin`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowCounterKey {
    tier: QuotaTier,
    discriminator: String,
}

impl WindowCounterKey {
    pub fn new(tier: QuotaTier, identity: &CallerIdentity) -> Self {
        let discriminator = match identity.user_id() {
            Some(user_id) => format!("{}:{}", user_id, identity.origin()),
            None => identity.origin().to_string(),
        };
        Self {
            tier,
            discriminator,
        }
    }

    pub fn tier(&self) -> QuotaTier {
        self.tier
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }
}

impl fmt::Display for WindowCounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tier, self.discriminator)
    }
}

/// 单个键的窗口计数
#[derive(Debug, Clone, Copy)]
pub struct WindowCounterState {
    pub count: u64,
    pub window_start: Instant,
}

impl WindowCounterState {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// `now - window_start >= window` 时窗口已结束
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }

    /// 距窗口结束的剩余时间
    pub fn time_until_reset(&self, now: Instant, window: Duration) -> Duration {
        (self.window_start + window).saturating_duration_since(now)
    }
}

/// 限流检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub tier: QuotaTier,
    /// 当前窗口内已计入的请求数
    pub count: u64,
    /// 限制的最大请求数
    pub limit: u64,
    /// 剩余可用请求数
    pub remaining: u64,
    /// 距窗口重置的秒数（向上取整）
    pub reset_after_secs: u64,
    /// 建议重试等待时间（秒，仅在拒绝时有效）
    pub retry_after: Option<u64>,
}

/// 准入决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 路径在跳过列表中，或限流总开关关闭
    Bypass,
    Allow(RateLimitResult),
    Deny(RateLimitResult),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Deny(_))
    }

    pub fn result(&self) -> Option<&RateLimitResult> {
        match self {
            Self::Bypass => None,
            Self::Allow(result) | Self::Deny(result) => Some(result),
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.result().and_then(|r| r.retry_after)
    }
}

/// 毫秒精度向上取整到秒
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasker_common::UserId;

    #[test]
    fn test_quota_tier_as_str() {
        assert_eq!(QuotaTier::AnonymousGeneral.as_str(), "anonymous_general");
        assert_eq!(QuotaTier::AnonymousAuthEndpoint.as_str(), "anonymous_auth");
        assert_eq!(QuotaTier::AuthenticatedUser.as_str(), "authenticated");
    }

    #[test]
    fn test_key_binds_user_to_origin() {
        let identity = CallerIdentity::authenticated(UserId::new("u-1"), "10.0.0.1");
        let key = WindowCounterKey::new(QuotaTier::AuthenticatedUser, &identity);
        assert_eq!(key.discriminator(), "u-1:10.0.0.1");
        assert_eq!(key.to_string(), "authenticated:u-1:10.0.0.1");
    }

    #[test]
    fn test_key_for_anonymous_is_origin() {
        let identity = CallerIdentity::anonymous("10.0.0.1");
        let key = WindowCounterKey::new(QuotaTier::AnonymousGeneral, &identity);
        assert_eq!(key.discriminator(), "10.0.0.1");
    }

    #[test]
    fn test_same_identity_different_tier_is_different_key() {
        let identity = CallerIdentity::anonymous("10.0.0.1");
        let general = WindowCounterKey::new(QuotaTier::AnonymousGeneral, &identity);
        let auth = WindowCounterKey::new(QuotaTier::AnonymousAuthEndpoint, &identity);
        assert_ne!(general, auth);
    }

    #[test]
    fn test_window_expiry_is_inclusive() {
        let start = Instant::now();
        let state = WindowCounterState::new(start);
        let window = Duration::from_secs(60);
        assert!(!state.is_expired(start + Duration::from_millis(59_999), window));
        assert!(state.is_expired(start + window, window));
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_millis(0)), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1000)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(1001)), 2);
        assert_eq!(ceil_secs(Duration::from_secs(900)), 900);
    }
}
