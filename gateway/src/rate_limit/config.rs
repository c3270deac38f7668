//! 配额策略表
//!
//! 启动时从配置构建，之后只读

use crate::rate_limit::types::QuotaTier;
use std::time::Duration;
use tasker_config::{ConfigError, QuotaRule, RateLimitSettings};

/// 单个层级的不可变策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub window: Duration,
    pub max_requests: u64,
    pub message: String,
}

impl QuotaPolicy {
    fn from_rule(tier: QuotaTier, rule: &QuotaRule) -> Result<Self, ConfigError> {
        if rule.window_ms == 0 || rule.max == 0 {
            return Err(ConfigError::Invalid(format!(
                "quota for tier `{}` needs a positive window and limit",
                tier
            )));
        }
        Ok(Self {
            window: rule.window(),
            max_requests: rule.max,
            message: rule.message.clone(),
        })
    }
}

/// 配额策略表：每个层级都必须有策略
#[derive(Debug, Clone)]
pub struct QuotaPolicyTable {
    anonymous_general: QuotaPolicy,
    anonymous_auth: QuotaPolicy,
    authenticated: QuotaPolicy,
}

impl QuotaPolicyTable {
    pub fn from_settings(settings: &RateLimitSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            anonymous_general: QuotaPolicy::from_rule(
                QuotaTier::AnonymousGeneral,
                &settings.anonymous_general,
            )?,
            anonymous_auth: QuotaPolicy::from_rule(
                QuotaTier::AnonymousAuthEndpoint,
                &settings.anonymous_auth,
            )?,
            authenticated: QuotaPolicy::from_rule(
                QuotaTier::AuthenticatedUser,
                &settings.authenticated,
            )?,
        })
    }

    pub fn policy(&self, tier: QuotaTier) -> &QuotaPolicy {
        match tier {
            QuotaTier::AnonymousGeneral => &self.anonymous_general,
            QuotaTier::AnonymousAuthEndpoint => &self.anonymous_auth,
            QuotaTier::AuthenticatedUser => &self.authenticated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_settings() {
        let table = QuotaPolicyTable::from_settings(&RateLimitSettings::default()).unwrap();

        let auth = table.policy(QuotaTier::AnonymousAuthEndpoint);
        assert_eq!(auth.max_requests, 5);
        assert_eq!(auth.window, Duration::from_secs(900));

        assert_eq!(table.policy(QuotaTier::AuthenticatedUser).max_requests, 500);
        assert_eq!(table.policy(QuotaTier::AnonymousGeneral).max_requests, 100);
    }

    #[test]
    fn test_non_positive_limit_is_rejected() {
        let mut settings = RateLimitSettings::default();
        settings.anonymous_general.max = 0;
        let err = QuotaPolicyTable::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("anonymous_general"));
    }

    #[test]
    fn test_non_positive_window_is_rejected() {
        let mut settings = RateLimitSettings::default();
        settings.authenticated.window_ms = 0;
        assert!(QuotaPolicyTable::from_settings(&settings).is_err());
    }
}
