//! 准入决策引擎
//!
//! 跳过检查 → 层级选择 → 计数键 → 窗口计数

use crate::rate_limit::classifier::EndpointClassifier;
use crate::rate_limit::config::{QuotaPolicy, QuotaPolicyTable};
use crate::rate_limit::store::WindowCounterStore;
use crate::rate_limit::types::{Decision, EndpointClass, QuotaTier, WindowCounterKey};
use metrics::{counter, gauge};
use std::sync::Arc;
use tasker_common::{CallerIdentity, Clock};
use tasker_config::{ConfigError, RateLimitSettings};
use tracing::debug;

/// 准入决策引擎
///
/// 进程启动时构建一次，以 `Arc` 形式共享给请求处理代码
#[derive(Debug)]
pub struct AdmissionEngine {
    enabled: bool,
    classifier: EndpointClassifier,
    policies: QuotaPolicyTable,
    store: WindowCounterStore,
    clock: Arc<dyn Clock>,
    idle_windows: u32,
}

impl AdmissionEngine {
    /// 构建引擎；配置错误直接返回，由调用方终止启动
    pub fn new(settings: &RateLimitSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: settings.enabled,
            classifier: EndpointClassifier::from_settings(settings),
            policies: QuotaPolicyTable::from_settings(settings)?,
            store: WindowCounterStore::new(),
            clock,
            idle_windows: settings.sweep.idle_windows,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self, tier: QuotaTier) -> &QuotaPolicy {
        self.policies.policy(tier)
    }

    pub fn classify(&self, path: &str) -> EndpointClass {
        self.classifier.classify(path)
    }

    /// 对一个请求做准入决策
    ///
    /// 每次决策最多修改一个计数；拒绝不会递增计数，也不会延长窗口
    pub fn decide(&self, path: &str, identity: &CallerIdentity) -> Decision {
        if !self.enabled {
            return Decision::Bypass;
        }

        let class = self.classifier.classify(path);
        if class == EndpointClass::Bypass {
            return Decision::Bypass;
        }

        let tier = QuotaTier::select(class, identity);
        let key = WindowCounterKey::new(tier, identity);
        let now = self.clock.now();
        let result = self.store.hit(key, self.policies.policy(tier), now);

        let outcome = if result.retry_after.is_some() {
            "denied"
        } else {
            "allowed"
        };
        counter!(
            "rate_limit_decisions_total",
            "tier" => tier.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        if result.retry_after.is_some() {
            Decision::Deny(result)
        } else {
            Decision::Allow(result)
        }
    }

    /// 清理不活跃的计数
    ///
    /// 窗口结束后再保留 `idle_windows` 个窗口长度
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let idle_windows = self.idle_windows.saturating_add(1);
        let removed = self.store.sweep(now, |tier| {
            self.policies.policy(tier).window.saturating_mul(idle_windows)
        });

        let tracked = self.store.len();
        counter!("rate_limit_swept_entries_total").increment(removed as u64);
        gauge!("rate_limit_tracked_keys").set(tracked as f64);
        debug!(removed, tracked, "Swept idle rate limit counters");
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}
