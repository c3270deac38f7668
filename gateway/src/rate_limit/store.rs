//! 窗口计数存储
//!
//! 固定窗口计数，进程内存储。`DashMap` 按分片加锁：同一个键的
//! 读-判断-写在 entry 守卫内完成，不同分片上的键互不阻塞。

use crate::rate_limit::config::QuotaPolicy;
use crate::rate_limit::types::{
    QuotaTier, RateLimitResult, WindowCounterKey, WindowCounterState, ceil_secs,
};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// 窗口计数存储
#[derive(Debug, Default)]
pub struct WindowCounterStore {
    counters: DashMap<WindowCounterKey, WindowCounterState>,
}

impl WindowCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次请求并返回检查结果
    ///
    /// 1. 取出或创建计数
    /// 2. 窗口已结束则原地重置
    /// 3. 已达上限则拒绝，不递增、不延长窗口
    /// 4. 否则递增并放行
    pub fn hit(&self, key: WindowCounterKey, policy: &QuotaPolicy, now: Instant) -> RateLimitResult {
        let tier = key.tier();
        let mut entry = self
            .counters
            .entry(key)
            .or_insert_with(|| WindowCounterState::new(now));
        let state = entry.value_mut();

        if state.is_expired(now, policy.window) {
            *state = WindowCounterState::new(now);
        }

        let reset_after_secs = ceil_secs(state.time_until_reset(now, policy.window));

        if state.count >= policy.max_requests {
            return RateLimitResult {
                tier,
                count: state.count,
                limit: policy.max_requests,
                remaining: 0,
                reset_after_secs,
                retry_after: Some(reset_after_secs.max(1)),
            };
        }

        state.count += 1;
        RateLimitResult {
            tier,
            count: state.count,
            limit: policy.max_requests,
            remaining: policy.max_requests - state.count,
            reset_after_secs,
            retry_after: None,
        }
    }

    /// 当前计数快照
    pub fn get(&self, key: &WindowCounterKey) -> Option<WindowCounterState> {
        self.counters.get(key).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// 移除长时间不活跃的计数，返回移除数量
    ///
    /// `retention` 给出每个层级从窗口起点算起的保留时长，必须不小于窗口长度，
    /// 这样仍在有效窗口内的键不会被移除。`retain` 持有分片写锁，
    /// 与正在进行的 `hit` 互斥。
    pub fn sweep(&self, now: Instant, retention: impl Fn(QuotaTier) -> Duration) -> usize {
        let mut removed = 0;
        self.counters.retain(|key, state| {
            let keep = now.saturating_duration_since(state.window_start) < retention(key.tier());
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasker_common::{CallerIdentity, UserId};

    fn policy(max: u64, window_secs: u64) -> QuotaPolicy {
        QuotaPolicy {
            window: Duration::from_secs(window_secs),
            max_requests: max,
            message: "limited".to_string(),
        }
    }

    fn anon_key(ip: &str) -> WindowCounterKey {
        WindowCounterKey::new(QuotaTier::AnonymousGeneral, &CallerIdentity::anonymous(ip))
    }

    #[test]
    fn test_allows_up_to_max() {
        let store = WindowCounterStore::new();
        let policy = policy(3, 60);
        let now = Instant::now();

        for expected in 1..=3 {
            let result = store.hit(anon_key("1.1.1.1"), &policy, now);
            assert!(result.retry_after.is_none());
            assert_eq!(result.count, expected);
            assert_eq!(result.remaining, 3 - expected);
        }
    }

    #[test]
    fn test_denies_max_plus_one() {
        let store = WindowCounterStore::new();
        let policy = policy(2, 60);
        let now = Instant::now();

        store.hit(anon_key("1.1.1.1"), &policy, now);
        store.hit(anon_key("1.1.1.1"), &policy, now);
        let denied = store.hit(anon_key("1.1.1.1"), &policy, now + Duration::from_secs(10));

        assert_eq!(denied.retry_after, Some(50));
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn test_denial_does_not_touch_counter() {
        let store = WindowCounterStore::new();
        let policy = policy(1, 60);
        let start = Instant::now();

        store.hit(anon_key("1.1.1.1"), &policy, start);
        for i in 1..10 {
            store.hit(anon_key("1.1.1.1"), &policy, start + Duration::from_secs(i));
        }

        let state = store.get(&anon_key("1.1.1.1")).unwrap();
        assert_eq!(state.count, 1);
        assert_eq!(state.window_start, start);
    }

    #[test]
    fn test_window_resets_after_duration() {
        let store = WindowCounterStore::new();
        let policy = policy(1, 60);
        let start = Instant::now();

        store.hit(anon_key("1.1.1.1"), &policy, start);
        assert!(store.hit(anon_key("1.1.1.1"), &policy, start).retry_after.is_some());

        let later = start + Duration::from_secs(60);
        let result = store.hit(anon_key("1.1.1.1"), &policy, later);
        assert!(result.retry_after.is_none());
        assert_eq!(result.count, 1);
        assert_eq!(store.get(&anon_key("1.1.1.1")).unwrap().window_start, later);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = WindowCounterStore::new();
        let policy = policy(1, 60);
        let now = Instant::now();

        store.hit(anon_key("1.1.1.1"), &policy, now);
        assert!(store.hit(anon_key("1.1.1.1"), &policy, now).retry_after.is_some());
        assert!(store.hit(anon_key("2.2.2.2"), &policy, now).retry_after.is_none());

        let user = CallerIdentity::authenticated(UserId::new("u"), "1.1.1.1");
        let user_key = WindowCounterKey::new(QuotaTier::AuthenticatedUser, &user);
        assert!(store.hit(user_key, &policy, now).retry_after.is_none());
    }

    #[test]
    fn test_concurrent_hits_never_exceed_max() {
        let store = std::sync::Arc::new(WindowCounterStore::new());
        let policy = std::sync::Arc::new(policy(50, 60));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let policy = policy.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| {
                            store
                                .hit(anon_key("9.9.9.9"), &policy, now)
                                .retry_after
                                .is_none()
                        })
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(store.get(&anon_key("9.9.9.9")).unwrap().count, 50);
    }

    #[test]
    fn test_sweep_keeps_active_windows() {
        let store = WindowCounterStore::new();
        let policy = policy(10, 60);
        let start = Instant::now();

        store.hit(anon_key("1.1.1.1"), &policy, start);
        store.hit(anon_key("2.2.2.2"), &policy, start + Duration::from_secs(100));

        let retention = |_: QuotaTier| Duration::from_secs(120);
        let removed = store.sweep(start + Duration::from_secs(130), retention);

        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&anon_key("2.2.2.2")).is_some());
    }
}
