//! 响应缓存存储
//!
//! 按用户和查询形状缓存列表响应。查找时过期条目视为未命中，
//! 由后台任务定期调用 `purge_expired` 回收。

use crate::cache::key::CacheKey;
use axum::http::HeaderValue;
use bytes::Bytes;
use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tasker_common::{Clock, UserId};

/// 缓存的响应体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub body: Bytes,
    pub content_type: Option<HeaderValue>,
}

impl CachedPayload {
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: Some(HeaderValue::from_static("application/json")),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedPayload,
    inserted_at: Instant,
}

/// 查找结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(CachedPayload),
    Miss,
}

/// 响应缓存
///
/// 单次 `lookup` 和单次 `store` 对同一个键是原子的；两者之间不加锁，
/// 并发未命中会各自执行下游处理并以最后一次写入为准
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 仅当 `now - inserted_at < ttl` 时命中
    pub fn lookup(&self, key: &CacheKey) -> CacheLookup {
        let now = self.clock.now();
        let lookup = match self.entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < self.ttl => {
                CacheLookup::Hit(entry.payload.clone())
            }
            _ => CacheLookup::Miss,
        };

        let outcome = match lookup {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Miss => "miss",
        };
        counter!("response_cache_lookups_total", "outcome" => outcome).increment(1);
        lookup
    }

    /// 写入并覆盖同一个键的旧条目
    pub fn store(&self, key: CacheKey, payload: CachedPayload) {
        let inserted_at = self.clock.now();
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at,
            },
        );
        counter!("response_cache_stores_total").increment(1);
    }

    /// 删除某个用户的全部条目，返回删除数量
    pub fn invalidate_user(&self, user_id: &UserId) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let keep = key.user_id() != user_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// 删除所有已过期条目，返回删除数量
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.inserted_at) < self.ttl;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            counter!("response_cache_evictions_total").increment(removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasker_common::ManualClock;

    fn cache() -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (
            ResponseCache::new(Duration::from_secs(300), clock.clone()),
            clock,
        )
    }

    fn key(user: &str, query: &str) -> CacheKey {
        CacheKey::new(UserId::new(user), "/api/tasks", Some(query))
    }

    #[test]
    fn test_lookup_after_store_is_hit() {
        let (cache, _clock) = cache();
        let payload = CachedPayload::json(r#"{"success":true,"data":[]}"#);

        cache.store(key("u", "page=1"), payload.clone());
        assert_eq!(cache.lookup(&key("u", "page=1")), CacheLookup::Hit(payload));
    }

    #[test]
    fn test_never_stored_is_miss() {
        let (cache, _clock) = cache();
        assert_eq!(cache.lookup(&key("u", "page=1")), CacheLookup::Miss);
    }

    #[test]
    fn test_expired_entry_is_miss_but_kept() {
        let (cache, clock) = cache();
        cache.store(key("u", "page=1"), CachedPayload::json("[]"));

        clock.advance(Duration::from_millis(299_999));
        assert!(matches!(cache.lookup(&key("u", "page=1")), CacheLookup::Hit(_)));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.lookup(&key("u", "page=1")), CacheLookup::Miss);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_overwrites_and_restamps() {
        let (cache, clock) = cache();
        cache.store(key("u", "page=1"), CachedPayload::json("old"));
        clock.advance(Duration::from_secs(299));
        cache.store(key("u", "page=1"), CachedPayload::json("new"));
        clock.advance(Duration::from_secs(200));

        assert_eq!(
            cache.lookup(&key("u", "page=1")),
            CacheLookup::Hit(CachedPayload::json("new"))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_users_are_isolated() {
        let (cache, _clock) = cache();
        cache.store(key("a", "page=1"), CachedPayload::json("a"));
        assert_eq!(cache.lookup(&key("b", "page=1")), CacheLookup::Miss);
    }

    #[test]
    fn test_purge_expired_keeps_fresh_entries() {
        let (cache, clock) = cache();
        for page in 1..=50 {
            cache.store(key("u", &format!("page={page}")), CachedPayload::json("[]"));
        }
        clock.advance(Duration::from_secs(200));
        cache.store(key("u", "limit=5"), CachedPayload::json("fresh"));
        clock.advance(Duration::from_secs(100));

        assert_eq!(cache.purge_expired(), 50);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.lookup(&key("u", "limit=5")), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_invalidate_user() {
        let (cache, _clock) = cache();
        cache.store(key("a", "page=1"), CachedPayload::json("a1"));
        cache.store(key("a", "page=2"), CachedPayload::json("a2"));
        cache.store(key("b", "page=1"), CachedPayload::json("b1"));

        assert_eq!(cache.invalidate_user(&UserId::new("a")), 2);
        assert_eq!(cache.lookup(&key("a", "page=1")), CacheLookup::Miss);
        assert!(matches!(cache.lookup(&key("b", "page=1")), CacheLookup::Hit(_)));
    }
}
