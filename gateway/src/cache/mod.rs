//! 按用户隔离的列表响应缓存

pub mod key;
pub mod middleware;
pub mod purger;
pub mod store;

pub use key::CacheKey;
pub use middleware::response_cache_middleware;
pub use purger::spawn_purger;
pub use store::{CacheLookup, CachedPayload, ResponseCache};
