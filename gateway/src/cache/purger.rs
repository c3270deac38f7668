//! 过期缓存回收任务

use crate::cache::store::ResponseCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// 启动回收任务
pub fn spawn_purger(cache: Arc<ResponseCache>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting response cache purger");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = cache.len(), "Response cache purge completed");
            }
        }
    })
}
