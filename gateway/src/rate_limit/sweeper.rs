//! 后台清理任务
//!
//! 匿名来源数量无上限，定期移除窗口早已结束的计数以限制内存

use crate::rate_limit::engine::AdmissionEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

/// 启动清理任务
pub fn spawn_sweeper(engine: Arc<AdmissionEngine>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "Starting rate limit sweeper");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = engine.sweep();
            if removed > 0 {
                debug!(removed, "Rate limit sweep completed");
            }
        }
    })
}
