use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::service::Registry;
use super::store::RegistryStore;

impl Registry {
    // 启动过期检查任务
    pub(super) fn start_health_check(&self) {
        let store = self.store.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.health_check_interval;
        let threshold = self.config.eviction_threshold();

        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::debug!("Executing service expiration check...");
                        Self::cleanup_expired_services(&store, threshold);
                    }
                }
            }
        });

        tracing::info!(
            interval_secs = period.as_secs(),
            threshold_secs = threshold.as_secs(),
            "Registry health check started"
        );
    }

    /// 立即执行一次过期清理，返回被剔除的实例数
    pub fn sweep_expired(&self) -> usize {
        Self::cleanup_expired_services(&self.store, self.config.eviction_threshold())
    }

    // 整个判定与删除过程持有写锁，心跳要么完全在清理之前，要么完全在之后
    fn cleanup_expired_services(store: &Arc<RwLock<RegistryStore>>, threshold: Duration) -> usize {
        let now = Instant::now();
        let expired = store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .evict_where(|record| record.is_expired(now, threshold));

        for record in &expired {
            tracing::warn!(
                service_name = %record.info.name,
                service_id = %record.service_id,
                elapsed_secs = record.idle_for(now).as_secs(),
                threshold_secs = threshold.as_secs(),
                "Service has not sent a heartbeat in time, removing from registry"
            );
        }

        if !expired.is_empty() {
            tracing::info!(
                expired_count = expired.len(),
                "Cleanup check completed, expired services removed"
            );
        }

        expired.len()
    }
}
