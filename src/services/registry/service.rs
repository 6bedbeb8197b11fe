use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::store::RegistryStore;
use super::types::{RegistrationAck, RegistryConfig, ServiceInfo, ServiceRecord};

/// 内存中的服务注册表
///
/// 所有操作（注册、注销、心跳、查询、过期清理）都在同一把锁内完成，
/// 调用方不会观察到更新到一半的记录。克隆后共享同一份存储。
#[derive(Debug, Clone)]
pub struct Registry {
    pub(super) store: Arc<RwLock<RegistryStore>>,
    pub(super) config: RegistryConfig,
    pub(super) task_tracker: TaskTracker,
    pub(super) shutdown: CancellationToken,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    /// 创建注册表，不启动过期检查任务
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(RegistryStore::default())),
            config,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 创建注册表并启动定期过期检查
    pub fn start(config: RegistryConfig) -> Self {
        let registry = Self::new(config);
        registry.start_health_check();
        registry
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub(super) fn read_store(&self) -> RwLockReadGuard<'_, RegistryStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write_store(&self) -> RwLockWriteGuard<'_, RegistryStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    // 注册或覆盖服务实例
    pub fn register(&self, info: ServiceInfo) -> RegistrationAck {
        let now = Instant::now();
        let mut store = self.write_store();

        let service_id = match info.declared_service_id() {
            Some(id) => id.to_string(),
            None => Self::synthesize_service_id(&store, &info.name),
        };

        let service_name = info.name.clone();
        let replaced = store.upsert(ServiceRecord::new(service_id.clone(), info, now));
        drop(store);

        tracing::info!(
            service_name = %service_name,
            service_id = %service_id,
            replaced,
            "Service registered"
        );

        RegistrationAck { service_id }
    }

    // 未提供 ID 时使用 "服务名-注册毫秒时间戳"，冲突时顺延
    fn synthesize_service_id(store: &RegistryStore, name: &str) -> String {
        let mut millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        loop {
            let candidate = format!("{name}-{millis}");
            if !store.contains(&candidate) {
                return candidate;
            }
            millis += 1;
        }
    }

    // 注销服务
    pub fn unregister(&self, service_id: &str) -> bool {
        let removed = self.write_store().remove(service_id);

        match removed {
            Some(record) => {
                tracing::info!(
                    service_name = %record.info.name,
                    service_id = %service_id,
                    "Service unregistered"
                );
                true
            }
            None => {
                tracing::warn!(
                    service_id = %service_id,
                    "Attempt to unregister unknown service"
                );
                false
            }
        }
    }

    // 更新心跳，未知 ID 不会被自动注册
    pub fn heartbeat(&self, service_id: &str) -> bool {
        let now = Instant::now();
        let mut store = self.write_store();

        if let Some(record) = store.get_mut(service_id) {
            record.touch(now);
            tracing::debug!(
                service_name = %record.info.name,
                service_id = %service_id,
                "Heartbeat updated for service"
            );
            return true;
        }
        drop(store);

        tracing::warn!(
            service_id = %service_id,
            "Heartbeat received for unknown service"
        );
        false
    }

    /// 按服务名查找，多个实例同名时返回最早注册且仍在线的那个
    pub fn get_service(&self, service_name: &str) -> Option<ServiceInfo> {
        let found = self
            .read_store()
            .values()
            .find(|record| record.info.name == service_name)
            .map(|record| record.info.clone());

        if found.is_none() {
            tracing::warn!(service_name = %service_name, "Service not found");
        }
        found
    }

    /// 所有在线实例的快照，按注册顺序排列
    pub fn get_all_services(&self) -> Vec<ServiceInfo> {
        self.read_store()
            .values()
            .map(|record| record.info.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 停止过期检查任务
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        tracing::info!("Registry health check stopped");
    }
}
