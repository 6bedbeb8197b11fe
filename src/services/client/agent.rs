use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::{AgentConfig, RegistryClient, RegistryClientError};
use crate::services::registry::{ServiceHealthStatus, ServiceInfo};

/// 注册方代理：注册自身、定期发送心跳、退出时注销
#[derive(Debug, Clone)]
pub struct RegistrationAgent {
    client: RegistryClient,
    config: AgentConfig,
    service_id: String,
    started_at: u128,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl RegistrationAgent {
    pub fn new(client: RegistryClient, config: AgentConfig) -> Self {
        let service_id = format!("{}-{}", config.service_name, Uuid::new_v4());
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        Self {
            client,
            config,
            service_id,
            started_at,
            task_tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// 本实例上报给注册中心的信息
    pub fn service_info(&self) -> ServiceInfo {
        let mut info = ServiceInfo::new(self.config.service_name.clone())
            .with_version(self.config.version.clone())
            .with_status(ServiceHealthStatus::Healthy);
        info.metadata = self.config.metadata.clone();
        info.host = self.config.host.clone();
        info.port = self.config.port;

        info.with_service_id(self.service_id.clone())
            .with_metadata("startTime", self.started_at.to_string())
    }

    /// 注册并启动心跳任务，注册失败时直接返回错误
    pub async fn start(&self) -> Result<(), RegistryClientError> {
        Self::register(&self.client, self.service_info()).await?;
        self.start_heartbeat();
        Ok(())
    }

    async fn register(client: &RegistryClient, info: ServiceInfo) -> Result<(), RegistryClientError> {
        let service_name = info.name.clone();
        match client.register(info).await {
            Ok(ack) => {
                tracing::info!(
                    service_name = %service_name,
                    service_id = %ack.service_id,
                    "Service registered with registry"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(service_name = %service_name, error = %e, "Failed to register service");
                Err(e)
            }
        }
    }

    fn start_heartbeat(&self) {
        let agent = self.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.heartbeat_interval;

        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => agent.send_heartbeat().await,
                }
            }
        });
    }

    // 心跳失败不致命；注册中心不认识本实例（已被剔除）时重新注册
    async fn send_heartbeat(&self) {
        match self.client.heartbeat(&self.service_id).await {
            Ok(true) => {
                tracing::debug!(service_id = %self.service_id, "Heartbeat sent");
            }
            Ok(false) => {
                tracing::warn!(
                    service_id = %self.service_id,
                    "Registry does not know this instance, registering again"
                );
                let _ = Self::register(&self.client, self.service_info()).await;
            }
            Err(e) => {
                tracing::error!(service_id = %self.service_id, error = %e, "Failed to send heartbeat");
            }
        }
    }

    /// 停止心跳并注销
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        match self.client.unregister(&self.service_id).await {
            Ok(_) => tracing::info!(service_id = %self.service_id, "Service unregistered"),
            Err(e) => {
                tracing::error!(service_id = %self.service_id, error = %e, "Failed to unregister service")
            }
        }
    }
}
