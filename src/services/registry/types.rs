use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// 注册方可在 metadata 中携带的实例 ID 键
pub const SERVICE_ID_METADATA_KEY: &str = "serviceId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceHealthStatus {
    #[default]
    Healthy,
    Unhealthy,
    Starting,
    Stopping,
}

/// 对外可见的服务信息，不含任何内部簿记字段
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub status: ServiceHealthStatus,
    pub metadata: HashMap<String, String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_status(mut self, status: ServiceHealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_service_id(self, service_id: impl Into<String>) -> Self {
        self.with_metadata(SERVICE_ID_METADATA_KEY, service_id)
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = Some(port);
        self
    }

    /// 注册方自带的实例 ID（空字符串视为未提供）
    pub fn declared_service_id(&self) -> Option<&str> {
        self.metadata
            .get(SERVICE_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

// 注册表内部记录
#[derive(Debug, Clone)]
pub(crate) struct ServiceRecord {
    pub service_id: String,
    pub info: ServiceInfo,
    pub last_seen: Instant,
}

impl ServiceRecord {
    pub fn new(service_id: String, info: ServiceInfo, now: Instant) -> Self {
        Self {
            service_id,
            info,
            last_seen: now,
        }
    }

    // last_seen 只前进不后退
    pub fn touch(&mut self, now: Instant) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn is_expired(&self, now: Instant, threshold: Duration) -> bool {
        self.idle_for(now) > threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationAck {
    pub service_id: String,
}

/// 注册表配置
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// 过期检查周期
    pub health_check_interval: Duration,
    /// 允许错过的心跳倍数，超过 周期 × 系数 即剔除
    pub staleness_factor: u32,
}

impl RegistryConfig {
    pub fn eviction_threshold(&self) -> Duration {
        self.health_check_interval.saturating_mul(self.staleness_factor)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            staleness_factor: 2,
        }
    }
}
