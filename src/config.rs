use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::services::client::{AgentConfig, RegistryClientConfig};
use crate::services::discovery::DiscoveryConfig;
use crate::services::registry::RegistryConfig;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
// 各类周期的上限：一周
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// 配置加载错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to read config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 进程级配置，可来自 config.toml 或环境变量
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// gRPC 监听地址
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 共享消息通道地址，服务未提供 host/port 时发现组件连接此地址
    #[serde(default)]
    pub broker_url: Option<String>,
    /// broker_url 的旧名称，两者同时出现时以 broker_url 为准
    #[serde(default)]
    pub rabbitmq_url: Option<String>,
    /// 健康检查周期（秒）
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,
    /// 超过 周期 × 系数 未心跳即被剔除
    #[serde(default = "default_staleness_factor")]
    pub staleness_factor: u32,
    /// 服务发现周期（秒），缺省与健康检查周期一致
    #[serde(default)]
    pub discovery_interval_secs: Option<u64>,
    /// 注册方发送心跳的周期（秒）
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_broker_url() -> String {
    "http://localhost:5672".to_string()
}

fn default_health_check_interval() -> u64 {
    30
}

fn default_staleness_factor() -> u32 {
    2
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_close_timeout() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            broker_url: None,
            rabbitmq_url: None,
            health_check_interval_secs: default_health_check_interval(),
            staleness_factor: default_staleness_factor(),
            discovery_interval_secs: None,
            heartbeat_interval_secs: default_heartbeat_interval(),
            connect_timeout_secs: default_connect_timeout(),
            close_timeout_secs: default_close_timeout(),
        }
    }
}

impl Config {
    /// 加载配置：优先读取配置文件（REGISTRY_CONFIG 或 ./config.toml），否则读取环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var("REGISTRY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::from_env()?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(config_str)?)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<Config>()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("health_check_interval_secs", Some(self.health_check_interval_secs)),
            ("heartbeat_interval_secs", Some(self.heartbeat_interval_secs)),
            ("discovery_interval_secs", self.discovery_interval_secs),
        ];
        for (field, value) in intervals {
            match value {
                Some(0) => {
                    return Err(ConfigError::Invalid(format!(
                        "{field} must be greater than 0"
                    )));
                }
                Some(secs) if secs > MAX_INTERVAL_SECS => {
                    return Err(ConfigError::Invalid(format!(
                        "{field} must not exceed {MAX_INTERVAL_SECS}"
                    )));
                }
                _ => {}
            }
        }
        if self.staleness_factor == 0 {
            return Err(ConfigError::Invalid(
                "staleness_factor must be at least 1".into(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.close_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "close_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// 实际使用的消息通道地址：BROKER_URL 优先，其次 RABBITMQ_URL，最后是默认值
    pub fn broker_url(&self) -> String {
        self.broker_url
            .clone()
            .or_else(|| self.rabbitmq_url.clone())
            .unwrap_or_else(default_broker_url)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(
            self.discovery_interval_secs
                .unwrap_or(self.health_check_interval_secs),
        )
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            health_check_interval: self.health_check_interval(),
            staleness_factor: self.staleness_factor,
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            interval: self.discovery_interval(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            close_timeout: Duration::from_secs(self.close_timeout_secs),
        }
    }

    pub fn client_config(&self, registry_address: &str) -> RegistryClientConfig {
        RegistryClientConfig {
            registry_address: registry_address.to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..Default::default()
        }
    }

    pub fn agent_config(&self, service_name: &str) -> AgentConfig {
        AgentConfig {
            service_name: service_name.to_string(),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            ..Default::default()
        }
    }
}
