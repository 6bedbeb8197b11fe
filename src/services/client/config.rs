use std::collections::HashMap;
use std::time::Duration;

/// 注册中心客户端配置
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// 注册中心地址
    pub registry_address: String,
    /// 默认请求超时时间
    pub default_timeout: Duration,
    /// 连接超时时间
    pub connect_timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registry_address: "http://localhost:50051".to_string(),
            default_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// 注册方代理配置
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub service_name: String,
    pub version: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// 附加到注册信息中的元数据
    pub metadata: HashMap<String, String>,
    /// 心跳发送周期
    pub heartbeat_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            version: String::new(),
            host: None,
            port: None,
            metadata: HashMap::new(),
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}
