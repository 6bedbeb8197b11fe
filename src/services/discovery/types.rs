use std::time::Duration;

/// 服务发现配置
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// 对账周期，默认与注册表健康检查周期一致
    pub interval: Duration,
    /// 单个连接建立的超时
    pub connect_timeout: Duration,
    /// 单个连接关闭的超时，超时后放弃
    pub close_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
        }
    }
}

// 每个服务名对应的连接槽位：absent -> Connecting -> Open -> Closing -> absent
// 目标地址变化时 Open -> Connecting，旧连接在槽位之外关闭
#[derive(Debug, Clone)]
pub(crate) enum ConnectionSlot<C> {
    Connecting,
    Open { connection: C, target: String },
    Closing,
}

/// 一次对账的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// 新建立连接的服务名
    pub opened: Vec<String>,
    /// 连接失败、等待下个周期重试的服务名
    pub failed: Vec<String>,
    /// 已从注册表消失且连接正常关闭的服务名
    pub closed: Vec<String>,
    /// 关闭失败或超时、连接被直接放弃的服务名
    pub abandoned: Vec<String>,
    /// 所选实例的目标地址发生变化、改连新地址的服务名
    pub rebound: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.opened.is_empty()
            && self.failed.is_empty()
            && self.closed.is_empty()
            && self.abandoned.is_empty()
            && self.rebound.is_empty()
    }
}
