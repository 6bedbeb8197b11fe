use crate::services::registry::{Registry, ServiceInfo};

use super::error::DiscoveryError;

/// 服务发现轮询的注册表视图，可以是本地注册表或远端客户端
#[tonic::async_trait]
pub trait RegistrySource: Send + Sync + 'static {
    async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, DiscoveryError>;
}

#[tonic::async_trait]
impl RegistrySource for Registry {
    async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, DiscoveryError> {
        Ok(Registry::get_all_services(self))
    }
}
