use tonic::transport::{Channel, Endpoint};

use super::{RegistryClientConfig, RegistryClientError};
use crate::registry::{
    GetAllServicesRequest, GetServiceRequest, ServiceIdRequest,
    registry_service_client::RegistryServiceClient,
};
use crate::services::discovery::{DiscoveryError, RegistrySource};
use crate::services::registry::{RegistrationAck, ServiceInfo};

/// 注册中心客户端
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryClientConfig,
    client: RegistryServiceClient<Channel>,
}

impl RegistryClient {
    /// 创建新的注册中心客户端
    pub async fn new(config: RegistryClientConfig) -> Result<Self, RegistryClientError> {
        let endpoint = Endpoint::from_shared(config.registry_address.clone())?
            .connect_timeout(config.connect_timeout)
            .timeout(config.default_timeout);

        let channel = endpoint.connect().await?;
        let client = RegistryServiceClient::new(channel);

        Ok(Self { config, client })
    }

    /// 便捷的创建方法，使用默认配置
    pub async fn connect(registry_address: &str) -> Result<Self, RegistryClientError> {
        let config = RegistryClientConfig {
            registry_address: registry_address.to_string(),
            ..Default::default()
        };
        Self::new(config).await
    }

    pub fn config(&self) -> &RegistryClientConfig {
        &self.config
    }

    /// service.register
    pub async fn register(&self, info: ServiceInfo) -> Result<RegistrationAck, RegistryClientError> {
        let mut client = self.client.clone();
        let response = client.register(crate::registry::ServiceInfo::from(info)).await?;
        Ok(RegistrationAck {
            service_id: response.into_inner().service_id,
        })
    }

    /// service.unregister
    pub async fn unregister(&self, service_id: &str) -> Result<bool, RegistryClientError> {
        let mut client = self.client.clone();
        let response = client
            .unregister(ServiceIdRequest {
                service_id: service_id.to_string(),
            })
            .await?;
        Ok(response.into_inner().success)
    }

    /// service.heartbeat，返回 false 表示注册中心不认识该实例
    pub async fn heartbeat(&self, service_id: &str) -> Result<bool, RegistryClientError> {
        let mut client = self.client.clone();
        let response = client
            .heartbeat(ServiceIdRequest {
                service_id: service_id.to_string(),
            })
            .await?;
        Ok(response.into_inner().success)
    }

    /// service.get
    pub async fn get_service(
        &self,
        service_name: &str,
    ) -> Result<Option<ServiceInfo>, RegistryClientError> {
        let mut client = self.client.clone();
        let response = client
            .get_service(GetServiceRequest {
                service_name: service_name.to_string(),
            })
            .await?;

        Ok(response
            .into_inner()
            .service
            .map(ServiceInfo::try_from)
            .transpose()?)
    }

    /// service.getAll
    pub async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, RegistryClientError> {
        let mut client = self.client.clone();
        let response = client.get_all_services(GetAllServicesRequest {}).await?;

        let services = response
            .into_inner()
            .services
            .into_iter()
            .map(ServiceInfo::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(services)
    }
}

#[tonic::async_trait]
impl RegistrySource for RegistryClient {
    async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, DiscoveryError> {
        RegistryClient::get_all_services(self)
            .await
            .map_err(|e| DiscoveryError::Source(e.to_string()))
    }
}
