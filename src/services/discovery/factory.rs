use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

use super::error::DiscoveryError;
use crate::services::registry::ServiceInfo;

/// 按服务名打开/关闭出站连接
#[tonic::async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    /// 连接目标的标识；同名服务的目标变化时连接会被重建
    fn target(&self, service: &ServiceInfo) -> String {
        service.name.clone()
    }

    async fn open(&self, service: &ServiceInfo) -> Result<Self::Connection, DiscoveryError>;

    async fn close(
        &self,
        service_name: &str,
        connection: Self::Connection,
    ) -> Result<(), DiscoveryError>;
}

/// 指向某个服务的 gRPC 连接
#[derive(Debug, Clone)]
pub struct ServiceConnection {
    pub service_name: String,
    pub endpoint: String,
    pub channel: Channel,
}

/// 基于 tonic Channel 的连接工厂
///
/// 服务声明了 host/port 时直连该地址，否则连接共享的消息通道地址。
#[derive(Debug, Clone)]
pub struct GrpcConnectionFactory {
    broker_url: String,
    connect_timeout: Duration,
}

impl GrpcConnectionFactory {
    pub fn new(broker_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            broker_url: broker_url.into(),
            connect_timeout,
        }
    }

    pub fn endpoint_for(&self, service: &ServiceInfo) -> String {
        match (&service.host, service.port) {
            (Some(host), Some(port)) => format!("http://{host}:{port}"),
            _ => self.broker_url.clone(),
        }
    }
}

#[tonic::async_trait]
impl ConnectionFactory for GrpcConnectionFactory {
    type Connection = ServiceConnection;

    fn target(&self, service: &ServiceInfo) -> String {
        self.endpoint_for(service)
    }

    async fn open(&self, service: &ServiceInfo) -> Result<ServiceConnection, DiscoveryError> {
        let endpoint_url = self.endpoint_for(service);
        let endpoint = Endpoint::from_shared(endpoint_url.clone())
            .map_err(|e| DiscoveryError::InvalidEndpoint {
                service_name: service.name.clone(),
                endpoint: endpoint_url.clone(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|source| DiscoveryError::Connect {
                service_name: service.name.clone(),
                source,
            })?;

        tracing::debug!(
            service_name = %service.name,
            endpoint = %endpoint_url,
            "Opened gRPC channel"
        );

        Ok(ServiceConnection {
            service_name: service.name.clone(),
            endpoint: endpoint_url,
            channel,
        })
    }

    async fn close(
        &self,
        service_name: &str,
        connection: ServiceConnection,
    ) -> Result<(), DiscoveryError> {
        // Channel 在最后一个句柄释放时断开
        drop(connection.channel);
        tracing::debug!(
            service_name = %service_name,
            endpoint = %connection.endpoint,
            "Released gRPC channel"
        );
        Ok(())
    }
}
