use tonic::{Request, Response, Status};

use super::error::RegistryError;
use super::message::{RegistryMessage, RegistryReply};
use super::service::Registry;
use super::types::{ServiceHealthStatus, ServiceInfo};
use crate::registry::{
    self as proto, AckResponse, GetAllServicesRequest, GetAllServicesResponse, GetServiceRequest,
    GetServiceResponse, RegisterResponse, ServiceIdRequest,
    registry_service_server::RegistryService,
};

impl TryFrom<i32> for ServiceHealthStatus {
    type Error = RegistryError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let status = proto::ServiceStatus::try_from(value).map_err(|_| {
            RegistryError::InvalidPayload {
                field: "status",
                reason: format!("has unknown value {value}"),
            }
        })?;

        Ok(match status {
            // 未声明状态的注册视为健康
            proto::ServiceStatus::Unspecified | proto::ServiceStatus::Healthy => {
                ServiceHealthStatus::Healthy
            }
            proto::ServiceStatus::Unhealthy => ServiceHealthStatus::Unhealthy,
            proto::ServiceStatus::Starting => ServiceHealthStatus::Starting,
            proto::ServiceStatus::Stopping => ServiceHealthStatus::Stopping,
        })
    }
}

impl From<ServiceHealthStatus> for proto::ServiceStatus {
    fn from(status: ServiceHealthStatus) -> Self {
        match status {
            ServiceHealthStatus::Healthy => proto::ServiceStatus::Healthy,
            ServiceHealthStatus::Unhealthy => proto::ServiceStatus::Unhealthy,
            ServiceHealthStatus::Starting => proto::ServiceStatus::Starting,
            ServiceHealthStatus::Stopping => proto::ServiceStatus::Stopping,
        }
    }
}

impl TryFrom<proto::ServiceInfo> for ServiceInfo {
    type Error = RegistryError;

    fn try_from(info: proto::ServiceInfo) -> Result<Self, Self::Error> {
        if info.name.trim().is_empty() {
            return Err(RegistryError::missing("name"));
        }

        let port = match info.port {
            0 => None,
            port => Some(u16::try_from(port).map_err(|_| RegistryError::InvalidPayload {
                field: "port",
                reason: format!("{port} is out of range"),
            })?),
        };

        Ok(ServiceInfo {
            status: ServiceHealthStatus::try_from(info.status)?,
            name: info.name,
            version: info.version,
            metadata: info.metadata,
            host: Some(info.host).filter(|host| !host.is_empty()),
            port,
        })
    }
}

impl From<ServiceInfo> for proto::ServiceInfo {
    fn from(info: ServiceInfo) -> Self {
        proto::ServiceInfo {
            name: info.name,
            version: info.version,
            status: proto::ServiceStatus::from(info.status) as i32,
            metadata: info.metadata,
            host: info.host.unwrap_or_default(),
            port: info.port.map(u32::from).unwrap_or_default(),
        }
    }
}

fn require(field: &'static str, value: String) -> Result<String, RegistryError> {
    if value.trim().is_empty() {
        Err(RegistryError::missing(field))
    } else {
        Ok(value)
    }
}

fn unexpected_reply(reply: RegistryReply) -> Status {
    tracing::error!(reply = ?reply, "Registry returned a reply of the wrong kind");
    Status::internal("Unexpected registry reply")
}

/// 注册表的 gRPC 入口
#[derive(Debug, Clone)]
pub struct RegistryGrpcService {
    pub registry: Registry,
}

impl RegistryGrpcService {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

#[tonic::async_trait]
impl RegistryService for RegistryGrpcService {
    async fn register(
        &self,
        request: Request<proto::ServiceInfo>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let info = ServiceInfo::try_from(request.into_inner())?;

        match self.registry.handle(RegistryMessage::Register(info)) {
            RegistryReply::Registered(ack) => Ok(Response::new(RegisterResponse {
                service_id: ack.service_id,
            })),
            other => Err(unexpected_reply(other)),
        }
    }

    async fn unregister(
        &self,
        request: Request<ServiceIdRequest>,
    ) -> Result<Response<AckResponse>, Status> {
        let service_id = require("service_id", request.into_inner().service_id)?;

        match self.registry.handle(RegistryMessage::Unregister { service_id }) {
            RegistryReply::Unregistered(success) => Ok(Response::new(AckResponse { success })),
            other => Err(unexpected_reply(other)),
        }
    }

    async fn heartbeat(
        &self,
        request: Request<ServiceIdRequest>,
    ) -> Result<Response<AckResponse>, Status> {
        let service_id = require("service_id", request.into_inner().service_id)?;

        match self.registry.handle(RegistryMessage::Heartbeat { service_id }) {
            RegistryReply::HeartbeatAccepted(success) => {
                Ok(Response::new(AckResponse { success }))
            }
            other => Err(unexpected_reply(other)),
        }
    }

    async fn get_service(
        &self,
        request: Request<GetServiceRequest>,
    ) -> Result<Response<GetServiceResponse>, Status> {
        let service_name = require("service_name", request.into_inner().service_name)?;

        match self.registry.handle(RegistryMessage::GetService { service_name }) {
            RegistryReply::Service(service) => Ok(Response::new(GetServiceResponse {
                service: service.map(Into::into),
            })),
            other => Err(unexpected_reply(other)),
        }
    }

    async fn get_all_services(
        &self,
        _request: Request<GetAllServicesRequest>,
    ) -> Result<Response<GetAllServicesResponse>, Status> {
        match self.registry.handle(RegistryMessage::GetAllServices) {
            RegistryReply::Services(services) => Ok(Response::new(GetAllServicesResponse {
                services: services.into_iter().map(Into::into).collect(),
            })),
            other => Err(unexpected_reply(other)),
        }
    }
}
