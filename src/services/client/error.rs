use tonic::Status;

use crate::services::registry::RegistryError;

/// 注册中心客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum RegistryClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("gRPC error: {0}")]
    Grpc(#[from] Status),
    #[error("Invalid response from registry: {0}")]
    InvalidResponse(#[from] RegistryError),
}
