use std::time::Duration;

/// 服务发现错误类型，均视为暂时性错误，下个周期重试
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Invalid endpoint {endpoint} for service {service_name}: {reason}")]
    InvalidEndpoint {
        service_name: String,
        endpoint: String,
        reason: String,
    },
    #[error("Failed to connect to service {service_name}: {source}")]
    Connect {
        service_name: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("Connection to service {service_name} failed: {reason}")]
    ConnectionFailed { service_name: String, reason: String },
    #[error("Timed out after {timeout:?} waiting on service {service_name}")]
    Timeout {
        service_name: String,
        timeout: Duration,
    },
    #[error("Failed to close connection for service {service_name}: {reason}")]
    Close { service_name: String, reason: String },
    #[error("Failed to fetch services from registry: {0}")]
    Source(String),
}
