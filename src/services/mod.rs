pub mod client;
pub mod discovery;
pub mod registry;

pub use client::{RegistrationAgent, RegistryClient};
pub use discovery::{ServiceDiscovery, GrpcConnectionFactory};
pub use registry::{Registry, RegistryGrpcService, ServiceHealthStatus, ServiceInfo};
