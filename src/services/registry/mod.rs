//! Service registry module
//!
//! This module contains the in-memory registry split into logical components:
//! - `types`: Data structures and type definitions
//! - `store`: Insertion-ordered instance storage
//! - `service`: Core registry operations
//! - `cleanup`: Periodic staleness sweep
//! - `message`: Typed registry messages and dispatch
//! - `grpc_impl`: gRPC trait implementation

pub mod cleanup;
pub mod error;
pub mod grpc_impl;
pub mod message;
pub mod service;
pub(crate) mod store;
pub mod types;

// Re-export public types for easier access
pub use error::RegistryError;
pub use grpc_impl::RegistryGrpcService;
pub use message::{RegistryMessage, RegistryReply};
pub use service::Registry;
pub use types::{
    RegistrationAck, RegistryConfig, SERVICE_ID_METADATA_KEY, ServiceHealthStatus, ServiceInfo,
};
