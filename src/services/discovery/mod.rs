//! Service discovery module
//!
//! Keeps a pool of outbound connections, one per service name, in line with
//! the registry's current membership:
//! - `source`: Where registry snapshots come from
//! - `factory`: How connections are opened and closed
//! - `manager`: Reconcile loop and connection pool

pub mod error;
pub mod factory;
pub mod manager;
pub mod source;
pub mod types;

pub use error::DiscoveryError;
pub use factory::{ConnectionFactory, GrpcConnectionFactory, ServiceConnection};
pub use manager::ServiceDiscovery;
pub use source::RegistrySource;
pub use types::{DiscoveryConfig, ReconcileReport};
