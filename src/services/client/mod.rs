pub mod agent;
pub mod config;
pub mod error;
pub mod registry_client;

pub use agent::*;
pub use config::*;
pub use error::*;
pub use registry_client::*;
