//! Shared data model for the Azure cluster HA daemon
//!
//! ARM resource shapes, the normalized cluster configuration and the
//! failover status tokens used across the client, engine and daemon crates.

pub mod config;
pub mod resources;
pub mod status;

pub use config::{
    ClusterConfig, Credentials, InterfaceSwitchMode, SyncAddresses, TemplateName, VipConfig,
};
pub use resources::*;
pub use status::FailoverStatus;
