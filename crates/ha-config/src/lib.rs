//! Configuration loading for the Azure cluster HA daemon
//!
//! The operator configuration arrives as a JSON dump from an external
//! helper; the sync-interface address pairs come from the cluster membership
//! tooling. Both are normalized into [`ha_shared_types::ClusterConfig`].

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use loader::{build_config, ConfigLoader, SyncInterface};
