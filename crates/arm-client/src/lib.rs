//! Azure Resource Manager REST facade
//!
//! GET/PUT access with per-resource api-version resolution, an edge-zone
//! aware PUT wrapper and the provisioning-state gate. Transport retries are
//! out of scope; every call carries a single request timeout.

pub mod client;
pub mod edge;
pub mod error;
pub mod mock;
pub mod provisioning;
pub mod versions;

pub use client::{management_endpoint, ArmApi, ArmClient, ArmResponse, HttpArmClient};
pub use error::{ArmError, ArmResult};
pub use mock::MockArmClient;
pub use provisioning::Readiness;
pub use versions::ApiVersionMap;
