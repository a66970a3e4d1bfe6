//! Error types for failover operations

use thiserror::Error;

use azure_arm_client::ArmError;

pub type Result<T> = std::result::Result<T, FailoverError>;

#[derive(Debug, Error)]
pub enum FailoverError {
    #[error("ARM error: {0}")]
    Arm(#[from] ArmError),

    #[error("status file update failed: {0}")]
    Status(#[from] std::io::Error),

    #[error("cannot find the \"*{0}\" interface")]
    InterfaceNotFound(String),

    #[error("VM {0} has no network interfaces")]
    NoNics(String),

    #[error("NIC {0} not present in the resource-group listing")]
    NicNotListed(String),

    #[error("NIC {0} has no ipConfigurations")]
    NoIpConfigurations(String),

    #[error("NIC {0} has no subnet on its first ipConfiguration")]
    NoSubnet(String),

    #[error("cluster name is not configured")]
    MissingClusterName,
}
