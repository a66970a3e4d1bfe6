//! Normalized daemon configuration, one immutable epoch per reload.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment template the cluster was rolled out from; selects which
/// reconcilers run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateName {
    Ha,
    HaTerraform,
    StackHa,
    Other(String),
}

impl TemplateName {
    /// Templates whose deployments only float VIPs between members.
    pub fn is_vip_only(&self) -> bool {
        matches!(self, TemplateName::Ha | TemplateName::HaTerraform)
    }

    pub fn is_stack(&self) -> bool {
        matches!(self, TemplateName::StackHa)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TemplateName::Ha => "ha",
            TemplateName::HaTerraform => "ha_terraform",
            TemplateName::StackHa => "stack-ha",
            TemplateName::Other(name) => name,
        }
    }
}

impl From<&str> for TemplateName {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ha" => TemplateName::Ha,
            "ha_terraform" => TemplateName::HaTerraform,
            "stack-ha" => TemplateName::StackHa,
            other => TemplateName::Other(other.to_string()),
        }
    }
}

impl Default for TemplateName {
    fn default() -> Self {
        TemplateName::Other(String::new())
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the VIP reconciler stops at the first interface that needed a
/// write this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceSwitchMode {
    Serial,
    #[default]
    Parallel,
}

impl From<&str> for InterfaceSwitchMode {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("serial") {
            InterfaceSwitchMode::Serial
        } else {
            InterfaceSwitchMode::Parallel
        }
    }
}

/// One floating address on a cluster interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipConfig {
    pub name: String,
    pub private_ip_addr: String,
    /// Public IP resource name or full resource id; empty means none.
    #[serde(default)]
    pub public_ip_obj: String,
}

/// Sync-interface addresses of both members, index-aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncAddresses {
    pub me: Vec<String>,
    pub peer: Vec<String>,
}

/// Opaque credential material handed to the cloud client; token acquisition
/// happens outside this daemon.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Desired state owned by the local node.
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    pub hostname: String,
    pub peername: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub template_name: TemplateName,
    /// Interface-name suffix (e.g. `eth0`) to its ordered VIP list.
    pub cluster_network_interfaces: Option<IndexMap<String, Vec<VipConfig>>>,
    pub lb_name: Option<String>,
    pub cluster_name: Option<String>,
    pub vnet_id: Option<String>,
    pub interface_switch_mode: InterfaceSwitchMode,
    pub addresses: SyncAddresses,
    pub credentials: Credentials,
    pub environment: Option<String>,
    pub proxy: Option<String>,
    pub debug: bool,
}

impl ClusterConfig {
    /// Common prefix of every resource id in the cluster's resource group.
    pub fn base_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourcegroups/{}/providers/",
            self.subscription_id, self.resource_group
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_name_parsing() {
        assert_eq!(TemplateName::from("ha"), TemplateName::Ha);
        assert_eq!(TemplateName::from("HA"), TemplateName::Ha);
        assert_eq!(TemplateName::from("ha_terraform"), TemplateName::HaTerraform);
        assert_eq!(TemplateName::from("stack-ha"), TemplateName::StackHa);
        assert_eq!(
            TemplateName::from("management"),
            TemplateName::Other("management".to_string())
        );
        assert!(TemplateName::from("ha").is_vip_only());
        assert!(!TemplateName::from("stack-ha").is_vip_only());
    }

    #[test]
    fn switch_mode_defaults_to_parallel() {
        assert_eq!(
            InterfaceSwitchMode::from("serial"),
            InterfaceSwitchMode::Serial
        );
        assert_eq!(
            InterfaceSwitchMode::from("anything-else"),
            InterfaceSwitchMode::Parallel
        );
    }

    #[test]
    fn base_id_composition() {
        let config = ClusterConfig {
            subscription_id: "0000-1111".to_string(),
            resource_group: "cluster-rg".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.base_id(),
            "/subscriptions/0000-1111/resourcegroups/cluster-rg/providers/"
        );
    }
}
