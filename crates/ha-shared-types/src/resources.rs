//! Typed views of the ARM resources the failover engine manipulates.
//!
//! Objects are fetched, mutated and written back whole, so every struct
//! level keeps a flattened `extra` map: provider fields the engine does not
//! model must survive the round trip unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker value of `extendedLocation.type` on edge-zone resources.
pub const EDGE_ZONE: &str = "EdgeZone";

/// Reference to another ARM resource by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Last path segment of the referenced id.
    pub fn last_segment(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or("")
    }
}

/// Locality extension carried by edge-zone resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExtendedLocation {
    pub fn is_edge_zone(&self) -> bool {
        self.kind == EDGE_ZONE
    }
}

/// Resources whose writes are gated on `provisioningState`.
pub trait ArmResource {
    fn resource_id(&self) -> &str;
    fn provisioning_state(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub properties: VmProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    #[serde(default)]
    pub network_profile: NetworkProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<NicAttachment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicAttachment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<NicAttachmentProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NicAttachmentProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VirtualMachine {
    /// Attachment of the primary NIC: the only one, or the first flagged
    /// primary, or the last listed when no flag is set.
    pub fn primary_nic_attachment(&self) -> Option<&NicAttachment> {
        let nics = &self.properties.network_profile.network_interfaces;
        if nics.len() == 1 {
            return nics.first();
        }
        nics.iter()
            .find(|ni| {
                ni.properties
                    .as_ref()
                    .and_then(|p| p.primary)
                    .unwrap_or(false)
            })
            .or_else(|| nics.last())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_location: Option<ExtendedLocation>,
    pub properties: NicProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnet_extended_location: Option<ExtendedLocation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkInterface {
    pub fn is_edge_zone(&self) -> bool {
        self.extended_location
            .as_ref()
            .is_some_and(ExtendedLocation::is_edge_zone)
            || self
                .properties
                .vnet_extended_location
                .as_ref()
                .is_some_and(ExtendedLocation::is_edge_zone)
    }
}

impl ArmResource for NetworkInterface {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub properties: IpConfigurationProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "privateIPAddressVersion")]
    pub private_ip_address_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
    /// `None` leaves the association untouched on PUT; `Some(vec![])` is an
    /// explicit clear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_inbound_nat_rules: Option<Vec<SubResource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_security_groups: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IpConfiguration {
    /// Ids of the inbound NAT rules referencing this ipConfiguration.
    pub fn nat_rule_ids(&self) -> impl Iterator<Item = &str> {
        self.properties
            .load_balancer_inbound_nat_rules
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|r| r.id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    pub properties: LbProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LbProperties {
    #[serde(default)]
    pub inbound_nat_rules: Vec<NatRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatRule {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTable {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: RouteTableProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTableProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArmResource for RouteTable {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: RouteProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProperties {
    #[serde(default)]
    pub next_hop_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualNetwork {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: VnetProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnetProperties {
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default)]
    pub virtual_network_peerings: Vec<VnetPeering>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: SubnetProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table: Option<SubResource>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnetPeering {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: PeeringProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringProperties {
    pub remote_virtual_network: SubResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering_state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nic_round_trip_preserves_unmodeled_fields() {
        let raw = json!({
            "id": "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/networkInterfaces/fw1-eth0",
            "name": "fw1-eth0",
            "etag": "W/\"abc\"",
            "location": "westeurope",
            "properties": {
                "provisioningState": "Succeeded",
                "enableIPForwarding": true,
                "ipConfigurations": [{
                    "name": "ipconfig1",
                    "properties": {
                        "privateIPAddress": "10.0.0.4",
                        "primary": true,
                        "subnet": {"id": "/sub/net"},
                        "dnsSettings": {"fqdn": "fw1"}
                    }
                }]
            }
        });
        let nic: NetworkInterface = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(nic.name, "fw1-eth0");
        assert_eq!(nic.properties.ip_configurations.len(), 1);
        let back = serde_json::to_value(&nic).unwrap();
        assert_eq!(back["etag"], raw["etag"]);
        assert_eq!(back["location"], raw["location"]);
        assert_eq!(back["properties"]["enableIPForwarding"], json!(true));
        assert_eq!(
            back["properties"]["ipConfigurations"][0]["properties"]["dnsSettings"]["fqdn"],
            json!("fw1")
        );
        // absent optionals must stay absent, not become nulls
        assert!(back["properties"]["ipConfigurations"][0]["properties"]
            .get("publicIPAddress")
            .is_none());
    }

    #[test]
    fn primary_nic_attachment_selection() {
        let vm: VirtualMachine = serde_json::from_value(json!({
            "id": "/vm/fw1",
            "name": "fw1",
            "properties": {
                "networkProfile": {
                    "networkInterfaces": [
                        {"id": "/nic/a"},
                        {"id": "/nic/b", "properties": {"primary": true}}
                    ]
                }
            }
        }))
        .unwrap();
        assert_eq!(vm.primary_nic_attachment().unwrap().id, "/nic/b");

        let single: VirtualMachine = serde_json::from_value(json!({
            "id": "/vm/fw2",
            "name": "fw2",
            "properties": {
                "networkProfile": {"networkInterfaces": [{"id": "/nic/only"}]}
            }
        }))
        .unwrap();
        assert_eq!(single.primary_nic_attachment().unwrap().id, "/nic/only");
    }

    #[test]
    fn edge_zone_markers() {
        let direct: NetworkInterface = serde_json::from_value(json!({
            "id": "/nic/a",
            "name": "a",
            "extendedLocation": {"name": "losangeles", "type": "EdgeZone"},
            "properties": {"ipConfigurations": []}
        }))
        .unwrap();
        assert!(direct.is_edge_zone());

        let via_vnet: NetworkInterface = serde_json::from_value(json!({
            "id": "/nic/b",
            "name": "b",
            "properties": {
                "ipConfigurations": [],
                "vnetExtendedLocation": {"name": "losangeles", "type": "EdgeZone"}
            }
        }))
        .unwrap();
        assert!(via_vnet.is_edge_zone());

        let plain: NetworkInterface = serde_json::from_value(json!({
            "id": "/nic/c",
            "name": "c",
            "properties": {"ipConfigurations": []}
        }))
        .unwrap();
        assert!(!plain.is_edge_zone());
    }
}
