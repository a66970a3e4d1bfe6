//! Route-table reconciler
//!
//! Rewrites `VirtualAppliance` next-hops that point at the peer's sync
//! addresses to the local equivalents, across the local VNet and every
//! connected peering. Peer reachability routes (`<peer-addr>/32`) stay
//! untouched.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use log::{debug, info};

use ha_shared_types::{RouteTable, VirtualNetwork};

use crate::engine::FailoverEngine;
use crate::error::{FailoverError, Result};
use crate::nic::primary_ip_conf;

const VIRTUAL_APPLIANCE: &str = "VirtualAppliance";

impl FailoverEngine {
    /// VNet id from the config, or discovered once per epoch by walking the
    /// local VM's primary NIC to its subnet.
    pub(crate) async fn vnet_id(&mut self) -> Result<String> {
        if let Some(id) = &self.vnet_id {
            return Ok(id.clone());
        }
        let me = self.get_vm(&self.config.hostname).await?;
        let my_nic = self.get_vm_primary_nic(&me).await?;
        let subnet_id = primary_ip_conf(&my_nic)?
            .properties
            .subnet
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or_else(|| FailoverError::NoSubnet(my_nic.name.clone()))?;
        let vnet_id = parent_of(&subnet_id, 2);
        debug!("discovered vnet id: {}", vnet_id);
        self.vnet_id = Some(vnet_id.clone());
        Ok(vnet_id)
    }

    async fn route_table_ids(&mut self) -> Result<HashSet<String>> {
        let vnet_id = self.vnet_id().await?;
        let vnet: VirtualNetwork = self.arm.get_as(&vnet_id).await?;
        let mut ids = route_table_ids_for_vnet(&vnet);

        for peering in &vnet.properties.virtual_network_peerings {
            let remote_id = &peering.properties.remote_virtual_network.id;
            let state = peering.properties.peering_state.as_deref().unwrap_or("");
            if state != "Connected" {
                info!("peered vnet {} in state {} ignored", remote_id, state);
                continue;
            }
            match self.arm.get_as::<VirtualNetwork>(remote_id).await {
                Ok(remote) => ids.extend(route_table_ids_for_vnet(&remote)),
                Err(err) => {
                    info!("failed to retrieve peered network {}: {}", remote_id, err);
                }
            }
        }
        debug!("route table ids: {:?}", ids);
        Ok(ids)
    }

    /// Returns `true` while any route table is held back by its provisioning
    /// state. Inaccessible tables (HTTP 401/403) are skipped; peered VNets
    /// commonly live in tenants this node cannot read.
    pub(crate) async fn set_routing_tables(&mut self) -> Result<bool> {
        let mut todo = false;
        for rid in self.route_table_ids().await? {
            match self.reconcile_route_table(&rid).await {
                Ok(pending) => todo |= pending,
                Err(FailoverError::Arm(err)) if err.is_access_denied() => {
                    info!("no access to route table {}: {}", rid, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(todo)
    }

    async fn reconcile_route_table(&self, rid: &str) -> Result<bool> {
        debug!("route table id: {}", rid);
        let table: RouteTable = self.arm.get_as(rid).await?;
        if !self.arm.ensure_ready(&table).await?.is_ready() {
            return Ok(true);
        }

        let mut table = table;
        let mut dirty = false;
        for route in &mut table.properties.routes {
            if route.properties.next_hop_type != VIRTUAL_APPLIANCE {
                continue;
            }
            let Some(next_hop) = route.properties.next_hop_ip_address.clone() else {
                continue;
            };
            let Some(index) = self
                .config
                .addresses
                .peer
                .iter()
                .position(|peer| *peer == next_hop)
            else {
                continue;
            };
            if is_peer_host_route(
                route.properties.address_prefix.as_deref(),
                &self.config.addresses.peer,
            ) {
                continue;
            }
            let my_addr = self.config.addresses.me[index].clone();
            info!(
                "changing route {}: next hop {} -> {}",
                route.name.as_deref().unwrap_or("<unnamed>"),
                next_hop,
                my_addr
            );
            route.properties.next_hop_ip_address = Some(my_addr);
            dirty = true;
        }

        if dirty {
            self.mark_in_progress()?;
            self.arm.safe_put_as(rid, &table, "route table update").await?;
        } else {
            debug!("route table already set correctly");
        }
        Ok(false)
    }
}

/// Peer reachability routes carry the peer's own address as a host prefix.
fn is_peer_host_route(prefix: Option<&str>, peers: &[String]) -> bool {
    let Some(prefix) = prefix else { return false };
    let Ok(net) = prefix.parse::<Ipv4Net>() else {
        return false;
    };
    net.prefix_len() == 32
        && peers
            .iter()
            .any(|peer| peer.parse::<Ipv4Addr>().map_or(false, |addr| addr == net.addr()))
}

fn route_table_ids_for_vnet(vnet: &VirtualNetwork) -> HashSet<String> {
    vnet.properties
        .subnets
        .iter()
        .filter_map(|subnet| {
            subnet
                .properties
                .route_table
                .as_ref()
                .map(|rt| rt.id.clone())
        })
        .collect()
}

/// Drop the last `levels` path segments of a resource id.
fn parent_of(id: &str, levels: usize) -> String {
    let mut parts: Vec<&str> = id.split('/').collect();
    parts.truncate(parts.len().saturating_sub(levels));
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_route_exemption() {
        let peers = vec!["10.0.1.5".to_string(), "10.0.2.5".to_string()];
        assert!(is_peer_host_route(Some("10.0.1.5/32"), &peers));
        // any peer address qualifies, not only the route's own next hop
        assert!(is_peer_host_route(Some("10.0.2.5/32"), &peers));
        assert!(!is_peer_host_route(Some("10.0.1.5/24"), &peers));
        assert!(!is_peer_host_route(Some("0.0.0.0/0"), &peers));
        assert!(!is_peer_host_route(Some("10.9.9.9/32"), &peers));
        assert!(!is_peer_host_route(None, &peers));
        assert!(!is_peer_host_route(Some("not-a-prefix"), &peers));
    }

    #[test]
    fn subnet_id_to_vnet_id() {
        let subnet = "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/virtualNetworks/vnet0/subnets/frontend";
        assert_eq!(
            parent_of(subnet, 2),
            "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/virtualNetworks/vnet0"
        );
    }
}
