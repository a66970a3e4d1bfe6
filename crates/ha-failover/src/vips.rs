//! VIP reconciler
//!
//! Moves the configured secondary ipConfigurations from the peer NIC to the
//! local NIC, one write per interface per tick. The peer removal must be
//! persisted before the local addition is attempted, so an interface never
//! takes both writes in the same tick.

use log::{debug, info, warn};
use serde_json::{Map, Value};

use ha_shared_types::{
    InterfaceSwitchMode, IpConfiguration, IpConfigurationProperties, NetworkInterface, SubResource,
    VipConfig,
};

use crate::engine::FailoverEngine;
use crate::error::Result;
use crate::nic::{ip_config_index, nic_by_suffix, primary_ip_conf};

/// Outcome of one interface's pass within a tick.
enum InterfacePass {
    /// Complete no-op: every VIP already sits on the local NIC and none on
    /// the peer.
    Settled,
    /// A write was issued or a provisioning gate held the interface back.
    Busy,
}

impl FailoverEngine {
    /// Returns `true` while any interface still needs work.
    pub(crate) async fn set_cluster_ips(&mut self) -> Result<bool> {
        let Some(interfaces) = self.config.cluster_network_interfaces.clone() else {
            return Ok(false);
        };

        let me = self.get_vm(&self.config.hostname).await?;
        let peer = self.get_vm(&self.config.peername).await?;
        let mut nic_sets = self.get_vm_nics(&[&me, &peer]).await?.into_iter();
        let my_nics = nic_sets.next().unwrap_or_default();
        let peer_nics = nic_sets.next().unwrap_or_default();

        log_edge_zone_environment(my_nics.iter().chain(peer_nics.iter()));

        let mut settled = 0usize;
        for (cni, vips) in &interfaces {
            match self
                .reconcile_interface(cni, vips, &my_nics, &peer_nics)
                .await?
            {
                InterfacePass::Settled => settled += 1,
                InterfacePass::Busy => {
                    if self.config.interface_switch_mode == InterfaceSwitchMode::Serial {
                        break;
                    }
                }
            }
        }
        Ok(settled != interfaces.len())
    }

    async fn reconcile_interface(
        &self,
        cni: &str,
        vips: &[VipConfig],
        my_nics: &[NetworkInterface],
        peer_nics: &[NetworkInterface],
    ) -> Result<InterfacePass> {
        debug!("{}: {} configured VIPs", cni, vips.len());

        let peer_nic = nic_by_suffix(peer_nics, cni)?;
        if !self.arm.ensure_ready(peer_nic).await?.is_ready() {
            return Ok(InterfacePass::Busy);
        }

        // Peer cleanup pass: every configured VIP leaves the peer first.
        let mut peer_nic = peer_nic.clone();
        let mut removed = false;
        for vip in vips {
            while let Some(index) = ip_config_index(&peer_nic, &vip.name) {
                info!("removing {} from peer {} [{}]", vip.name, cni, index);
                peer_nic.properties.ip_configurations.remove(index);
                removed = true;
            }
        }
        if removed {
            self.mark_in_progress()?;
            let id = peer_nic.id.clone();
            self.arm
                .safe_put_as(&id, &peer_nic, &format!("peer {} VIP removal", cni))
                .await?;
            return Ok(InterfacePass::Busy);
        }

        let my_nic = nic_by_suffix(my_nics, cni)?;
        if !self.arm.ensure_ready(my_nic).await?.is_ready() {
            return Ok(InterfacePass::Busy);
        }

        let first = primary_ip_conf(my_nic)?;
        let subnet = first.properties.subnet.clone();
        let security_groups = first.properties.application_security_groups.clone();

        // Local addition pass: append every missing VIP, one PUT in total.
        let mut my_nic = my_nic.clone();
        let mut added = false;
        for vip in vips {
            if ip_config_index(&my_nic, &vip.name).is_some() {
                debug!("VIP {} already present on {}", vip.name, cni);
                continue;
            }
            my_nic.properties.ip_configurations.push(new_vip_ip_config(
                vip,
                subnet.clone(),
                security_groups.clone(),
                &self.config.base_id(),
            ));
            added = true;
        }
        if added {
            self.mark_in_progress()?;
            let id = my_nic.id.clone();
            self.arm
                .safe_put_as(&id, &my_nic, &format!("local {} VIP addition", cni))
                .await?;
            return Ok(InterfacePass::Busy);
        }

        Ok(InterfacePass::Settled)
    }
}

fn new_vip_ip_config(
    vip: &VipConfig,
    subnet: Option<SubResource>,
    security_groups: Option<Value>,
    base_id: &str,
) -> IpConfiguration {
    IpConfiguration {
        name: vip.name.clone(),
        id: None,
        properties: IpConfigurationProperties {
            private_ip_address: Some(vip.private_ip_addr.clone()),
            private_ip_allocation_method: Some("Static".to_string()),
            private_ip_address_version: Some("IPv4".to_string()),
            primary: Some(false),
            subnet,
            public_ip_address: public_ip_id(vip, base_id).map(SubResource::new),
            application_security_groups: security_groups,
            ..Default::default()
        },
        extra: Map::new(),
    }
}

/// Full resource path as-is; bare names are rooted in the cluster's resource
/// group.
fn public_ip_id(vip: &VipConfig, base_id: &str) -> Option<String> {
    if vip.public_ip_obj.is_empty() {
        return None;
    }
    if vip.public_ip_obj.contains('/') {
        Some(vip.public_ip_obj.clone())
    } else {
        Some(format!(
            "{}Microsoft.Network/publicIPAddresses/{}",
            base_id, vip.public_ip_obj
        ))
    }
}

fn log_edge_zone_environment<'a>(nics: impl Iterator<Item = &'a NetworkInterface>) {
    for nic in nics {
        if nic.is_edge_zone() {
            warn!("edge zone environment detected on NIC {}", nic.name);
            warn!("VIP writes may hit management-surface limitations; watch for InvalidExtendedLocation conflicts");
            return;
        }
    }
    debug!("no edge zone markers on cluster NICs");
}
