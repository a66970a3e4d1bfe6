//! Cluster public IP reconciler
//!
//! The cluster public address and every externally-managed inbound NAT rule
//! (anything not named `checkpoint-*`) follow the active member's primary
//! NIC. Peer disassociation always precedes the local association.

use std::collections::HashSet;

use log::debug;

use ha_shared_types::{LoadBalancer, SubResource};

use crate::engine::FailoverEngine;
use crate::error::{FailoverError, Result};
use crate::nic::{nat_rule_set, primary_ip_conf, primary_ip_conf_mut};

/// Rules carrying this prefix are pinned per-member and never migrated.
/// Unlike the cluster-vip match, the prefix is compared case-sensitively.
const MEMBER_RULE_PREFIX: &str = "checkpoint-";

impl FailoverEngine {
    /// Returns `true` while the public address migration still needs work.
    pub(crate) async fn set_public_address(&mut self) -> Result<bool> {
        let cluster_name = self
            .config
            .cluster_name
            .clone()
            .ok_or(FailoverError::MissingClusterName)?;

        let mut target: HashSet<String> = HashSet::new();
        if let Some(lb_name) = self.config.lb_name.clone() {
            debug!("lbname: {}", lb_name);
            let lb_id = format!(
                "{}microsoft.network/loadBalancers/{}",
                self.config.base_id(),
                lb_name
            );
            match self.arm.get_as::<LoadBalancer>(&lb_id).await {
                Ok(lb) => {
                    target = lb
                        .properties
                        .inbound_nat_rules
                        .iter()
                        .filter(|rule| !rule.name.starts_with(MEMBER_RULE_PREFIX))
                        .map(|rule| rule.id.to_ascii_lowercase())
                        .collect();
                    debug!("migratable NAT rules: {:?}", target);
                }
                Err(err) if err.is_not_found() => debug!("{} not found", lb_id),
                Err(err) => return Err(err.into()),
            }
        }

        let me = self.get_vm(&self.config.hostname).await?;
        let peer = self.get_vm(&self.config.peername).await?;

        let my_nic = self.get_vm_primary_nic(&me).await?;
        if !self.arm.ensure_ready(&my_nic).await?.is_ready() {
            return Ok(true);
        }
        let peer_nic = self.get_vm_primary_nic(&peer).await?;
        if !self.arm.ensure_ready(&peer_nic).await?.is_ready() {
            return Ok(true);
        }

        let public_ip_id = format!(
            "{}Microsoft.Network/publicIPAddresses/{}",
            self.config.base_id(),
            cluster_name
        );
        let public_ip = match self.arm.get(&public_ip_id).await {
            Ok(body) => Some(body),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err.into()),
        };
        debug!("cluster public address present: {}", public_ip.is_some());

        let my_rules = nat_rule_set(&my_nic)?;
        let peer_rules = nat_rule_set(&peer_nic)?;
        let my_conf = primary_ip_conf(&my_nic)?;
        let peer_conf = primary_ip_conf(&peer_nic)?;

        // "no cluster public IP configured" short-circuits the same way as
        // "my NIC already holds it"
        if (public_ip.is_none() || my_conf.properties.public_ip_address.is_some())
            && target.is_subset(&my_rules)
        {
            debug!("interface already set");
            return Ok(false);
        }

        if peer_conf.properties.public_ip_address.is_some() || !target.is_disjoint(&peer_rules) {
            let mut peer_nic = peer_nic;
            let conf = primary_ip_conf_mut(&mut peer_nic)?;
            conf.properties.public_ip_address = None;
            let kept: Vec<SubResource> = conf
                .properties
                .load_balancer_inbound_nat_rules
                .take()
                .unwrap_or_default()
                .into_iter()
                .filter(|rule| rule.last_segment().starts_with(MEMBER_RULE_PREFIX))
                .collect();
            conf.properties.load_balancer_inbound_nat_rules = Some(kept);
            self.mark_in_progress()?;
            let id = peer_nic.id.clone();
            self.arm
                .safe_put_as(&id, &peer_nic, "peer NIC public IP disassociation")
                .await?;
            return Ok(true);
        }

        let mut my_nic = my_nic;
        let conf = primary_ip_conf_mut(&mut my_nic)?;
        if public_ip.is_some() {
            conf.properties.public_ip_address = Some(SubResource::new(public_ip_id));
        }
        let mut union: Vec<String> = my_rules.union(&target).cloned().collect();
        union.sort();
        conf.properties.load_balancer_inbound_nat_rules =
            Some(union.into_iter().map(SubResource::new).collect());
        self.mark_in_progress()?;
        let id = my_nic.id.clone();
        self.arm
            .safe_put_as(&id, &my_nic, "local NIC public IP association")
            .await?;
        Ok(true)
    }
}
