//! Load-balancer inbound NAT rule reconciler
//!
//! Rules named `cluster-vip*` follow the active member: they are stripped
//! from the peer's primary ipConfiguration before being attached to the
//! local one.

use std::collections::HashSet;

use log::debug;

use ha_shared_types::{LoadBalancer, SubResource};

use crate::engine::FailoverEngine;
use crate::error::Result;
use crate::nic::{nat_rule_set, primary_ip_conf_mut};

const CLUSTER_VIP_PREFIX: &str = "cluster-vip";

impl FailoverEngine {
    /// Returns `true` while the rule migration still needs work.
    pub(crate) async fn set_lb_nat_rules(&mut self) -> Result<bool> {
        let Some(lb_name) = self.config.lb_name.clone() else {
            return Ok(false);
        };
        debug!("lbname: {}", lb_name);
        let lb_id = format!(
            "{}microsoft.network/loadBalancers/{}",
            self.config.base_id(),
            lb_name
        );
        let lb: LoadBalancer = match self.arm.get_as(&lb_id).await {
            Ok(lb) => lb,
            Err(err) if err.is_not_found() => {
                debug!("{} not found", lb_id);
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let target: HashSet<String> = lb
            .properties
            .inbound_nat_rules
            .iter()
            .filter(|rule| {
                rule.name
                    .to_ascii_lowercase()
                    .starts_with(CLUSTER_VIP_PREFIX)
            })
            .map(|rule| rule.id.to_ascii_lowercase())
            .collect();
        debug!("cluster NAT rules: {:?}", target);
        if target.is_empty() {
            return Ok(false);
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

        let my_rules = nat_rule_set(&my_nic)?;
        let peer_rules = nat_rule_set(&peer_nic)?;

        if target.is_subset(&my_rules) {
            debug!("interface already set");
            return Ok(false);
        }

        if !target.is_disjoint(&peer_rules) {
            // the peer still references cluster rules: strip them first
            let mut peer_nic = peer_nic;
            let conf = primary_ip_conf_mut(&mut peer_nic)?;
            let kept: Vec<SubResource> = conf
                .properties
                .load_balancer_inbound_nat_rules
                .take()
                .unwrap_or_default()
                .into_iter()
                .filter(|rule| {
                    !rule
                        .last_segment()
                        .to_ascii_lowercase()
                        .starts_with(CLUSTER_VIP_PREFIX)
                })
                .collect();
            conf.properties.load_balancer_inbound_nat_rules = Some(kept);
            self.mark_in_progress()?;
            let id = peer_nic.id.clone();
            self.arm
                .safe_put_as(&id, &peer_nic, "peer NIC disassociation")
                .await?;
            return Ok(true);
        }

        let mut my_nic = my_nic;
        let conf = primary_ip_conf_mut(&mut my_nic)?;
        let mut union: Vec<String> = my_rules.union(&target).cloned().collect();
        union.sort();
        conf.properties.load_balancer_inbound_nat_rules =
            Some(union.into_iter().map(SubResource::new).collect());
        self.mark_in_progress()?;
        let id = my_nic.id.clone();
        self.arm
            .safe_put_as(&id, &my_nic, "local NIC association")
            .await?;
        Ok(true)
    }
}
