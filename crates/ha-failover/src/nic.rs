//! VM and NIC discovery helpers shared by the reconcilers

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use ha_shared_types::{IpConfiguration, NetworkInterface, VirtualMachine};

use crate::engine::FailoverEngine;
use crate::error::{FailoverError, Result};

impl FailoverEngine {
    pub(crate) async fn get_vm(&self, name: &str) -> Result<VirtualMachine> {
        let id = format!(
            "{}microsoft.compute/virtualmachines/{}",
            self.config.base_id(),
            name
        );
        Ok(self.arm.get_as(&id).await?)
    }

    /// Full NIC object behind a VM's primary attachment.
    pub(crate) async fn get_vm_primary_nic(&self, vm: &VirtualMachine) -> Result<NetworkInterface> {
        let attachment = vm
            .primary_nic_attachment()
            .ok_or_else(|| FailoverError::NoNics(vm.name.clone()))?;
        Ok(self.arm.get_as(&attachment.id).await?)
    }

    /// Resolve the NIC objects of several VMs out of one resource-group
    /// listing, matching ids case-insensitively.
    pub(crate) async fn get_vm_nics(
        &self,
        vms: &[&VirtualMachine],
    ) -> Result<Vec<Vec<NetworkInterface>>> {
        let listing = self
            .arm
            .get(&format!(
                "{}microsoft.network/networkinterfaces",
                self.config.base_id()
            ))
            .await?;
        let all: Vec<NetworkInterface> = serde_json::from_value(
            listing
                .get("value")
                .cloned()
                .unwrap_or(Value::Array(Vec::new())),
        )
        .map_err(|err| {
            FailoverError::Arm(azure_arm_client::ArmError::Parse(format!(
                "NIC listing: {}",
                err
            )))
        })?;
        let by_id: HashMap<String, &NetworkInterface> = all
            .iter()
            .map(|nic| (nic.id.to_ascii_lowercase(), nic))
            .collect();

        let mut sets = Vec::with_capacity(vms.len());
        for vm in vms {
            let mut nics = Vec::new();
            for attachment in &vm.properties.network_profile.network_interfaces {
                let nic = by_id
                    .get(&attachment.id.to_ascii_lowercase())
                    .ok_or_else(|| FailoverError::NicNotListed(attachment.id.clone()))?;
                nics.push((*nic).clone());
            }
            sets.push(nics);
        }
        Ok(sets)
    }
}

pub(crate) fn nic_by_suffix<'a>(
    nics: &'a [NetworkInterface],
    suffix: &str,
) -> Result<&'a NetworkInterface> {
    nics.iter()
        .find(|nic| nic.name.ends_with(suffix))
        .ok_or_else(|| FailoverError::InterfaceNotFound(suffix.to_string()))
}

/// Index of a named ipConfiguration, matched case-insensitively.
pub(crate) fn ip_config_index(nic: &NetworkInterface, name: &str) -> Option<usize> {
    nic.properties
        .ip_configurations
        .iter()
        .position(|conf| conf.name.eq_ignore_ascii_case(name))
}

pub(crate) fn primary_ip_conf(nic: &NetworkInterface) -> Result<&IpConfiguration> {
    nic.properties
        .ip_configurations
        .first()
        .ok_or_else(|| FailoverError::NoIpConfigurations(nic.name.clone()))
}

pub(crate) fn primary_ip_conf_mut(nic: &mut NetworkInterface) -> Result<&mut IpConfiguration> {
    let name = nic.name.clone();
    nic.properties
        .ip_configurations
        .first_mut()
        .ok_or(FailoverError::NoIpConfigurations(name))
}

/// Lower-cased NAT rule ids referenced by the NIC's first ipConfiguration.
pub(crate) fn nat_rule_set(nic: &NetworkInterface) -> Result<HashSet<String>> {
    Ok(primary_ip_conf(nic)?
        .nat_rule_ids()
        .map(|id| id.to_ascii_lowercase())
        .collect())
}
