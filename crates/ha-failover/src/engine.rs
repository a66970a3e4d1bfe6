//! Failover orchestration

use std::sync::Arc;

use log::{debug, info};

use azure_arm_client::ArmClient;
use ha_shared_types::{ClusterConfig, FailoverStatus};

use crate::error::Result;
use crate::status::StatusFile;

/// Converges the cloud network objects toward the local node across ticks.
///
/// The engine is deliberately single-writer: it runs on one thread, driven
/// by the daemon's event loop, and performs at most one mutating write per
/// resource per tick. The only state carried between ticks is the config
/// epoch, the `todo` flag and the discovered VNet id.
pub struct FailoverEngine {
    pub(crate) arm: ArmClient,
    pub(crate) config: ClusterConfig,
    pub(crate) status: Arc<StatusFile>,
    pub(crate) vnet_id: Option<String>,
    todo: bool,
}

impl FailoverEngine {
    pub fn new(arm: ArmClient, config: ClusterConfig, status: Arc<StatusFile>) -> Self {
        let vnet_id = config.vnet_id.clone();
        Self {
            arm,
            config,
            status,
            vnet_id,
            todo: false,
        }
    }

    /// Whether the previous tick left work for a later one.
    pub fn work_pending(&self) -> bool {
        self.todo
    }

    /// One reconciliation tick for the active role.
    ///
    /// Dispatches the reconcilers the deployment template calls for, folds
    /// their "work remains" flags into `todo` and reports `DONE` on any tick
    /// that ends converged (the status file deduplicates repeats). On error
    /// `todo` is left untouched so the next tick retries.
    pub async fn set_local_active(&mut self) -> Result<()> {
        debug!("set_local_active called");

        let mut todo = false;
        if self.config.template_name.is_vip_only() {
            todo |= self.set_cluster_ips().await?;
        } else {
            todo |= self.set_routing_tables().await?;
            if self.config.cluster_network_interfaces.is_some() {
                todo |= self.set_cluster_ips().await?;
                todo |= self.set_lb_nat_rules().await?;
            } else if !self.config.template_name.is_stack() {
                todo |= self.set_public_address().await?;
            }
        }

        if !todo {
            if self.todo {
                info!("done");
            }
            self.status.set(FailoverStatus::Done)?;
        }
        self.todo = todo;
        Ok(())
    }

    /// Called right before any mutating write; deduplicated by the status
    /// file.
    pub(crate) fn mark_in_progress(&self) -> Result<()> {
        self.status.set(FailoverStatus::InProgress)?;
        Ok(())
    }
}
