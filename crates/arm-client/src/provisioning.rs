//! Provisioning-state gate
//!
//! ARM writes settle asynchronously; `provisioningState` reports the
//! transition. A resource that is not `Succeeded` must not be written this
//! tick; a `Failed` resource gets an idempotent self-PUT, which the provider
//! interprets as "retry the last transition".

use log::info;
use serde::Serialize;

use ha_shared_types::ArmResource;

use crate::client::ArmClient;
use crate::error::{ArmError, ArmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending,
    /// Reset initiated; treat as pending for the rest of the tick.
    Failed,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

impl ArmClient {
    /// Gate a write on the resource's provisioning state.
    pub async fn ensure_ready<T>(&self, resource: &T) -> ArmResult<Readiness>
    where
        T: ArmResource + Serialize,
    {
        match resource.provisioning_state() {
            Some("Succeeded") => Ok(Readiness::Ready),
            Some("Failed") => {
                info!("resource {} is Failed, resetting", resource.resource_id());
                let body = serde_json::to_value(resource).map_err(|err| {
                    ArmError::Parse(format!("{}: {}", resource.resource_id(), err))
                })?;
                self.safe_put(resource.resource_id(), &body, "resource reset")
                    .await?;
                Ok(Readiness::Failed)
            }
            state => {
                info!(
                    "resource {} not ready: {}",
                    resource.resource_id(),
                    state.unwrap_or("<missing provisioningState>")
                );
                Ok(Readiness::Pending)
            }
        }
    }
}
