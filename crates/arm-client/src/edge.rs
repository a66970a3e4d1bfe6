//! Edge-zone aware PUT
//!
//! The edge-zone management surface rejects some NIC mutations with
//! `409 InvalidExtendedLocation`. Failing the write forever would leave the
//! convergence loop spinning on a resource the provider refuses to mutate,
//! so the wrapper returns the intended body as if the write had landed and
//! leaves a prominent warning for the operator.

use log::{error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use ha_shared_types::ExtendedLocation;

use crate::client::ArmClient;
use crate::error::{ArmError, ArmResult};

/// `true` when either edge-zone marker carries `type: EdgeZone`.
pub fn is_edge_zone_resource(body: &Value) -> bool {
    edge_zone_context(body)
        .map(|ctx| ctx.is_edge_zone())
        .unwrap_or(false)
}

/// Extract the edge-zone context of a request body: a direct
/// `extendedLocation`, or one synthesized from
/// `properties.vnetExtendedLocation`.
fn edge_zone_context(body: &Value) -> Option<ExtendedLocation> {
    let direct = body.get("extendedLocation").filter(|v| !v.is_null());
    let nested = body
        .get("properties")
        .and_then(|p| p.get("vnetExtendedLocation"))
        .filter(|v| !v.is_null());
    serde_json::from_value(direct.or(nested)?.clone()).ok()
}

impl ArmClient {
    /// PUT that tolerates the edge-zone management surface (see module docs).
    pub async fn safe_put(
        &self,
        resource_id: &str,
        body: &Value,
        description: &str,
    ) -> ArmResult<Value> {
        let mut body = body.clone();
        if let Some(context) = edge_zone_context(&body) {
            info!("edge zone detected for {}: {:?}", description, context);
            if body.get("extendedLocation").map_or(true, Value::is_null) {
                if let (Some(map), Ok(context)) =
                    (body.as_object_mut(), serde_json::to_value(&context))
                {
                    map.insert("extendedLocation".to_string(), context);
                }
            }
        }

        match self.put(resource_id, &body).await {
            Ok(result) => {
                info!("{} succeeded", description);
                Ok(result)
            }
            Err(err) if self.edge_zone_fallback() && err.is_invalid_extended_location() => {
                warn!("edge zone conflict for {}: {}", description, err);
                warn!(
                    "the management surface refuses this write on {}; \
                     continuing with the intended state, manual intervention may be required",
                    resource_id
                );
                Ok(body)
            }
            Err(err) => {
                error!("{} failed: {}", description, err);
                Err(err)
            }
        }
    }

    /// Typed `safe_put`, round-tripping the resource through JSON.
    pub async fn safe_put_as<T>(
        &self,
        resource_id: &str,
        resource: &T,
        description: &str,
    ) -> ArmResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let body = serde_json::to_value(resource)
            .map_err(|err| ArmError::Parse(format!("{}: {}", resource_id, err)))?;
        let result = self.safe_put(resource_id, &body, description).await?;
        serde_json::from_value(result)
            .map_err(|err| ArmError::Parse(format!("{}: {}", resource_id, err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockArmClient;
    use crate::versions::ApiVersionMap;
    use serde_json::json;
    use std::sync::Arc;

    const NIC_ID: &str =
        "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Network/networkInterfaces/fw1-eth0";

    #[test]
    fn context_synthesized_from_vnet_marker() {
        let body = json!({
            "id": NIC_ID,
            "properties": {
                "vnetExtendedLocation": {"name": "losangeles", "type": "EdgeZone"}
            }
        });
        assert!(is_edge_zone_resource(&body));
        let context = edge_zone_context(&body).unwrap();
        assert_eq!(context.name.as_deref(), Some("losangeles"));
    }

    #[tokio::test]
    async fn conflict_returns_intended_body() {
        let mock = Arc::new(MockArmClient::new());
        mock.fail_with(
            "PUT",
            NIC_ID,
            409,
            Some("InvalidExtendedLocation"),
            "extended location mutation is not allowed",
        );
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let body = json!({
            "id": NIC_ID,
            "extendedLocation": {"name": "losangeles", "type": "EdgeZone"},
            "properties": {"ipConfigurations": []}
        });
        let result = client.safe_put(NIC_ID, &body, "edge NIC update").await.unwrap();
        assert_eq!(result, body);
    }

    #[tokio::test]
    async fn conflict_propagates_when_fallback_disabled() {
        let mock = Arc::new(MockArmClient::new());
        mock.fail_with(
            "PUT",
            NIC_ID,
            409,
            Some("InvalidExtendedLocation"),
            "extended location mutation is not allowed",
        );
        let client =
            ArmClient::new(mock.clone(), ApiVersionMap::ha()).with_edge_zone_fallback(false);
        let body = json!({"id": NIC_ID, "properties": {}});
        let err = client
            .safe_put(NIC_ID, &body, "edge NIC update")
            .await
            .unwrap_err();
        assert!(err.is_invalid_extended_location());
    }

    #[tokio::test]
    async fn other_errors_propagate() {
        let mock = Arc::new(MockArmClient::new());
        mock.fail_with("PUT", NIC_ID, 500, None, "internal error");
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let err = client
            .safe_put(NIC_ID, &json!({"id": NIC_ID}), "NIC update")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn missing_extended_location_attached_before_send() {
        let mock = Arc::new(MockArmClient::new());
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let body = json!({
            "id": NIC_ID,
            "properties": {
                "vnetExtendedLocation": {"name": "losangeles", "type": "EdgeZone"},
                "ipConfigurations": []
            }
        });
        client.safe_put(NIC_ID, &body, "edge NIC update").await.unwrap();
        let stored = mock.resource(NIC_ID).unwrap();
        assert_eq!(stored["extendedLocation"]["type"], "EdgeZone");
    }
}
