//! Canned ARM backend for tests
//!
//! Implements the provider contract the reconcilers rely on: GET by id, GET
//! of a provider collection (`{"value": [...]}`), PUT persisting the body.
//! Errors can be injected per (method, id) and every call is recorded so
//! tests can assert ordering and idempotence.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::client::{ArmApi, ArmResponse};
use crate::error::{ArmError, ArmResult};

#[derive(Debug, Clone)]
struct InjectedError {
    status: u16,
    code: Option<String>,
    message: String,
}

#[derive(Default)]
struct MockState {
    /// Resources keyed by lower-cased id.
    resources: HashMap<String, Value>,
    /// Errors keyed by `"<METHOD> <lower-cased id>"`.
    errors: HashMap<String, InjectedError>,
    /// Every request as `(method, path-and-query)`, in order.
    calls: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MockArmClient {
    state: Mutex<MockState>,
}

impl MockArmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource under its own `id` field.
    pub fn insert(&self, resource: Value) {
        let id = resource["id"]
            .as_str()
            .unwrap_or_default()
            .to_ascii_lowercase();
        self.lock().resources.insert(id, resource);
    }

    /// Replace `properties.provisioningState` of a stored resource.
    pub fn set_provisioning_state(&self, id: &str, state: &str) {
        let mut guard = self.lock();
        if let Some(props) = guard
            .resources
            .get_mut(&id.to_ascii_lowercase())
            .and_then(|r| r.get_mut("properties"))
            .and_then(Value::as_object_mut)
        {
            props.insert("provisioningState".to_string(), json!(state));
        }
    }

    /// Every subsequent `method` call against `id` fails with this error.
    pub fn fail_with(
        &self,
        method: &str,
        id: &str,
        status: u16,
        code: Option<&str>,
        message: &str,
    ) {
        self.lock().errors.insert(
            format!("{} {}", method, id.to_ascii_lowercase()),
            InjectedError {
                status,
                code: code.map(str::to_string),
                message: message.to_string(),
            },
        );
    }

    pub fn clear_error(&self, method: &str, id: &str) {
        self.lock()
            .errors
            .remove(&format!("{} {}", method, id.to_ascii_lowercase()));
    }

    pub fn resource(&self, id: &str) -> Option<Value> {
        self.lock().resources.get(&id.to_ascii_lowercase()).cloned()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.lock().calls.clone()
    }

    /// Resource ids of every PUT, in order.
    pub fn put_ids(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(method, _)| method == "PUT")
            .map(|(_, path)| strip_query(path).to_string())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

#[async_trait]
impl ArmApi for MockArmClient {
    async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Value>,
    ) -> ArmResult<ArmResponse> {
        let path = strip_query(path_and_query);
        let key = path.to_ascii_lowercase();
        let mut guard = self.lock();
        guard
            .calls
            .push((method.to_string(), path_and_query.to_string()));

        if let Some(err) = guard.errors.get(&format!("{} {}", method, key)) {
            return Err(ArmError::Api {
                status: err.status,
                code: err.code.clone(),
                message: err.message.clone(),
            });
        }

        match method.as_str() {
            "GET" => {
                if let Some(resource) = guard.resources.get(&key) {
                    return Ok(ArmResponse {
                        status: 200,
                        body: resource.clone(),
                    });
                }
                // provider collection listing
                let prefix = format!("{}/", key);
                let members: Vec<Value> = guard
                    .resources
                    .iter()
                    .filter(|(id, _)| id.starts_with(&prefix))
                    .map(|(_, r)| r.clone())
                    .collect();
                if !members.is_empty() {
                    return Ok(ArmResponse {
                        status: 200,
                        body: json!({ "value": members }),
                    });
                }
                Err(ArmError::Api {
                    status: 404,
                    code: Some("ResourceNotFound".to_string()),
                    message: format!("{} was not found", path),
                })
            }
            "PUT" => {
                let mut stored = body.cloned().unwrap_or(Value::Null);
                if let Some(props) = stored.get_mut("properties").and_then(Value::as_object_mut) {
                    props.insert("provisioningState".to_string(), json!("Succeeded"));
                }
                guard.resources.insert(key, stored.clone());
                Ok(ArmResponse {
                    status: 200,
                    body: stored,
                })
            }
            other => Err(ArmError::Api {
                status: 405,
                code: None,
                message: format!("method {} not supported by the mock", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ArmClient;
    use crate::versions::ApiVersionMap;
    use std::sync::Arc;

    const BASE: &str = "/subscriptions/s/resourcegroups/rg/providers/";

    #[tokio::test]
    async fn collection_listing() {
        let mock = Arc::new(MockArmClient::new());
        mock.insert(json!({
            "id": format!("{}Microsoft.Network/networkInterfaces/fw1-eth0", BASE),
            "name": "fw1-eth0", "properties": {}
        }));
        mock.insert(json!({
            "id": format!("{}Microsoft.Network/networkInterfaces/fw2-eth0", BASE),
            "name": "fw2-eth0", "properties": {}
        }));
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let listing = client
            .get(&format!("{}microsoft.network/networkinterfaces", BASE))
            .await
            .unwrap();
        assert_eq!(listing["value"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_resource_is_404() {
        let mock = Arc::new(MockArmClient::new());
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let err = client
            .get(&format!("{}Microsoft.Network/publicIPAddresses/cluster-ip", BASE))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_persists_with_succeeded_state() {
        let mock = Arc::new(MockArmClient::new());
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let id = format!("{}Microsoft.Network/networkInterfaces/fw1-eth0", BASE);
        client
            .put(&id, &json!({"id": id, "properties": {"provisioningState": "Updating"}}))
            .await
            .unwrap();
        let stored = mock.resource(&id).unwrap();
        assert_eq!(stored["properties"]["provisioningState"], "Succeeded");
        assert_eq!(mock.put_ids(), vec![id]);
    }
}
