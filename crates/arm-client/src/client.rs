//! ARM transport and the typed GET/PUT facade

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, Proxy};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ArmError, ArmResult};
use crate::versions::ApiVersionMap;

/// Management endpoint for a named cloud environment.
pub fn management_endpoint(environment: Option<&str>) -> &'static str {
    match environment.unwrap_or("AzureCloud") {
        "AzureChinaCloud" => "https://management.chinacloudapi.cn",
        "AzureUSGovernment" => "https://management.usgovcloudapi.net",
        "AzureGermanCloud" => "https://management.microsoftazure.de",
        _ => "https://management.azure.com",
    }
}

#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub body: Value,
}

/// Raw transport contract; implemented by the HTTP client and by the test
/// mock.
#[async_trait]
pub trait ArmApi: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Value>,
    ) -> ArmResult<ArmResponse>;
}

/// reqwest-backed transport against the ARM endpoint.
pub struct HttpArmClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpArmClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> ArmResult<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            builder = builder.proxy(Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            auth_token: None,
        })
    }

    /// Bearer token for every request; acquisition happens outside the
    /// daemon.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl ArmApi for HttpArmClient {
    async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Value>,
    ) -> ArmResult<ArmResponse> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!("ARM {} {}", method, path_and_query);

        let mut request = self.client.request(method, &url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|err| ArmError::Parse(format!("invalid JSON response: {}", err)))?
        };

        if status >= 400 {
            let (code, message) = error_details(&body);
            return Err(ArmError::Api {
                status,
                code,
                message,
            });
        }

        debug!("ARM response: status={}, body_size={}", status, text.len());
        Ok(ArmResponse { status, body })
    }
}

/// Provider error payloads nest as `{"error": {"code": ..., "message": ...}}`.
fn error_details(body: &Value) -> (Option<String>, String) {
    let error = body.get("error").unwrap_or(body);
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    (code, message)
}

/// GET/PUT wrapper that appends the resolved api-version to every call and
/// round-trips typed resources through JSON.
#[derive(Clone)]
pub struct ArmClient {
    api: Arc<dyn ArmApi>,
    versions: Arc<ApiVersionMap>,
    edge_zone_fallback: bool,
}

impl ArmClient {
    pub fn new(api: Arc<dyn ArmApi>, versions: ApiVersionMap) -> Self {
        Self {
            api,
            versions: Arc::new(versions),
            edge_zone_fallback: true,
        }
    }

    /// Disable the edge-zone conflict fallback (see `safe_put`).
    pub fn with_edge_zone_fallback(mut self, enabled: bool) -> Self {
        self.edge_zone_fallback = enabled;
        self
    }

    pub(crate) fn edge_zone_fallback(&self) -> bool {
        self.edge_zone_fallback
    }

    pub async fn get(&self, resource_id: &str) -> ArmResult<Value> {
        let path = format!("{}{}", resource_id, self.versions.query_suffix(resource_id));
        Ok(self.api.request(Method::GET, &path, None).await?.body)
    }

    pub async fn get_as<T: DeserializeOwned>(&self, resource_id: &str) -> ArmResult<T> {
        serde_json::from_value(self.get(resource_id).await?)
            .map_err(|err| ArmError::Parse(format!("{}: {}", resource_id, err)))
    }

    /// Plain PUT without edge-zone handling; most callers want `safe_put`.
    pub async fn put(&self, resource_id: &str, body: &Value) -> ArmResult<Value> {
        let path = format!("{}{}", resource_id, self.versions.query_suffix(resource_id));
        Ok(self.api.request(Method::PUT, &path, Some(body)).await?.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockArmClient;
    use serde_json::json;

    #[test]
    fn environment_endpoints() {
        assert_eq!(
            management_endpoint(None),
            "https://management.azure.com"
        );
        assert_eq!(
            management_endpoint(Some("AzureChinaCloud")),
            "https://management.chinacloudapi.cn"
        );
        assert_eq!(
            management_endpoint(Some("AzureCloud")),
            "https://management.azure.com"
        );
    }

    #[test]
    fn error_details_from_arm_payload() {
        let (code, message) = error_details(&json!({
            "error": {"code": "InvalidExtendedLocation", "message": "not allowed"}
        }));
        assert_eq!(code.as_deref(), Some("InvalidExtendedLocation"));
        assert_eq!(message, "not allowed");

        let (code, message) = error_details(&json!({"unexpected": true}));
        assert_eq!(code, None);
        assert_eq!(message, "unknown error");
    }

    #[tokio::test]
    async fn get_appends_api_version() {
        let mock = Arc::new(MockArmClient::new());
        mock.insert(json!({
            "id": "/subscriptions/s/resourcegroups/rg/providers/Microsoft.Compute/virtualMachines/fw1",
            "name": "fw1"
        }));
        let client = ArmClient::new(mock.clone(), ApiVersionMap::ha());
        let vm = client
            .get("/subscriptions/s/resourcegroups/rg/providers/Microsoft.Compute/virtualMachines/fw1")
            .await
            .unwrap();
        assert_eq!(vm["name"], "fw1");
        let (_, query) = mock.calls()[0].clone();
        assert!(query.ends_with("?api-version=2019-07-01"));
    }
}
